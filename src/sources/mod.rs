//! Source adapters.
//!
//! Each adapter owns its provider connection, including the reconnect
//! policy, and submits one `TxIn` value per observed transaction into the
//! fan-in channel. The bounded channel's backpressure propagates into the
//! adapter's receive loop; an adapter returns once the collector side of
//! the channel is gone.

pub mod node;
pub mod relay;
