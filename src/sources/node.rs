use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::ws::WsConnect;
use alloy::transports::TransportError;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::{TxIn, SOURCE_LOCAL};

/// Delay before re-dialing a node whose subscription dropped.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Subscribe to a direct peer's pending transactions and feed them into the
/// collector. Reconnects forever; returns only when the collector is gone.
pub async fn run(url: String, tx: mpsc::Sender<TxIn>) {
    loop {
        if let Err(e) = subscribe_once(&url, &tx).await {
            warn!(url = %url, error = %e, "node subscription ended");
        }
        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn subscribe_once(url: &str, tx: &mpsc::Sender<TxIn>) -> Result<(), TransportError> {
    let provider = ProviderBuilder::new().connect_ws(WsConnect::new(url)).await?;
    let sub = provider.subscribe_full_pending_transactions().await?;
    info!(url = %url, "subscribed to pending transactions");

    let mut stream = sub.into_stream();
    while let Some(pending) = stream.next().await {
        let tx_in = TxIn::new(pending.inner.into_inner(), SOURCE_LOCAL);
        if tx.send(tx_in).await.is_err() {
            return Ok(());
        }
    }
    Ok(())
}
