use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::core::housekeeper;
use crate::core::processor::{CollectorState, TxProcessor};
use crate::core::INPUT_QUEUE_SIZE;
use crate::rpc::{EthRpc, InclusionCheck, RpcError};
use crate::sources::{node, relay::RelayFeed};

/// Wire up the processor, the housekeeper and every configured source
/// adapter, then return. Everything runs as background tasks; the processor
/// stops once the last adapter has dropped its channel sender.
pub fn start(config: &Config) -> Result<(), RpcError> {
    let state = Arc::new(CollectorState::new(
        &config.collector.out_dir,
        &config.collector.uid,
    ));

    let checker: Option<Arc<dyn InclusionCheck>> = if config.check.node_uri.is_empty() {
        None
    } else {
        info!(uri = %config.check.node_uri, "inclusion checks enabled");
        Some(Arc::new(EthRpc::new(&config.check.node_uri)?))
    };

    let (tx, rx) = mpsc::channel(INPUT_QUEUE_SIZE);

    tokio::spawn(housekeeper::run(state.clone()));

    let processor = TxProcessor::new(state, checker, config.collector.write_sourcelog);
    tokio::spawn(processor.run(rx));

    for node_url in &config.sources.nodes {
        tokio::spawn(node::run(node_url.clone(), tx.clone()));
    }

    if !config.sources.bloxroute_auth_token.is_empty() {
        let feed = RelayFeed::bloxroute(config.sources.bloxroute_auth_token.clone());
        tokio::spawn(feed.run(tx.clone()));
    }
    if !config.sources.eden_auth_token.is_empty() {
        let feed = RelayFeed::eden(config.sources.eden_auth_token.clone());
        tokio::spawn(feed.run(tx.clone()));
    }

    Ok(())
}
