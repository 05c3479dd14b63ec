use std::time::Duration;

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::hex;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::core::{TxIn, SOURCE_BLX, SOURCE_EDEN};

/// Default feed endpoints; overridable via the environment.
const BLX_DEFAULT_URI: &str = "wss://api.blxrbdn.com/ws";
const EDEN_DEFAULT_URI: &str = "wss://speed-eu.edennetwork.io";

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A relay endpoint speaking the bloXroute websocket feed protocol:
/// authenticated connect, one `subscribe` request, then a stream of
/// notifications carrying raw transaction bytes.
pub struct RelayFeed {
    source: &'static str,
    url: String,
    auth_token: String,
}

impl RelayFeed {
    pub fn bloxroute(auth_token: String) -> Self {
        Self {
            source: SOURCE_BLX,
            url: env_or("BLX_URI", BLX_DEFAULT_URI),
            auth_token,
        }
    }

    /// Eden runs the same feed protocol as bloXroute.
    pub fn eden(auth_token: String) -> Self {
        Self {
            source: SOURCE_EDEN,
            url: env_or("EDEN_URI", EDEN_DEFAULT_URI),
            auth_token,
        }
    }

    /// Consume the feed and submit every decodable transaction. Reconnects
    /// forever; returns only when the collector is gone.
    pub async fn run(self, tx: mpsc::Sender<TxIn>) {
        loop {
            if let Err(e) = self.subscribe_once(&tx).await {
                warn!(source = self.source, url = %self.url, error = %e, "relay subscription ended");
            }
            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn subscribe_once(&self, tx: &mpsc::Sender<TxIn>) -> Result<(), RelayError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(RelayError::Ws)?;
        let auth = HeaderValue::from_str(&self.auth_token).map_err(|_| RelayError::BadAuthToken)?;
        request.headers_mut().insert("Authorization", auth);

        let (ws, _) = connect_async(request).await.map_err(RelayError::Ws)?;
        let (mut write, mut read) = ws.split();

        let subscribe = json!({
            "id": 1,
            "method": "subscribe",
            "params": ["newTxs", {"include": ["raw_tx"]}],
        });
        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(RelayError::Ws)?;
        info!(source = self.source, url = %self.url, "subscribed to relay feed");

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(RelayError::Ws)?;
            let Message::Text(text) = msg else { continue };
            let envelope = match decode_feed_message(&text) {
                Ok(Some(envelope)) => envelope,
                // subscription ack or other non-notification frame
                Ok(None) => continue,
                Err(e) => {
                    debug!(source = self.source, error = %e, "undecodable feed message");
                    continue;
                }
            };
            if tx.send(TxIn::new(envelope, self.source)).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Deserialize)]
struct FeedMessage {
    params: Option<FeedParams>,
}

#[derive(Debug, Deserialize)]
struct FeedParams {
    result: Option<FeedResult>,
}

#[derive(Debug, Deserialize)]
struct FeedResult {
    #[serde(rename = "rawTx")]
    raw_tx: String,
}

/// Pull the raw transaction out of a feed notification and decode it.
/// Non-notification frames yield `None`.
fn decode_feed_message(text: &str) -> Result<Option<TxEnvelope>, RelayError> {
    let msg: FeedMessage = serde_json::from_str(text).map_err(RelayError::Json)?;
    let Some(raw_hex) = msg.params.and_then(|p| p.result).map(|r| r.raw_tx) else {
        return Ok(None);
    };
    let raw = hex::decode(raw_hex.trim_start_matches("0x"))
        .map_err(|e| RelayError::BadRawTx(e.to_string()))?;
    let envelope = TxEnvelope::decode_2718(&mut raw.as_slice())
        .map_err(|e| RelayError::BadRawTx(e.to_string()))?;
    Ok(Some(envelope))
}

#[derive(Debug)]
enum RelayError {
    Ws(tokio_tungstenite::tungstenite::Error),
    Json(serde_json::Error),
    BadRawTx(String),
    BadAuthToken,
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Ws(e) => write!(f, "websocket error: {e}"),
            RelayError::Json(e) => write!(f, "malformed feed message: {e}"),
            RelayError::BadRawTx(e) => write!(f, "bad raw transaction: {e}"),
            RelayError::BadAuthToken => write!(f, "auth token is not a valid header value"),
        }
    }
}

impl std::error::Error for RelayError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::legacy_tx;
    use alloy::eips::eip2718::Encodable2718;

    #[test]
    fn notification_decodes_to_the_submitted_transaction() {
        let tx = legacy_tx(0x11);
        let raw = tx.encoded_2718();
        let text = json!({
            "params": {
                "subscription": "abc123",
                "result": {"rawTx": hex::encode_prefixed(&raw)},
            }
        })
        .to_string();

        let decoded = decode_feed_message(&text).unwrap().unwrap();
        assert_eq!(decoded.encoded_2718(), raw);
    }

    #[test]
    fn subscription_ack_is_skipped() {
        let ack = json!({"id": 1, "result": "abc123"}).to_string();
        assert!(decode_feed_message(&ack).unwrap().is_none());
    }

    #[test]
    fn garbage_raw_tx_is_an_error() {
        let text = json!({"params": {"result": {"rawTx": "0xzz"}}}).to_string();
        assert!(decode_feed_message(&text).is_err());

        let text = json!({"params": {"result": {"rawTx": "0x00"}}}).to_string();
        assert!(decode_feed_message(&text).is_err());
    }

    #[test]
    fn env_override_wins_over_default() {
        std::env::set_var("BLX_URI", "wss://relay.example/ws");
        let feed = RelayFeed::bloxroute("token".into());
        assert_eq!(feed.url, "wss://relay.example/ws");
        std::env::remove_var("BLX_URI");
    }
}
