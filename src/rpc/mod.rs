use alloy::primitives::{hex, TxHash};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};

/// Chain-node lookup used to route already-mined transactions to the trash
/// file instead of the archive.
#[async_trait]
pub trait InclusionCheck: Send + Sync {
    /// Block number the transaction landed in, or `None` while it is still
    /// pending.
    async fn tx_inclusion(&self, hash: TxHash) -> Result<Option<u64>, RpcError>;
}

/// Minimal Ethereum JSON-RPC client.
pub struct EthRpc {
    url: Url,
    client: Client,
}

impl EthRpc {
    pub fn new(uri: &str) -> Result<Self, RpcError> {
        let url = Url::parse(uri).map_err(|e| RpcError::BadUri(e.to_string()))?;
        Ok(Self {
            url,
            client: Client::new(),
        })
    }

    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(RpcError::Http)?;

        let json: Value = resp.json().await.map_err(RpcError::Http)?;

        if let Some(err) = json.get("error").and_then(|e| {
            if e.is_null() {
                None
            } else {
                Some(e.clone())
            }
        }) {
            return Err(RpcError::Rpc(err));
        }

        Ok(json["result"].clone())
    }
}

#[async_trait]
impl InclusionCheck for EthRpc {
    async fn tx_inclusion(&self, hash: TxHash) -> Result<Option<u64>, RpcError> {
        let result = match self
            .call("eth_getTransactionReceipt", vec![json!(hex::encode_prefixed(hash))])
            .await
        {
            Ok(result) => result,
            // some nodes answer a missing tx with an explicit error instead of null
            Err(RpcError::Rpc(e)) if rpc_error_is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e),
        };
        receipt_block_number(&result)
    }
}

/// Extract the inclusion block from an `eth_getTransactionReceipt` result.
/// A `null` receipt means the transaction is not on chain.
fn receipt_block_number(result: &Value) -> Result<Option<u64>, RpcError> {
    if result.is_null() {
        return Ok(None);
    }
    let field = result
        .get("blockNumber")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::BadResponse(result.clone()))?;
    let block = u64::from_str_radix(field.trim_start_matches("0x"), 16)
        .map_err(|_| RpcError::BadResponse(result.clone()))?;
    Ok(Some(block))
}

fn rpc_error_is_not_found(err: &Value) -> bool {
    err.get("message")
        .and_then(Value::as_str)
        .map(|m| m == "not found")
        .unwrap_or(false)
}

#[derive(Debug)]
pub enum RpcError {
    BadUri(String),
    Http(reqwest::Error),
    Rpc(Value),
    BadResponse(Value),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::BadUri(e) => write!(f, "bad RPC uri: {e}"),
            RpcError::Http(e) => write!(f, "HTTP error: {e}"),
            RpcError::Rpc(e) => write!(f, "RPC error: {e}"),
            RpcError::BadResponse(e) => write!(f, "malformed RPC response: {e}"),
        }
    }
}

impl std::error::Error for RpcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_receipt_means_not_on_chain() {
        assert_eq!(receipt_block_number(&Value::Null).unwrap(), None);
    }

    #[test]
    fn receipt_block_number_parses_hex_quantity() {
        // 0x112a880 == 18_000_000
        let receipt = json!({"blockNumber": "0x112a880", "status": "0x1"});
        assert_eq!(receipt_block_number(&receipt).unwrap(), Some(18_000_000));
    }

    #[test]
    fn malformed_receipt_is_an_error() {
        let receipt = json!({"blockNumber": 42});
        assert!(receipt_block_number(&receipt).is_err());

        let receipt = json!({"status": "0x1"});
        assert!(receipt_block_number(&receipt).is_err());
    }

    #[test]
    fn not_found_error_detection() {
        assert!(rpc_error_is_not_found(
            &json!({"code": -32000, "message": "not found"})
        ));
        assert!(!rpc_error_is_not_found(
            &json!({"code": -32000, "message": "header not found"})
        ));
        assert!(!rpc_error_is_not_found(&json!({"code": -32000})));
    }

    #[test]
    fn bad_uri_is_a_startup_error() {
        assert!(EthRpc::new("not a uri").is_err());
        assert!(EthRpc::new("http://127.0.0.1:8545").is_ok());
    }
}
