//! Upstream Forwarder (C5): issues JSON-RPC calls against the configured
//! upstream node and returns the body verbatim, substituting the caller's
//! `id` back in. Grounded in the teacher's `proxy_to_upstream`, generalized
//! into a reusable client (one `reqwest::Client` per process instead of one
//! per call) and into named accessors the Executor needs (`pending_nonce`,
//! `balance_at`, `sync_progress`) in addition to raw passthrough.

use crate::error::GatewayError;
use crate::types::{JsonRpcRequest, JsonRpcResponse};
use serde_json::{json, Value};

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    url: String,
}

impl UpstreamClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Forwards a request untouched; preserves the caller's `id`. No
    /// retries, no connection pooling beyond what `reqwest` gives for free.
    pub async fn forward(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        match self.call_raw(&req.method, req.params.clone()).await {
            Ok(body) => JsonRpcResponse::from_upstream_body(req.id.clone(), body),
            Err(e) => JsonRpcResponse::error(
                req.id.clone(),
                crate::types::SERVER_ERROR,
                e.to_string(),
            ),
        }
    }

    /// Low-level call used both by `forward` and by the Executor's named
    /// upstream accessors below.
    async fn call_raw(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;
        resp.json::<Value>()
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))
    }

    /// `PendingNonceAt` — the pending transaction count for an address.
    pub async fn pending_nonce(&self, address: &str) -> Result<u64, GatewayError> {
        let body = self
            .call_raw(
                "eth_getTransactionCount",
                json!([address, "pending"]),
            )
            .await?;
        parse_hex_u64(&body)
    }

    /// `BalanceAt` — the balance of an address at the latest block.
    pub async fn balance_at(&self, address: &str) -> Result<u128, GatewayError> {
        let body = self
            .call_raw("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_hex_u128(&body)
    }

    pub async fn send_raw_transaction(&self, signed_hex: &str) -> Result<String, GatewayError> {
        let body = self
            .call_raw("eth_sendRawTransaction", json!([signed_hex]))
            .await?;
        extract_result_str(&body)
    }

    /// `SyncProgress` — `(syncing, current, highest)`; `syncing=false` means
    /// upstream reports `eth_syncing` as `false`.
    pub async fn sync_progress(&self) -> Result<(bool, u64, u64), GatewayError> {
        let body = self.call_raw("eth_syncing", json!([])).await?;
        let result = body
            .get("result")
            .cloned()
            .unwrap_or(Value::Bool(false));
        if let Some(false) = result.as_bool() {
            return Ok((false, 0, 0));
        }
        let current = result
            .get("currentBlock")
            .map(parse_hex_value_u64)
            .transpose()?
            .unwrap_or(0);
        let highest = result
            .get("highestBlock")
            .map(parse_hex_value_u64)
            .transpose()?
            .unwrap_or(0);
        Ok((true, current, highest))
    }
}

fn extract_result_str(body: &Value) -> Result<String, GatewayError> {
    if let Some(err) = body.get("error") {
        return Err(GatewayError::Upstream(err.to_string()));
    }
    body.get("result")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Upstream("missing result".into()))
}

fn parse_hex_u64(body: &Value) -> Result<u64, GatewayError> {
    parse_hex_value_u64(&extract_result(body)?)
}

fn parse_hex_u128(body: &Value) -> Result<u128, GatewayError> {
    let v = extract_result(body)?;
    let s = v
        .as_str()
        .ok_or_else(|| GatewayError::Upstream("expected hex string result".into()))?;
    u128::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| GatewayError::Upstream(format!("invalid hex u128: {e}")))
}

fn parse_hex_value_u64(v: &Value) -> Result<u64, GatewayError> {
    let s = v
        .as_str()
        .ok_or_else(|| GatewayError::Upstream("expected hex string result".into()))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| GatewayError::Upstream(format!("invalid hex u64: {e}")))
}

fn extract_result(body: &Value) -> Result<Value, GatewayError> {
    if let Some(err) = body.get("error") {
        return Err(GatewayError::Upstream(err.to_string()));
    }
    body.get("result")
        .cloned()
        .ok_or_else(|| GatewayError::Upstream("missing result".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_u64_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": "0x2a"});
        assert_eq!(parse_hex_u64(&body).unwrap(), 42);
    }

    #[test]
    fn parses_hex_u128_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": "0xde0b6b3a7640000"});
        assert_eq!(parse_hex_u128(&body).unwrap(), 1_000_000_000_000_000_000u128);
    }

    #[test]
    fn propagates_upstream_error() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "boom"}});
        assert!(parse_hex_u64(&body).is_err());
    }
}
