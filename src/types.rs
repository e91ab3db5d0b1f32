//! JSON-RPC 2.0 wire types shared by the dispatcher, the upstream forwarder,
//! and the admin IPC channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request as received on the HTTP endpoint.
///
/// `id` is kept as a raw `Value` (not coerced to a string or integer) so it
/// round-trips byte-for-byte regardless of whether the caller sent a number,
/// a string, or `null`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const SERVER_ERROR: i32 = -32000;
pub const INTERNAL_ERROR: i32 = -32603;

impl JsonRpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Reconstruct a response from a raw upstream body, substituting the
    /// caller's `id` back in (upstream echoes its own, which we discard).
    pub fn from_upstream_body(id: Value, body: Value) -> Self {
        if let Some(err) = body.get("error") {
            let code = err.get("code").and_then(Value::as_i64).unwrap_or(SERVER_ERROR as i64) as i32;
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("upstream error")
                .to_string();
            return Self::error(id, code, message);
        }
        Self::result(id, body.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// One element of the `eth_sendTransaction` / `eth_signTransaction` params array.
///
/// All numeric-ish fields arrive hex-encoded per the JSON-RPC convention;
/// they are parsed to integers at the executor boundary, not here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RpcTransaction {
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub gas: Option<String>,
    #[serde(rename = "gasPrice", default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
}

pub type RpcTransactionParams = Vec<RpcTransaction>;
