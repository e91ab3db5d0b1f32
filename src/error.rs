//! Crate-wide error taxonomy (spec §7). Bootstrap errors are handled with
//! `anyhow` directly (see `main.rs`); this enum covers per-request and
//! per-connection failures that must be translated into a JSON-RPC error
//! payload or an HTTP status code.

use crate::types::{self, JsonRpcError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("secrets store error: {0}")]
    Secrets(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("account not found")]
    AccountMissing,

    #[error("signing error: {0}")]
    Signing(String),

    #[error("{0}")]
    AuthRejected(&'static str),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl GatewayError {
    /// JSON-RPC error code for this variant, per spec §7.
    pub fn rpc_code(&self) -> i32 {
        match self {
            GatewayError::BadRequest(_) => types::INVALID_PARAMS,
            GatewayError::AuthRejected(_) => types::SERVER_ERROR,
            _ => types::SERVER_ERROR,
        }
    }

    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.rpc_code(),
            message: self.to_string(),
            data: None,
        }
    }
}

/// Lets handlers that run outside the JSON-RPC dispatcher (the `/rpc` POST
/// itself failing to parse, for example) return a plain HTTP error.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match self {
            GatewayError::AuthRejected(_) => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
