//! RPC Dispatcher (C7): the single HTTP route that demultiplexes JSON-RPC
//! requests via the Method Registry (C4) and invokes either the Upstream
//! Forwarder (C5) or the Transaction Executor (C6).

use axum::extract::State;
use axum::Json;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::registry::{lookup, HandlerKind};
use crate::types::{JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND};

pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    info!(method = %req.method, "RPC request received");

    let Some(kind) = lookup(&req.method) else {
        return Json(JsonRpcResponse::error(
            req.id.clone(),
            METHOD_NOT_FOUND,
            format!("the method {} does not exist/is not available", req.method),
        ));
    };

    let response = match kind {
        HandlerKind::Passthrough => state.upstream.forward(&req).await,
        HandlerKind::LocalKeygen => handle_keygen(&state, &req),
        HandlerKind::LocalAccount => handle_accounts(&state, &req).await,
        HandlerKind::LocalSign => handle_sign(&state, &req).await,
        HandlerKind::LocalBalance => handle_balance(&state, &req).await,
    };

    Json(response)
}

fn handle_keygen(state: &AppState, req: &JsonRpcRequest) -> JsonRpcResponse {
    match state.executor.generate_key() {
        Ok(addr) => JsonRpcResponse::result(req.id.clone(), Value::String(format!("{addr:#x}"))),
        Err(e) => JsonRpcResponse::error(req.id.clone(), e.rpc_code(), e.to_string()),
    }
}

async fn handle_accounts(state: &AppState, req: &JsonRpcRequest) -> JsonRpcResponse {
    use crate::config::AccountsSource;
    use crate::error::GatewayError;
    use crate::secrets::{parse_singleton_address, SINGLETON_KEY_PATH};

    let addresses: Result<Vec<String>, GatewayError> = match state.config.accounts_source {
        AccountsSource::Local => Ok(state
            .executor
            .cached_accounts()
            .iter()
            .map(|a| format!("{a:#x}"))
            .collect()),
        AccountsSource::Secrets => {
            // One deployment mode: a single address parsed from the remote
            // secret store's Keyfile-shaped blob (`transport.go: Keyfile`,
            // `service.go: GetKey`'s `keys/singleton` path).
            async {
                let secrets = state
                    .secrets
                    .as_ref()
                    .ok_or_else(|| GatewayError::Secrets("no secrets client configured".into()))?;
                let bearer = state.secrets_bearer.as_deref().unwrap_or_default();
                let data = secrets.read(SINGLETON_KEY_PATH, bearer).await?;
                Ok(vec![parse_singleton_address(&data)?])
            }
            .await
        }
    };

    match addresses {
        Ok(list) => JsonRpcResponse::result(req.id.clone(), Value::Array(list.into_iter().map(Value::String).collect())),
        Err(e) => JsonRpcResponse::error(req.id.clone(), e.rpc_code(), e.to_string()),
    }
}

async fn handle_sign(state: &AppState, req: &JsonRpcRequest) -> JsonRpcResponse {
    match req.method.as_str() {
        "eth_sign" => handle_eth_sign(state, req),
        "eth_sendTransaction" => handle_send_or_sign_tx(state, req, true).await,
        "eth_signTransaction" => handle_send_or_sign_tx(state, req, false).await,
        _ => unreachable!("registry only routes these three methods to LocalSign"),
    }
}

fn handle_eth_sign(state: &AppState, req: &JsonRpcRequest) -> JsonRpcResponse {
    let params = match req.params.as_array() {
        Some(p) if p.len() >= 2 => p,
        _ => {
            return JsonRpcResponse::error(
                req.id.clone(),
                crate::types::INVALID_PARAMS,
                "eth_sign requires [address, data]",
            )
        }
    };
    let address = params[0].as_str().unwrap_or_default();
    let data_hex = params[1].as_str().unwrap_or_default();
    let data = match hex::decode(data_hex.trim_start_matches("0x")) {
        Ok(d) => d,
        Err(e) => {
            return JsonRpcResponse::error(req.id.clone(), crate::types::INVALID_PARAMS, e.to_string())
        }
    };
    match state.executor.sign_hash(address, &data) {
        Ok(sig) => JsonRpcResponse::result(req.id.clone(), Value::String(sig)),
        Err(e) => JsonRpcResponse::error(req.id.clone(), e.rpc_code(), e.to_string()),
    }
}

async fn handle_send_or_sign_tx(state: &AppState, req: &JsonRpcRequest, submit: bool) -> JsonRpcResponse {
    let tx = match req
        .params
        .as_array()
        .and_then(|p| p.first())
        .and_then(|v| serde_json::from_value::<crate::types::RpcTransaction>(v.clone()).ok())
    {
        Some(tx) => tx,
        None => {
            return JsonRpcResponse::error(
                req.id.clone(),
                crate::types::INVALID_PARAMS,
                "expected a one-element array of transaction objects",
            )
        }
    };

    let to = tx.to.unwrap_or_default();
    let gas = tx.gas.unwrap_or_else(|| "0x0".to_string());
    let gas_price = tx.gas_price.unwrap_or_else(|| "0x0".to_string());
    let value = tx.value.unwrap_or_else(|| "0x0".to_string());
    let data = tx.data.unwrap_or_default();

    let result = if submit {
        state
            .executor
            .send_transaction(&tx.from, &to, &value, &gas, &gas_price, &data)
            .await
    } else {
        state
            .executor
            .sign_transaction(&tx.from, &to, &value, &gas, &gas_price, &data)
            .await
    };

    match result {
        Ok(out) => JsonRpcResponse::result(req.id.clone(), Value::String(out)),
        Err(e) => JsonRpcResponse::error(req.id.clone(), e.rpc_code(), e.to_string()),
    }
}

async fn handle_balance(state: &AppState, req: &JsonRpcRequest) -> JsonRpcResponse {
    let address = req
        .params
        .as_array()
        .and_then(|p| p.first())
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    match state.executor.get_balance(address).await {
        Ok(balance) => JsonRpcResponse::result(req.id.clone(), Value::String(format!("0x{balance:x}"))),
        Err(crate::error::GatewayError::AccountMissing) => {
            // Cache miss: fall through to the upstream as a raw passthrough,
            // per spec.md §4.4's LocalBalance fallthrough rule.
            state.upstream.forward(req).await
        }
        Err(e) => JsonRpcResponse::error(req.id.clone(), e.rpc_code(), e.to_string()),
    }
}
