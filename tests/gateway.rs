//! End-to-end scenarios from spec.md §8, run against the axum router
//! directly via `tower::ServiceExt::oneshot` (no real HTTP socket, no real
//! upstream node — methods exercised here never need one).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware;
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use custodian_rpc::app::AppState;
use custodian_rpc::auth::require_auth;
use custodian_rpc::config::{AccountsSource, Config};
use custodian_rpc::dispatcher::handle_rpc;
use custodian_rpc::error::GatewayError;
use custodian_rpc::executor::TransactionExecutor;
use custodian_rpc::secrets::Secrets;
use custodian_rpc::signer::{KeystoreSigner, Signer};
use custodian_rpc::upstream::UpstreamClient;
use custodian_rpc::user_store::UserStore;

/// Stands in for a live Vault session in the `eth_accounts`
/// `AccountsSource::Secrets` test below.
struct FakeSecrets;

#[async_trait::async_trait]
impl Secrets for FakeSecrets {
    async fn login_with_identity(&self, _method: &str, _role: &str) -> Result<String, GatewayError> {
        Ok("fake-bearer".into())
    }

    async fn read(&self, path: &str, _bearer: &str) -> Result<Value, GatewayError> {
        assert_eq!(path, "keys/singleton");
        Ok(json!({ "key": "{\"address\":\"abcd000000000000000000000000000000000000\"}" }))
    }
}

fn test_config(disable_auth: bool) -> Config {
    Config {
        upstream_rpc_url: "http://127.0.0.1:0".into(),
        secrets_address: "http://127.0.0.1:0".into(),
        keystore_dir: std::env::temp_dir(),
        db_path: std::env::temp_dir().join("unused.db"),
        admin_socket_path: std::env::temp_dir().join("unused.sock"),
        bind_address: "127.0.0.1:0".into(),
        rpc_path: "/rpc".into(),
        disable_auth,
        accounts_source: AccountsSource::Local,
        signing_passphrase: String::new(),
        shutdown_grace: std::time::Duration::from_secs(1),
    }
}

fn build_app(disable_auth: bool) -> (Router, tempfile::TempDir) {
    let keystore_dir = tempfile::tempdir().unwrap();
    let signer: Arc<dyn Signer> = Arc::new(KeystoreSigner::open(keystore_dir.path()).unwrap());
    let upstream = UpstreamClient::new("http://127.0.0.1:0");
    let executor = Arc::new(TransactionExecutor::new(signer, upstream.clone(), String::new()));

    let db_dir = tempfile::tempdir().unwrap();
    let user_store = Arc::new(UserStore::open(db_dir.path().join("users.db")).unwrap());

    let mut config = test_config(disable_auth);
    config.keystore_dir = keystore_dir.path().to_path_buf();

    let state = Arc::new(AppState {
        config,
        user_store,
        executor,
        upstream,
        secrets: None,
        secrets_bearer: None,
    });

    let router = Router::new()
        .route("/rpc", post(handle_rpc))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    (router, db_dir)
}

fn rpc_request(body: Value, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json");
    if let Some(token) = auth {
        builder = builder.header("authorization", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn auth_reject_missing_header() {
    let (app, _db) = build_app(false);
    let req = rpc_request(json!({"jsonrpc":"2.0","id":2,"method":"eth_syncing","params":[]}), None);
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"no auth in header\n");
}

#[tokio::test]
async fn auth_reject_unknown_token() {
    let (app, _db) = build_app(false);
    let req = rpc_request(
        json!({"jsonrpc":"2.0","id":2,"method":"eth_syncing","params":[]}),
        Some("bogus"),
    );
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"no user found\n");
}

#[tokio::test]
async fn unknown_method_is_rejected_before_auth_bypass_matters() {
    let (app, _db) = build_app(true);
    let req = rpc_request(
        json!({"jsonrpc":"2.0","id":7,"method":"totally_bogus_method","params":[]}),
        None,
    );
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["id"], 7);
    assert_eq!(json["error"]["code"], -32601);
}

#[tokio::test]
async fn keygen_then_accounts_contains_new_address() {
    let (app, _db) = build_app(true);

    let keygen_req = rpc_request(
        json!({"jsonrpc":"2.0","id":1,"method":"personal_newAccount","params":[]}),
        None,
    );
    let resp = app.clone().oneshot(keygen_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let address = json["result"].as_str().unwrap().to_string();
    assert_eq!(address.len(), 42);
    assert!(address.starts_with("0x"));

    let accounts_req = rpc_request(
        json!({"jsonrpc":"2.0","id":2,"method":"eth_accounts","params":[]}),
        None,
    );
    let resp = app.oneshot(accounts_req).await.unwrap();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let accounts = json["result"].as_array().unwrap();
    assert!(accounts.iter().any(|a| a.as_str() == Some(address.as_str())));
}

#[tokio::test]
async fn unknown_sender_tx_fails_without_hitting_upstream() {
    let (app, _db) = build_app(true);
    let from = format!("0x{}", "11".repeat(20));
    let to = format!("0x{}", "22".repeat(20));
    let req = rpc_request(
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "eth_sendTransaction",
            "params": [{
                "from": from,
                "to": to,
                "value": "0x1",
                "gas": "0x5208",
                "gasPrice": "0x1",
                "data": "",
            }]
        }),
        None,
    );
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["message"], "account not found");
}

#[tokio::test]
async fn eth_accounts_secrets_mode_reads_singleton_keyfile() {
    let keystore_dir = tempfile::tempdir().unwrap();
    let signer: Arc<dyn Signer> = Arc::new(KeystoreSigner::open(keystore_dir.path()).unwrap());
    let upstream = UpstreamClient::new("http://127.0.0.1:0");
    let executor = Arc::new(TransactionExecutor::new(signer, upstream.clone(), String::new()));

    let db_dir = tempfile::tempdir().unwrap();
    let user_store = Arc::new(UserStore::open(db_dir.path().join("users.db")).unwrap());

    let mut config = test_config(true);
    config.keystore_dir = keystore_dir.path().to_path_buf();
    config.accounts_source = AccountsSource::Secrets;

    let state = Arc::new(AppState {
        config,
        user_store,
        executor,
        upstream,
        secrets: Some(Arc::new(FakeSecrets)),
        secrets_bearer: Some("fake-bearer".into()),
    });

    let router = Router::new().route("/rpc", post(handle_rpc)).with_state(state);

    let req = rpc_request(
        json!({"jsonrpc":"2.0","id":9,"method":"eth_accounts","params":[]}),
        None,
    );
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json["result"],
        json!(["0xabcd000000000000000000000000000000000000"])
    );
}
