//! Bootstrap & Lifecycle (C8): credential bootstrap, component wiring, and
//! signal-driven graceful shutdown for the `server` and `local` subcommands.

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{Method, StatusCode};
use axum::middleware;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::require_auth;
use crate::cli::{LocalArgs, ServerArgs};
use crate::config::Config;
use crate::dispatcher::handle_rpc;
use crate::executor::TransactionExecutor;
use crate::secrets::{Ec2MetadataProvider, IdentityProvider, Secrets, VaultSecrets};
use crate::signer::{KeystoreSigner, Signer};
use crate::upstream::UpstreamClient;
use crate::user_store::UserStore;

/// Runs the `server` subcommand end to end: credential bootstrap, component
/// wiring, serve, graceful shutdown. Fails fast (before listening) on any
/// bootstrap error, matching spec.md §4.8/§6's "fatal bootstrap errors" exit
/// policy.
pub async fn run_server(args: ServerArgs) -> Result<()> {
    let mut config = Config::from_env().context("loading base configuration")?;
    config.secrets_address = args.vault_address.clone();
    config.upstream_rpc_url = args.quorum_address.clone();
    config.keystore_dir = args.keystore.clone();
    config.disable_auth = args.disable_auth;
    config.bind_address = args.bind.clone();
    config.db_path = args.db_path.clone();
    config.admin_socket_path = args.admin_socket.clone();

    if config.disable_auth {
        warn!("auth is disabled; every request will be treated as authenticated");
    }

    // Step 2: acquire the secrets-store bearer token, either from a static
    // flag or by exchanging cloud-identity material (spec.md §4.8 step 2).
    // The client itself is kept (not just the bearer) since
    // `AccountsSource::Secrets` needs it later for `keys/singleton` reads.
    let (secrets_client, bearer) =
        acquire_secrets_bearer(&config, args.auth_token.as_deref()).await?;

    // Step 3: open the Signer over the keystore directory.
    let signer: Arc<dyn Signer> =
        Arc::new(KeystoreSigner::open(&config.keystore_dir).context("opening keystore")?);

    let upstream = UpstreamClient::new(&config.upstream_rpc_url);
    let executor = Arc::new(TransactionExecutor::new(
        signer,
        upstream.clone(),
        config.signing_passphrase.clone(),
    ));

    // Step 4: open the User Store, start the Admin IPC. Both the HTTP auth
    // path and the Admin IPC share one handle, since `sled` itself is the
    // one enforcing single-writer exclusivity (spec.md §4.1).
    let user_store = Arc::new(UserStore::open(&config.db_path).context("opening user store")?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let admin_socket_path = config.admin_socket_path.clone();
    let admin_task = tokio::spawn(crate::admin_ipc::serve(
        admin_socket_path,
        user_store.clone(),
        shutdown_rx,
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        user_store,
        executor,
        upstream,
        secrets: Some(secrets_client),
        secrets_bearer: Some(bearer),
    });

    // Step 5: wrap the dispatcher with auth (unless disabled), mount CORS.
    // `cors_middleware` runs outside the auth layer, so an OPTIONS preflight
    // never reaches `require_auth`, matching `accessControl`'s own
    // before-auth header-then-return shape.
    let rpc_router = Router::new()
        .route(&config.rpc_path, post(handle_rpc))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = rpc_router
        .layer(middleware::from_fn(cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.bind_address))?;
    info!(
        bind = %config.bind_address,
        admin_socket = %config.admin_socket_path.display(),
        "gateway listening"
    );

    let grace = config.shutdown_grace;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx, grace))
        .await
        .context("HTTP server error")?;

    admin_task.abort();
    Ok(())
}

/// Dev-mode server: no secrets-store dependency, no auth (spec.md §6
/// `local`).
pub async fn run_local(args: LocalArgs) -> Result<()> {
    let config = Config::local_dev(args.keystore, args.quorum_address)
        .context("building local-mode configuration")?
        .tap_bind(args.bind);

    let signer: Arc<dyn Signer> =
        Arc::new(KeystoreSigner::open(&config.keystore_dir).context("opening keystore")?);
    let upstream = UpstreamClient::new(&config.upstream_rpc_url);
    let executor = Arc::new(TransactionExecutor::new(
        signer,
        upstream.clone(),
        config.signing_passphrase.clone(),
    ));

    let db_dir = tempfile::tempdir().context("creating scratch dir for local-mode user store")?;
    let user_store = Arc::new(UserStore::open(db_dir.path().join("local.db")).context("opening user store")?);

    let state = Arc::new(AppState {
        config: config.clone(),
        user_store,
        executor,
        upstream,
        secrets: None,
        secrets_bearer: None,
    });

    let app = Router::new()
        .route(&config.rpc_path, post(handle_rpc))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.bind_address))?;
    info!(bind = %config.bind_address, "local-mode gateway listening (no auth, no secrets store)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;
    Ok(())
}

/// Mirrors `original_source/server.go: accessControl` — sets the CORS
/// headers on every response and short-circuits `OPTIONS` preflight.
/// Unlike the original (which returns Go's default 200 on preflight),
/// spec.md §6 redesigns this to `204 No Content`; `tower_http`'s own
/// `CorsLayer` preflight responder always answers 200 and has no knob for
/// this, so CORS is hand-rolled here instead.
async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        set_cors_headers(&mut response);
        return response;
    }

    let mut response = next.run(request).await;
    set_cors_headers(&mut response);
    response
}

fn set_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Origin, Content-Type, Authorization"),
    );
}

trait TapBind {
    fn tap_bind(self, bind: String) -> Self;
}

impl TapBind for Config {
    fn tap_bind(mut self, bind: String) -> Self {
        self.bind_address = bind;
        self
    }
}

/// Collects chained credentials (environment → instance role → the static
/// flag) and exchanges them for a secrets-store bearer token, per
/// spec.md §4.8 step 2. Returns the live client alongside the bearer since
/// `AccountsSource::Secrets` needs it after bootstrap for `keys/singleton`
/// reads (§9 Open Question, resolved in DESIGN.md).
async fn acquire_secrets_bearer(
    config: &Config,
    static_token: Option<&str>,
) -> Result<(Arc<dyn Secrets>, String)> {
    let secrets: Arc<dyn Secrets> = Arc::new(VaultSecrets::new(&config.secrets_address));

    if let Some(token) = static_token {
        return Ok((secrets, token.to_string()));
    }

    let identity = Ec2MetadataProvider::new();
    let role = identity
        .role()
        .await
        .context("discovering instance role from cloud identity")?;
    let bearer = secrets
        .login_with_identity("aws", &role)
        .await
        .context("logging in to secrets store with cloud identity")?;
    Ok((secrets, bearer))
}

/// Waits for SIGINT/SIGTERM, flips the shutdown watch (so the Admin IPC
/// accept loop stops too), then returns so axum starts draining in-flight
/// connections. A background timer forces the process down if that drain
/// hasn't finished within `grace`, since `axum::serve`'s own graceful
/// shutdown has no deadline of its own and would otherwise wait forever on a
/// stuck connection (spec.md §4.8 step 6 / scenario §8.6's 5s bound).
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>, grace: std::time::Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("installing SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining in-flight requests up to {grace:?}");
    let _ = shutdown_tx.send(true);

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!("graceful shutdown exceeded {grace:?} grace period, forcing exit");
        std::process::exit(1);
    });
}
