//! Shared application state handed to every axum handler via `State`.

use std::sync::Arc;

use crate::config::Config;
use crate::executor::TransactionExecutor;
use crate::secrets::Secrets;
use crate::upstream::UpstreamClient;
use crate::user_store::UserStore;

pub struct AppState {
    pub config: Config,
    pub user_store: Arc<UserStore>,
    pub executor: Arc<TransactionExecutor>,
    pub upstream: UpstreamClient,
    /// Present whenever the gateway has a live secrets-store session
    /// (absent in `local` dev mode). Backs `AccountsSource::Secrets`.
    pub secrets: Option<Arc<dyn Secrets>>,
    pub secrets_bearer: Option<String>,
}
