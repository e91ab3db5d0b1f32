//! Configuration for the custodial RPC gateway.
//!
//! Defaults come from the environment (mirroring the teacher's
//! `Config::from_env`); the CLI layer (`cli.rs`) overlays explicit flags on
//! top, matching spec.md §6's `server`/`user`/`local` subcommand flags.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Where `eth_accounts` sources its address list from — spec.md §9 Open
/// Question, resolved in DESIGN.md by making it a deployment choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountsSource {
    /// Addresses the gateway generated in this process (the account cache).
    Local,
    /// A single address read from the remote secret store.
    Secrets,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream blockchain node JSON-RPC URL.
    pub upstream_rpc_url: String,

    /// Remote secret-store (Vault-compatible) address.
    pub secrets_address: String,

    /// Directory of the on-disk encrypted keystore.
    pub keystore_dir: PathBuf,

    /// Path to the embedded user-token store file.
    pub db_path: PathBuf,

    /// UNIX-domain socket path for the admin IPC channel.
    pub admin_socket_path: PathBuf,

    /// HTTP bind address, e.g. "0.0.0.0:8080".
    pub bind_address: String,

    /// HTTP path the JSON-RPC dispatcher is mounted on.
    pub rpc_path: String,

    /// Bypasses the Auth middleware entirely when true.
    pub disable_auth: bool,

    /// Source for `eth_accounts`.
    pub accounts_source: AccountsSource,

    /// Passphrase used for every local signing operation. The base design
    /// hard-codes an empty passphrase (spec.md §9 Open Question); kept
    /// configurable so tests and stricter deployments can supply one.
    pub signing_passphrase: String,

    /// How long graceful shutdown waits for in-flight requests to drain.
    pub shutdown_grace: std::time::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            upstream_rpc_url: std::env::var("EXECUTOR_UPSTREAM_RPC")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".into()),
            secrets_address: std::env::var("EXECUTOR_SECRETS_ADDRESS")
                .unwrap_or_else(|_| "http://127.0.0.1:8200".into()),
            keystore_dir: std::env::var("EXECUTOR_KEYSTORE")
                .unwrap_or_else(|_| "/home/ubuntu/.ethereum/keystore".into())
                .into(),
            db_path: std::env::var("EXECUTOR_DB_PATH")
                .unwrap_or_else(|_| "eximchain.db".into())
                .into(),
            admin_socket_path: std::env::var("EXECUTOR_ADMIN_SOCKET")
                .unwrap_or_else(|_| "/tmp/executor.sock".into())
                .into(),
            bind_address: std::env::var("EXECUTOR_BIND")
                .unwrap_or_else(|_| "0.0.0.0:8080".into()),
            rpc_path: std::env::var("EXECUTOR_RPC_PATH").unwrap_or_else(|_| "/rpc".into()),
            disable_auth: std::env::var("EXECUTOR_DISABLE_AUTH")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            accounts_source: match std::env::var("EXECUTOR_ACCOUNTS_SOURCE").as_deref() {
                Ok("secrets") => AccountsSource::Secrets,
                _ => AccountsSource::Local,
            },
            signing_passphrase: std::env::var("EXECUTOR_SIGNING_PASSPHRASE").unwrap_or_default(),
            shutdown_grace: std::env::var("EXECUTOR_SHUTDOWN_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(std::time::Duration::from_secs)
                .unwrap_or(std::time::Duration::from_secs(5)),
        })
    }

    /// A `local` dev-mode config: no secrets-store dependency, no auth,
    /// matching spec.md §6's `local` subcommand.
    pub fn local_dev(keystore_dir: PathBuf, upstream_rpc_url: String) -> Result<Self> {
        let mut cfg = Self::from_env().context("building base config for local mode")?;
        cfg.keystore_dir = keystore_dir;
        cfg.upstream_rpc_url = upstream_rpc_url;
        cfg.disable_auth = true;
        Ok(cfg)
    }
}
