//! CLI surface (spec.md §6). Replaces the original's `flag.NewFlagSet`
//! subcommands with `clap`'s derive macros, the same pattern
//! `Vitreus-Foundation-power-plant`'s and `selendra-selendrachain`'s own
//! CLI crates use for their node subcommands.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "custodian-rpc", about = "Authenticated, key-custodial JSON-RPC gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the gateway.
    Server(ServerArgs),
    /// Manage users in the embedded token store.
    User(UserArgs),
    /// Dev-mode server: no secrets-store dependency, no auth.
    Local(LocalArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ServerArgs {
    #[arg(long, default_value = "http://127.0.0.1:8200")]
    pub vault_address: String,

    #[arg(long, default_value = "http://127.0.0.1:8545")]
    pub quorum_address: String,

    /// Static bearer token for the secrets store; skips cloud-identity login.
    #[arg(long)]
    pub auth_token: Option<String>,

    #[arg(long, default_value = "/home/ubuntu/.ethereum/keystore")]
    pub keystore: PathBuf,

    #[arg(long, default_value_t = false)]
    pub disable_auth: bool,

    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: String,

    #[arg(long, default_value = "eximchain.db")]
    pub db_path: PathBuf,

    #[arg(long, default_value = "/tmp/executor.sock")]
    pub admin_socket: PathBuf,
}

#[derive(Debug, Args, Clone, Default)]
pub struct UserArgs {
    #[arg(long)]
    pub email: Option<String>,

    #[arg(long, default_value_t = false)]
    pub delete: bool,

    #[arg(long, default_value_t = false)]
    pub update: bool,

    #[arg(long, default_value_t = false)]
    pub list: bool,

    #[arg(long, default_value = "eximchain.db")]
    pub db_path: PathBuf,

    #[arg(long, default_value = "/tmp/executor.sock")]
    pub admin_socket: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct LocalArgs {
    #[arg(long, default_value = "/home/ubuntu/.ethereum/keystore")]
    pub keystore: PathBuf,

    #[arg(long, default_value = "http://127.0.0.1:8545")]
    pub quorum_address: String,

    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: String,
}
