use anyhow::{Context, Result};
use clap::Parser;
use custodian_rpc::admin_ipc::{is_server_listening, send_command};
use custodian_rpc::cli::{Cli, Commands};
use custodian_rpc::user_cmd::run_user_command;
use custodian_rpc::user_store::UserStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Server(args) => custodian_rpc::bootstrap::run_server(args).await,
        Commands::Local(args) => custodian_rpc::bootstrap::run_local(args).await,
        Commands::User(args) => run_user(args).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
    Ok(())
}

/// Routes to the Admin IPC when a server already owns the store, otherwise
/// runs the command directly against the on-disk store. Checks the socket
/// file's liveness with a non-blocking connect rather than the original's
/// racy timeout-on-open heuristic (spec.md §9 redesign note).
async fn run_user(args: custodian_rpc::cli::UserArgs) -> Result<()> {
    if is_server_listening(&args.admin_socket).await {
        let argv: Vec<String> = std::env::args().skip(2).collect();
        let output = send_command(&args.admin_socket, &argv)
            .await
            .context("sending admin IPC command")?;
        print!("{output}");
        return Ok(());
    }

    let store = UserStore::open(&args.db_path).context("opening user store")?;
    let stdout = std::io::stdout();
    run_user_command(&store, &args, stdout.lock())?;
    Ok(())
}
