// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Chain, Init, Session, Version};
use sealchain::logging::init_logging;
use sealchain::state::AppState;

command_enum! {
    (Chain, Chain),
    (Init, Init),
    (Session, Session),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // only log to file once a state directory exists
    let log_dir = AppState::load(args.config_path.clone())
        .ok()
        .map(|state| state.logs_path);
    let guards = init_logging(args.log_level, log_dir.as_deref());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupted, cancelling pending work");
            let _ = shutdown_tx.send(());
        }
    });

    let ctx = cli::op::OpContext::new(args.config_path, shutdown_rx);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            drop(guards);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            drop(guards);
            std::process::exit(1);
        }
    }
}
