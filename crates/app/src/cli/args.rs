pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sealchain")]
#[command(about = "Per-application session keys sealed onto a hash-linked chain")]
pub struct Args {
    /// Path to the sealchain state directory (defaults to ~/.sealchain)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Console log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: crate::Command,
}
