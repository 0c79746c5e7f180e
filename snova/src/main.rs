//! Snova - Entry Point
//!
//! Updates, configures and restarts multi-tenant Sparrow installations.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use snova::cli::{execute, Cli};
use snova::logs::{init_logging, LogOptions};
use snova::storage::layout::BenchLayout;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Only log to the installation's log directory when it already exists
    let logs_dir = BenchLayout::new(&cli.bench).logs_dir();
    let log_options = LogOptions {
        log_level: cli.log_level(),
        json_format: cli.log_json,
        log_dir: logs_dir.exists().await.then(|| logs_dir.path().to_path_buf()),
        ..Default::default()
    };
    let _guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
