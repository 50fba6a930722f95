//! PyRTF CLI binary entry point.
//!
//! Initializes the tracing subscriber, parses command-line arguments with
//! clap, and dispatches to the selected subcommand via [`Cli::run`].

mod cli;
mod logging;
mod tui;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = cli.log_context();

    // Best-effort, before tracing is initialized.
    logging::cleanup_old_logs(&ctx.work_dir);

    let _guard = logging::init_tracing(&ctx);

    cli.run().await
}
