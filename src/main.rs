//! remotest - run acceptance tests on a remote execution service
//!
//! Binary entry point: parses the command line, sets up logging on
//! stderr so the live display keeps stdout to itself, and dispatches.

use clap::Parser;
use commands::Commands;
use remotest::{cli, commands, common};

#[derive(Parser)]
#[command(name = "remotest", about = "Run acceptance tests on a remote execution service")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    common::logging::init();

    let cli = Cli::parse();

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
