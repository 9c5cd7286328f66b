// Pwvault - Application Entry Point
//
// Parses CLI arguments, initializes structured logging (never emitting
// secret values), and dispatches to the command handler.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pwvault::cli::{execute, Cli};

fn main() {
    // RUST_LOG=pwvault=debug for verbose output. Logs go to stderr so that
    // listings on stdout stay machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pwvault=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
