//! `pushbridge` - relay and ingest Pushbullet pushes from the command line.

/// CLI module - argument parsing and command handlers
mod cli;

#[tokio::main]
async fn main() {
    std::process::exit(cli::run_cli().await);
}
