//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pushbridge")]
#[command(author, version, about = "Bridge a Pushbullet account to a key-value state tree", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.config/pushbridge/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Pushbullet access token (overrides config and PUSHBULLET_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Keep consumed pushes on the service instead of deleting them
    #[arg(long, global = true)]
    pub no_delete: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the event stream and write incoming pushes as JSON lines
    Run,

    /// Send a note, link or file to the configured receivers
    Send(SendArgs),

    /// List devices on the account
    Devices,
}

#[derive(Args, Debug, Default)]
pub struct SendArgs {
    /// Push type: note, link or file
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// Title (defaults to the configured default title)
    #[arg(long)]
    pub title: Option<String>,

    /// Comma-separated receivers (device idens or emails)
    #[arg(long)]
    pub receiver: Option<String>,

    /// URL for link pushes
    #[arg(long)]
    pub link: Option<String>,

    /// File to upload for file pushes
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Message text, or a JSON object with type/title/message/link/file/receiver
    pub message: Option<String>,
}
