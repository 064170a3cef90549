//! Command dispatch, logging setup and the shared service client.

mod args;
mod devices;
mod run;
mod send;
mod sink;

use std::sync::Arc;

use clap::Parser;
use pushbridge_core::api::{HttpPushApi, PushApi};
use pushbridge_core::config::BridgeConfig;
use pushbridge_core::error::{ApiError, BridgeError, ConfigError};
use thiserror::Error;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::{Cli, Commands};

/// Failures surfaced to the user by a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bridge operation failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    /// Direct API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Parse arguments, run the command and return the process exit code.
pub async fn run_cli() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return 2;
        }
    };

    let result = match cli.command {
        Commands::Run => run::handle_run(&config).await.map(|_| true),
        Commands::Send(args) => send::handle_send(&config, args).await,
        Commands::Devices => devices::handle_devices(&config).await.map(|_| true),
    };

    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "pushbridge=info,pushbridge_core=info",
        1 => "pushbridge=debug,pushbridge_core=debug",
        _ => "pushbridge=trace,pushbridge_core=trace",
    };

    // stdout carries state output, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<BridgeConfig, ConfigError> {
    let mut config = BridgeConfig::load(cli.config.as_deref())?;
    if let Some(key) = &cli.api_key {
        config.api_key = key.clone();
    }
    if cli.no_delete {
        config.no_delete = true;
    }
    config.validate()?;
    Ok(config)
}

fn build_api(config: &BridgeConfig) -> Result<Arc<dyn PushApi>, CliError> {
    let api = HttpPushApi::new(
        &config.api_url,
        config.api_key.clone(),
        config.request_timeout(),
    )?;
    Ok(Arc::new(api))
}
