//! `pushbridge run`: the long-running stream session.

use std::sync::Arc;

use pushbridge_core::BridgeError;
use pushbridge_core::config::BridgeConfig;
use pushbridge_core::identity;
use pushbridge_core::reconcile::SessionContext;
use pushbridge_core::sink::{PUSH_STATES, StateSink};
use pushbridge_core::stream::{SessionHandle, StreamSession, TokioConnector};
use tracing::{info, warn};

use super::sink::JsonLinesSink;
use super::{CliError, build_api};

/// Declare states, resolve the device and process the stream until Ctrl+C.
pub async fn handle_run(config: &BridgeConfig) -> Result<(), CliError> {
    info!("Starting pushbridge v{}", env!("CARGO_PKG_VERSION"));

    let api = build_api(config)?;
    let sink = Arc::new(JsonLinesSink::stdout());
    sink.declare(&PUSH_STATES).await.map_err(BridgeError::from)?;

    let identity = identity::resolve(api.as_ref(), &config.device_name).await?;
    info!("Receiving as device {} ({})", config.device_name, identity);
    if config.no_delete {
        info!("Consumed pushes will be kept on the service");
    }

    let context = SessionContext::new(api, sink, identity, !config.no_delete);
    let mut session = StreamSession::new(
        TokioConnector,
        config.stream_endpoint(),
        config.reconnect.clone(),
        context,
    );

    tokio::spawn(close_on_signal(session.handle()));
    session.run().await;
    session.close().await;
    Ok(())
}

async fn close_on_signal(handle: SessionHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    info!("Shutting down...");
    handle.close();
}
