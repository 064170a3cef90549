//! Core library for pushbridge.
//!
//! Bridges a Pushbullet account to a key-value state tree. Inbound pushes
//! arrive as tickles on the realtime stream, are reconciled against the push
//! history and normalized into five scalar states. Outbound messages are
//! relayed to a list of receivers.
//!
//! The network seams ([`api::PushApi`], [`stream::StreamConnector`]) and the
//! state sink ([`sink::StateSink`]) are traits; the `native` feature provides
//! reqwest and tokio-tungstenite implementations.

#![warn(missing_docs)]

/// Remote push service API.
pub mod api;

/// Configuration loading.
pub mod config;

/// History cursor.
pub mod cursor;

/// Error types.
pub mod error;

/// Local endpoint identity.
pub mod identity;

/// Push normalization.
pub mod normalize;

/// Raw push records.
pub mod push;

/// Tickle reconciliation.
pub mod reconcile;

/// Outbound relay.
pub mod relay;

/// State sink.
pub mod sink;

/// Realtime event stream.
pub mod stream;

/// Scripted fakes for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use identity::EndpointIdentity;
pub use normalize::{Canonical, Disposition, normalize};
pub use push::RawPush;
pub use reconcile::SessionContext;
pub use relay::{OutboundMessage, Relay, RelayReport};
pub use sink::{MemorySink, StateSink};
pub use stream::{SessionHandle, SessionState, StreamSession};
