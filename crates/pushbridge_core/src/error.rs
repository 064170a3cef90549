//! Error types for the bridge.
//!
//! Low-level failures (`ApiError`, `TransportError`, `SinkError`, `ConfigError`)
//! are wrapped by [`BridgeError`], which classifies them by the operation that
//! failed. Only [`BridgeError::IdentityResolution`] is fatal; every other kind
//! is logged and retried on the next natural trigger.

use thiserror::Error;

/// Failure talking to the remote push service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the connection dropped.
    #[error("request failed: {0}")]
    Request(String),
    /// The service answered with a non-success status code.
    #[error("service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// A local file needed for an upload could not be read.
    #[error("file error: {0}")]
    File(String),
}

/// Failure on the realtime stream connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The connection was interrupted while reading.
    #[error("stream error: {0}")]
    Stream(String),
    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Failure writing to the state sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink rejected or could not persist the value.
    #[error("failed to write state {id}: {reason}")]
    Write {
        /// State id that failed.
        id: String,
        /// Reason reported by the sink.
        reason: String,
    },
    /// Declaring state objects failed.
    #[error("failed to declare states: {0}")]
    Declare(String),
}

/// Failure loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML or has the wrong shape.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// No API key was provided by any source.
    #[error("missing API key (set api_key in the config file or PUSHBULLET_API_KEY)")]
    MissingApiKey,
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// Offending value.
        value: String,
    },
}

/// Classified failures of the bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The local endpoint identity could not be resolved. Aborts session start.
    #[error("identity resolution failed: {0}")]
    IdentityResolution(#[source] ApiError),
    /// The seed history fetch after connecting failed.
    #[error("history seed failed: {0}")]
    HistorySeed(#[source] ApiError),
    /// A reconciliation history query failed.
    #[error("reconciliation query failed: {0}")]
    ReconciliationQuery(#[source] ApiError),
    /// Deleting a consumed push on the service failed.
    #[error("deleting push {iden} failed: {source}")]
    RecordDeletion {
        /// Push identifier.
        iden: String,
        /// Underlying failure.
        #[source]
        source: ApiError,
    },
    /// An outbound send to one receiver failed.
    #[error("sending to {receiver} failed: {source}")]
    OutboundSend {
        /// Receiver that failed.
        receiver: String,
        /// Underlying failure.
        #[source]
        source: ApiError,
    },
    /// The stream transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Writing to the state sink failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for bridge operations.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ApiError::Status {
            status: 401,
            body: "invalid access token".to_string(),
        };
        assert_eq!(err.to_string(), "service returned 401: invalid access token");
    }

    #[test]
    fn test_bridge_error_keeps_source() {
        let err = BridgeError::RecordDeletion {
            iden: "ujpah72o0".to_string(),
            source: ApiError::Request("timeout".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "deleting push ujpah72o0 failed: request failed: timeout"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
