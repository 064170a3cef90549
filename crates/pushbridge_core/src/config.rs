//! Bridge configuration.
//!
//! Loaded from a TOML file (`~/.config/pushbridge/config.toml` unless a path is
//! given), then overlaid with environment variables. A `.env` file in the
//! working directory is honoured.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::DEFAULT_DEVICE_NAME;

/// Default REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.pushbullet.com/v2";
/// Default realtime stream endpoint; the API key is appended.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.pushbullet.com/websocket/";
/// Title used for outbound pushes that do not carry one.
pub const DEFAULT_TITLE: &str = "[ioBroker]";

/// Reconnection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Whether to automatically reconnect on disconnect.
    pub enabled: bool,
    /// Maximum number of consecutive reconnection attempts (0 = infinite).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: u64,
    /// Maximum delay in seconds for exponential backoff.
    pub max_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 0,
            base_delay_secs: 1,
            max_delay_secs: 32,
        }
    }
}

impl ReconnectConfig {
    /// Backoff before reconnection attempt `attempt` (1-based):
    /// base, 2×base, 4×base, ... capped at the max.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let secs = self
            .base_delay_secs
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }

    /// Whether another attempt is allowed after `attempt` consecutive failures.
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempt <= self.max_attempts)
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Account access token.
    pub api_key: String,
    /// Default outbound receivers, comma-separated (device idens or emails).
    pub receivers: String,
    /// Keep consumed pushes on the service instead of deleting them.
    pub no_delete: bool,
    /// Nickname of the device the bridge registers as.
    pub device_name: String,
    /// REST endpoint.
    pub api_url: String,
    /// Realtime stream endpoint (API key is appended).
    pub stream_url: String,
    /// Per-request timeout for REST calls.
    pub request_timeout_secs: u64,
    /// Title for outbound pushes without one.
    pub default_title: String,
    /// Stream reconnection policy.
    pub reconnect: ReconnectConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            receivers: String::new(),
            no_delete: false,
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            request_timeout_secs: 30,
            default_title: DEFAULT_TITLE.to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Default config file path (`~/.config/pushbridge/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pushbridge").join("config.toml"))
    }

    /// Load from `path` (or the default path), then apply the environment.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Overlay values from environment variables, looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("PUSHBULLET_API_KEY") {
            self.api_key = key;
        }
        if let Some(receivers) = var("PUSHBRIDGE_RECEIVERS") {
            self.receivers = receivers;
        }
        if let Some(value) = var("PUSHBRIDGE_NO_DELETE") {
            self.no_delete = parse_bool("PUSHBRIDGE_NO_DELETE", &value)?;
        }
        if let Some(name) = var("PUSHBRIDGE_DEVICE_NAME") {
            self.device_name = name;
        }
        if let Some(url) = var("PUSHBRIDGE_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = var("PUSHBRIDGE_STREAM_URL") {
            self.stream_url = url;
        }
        Ok(())
    }

    /// Check that the configuration is usable for talking to the service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    /// Configured default receivers.
    pub fn receiver_list(&self) -> Vec<String> {
        split_receivers(&self.receivers)
    }

    /// Full stream URL including the API key.
    pub fn stream_endpoint(&self) -> String {
        format!("{}{}", self.stream_url, self.api_key)
    }

    /// REST request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Split a comma-separated receiver list, dropping blanks.
pub fn split_receivers(receivers: &str) -> Vec<String> {
    receivers
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.device_name, "ioBroker");
        assert_eq!(config.default_title, "[ioBroker]");
        assert!(!config.no_delete);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_receivers() {
        assert_eq!(
            split_receivers("a@b.c, dev1 ,,dev2"),
            vec!["a@b.c", "dev1", "dev2"]
        );
        assert!(split_receivers("").is_empty());
        assert_eq!(split_receivers("single"), vec!["single"]);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_key = "o.abc"
receivers = "me@example.com,dev1"
no_delete = true

[reconnect]
max_attempts = 5
"#
        )
        .unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api_key, "o.abc");
        assert_eq!(config.receiver_list(), vec!["me@example.com", "dev1"]);
        assert!(config.no_delete);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.max_delay_secs, 32);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key = [").unwrap();
        assert!(matches!(
            BridgeConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("PUSHBULLET_API_KEY", "o.env"),
            ("PUSHBRIDGE_NO_DELETE", "yes"),
            ("PUSHBRIDGE_DEVICE_NAME", "Bridge"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api_key, "o.env");
        assert!(config.no_delete);
        assert_eq!(config.device_name, "Bridge");
        assert_eq!(
            config.stream_endpoint(),
            "wss://stream.pushbullet.com/websocket/o.env"
        );
    }

    #[test]
    fn test_env_invalid_bool() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_env(|name| (name == "PUSHBRIDGE_NO_DELETE").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_backoff() {
        let rc = ReconnectConfig {
            enabled: true,
            max_attempts: 3,
            base_delay_secs: 1,
            max_delay_secs: 8,
        };
        assert_eq!(rc.delay_for(1), Duration::from_secs(1));
        assert_eq!(rc.delay_for(2), Duration::from_secs(2));
        assert_eq!(rc.delay_for(4), Duration::from_secs(8));
        assert_eq!(rc.delay_for(60), Duration::from_secs(8));
        assert!(rc.allows(3));
        assert!(!rc.allows(4));

        let disabled = ReconnectConfig {
            enabled: false,
            ..ReconnectConfig::default()
        };
        assert!(!disabled.allows(1));
        assert!(ReconnectConfig::default().allows(1_000));
    }
}
