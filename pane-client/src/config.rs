//! Session configuration.
//!
//! Configuration can be built in code or loaded from a TOML file:
//!
//! ```toml
//! relay_url = "wss://relay.example.com/signal"
//! transmit_audio = true
//! audio_timeout_secs = 5
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`RemoteSession`](crate::RemoteSession).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Relay WebSocket endpoint (default: ws://127.0.0.1:8080/signal).
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    /// Attach local audio before negotiating (default: false).
    #[serde(default)]
    pub transmit_audio: bool,
    /// Bound on local audio acquisition in seconds (default: 10).
    #[serde(default = "default_audio_timeout_secs")]
    pub audio_timeout_secs: u64,
    /// Label of the application data channel (default: "panelink").
    #[serde(default = "default_data_channel_label")]
    pub data_channel_label: String,
    /// Maximum concurrently pending file transfers (default: 64).
    #[serde(default = "default_max_pending_transfers")]
    pub max_pending_transfers: usize,
    /// Capacity of the session event broadcast (default: 64).
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

// Default value functions
fn default_relay_url() -> String {
    "ws://127.0.0.1:8080/signal".to_string()
}

fn default_audio_timeout_secs() -> u64 {
    10
}

fn default_data_channel_label() -> String {
    "panelink".to_string()
}

fn default_max_pending_transfers() -> usize {
    pane_core::DEFAULT_MAX_PENDING_TRANSFERS
}

fn default_event_buffer() -> usize {
    64
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            transmit_audio: false,
            audio_timeout_secs: default_audio_timeout_secs(),
            data_channel_label: default_data_channel_label(),
            max_pending_transfers: default_max_pending_transfers(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given relay with all other defaults.
    pub fn new(relay_url: &str) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            ..Self::default()
        }
    }

    /// Enable or disable local audio.
    pub fn with_audio(mut self, transmit_audio: bool) -> Self {
        self.transmit_audio = transmit_audio;
        self
    }

    /// Set the audio acquisition bound (whole seconds, minimum 1).
    pub fn with_audio_timeout(mut self, timeout: Duration) -> Self {
        self.audio_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the data channel label.
    pub fn with_channel_label(mut self, label: &str) -> Self {
        self.data_channel_label = label.to_string();
        self
    }

    /// Audio acquisition bound as a [`Duration`].
    pub fn audio_timeout(&self) -> Duration {
        Duration::from_secs(self.audio_timeout_secs.max(1))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.relay_url, "ws://127.0.0.1:8080/signal");
        assert!(!config.transmit_audio);
        assert_eq!(config.audio_timeout(), Duration::from_secs(10));
        assert_eq!(config.data_channel_label, "panelink");
        assert_eq!(config.max_pending_transfers, 64);
    }

    #[test]
    fn builders_override_defaults() {
        let config = SessionConfig::new("wss://relay.test/signal")
            .with_audio(true)
            .with_audio_timeout(Duration::from_secs(3))
            .with_channel_label("editors");

        assert_eq!(config.relay_url, "wss://relay.test/signal");
        assert!(config.transmit_audio);
        assert_eq!(config.audio_timeout_secs, 3);
        assert_eq!(config.data_channel_label, "editors");
    }

    #[test]
    fn sub_second_timeout_rounds_up() {
        let config = SessionConfig::default().with_audio_timeout(Duration::from_millis(200));
        assert_eq!(config.audio_timeout_secs, 1);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
relay_url = "wss://relay.example.com/signal"
transmit_audio = true
audio_timeout_secs = 5
max_pending_transfers = 8
"#;

        let config: SessionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.relay_url, "wss://relay.example.com/signal");
        assert!(config.transmit_audio);
        assert_eq!(config.audio_timeout_secs, 5);
        assert_eq!(config.max_pending_transfers, 8);
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn from_file_reports_missing_file() {
        let path = std::path::Path::new("/nonexistent/panelink.toml");
        let err = SessionConfig::from_file(path).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
        assert!(err.to_string().contains("panelink.toml"));
    }

    #[test]
    fn from_file_reports_bad_toml() {
        let path = std::env::temp_dir().join(format!("panelink-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "transmit_audio = \"maybe\"").unwrap();

        let err = SessionConfig::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
