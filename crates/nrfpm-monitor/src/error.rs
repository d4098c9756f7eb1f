//! Error types for the power monitor.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a power monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// No telemetry reply arrived before the session deadline.
    #[error("no reply from sensor 0x{address:02x} within {waited:?}")]
    Timeout {
        /// Sensor address.
        address: u8,
        /// Time spent waiting.
        waited: Duration,
    },

    /// Writing a radio configuration value failed.
    #[error("failed to write radio setting {key}: {source}")]
    ConfigWrite {
        /// Configuration key that could not be written.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The radio device node does not exist (driver not loaded).
    #[error("radio device {0} not found; is the nRF24L01 kernel module loaded?")]
    DeviceMissing(PathBuf),

    /// Transport failure outside of a telemetry exchange.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MonitorError {
    /// Whether retrying the whole exchange may succeed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MonitorError::Timeout { .. })
    }
}
