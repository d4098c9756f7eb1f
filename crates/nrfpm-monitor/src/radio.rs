//! Radio configuration.
//!
//! The nRF24L01 kernel driver is configured through sysfs attributes, one file
//! per setting. Configuration is a one-shot, idempotent sequence of writes made
//! before the first exchange; it has no protocol semantics of its own.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MonitorError;
use crate::Result;

/// Default sysfs directory of the radio driver.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/nrf24/nrf24l01";

/// Radio settings for talking to one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Air data rate in kbps.
    pub data_rate_kbps: u32,
    /// RF channel.
    pub channel: u8,
    /// CRC length in bytes.
    pub crc_bytes: u8,
    /// Pipe address prefix as hex; the sensor address is appended.
    pub base_address: String,
    /// Sensor address.
    pub address: u8,
    /// Whether the pipe uses dynamic payload lengths.
    pub dynamic_payload: bool,
    /// Static payload width in bytes.
    pub payload_width: u8,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            data_rate_kbps: 2000,
            channel: 4,
            crc_bytes: 2,
            base_address: "89674523".to_string(),
            address: 0x02,
            dynamic_payload: false,
            payload_width: 32,
        }
    }
}

impl RadioConfig {
    /// Full pipe address: base address followed by the sensor address.
    pub fn pipe_address(&self) -> String {
        format!("{}{:02x}", self.base_address, self.address)
    }

    /// Settings in the order they are written.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("rf/datarate", self.data_rate_kbps.to_string()),
            ("rf/channel", self.channel.to_string()),
            ("crc", self.crc_bytes.to_string()),
            ("tx_address", self.pipe_address()),
            ("pipe0/address", self.pipe_address()),
            ("pipe0/dynamicpayload", u8::from(self.dynamic_payload).to_string()),
            ("pipe0/payloadwidth", self.payload_width.to_string()),
        ]
    }

    /// Check the settings for values the driver would reject.
    pub fn validate(&self) -> Result<()> {
        if self.base_address.is_empty()
            || self.base_address.len() % 2 != 0
            || !self.base_address.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(MonitorError::Config(format!(
                "base address {:?} must be an even number of hex digits",
                self.base_address
            )));
        }
        if self.payload_width == 0 || usize::from(self.payload_width) > nrfpm_protocol::FRAME_SIZE {
            return Err(MonitorError::Config(format!(
                "payload width {} outside 1..={}",
                self.payload_width,
                nrfpm_protocol::FRAME_SIZE
            )));
        }
        Ok(())
    }
}

/// Destination for radio settings.
pub trait RadioConfigSink {
    /// Write one setting.
    fn write(&mut self, key: &str, value: &str) -> io::Result<()>;
}

/// Writes settings to the driver's sysfs attributes.
#[derive(Debug, Clone)]
pub struct SysfsRadioConfig {
    root: PathBuf,
}

impl SysfsRadioConfig {
    /// Settings go below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SysfsRadioConfig { root: root.into() }
    }

    /// sysfs directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for SysfsRadioConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl RadioConfigSink for SysfsRadioConfig {
    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::write(self.root.join(key), value)
    }
}

/// Apply `config` to `sink`.
///
/// Stops at the first failed write; the radio is then in an unknown state and
/// the session must not be started.
pub fn configure_radio(sink: &mut dyn RadioConfigSink, config: &RadioConfig) -> Result<()> {
    config.validate()?;
    for (key, value) in config.entries() {
        debug!("Radio setting {} = {}", key, value);
        sink.write(key, &value)
            .map_err(|source| MonitorError::ConfigWrite {
                key: key.to_string(),
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<(String, String)>,
        fail_on: Option<&'static str>,
    }

    impl RadioConfigSink for Recorder {
        fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
            if self.fail_on == Some(key) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.writes.push((key.to_string(), value.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_default_settings() {
        let mut sink = Recorder::default();
        configure_radio(&mut sink, &RadioConfig::default()).unwrap();

        let expected = [
            ("rf/datarate", "2000"),
            ("rf/channel", "4"),
            ("crc", "2"),
            ("tx_address", "8967452302"),
            ("pipe0/address", "8967452302"),
            ("pipe0/dynamicpayload", "0"),
            ("pipe0/payloadwidth", "32"),
        ];
        let writes: Vec<(&str, &str)> = sink
            .writes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(writes, expected);
    }

    #[test]
    fn test_pipe_address_is_lowercase_hex() {
        let config = RadioConfig {
            address: 0xAB,
            ..RadioConfig::default()
        };
        assert_eq!(config.pipe_address(), "89674523ab");
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let mut sink = Recorder {
            fail_on: Some("crc"),
            ..Recorder::default()
        };
        let err = configure_radio(&mut sink, &RadioConfig::default()).unwrap_err();
        match err {
            MonitorError::ConfigWrite { key, .. } => assert_eq!(key, "crc"),
            other => panic!("unexpected error: {:?}", other),
        }
        // Nothing after the failing key was written.
        assert_eq!(sink.writes.len(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_address = RadioConfig {
            base_address: "8967452".to_string(),
            ..RadioConfig::default()
        };
        assert!(bad_address.validate().is_err());

        let bad_width = RadioConfig {
            payload_width: 33,
            ..RadioConfig::default()
        };
        assert!(bad_width.validate().is_err());
    }

    #[test]
    fn test_sysfs_writes_files() {
        let root = std::env::temp_dir().join(format!("nrfpm-sysfs-{}", std::process::id()));
        fs::create_dir_all(root.join("rf")).unwrap();
        fs::create_dir_all(root.join("pipe0")).unwrap();

        let mut sink = SysfsRadioConfig::new(&root);
        configure_radio(&mut sink, &RadioConfig::default()).unwrap();
        assert_eq!(fs::read_to_string(root.join("rf/channel")).unwrap(), "4");
        assert_eq!(fs::read_to_string(root.join("tx_address")).unwrap(), "8967452302");

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_sysfs_missing_root() {
        let mut sink = SysfsRadioConfig::new("/nonexistent/nrfpm");
        let err = configure_radio(&mut sink, &RadioConfig::default()).unwrap_err();
        assert!(matches!(err, MonitorError::ConfigWrite { ref key, .. } if key == "rf/datarate"));
    }
}
