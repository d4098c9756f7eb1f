//! Monitor configuration.
//!
//! Loaded from YAML. Every field is optional:
//!
//! ```yaml
//! device: /dev/nrf24l01
//! sysfs_root: /sys/class/nrf24/nrf24l01
//! revision: v3
//! radio:
//!   channel: 4
//!   address: 2
//! timing:
//!   deadline_ms: 5000
//! ```
//!
//! `revision` is either a built-in name or a full revision description.

use std::fs;
use std::path::{Path, PathBuf};

use nrfpm_protocol::{ProtocolRevision, RevisionId};
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::radio::{RadioConfig, DEFAULT_SYSFS_ROOT};
use crate::session::SessionTiming;
use crate::Result;

/// Default radio character device.
pub const DEFAULT_DEVICE: &str = "/dev/nrf24l01";

/// A built-in revision or a custom description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RevisionChoice {
    /// One of the built-in revisions, by name.
    Builtin(RevisionId),
    /// A revision described in full.
    Custom(ProtocolRevision),
}

impl Default for RevisionChoice {
    fn default() -> Self {
        RevisionChoice::Builtin(RevisionId::default())
    }
}

impl RevisionChoice {
    /// The revision to use.
    pub fn resolve(&self) -> ProtocolRevision {
        match self {
            RevisionChoice::Builtin(id) => id.revision(),
            RevisionChoice::Custom(revision) => revision.clone(),
        }
    }
}

/// Configuration of one monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Radio character device.
    pub device: PathBuf,
    /// sysfs directory of the radio driver.
    pub sysfs_root: PathBuf,
    /// Radio settings.
    pub radio: RadioConfig,
    /// Firmware revision of the sensor.
    pub revision: RevisionChoice,
    /// Session timing.
    pub timing: SessionTiming,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            device: PathBuf::from(DEFAULT_DEVICE),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            radio: RadioConfig::default(),
            revision: RevisionChoice::default(),
            timing: SessionTiming::default(),
        }
    }
}

impl MonitorConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    /// Parse and validate YAML.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: MonitorConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for unusable values.
    pub fn validate(&self) -> Result<()> {
        self.radio.validate()?;

        let timing = &self.timing;
        if timing.deadline_ms == 0 {
            return Err(MonitorError::Config("deadline_ms must be positive".into()));
        }
        if timing.read_timeout_ms == 0 {
            return Err(MonitorError::Config("read_timeout_ms must be positive".into()));
        }
        if self.revision.resolve().resync_after_ms == 0 {
            return Err(MonitorError::Config("resync_after_ms must be positive".into()));
        }
        Ok(())
    }
}
