//! # nrfpm-monitor
//!
//! Host side of the nRF24 wireless power monitor link.
//!
//! The radio is half-duplex, lossy and unordered, and the sensor firmware
//! may restart at any time. Reading telemetry is therefore a small retry
//! protocol rather than a request/response call:
//!
//! 1. Drain frames left over from earlier exchanges.
//! 2. Optionally send a telemetry request.
//! 3. Read until a valid reply from the target sensor arrives.
//! 4. If the sensor stays silent too long, re-initialize it and keep going.
//! 5. Give up after the session deadline (5 seconds by default).
//!
//! ## Example
//!
//! ```no_run
//! use nrfpm_monitor::{MonitorConfig, PowerMonitor};
//!
//! let config = MonitorConfig::load("/etc/nrfpm.yaml")?;
//! let monitor = PowerMonitor::open(&config)?;
//!
//! let reply = monitor.read_telemetry(config.radio.address, true)?;
//! println!("{:.2} V {:.2} A {:.3} W", reply.voltage, reply.current, reply.power);
//! # Ok::<(), nrfpm_monitor::MonitorError>(())
//! ```
//!
//! ## Testing without hardware
//!
//! [`ScriptedTransport`] and [`ManualClock`] replace the radio and wall clock,
//! so a full exchange, including resyncs and timeouts, runs instantly.

pub mod clock;
pub mod config;
mod error;
pub mod monitor;
pub mod poll;
pub mod radio;
pub mod session;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MonitorConfig, RevisionChoice};
pub use error::MonitorError;
pub use monitor::PowerMonitor;
pub use radio::{configure_radio, RadioConfig, RadioConfigSink, SysfsRadioConfig};
pub use session::{flush, PollSession, SessionState, SessionStats, SessionTiming};
pub use transport::{DeviceTransport, ScriptedTransport, Transport, WrittenFrame};

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
