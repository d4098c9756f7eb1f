//! Power monitor facade.
//!
//! [`PowerMonitor`] owns the transport and serializes every operation on it:
//! the link is half-duplex and frames carry no request ID, so two interleaved
//! exchanges would steal each other's replies.
//!
//! The radio only hears the pipe address it was configured for. A monitor
//! opened with [`PowerMonitor::open`] reconfigures the pipe whenever an
//! operation targets a different sensor; one built with [`PowerMonitor::new`]
//! does the same once given a sink with [`PowerMonitor::with_radio`].

use std::sync::Arc;

use nrfpm_protocol::{Command, OutboundFrame, ProtocolRevision, TelemetryReply};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::poll::Deadline;
use crate::radio::{configure_radio, RadioConfig, RadioConfigSink, SysfsRadioConfig};
use crate::session::{flush, PollSession, SessionStats, SessionTiming};
use crate::transport::{DeviceTransport, Transport};
use crate::Result;

struct Radio {
    sink: Box<dyn RadioConfigSink + Send>,
    config: RadioConfig,
}

struct Link<T> {
    transport: T,
    radio: Option<Radio>,
    last_stats: SessionStats,
}

impl<T> Link<T> {
    /// Point the radio pipe at `address` if it is aimed elsewhere.
    fn retarget(&mut self, address: u8) -> Result<()> {
        let Some(radio) = self.radio.as_mut() else {
            return Ok(());
        };
        if radio.config.address == address {
            return Ok(());
        }

        let config = RadioConfig {
            address,
            ..radio.config.clone()
        };
        debug!(
            "Retargeting radio from 0x{:02x} to 0x{:02x}",
            radio.config.address, address
        );
        configure_radio(radio.sink.as_mut(), &config)?;
        radio.config = config;
        Ok(())
    }
}

/// Talks to power monitors over one transport.
pub struct PowerMonitor<T: Transport> {
    link: Mutex<Link<T>>,
    clock: Arc<dyn Clock>,
    revision: ProtocolRevision,
    timing: SessionTiming,
}

impl<T: Transport> PowerMonitor<T> {
    /// Create a monitor on an already configured transport.
    pub fn new(
        transport: T,
        clock: Arc<dyn Clock>,
        revision: ProtocolRevision,
        timing: SessionTiming,
    ) -> Self {
        PowerMonitor {
            link: Mutex::new(Link {
                transport,
                radio: None,
                last_stats: SessionStats::default(),
            }),
            clock,
            revision,
            timing,
        }
    }

    /// Reconfigure the radio through `sink` whenever an operation targets an
    /// address other than the one in `config`. `config` must describe the
    /// radio's current settings.
    pub fn with_radio(
        mut self,
        sink: impl RadioConfigSink + Send + 'static,
        config: RadioConfig,
    ) -> Self {
        self.link.get_mut().radio = Some(Radio {
            sink: Box::new(sink),
            config,
        });
        self
    }

    /// Protocol revision in use.
    pub fn revision(&self) -> &ProtocolRevision {
        &self.revision
    }

    /// Session timing in use.
    pub fn timing(&self) -> SessionTiming {
        self.timing
    }

    /// Counters of the most recent telemetry exchange.
    pub fn last_stats(&self) -> SessionStats {
        self.link.lock().last_stats
    }

    /// Run `f` with exclusive access to the transport.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.link.lock().transport)
    }

    /// Consume the monitor, returning the transport.
    pub fn into_transport(self) -> T {
        self.link.into_inner().transport
    }

    /// Initialize the sensor at `address`.
    pub fn initialize(&self, address: u8) -> Result<()> {
        let frames = self.revision.resync_frames(address);
        self.send_once(address, "initialize", &frames)
    }

    /// Close the sensor's relay. The sensor does not acknowledge this.
    pub fn enable_relay(&self, address: u8) -> Result<()> {
        let frame = self.revision.encode(Command::EnableRelay, address);
        self.send_once(address, "enable relay", &[frame])
    }

    /// Open the sensor's relay. The sensor does not acknowledge this.
    pub fn disable_relay(&self, address: u8) -> Result<()> {
        let frame = self.revision.encode(Command::DisableRelay, address);
        self.send_once(address, "disable relay", &[frame])
    }

    /// Read telemetry from the sensor at `address`.
    ///
    /// With `active_request` the sensor is polled; otherwise the monitor waits
    /// for the sensor to transmit on its own. The exchange itself fails only
    /// with [`MonitorError::Timeout`]; retargeting the radio may fail with
    /// [`MonitorError::ConfigWrite`] before it starts.
    pub fn read_telemetry(&self, address: u8, active_request: bool) -> Result<TelemetryReply> {
        let mut link = self.link.lock();
        link.retarget(address)?;
        let mut session = PollSession::new(
            &mut link.transport,
            self.clock.as_ref(),
            &self.revision,
            self.timing,
            address,
            active_request,
        );
        let result = session.run();
        let stats = session.stats();
        link.last_stats = stats;

        debug!(
            "Exchange with 0x{:02x}: {} sent, {} received, {} discarded, {} flushed, {} resyncs",
            address,
            stats.frames_sent,
            stats.frames_received,
            stats.frames_discarded,
            stats.frames_flushed,
            stats.resyncs
        );
        result
    }

    /// Flush, then send `frames` without waiting for a reply.
    fn send_once(&self, address: u8, what: &str, frames: &[OutboundFrame]) -> Result<()> {
        let mut link = self.link.lock();
        link.retarget(address)?;
        let deadline = Deadline::after(self.clock.as_ref(), self.timing.deadline());
        let flushed = flush(&mut link.transport, self.clock.as_ref(), deadline)?;
        if flushed > 0 {
            trace!("Flushed {} stale frames before {}", flushed, what);
        }

        for frame in frames {
            trace!("Sending frame: {}", hex::encode(frame.as_bytes()));
            link.transport
                .write_frame(frame.as_bytes())
                .map_err(MonitorError::Transport)?;
        }
        info!("Sent {} to sensor 0x{:02x}", what, address);
        Ok(())
    }
}

impl PowerMonitor<DeviceTransport> {
    /// Open the radio device described by `config` and configure the radio.
    pub fn open(config: &MonitorConfig) -> Result<Self> {
        if !config.device.exists() {
            return Err(MonitorError::DeviceMissing(config.device.clone()));
        }

        let mut sink = SysfsRadioConfig::new(&config.sysfs_root);
        configure_radio(&mut sink, &config.radio)?;

        let transport = DeviceTransport::open(&config.device).map_err(MonitorError::Transport)?;
        let revision = config.revision.resolve();
        debug!(
            "Opened {} (revision {}, channel {}, address 0x{:02x})",
            config.device.display(),
            revision.name,
            config.radio.channel,
            config.radio.address
        );
        Ok(PowerMonitor::new(
            transport,
            Arc::new(SystemClock::new()),
            revision,
            config.timing,
        )
        .with_radio(sink, config.radio.clone()))
    }
}
