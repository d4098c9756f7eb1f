//! The polling session.
//!
//! One [`PollSession`] drives one telemetry exchange:
//!
//! ```text
//! Flushing ──► Polling ──► Succeeded
//!                │  ▲
//!                ▼  │
//!             Resyncing          (any) ──► TimedOut
//! ```
//!
//! - **Flushing** drains frames queued since the last exchange so a stale reply
//!   is never matched to the new request.
//! - **Polling** optionally sends a telemetry request, waits the pacing delay
//!   and reads one frame. The first valid reply from the target address wins.
//! - **Resyncing** happens when the sensor has been silent for the revision's
//!   threshold: it may have restarted and needs initializing again. Resync is
//!   gated on the time since the previous resync, so it is not repeated on
//!   every iteration.
//! - **TimedOut** is reached when the overall deadline passes.
//!
//! Garbage, echoes, short frames and replies from other sensors are not errors;
//! they are counted and discarded while the session keeps listening. Transport
//! failures during an exchange are logged and treated the same way, so the
//! only failure a telemetry exchange reports is the deadline.

use std::time::Duration;

use nrfpm_protocol::{Command, OutboundFrame, ProtocolRevision, TelemetryReply};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::error::MonitorError;
use crate::poll::{poll_until, Deadline};
use crate::transport::Transport;
use crate::Result;

// ============================================================================
// Timing
// ============================================================================

/// Session timing, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTiming {
    /// Overall deadline for one exchange, initial flush included.
    pub deadline_ms: u64,
    /// Longest single read. Clamped to the time left before the deadline.
    pub read_timeout_ms: u64,
    /// Delay between sending a request and reading; paces the sensor firmware.
    pub pacing_ms: u64,
    /// Delay after a resync before flushing and polling again.
    pub settle_ms: u64,
}

impl Default for SessionTiming {
    fn default() -> Self {
        SessionTiming {
            deadline_ms: 5000,
            read_timeout_ms: 1000,
            pacing_ms: 10,
            settle_ms: 100,
        }
    }
}

impl SessionTiming {
    /// Overall deadline.
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Longest single read.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Request-to-read delay.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Post-resync delay.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

// ============================================================================
// State
// ============================================================================

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Draining stale frames.
    Flushing,
    /// Requesting and reading.
    Polling,
    /// Re-initializing a silent sensor.
    Resyncing,
    /// A reply was decoded.
    Succeeded,
    /// The deadline passed.
    TimedOut,
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Frames written.
    pub frames_sent: u32,
    /// Frames read during polling.
    pub frames_received: u32,
    /// Received frames that were not the expected reply.
    pub frames_discarded: u32,
    /// Frames dropped by flushing.
    pub frames_flushed: u32,
    /// Resyncs performed.
    pub resyncs: u32,
    /// Transport errors absorbed.
    pub transport_errors: u32,
}

/// Drain every queued frame.
///
/// Issues zero-timeout reads until one comes back empty, bounded by
/// `deadline`. Returns the number of frames discarded.
pub fn flush<T: Transport + ?Sized>(
    transport: &mut T,
    clock: &dyn Clock,
    deadline: Deadline,
) -> Result<u32> {
    let mut flushed = 0u32;
    poll_until(clock, deadline, Duration::ZERO, |_| {
        match transport.read_frame(Duration::ZERO) {
            Ok(Some(frame)) => {
                trace!("Flushed stale frame: {}", hex::encode(&frame));
                flushed += 1;
                Ok(None)
            }
            Ok(None) => Ok(Some(())),
            Err(e) => Err(MonitorError::Transport(e)),
        }
    })?;
    Ok(flushed)
}

/// One telemetry exchange with one sensor.
pub struct PollSession<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    clock: &'a dyn Clock,
    revision: &'a ProtocolRevision,
    timing: SessionTiming,
    address: u8,
    active_request: bool,
    state: SessionState,
    last_resync: Duration,
    stats: SessionStats,
}

impl<'a, T: Transport + ?Sized> PollSession<'a, T> {
    /// Create a session for the sensor at `address`.
    ///
    /// With `active_request` unset the session only listens for frames the
    /// sensor sends on its own.
    pub fn new(
        transport: &'a mut T,
        clock: &'a dyn Clock,
        revision: &'a ProtocolRevision,
        timing: SessionTiming,
        address: u8,
        active_request: bool,
    ) -> Self {
        PollSession {
            transport,
            clock,
            revision,
            timing,
            address,
            active_request,
            state: SessionState::Flushing,
            last_resync: Duration::ZERO,
            stats: SessionStats::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Run the exchange to completion.
    pub fn run(&mut self) -> Result<TelemetryReply> {
        self.transition(SessionState::Flushing);
        let deadline = Deadline::after(self.clock, self.timing.deadline());
        self.flush_absorbing(deadline);

        self.last_resync = deadline.start();
        self.transition(SessionState::Polling);

        if self.active_request {
            self.send_request();
        }

        let clock = self.clock;
        let pacing = self.timing.pacing();
        let outcome: Result<Option<TelemetryReply>> =
            poll_until(clock, deadline, pacing, |deadline| Ok(self.poll_once(deadline)));

        match outcome? {
            Some(reply) => {
                self.transition(SessionState::Succeeded);
                debug!(
                    "Sensor 0x{:02x}: {:.2} V, {:.2} A, {:.3} W after {:?}",
                    self.address,
                    reply.voltage,
                    reply.current,
                    reply.power,
                    deadline.elapsed(clock)
                );
                Ok(reply)
            }
            None => {
                self.transition(SessionState::TimedOut);
                Err(MonitorError::Timeout {
                    address: self.address,
                    waited: deadline.elapsed(clock),
                })
            }
        }
    }

    /// One read after the pacing delay. On a miss, resync if due and send the
    /// next request.
    fn poll_once(&mut self, deadline: &Deadline) -> Option<TelemetryReply> {
        let timeout = self.timing.read_timeout().min(deadline.remaining(self.clock));
        match self.transport.read_frame(timeout) {
            Ok(Some(frame)) => {
                self.stats.frames_received += 1;
                if let Some(reply) = self.accept(&frame) {
                    return Some(reply);
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.transport_errors += 1;
                warn!("Read from sensor 0x{:02x} failed: {}", self.address, e);
            }
        }

        if deadline.expired(self.clock) {
            return None;
        }
        if self.clock.now().saturating_sub(self.last_resync) > self.revision.resync_after() {
            self.resync(deadline);
        }
        if self.active_request {
            self.send_request();
        }
        None
    }

    /// Decode `frame` and check it comes from our sensor.
    fn accept(&mut self, frame: &[u8]) -> Option<TelemetryReply> {
        trace!("Received frame: {}", hex::encode(frame));
        match self.revision.decode(frame) {
            Some(reply) if reply.address == self.address => Some(reply),
            Some(reply) => {
                debug!(
                    "Ignoring reply from sensor 0x{:02x} (waiting for 0x{:02x})",
                    reply.address, self.address
                );
                self.stats.frames_discarded += 1;
                None
            }
            None => {
                self.stats.frames_discarded += 1;
                None
            }
        }
    }

    /// Re-initialize the sensor, let it settle, and drop whatever it sent.
    fn resync(&mut self, deadline: &Deadline) {
        self.transition(SessionState::Resyncing);
        debug!(
            "Sensor 0x{:02x} silent for {:?}, resyncing ({})",
            self.address,
            self.clock.now().saturating_sub(self.last_resync),
            self.revision.name
        );

        for frame in self.revision.resync_frames(self.address) {
            self.send(&frame);
        }
        self.clock.sleep(self.timing.settle().min(deadline.remaining(self.clock)));
        self.flush_absorbing(*deadline);

        self.stats.resyncs += 1;
        self.last_resync = self.clock.now();
        self.transition(SessionState::Polling);
    }

    fn send_request(&mut self) {
        let frame = self.revision.encode(Command::RequestTelemetry, self.address);
        self.send(&frame);
    }

    fn send(&mut self, frame: &OutboundFrame) {
        trace!("Sending frame: {}", hex::encode(frame.as_bytes()));
        match self.transport.write_frame(frame.as_bytes()) {
            Ok(()) => self.stats.frames_sent += 1,
            Err(e) => {
                self.stats.transport_errors += 1;
                warn!("Write to sensor 0x{:02x} failed: {}", self.address, e);
            }
        }
    }

    fn flush_absorbing(&mut self, deadline: Deadline) {
        match flush(&mut *self.transport, self.clock, deadline) {
            Ok(flushed) => self.stats.frames_flushed += flushed,
            Err(e) => {
                self.stats.transport_errors += 1;
                warn!("Flush failed: {}", e);
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            trace!("Session 0x{:02x}: {:?} -> {:?}", self.address, self.state, next);
            self.state = next;
        }
    }
}
