//! In-memory transport on virtual time.
//!
//! Inbound frames are queued with the (virtual) time they become available.
//! A read that finds nothing due advances the shared [`ManualClock`] to the
//! next due frame or by its full timeout, so whole sessions run instantly and
//! deterministically. An optional responder plays the sensor and can queue a
//! reply for each frame written.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use nrfpm_protocol::FRAME_SIZE;

use super::Transport;
use crate::clock::{Clock, ManualClock};

/// Sensor model: sees each written frame and may answer with frames that
/// become readable immediately.
pub type Responder = Box<dyn FnMut(&[u8; FRAME_SIZE]) -> Vec<Vec<u8>> + Send>;

/// A frame written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFrame {
    /// Virtual time of the write.
    pub at: Duration,
    /// Frame bytes.
    pub bytes: [u8; FRAME_SIZE],
}

impl WrittenFrame {
    /// Opcode byte.
    pub fn opcode(&self) -> u8 {
        self.bytes[2]
    }
}

/// Transport that replays queued frames against a [`ManualClock`].
pub struct ScriptedTransport {
    clock: Arc<ManualClock>,
    inbound: VecDeque<(Duration, Vec<u8>)>,
    written: Vec<WrittenFrame>,
    responder: Option<Responder>,
    reads: usize,
    fail_writes: bool,
}

impl ScriptedTransport {
    /// Create an empty transport on `clock`.
    pub fn new(clock: Arc<ManualClock>) -> Self {
        ScriptedTransport {
            clock,
            inbound: VecDeque::new(),
            written: Vec::new(),
            responder: None,
            reads: 0,
            fail_writes: false,
        }
    }

    /// Install a sensor model.
    pub fn with_responder(
        mut self,
        responder: impl FnMut(&[u8; FRAME_SIZE]) -> Vec<Vec<u8>> + Send + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Queue a frame that is readable right away.
    pub fn push(&mut self, frame: impl Into<Vec<u8>>) {
        let now = self.clock.now();
        self.push_at(now, frame);
    }

    /// Queue a frame that becomes readable at virtual time `at`.
    pub fn push_at(&mut self, at: Duration, frame: impl Into<Vec<u8>>) {
        let index = self.inbound.partition_point(|(due, _)| *due <= at);
        self.inbound.insert(index, (at, frame.into()));
    }

    /// Make every following write fail.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Frames written so far.
    pub fn written(&self) -> &[WrittenFrame] {
        &self.written
    }

    /// Written frames with the given opcode.
    pub fn written_with_opcode(&self, opcode: u8) -> Vec<&WrittenFrame> {
        self.written.iter().filter(|f| f.opcode() == opcode).collect()
    }

    /// Number of `read_frame` calls so far.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Queued frames not yet read.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// The clock this transport runs on.
    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }
}

impl Transport for ScriptedTransport {
    fn write_frame(&mut self, frame: &[u8; FRAME_SIZE]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::Other, "scripted write failure"));
        }
        self.written.push(WrittenFrame {
            at: self.clock.now(),
            bytes: *frame,
        });
        let replies = match self.responder.as_mut() {
            Some(respond) => respond(frame),
            None => Vec::new(),
        };
        for reply in replies {
            self.push(reply);
        }
        Ok(())
    }

    fn read_frame(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        self.reads += 1;
        let now = self.clock.now();
        let horizon = now.saturating_add(timeout);

        match self.inbound.front() {
            Some((due, _)) if *due <= horizon => {
                self.clock.advance_to(*due);
                Ok(self.inbound.pop_front().map(|(_, frame)| frame))
            }
            _ => {
                self.clock.advance_to(horizon);
                Ok(None)
            }
        }
    }
}
