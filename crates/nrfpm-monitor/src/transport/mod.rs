//! Frame transports.
//!
//! The session only needs two things from the radio: send a 32-byte frame and
//! wait (boundedly) for the next received frame. Delivery, ordering across
//! directions and deduplication are not guaranteed.

mod device;
mod scripted;

pub use device::DeviceTransport;
pub use scripted::{ScriptedTransport, WrittenFrame};

use std::io;
use std::time::Duration;

use nrfpm_protocol::FRAME_SIZE;

/// A half-duplex frame channel to the sensor.
pub trait Transport: Send {
    /// Send one frame.
    fn write_frame(&mut self, frame: &[u8; FRAME_SIZE]) -> io::Result<()>;

    /// Wait up to `timeout` for the next received frame.
    ///
    /// A zero timeout must not block. Returns `Ok(None)` when nothing arrived.
    fn read_frame(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_frame(&mut self, frame: &[u8; FRAME_SIZE]) -> io::Result<()> {
        (**self).write_frame(frame)
    }

    fn read_frame(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        (**self).read_frame(timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_frame(&mut self, frame: &[u8; FRAME_SIZE]) -> io::Result<()> {
        (**self).write_frame(frame)
    }

    fn read_frame(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        (**self).read_frame(timeout)
    }
}
