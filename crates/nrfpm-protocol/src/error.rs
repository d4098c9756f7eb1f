//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when working with power monitor frames.
///
/// Decoding errors never leave the receive path: a frame that fails to parse
/// is simply not the reply the caller is waiting for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame is not a telemetry reply.
    #[error("not a telemetry frame: type 0x{request_type:02X}, unknown1 0x{unknown1:02X}")]
    NotTelemetry {
        /// Byte 1 of the frame.
        request_type: u8,
        /// Byte 2 of the frame.
        unknown1: u8,
    },

    /// Command template does not fit in a frame.
    #[error("invalid command template: {0}")]
    InvalidTemplate(String),

    /// Unknown protocol revision name.
    #[error("unknown protocol revision: {0}")]
    UnknownRevision(String),
}
