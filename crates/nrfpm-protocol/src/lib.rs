//! nRF24 Power Monitor Protocol
//!
//! This crate provides the frame codec for wireless battery/power monitors that
//! hang off an nRF24L01 radio link. Every message on the link is a fixed
//! 32-byte frame.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → sensor): `0xAA` preamble, class byte, opcode, sensor
//!   address, an optional payload, then an additive checksum. The remainder of
//!   the frame is zero padding.
//! - **Telemetry** (sensor → host): frames whose bytes 1 and 2 are `0x1C 0x01`
//!   carry big-endian voltage, current and power readings. Anything else seen on
//!   the link is noise or an echo and is ignored.
//!
//! Sensor firmware has gone through several revisions which differ in how they
//! are resynchronized and in how wide the telemetry payload is. Those
//! differences live in [`ProtocolRevision`] so one engine drives all of them.
//!
//! # Example
//!
//! ```rust
//! use nrfpm_protocol::{Command, RevisionId};
//!
//! let revision = RevisionId::V3.revision();
//! let frame = revision.encode(Command::RequestTelemetry, 0x02);
//! assert_eq!(&frame.as_bytes()[..5], &[0xAA, 0x04, 0x01, 0x02, 0xB1]);
//!
//! let mut reply = [0u8; 32];
//! reply[..8].copy_from_slice(&[0xAA, 0x1C, 0x01, 0x02, 0x04, 0xE2, 0x00, 0x96]);
//! let telemetry = revision.decode(&reply).expect("telemetry frame");
//! assert_eq!(telemetry.voltage, 12.5);
//! assert_eq!(telemetry.current, 1.5);
//! ```

mod checksum;
mod commands;
mod constants;
mod error;
mod revision;
mod telemetry;

pub use checksum::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use revision::*;
pub use telemetry::*;
