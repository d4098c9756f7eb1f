//! Telemetry replies from the sensor.
//!
//! ```text
//! +----------+------+----------+---------+---------+---------+-------------------------+
//! | preamble | 0x1C | unknown1 | address | voltage | current | power / energy counters |
//! |    [0]   |  [1] |   [2]    |   [3]   |  [4..6] |  [6..8] |         [8..]           |
//! +----------+------+----------+---------+---------+---------+-------------------------+
//! ```
//!
//! All multi-byte fields are big-endian fixed point integers.

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ProtocolError;

/// Width of the reply payload, which changed between firmware revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyLayout {
    /// 16-bit power at bytes 10..12, no energy counters.
    Compact,
    /// 32-bit power at bytes 8..12 followed by amp-hour and watt-hour counters.
    #[default]
    Extended,
}

/// A decoded telemetry reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReply {
    /// Reply type byte (always `0x1C`).
    pub request_type: u8,
    /// Uninterpreted byte following the reply type (always `0x01`).
    pub unknown1: u8,
    /// Address of the sensor that sent the reply.
    pub address: u8,
    /// Bus voltage in volts.
    pub voltage: f64,
    /// Load current in amps.
    pub current: f64,
    /// Load power in watts.
    pub power: f64,
    /// Accumulated charge in amp-hours (extended layout only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amphour: Option<f64>,
    /// Accumulated energy in watt-hours (extended layout only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watthour: Option<f64>,
}

impl TelemetryReply {
    /// Check whether `frame` carries the telemetry reply markers.
    pub fn is_telemetry(frame: &[u8]) -> bool {
        frame.len() > 2 && frame[1] == REPLY_TYPE_TELEMETRY && frame[2] == REPLY_UNKNOWN1
    }

    /// Parse a telemetry reply.
    ///
    /// Bytes past the layout's fields (radio padding) are ignored.
    pub fn parse(frame: &[u8], layout: ReplyLayout) -> Result<Self, ProtocolError> {
        if frame.len() < 3 {
            return Err(ProtocolError::FrameTooShort {
                expected: TELEMETRY_MIN_LEN,
                actual: frame.len(),
            });
        }
        if !Self::is_telemetry(frame) {
            return Err(ProtocolError::NotTelemetry {
                request_type: frame[1],
                unknown1: frame[2],
            });
        }
        if frame.len() < TELEMETRY_MIN_LEN {
            return Err(ProtocolError::FrameTooShort {
                expected: TELEMETRY_MIN_LEN,
                actual: frame.len(),
            });
        }

        let mut fields = &frame[OFFSET_VOLTAGE..];
        let voltage = f64::from(fields.get_u16()) / VOLTAGE_DIVISOR;
        let current = f64::from(fields.get_u16()) / CURRENT_DIVISOR;

        let (power, amphour, watthour) = match layout {
            ReplyLayout::Compact => {
                let mut power = &frame[OFFSET_POWER_COMPACT..];
                (f64::from(power.get_u16()) / POWER_DIVISOR, None, None)
            }
            ReplyLayout::Extended => {
                let power = f64::from(fields.get_u32()) / POWER_DIVISOR;
                if frame.len() >= TELEMETRY_EXTENDED_LEN {
                    let amphour = f64::from(fields.get_u32()) / ENERGY_DIVISOR;
                    let watthour = f64::from(fields.get_u32()) / ENERGY_DIVISOR;
                    (power, Some(amphour), Some(watthour))
                } else {
                    (power, None, None)
                }
            }
        };

        Ok(TelemetryReply {
            request_type: frame[1],
            unknown1: frame[2],
            address: frame[3],
            voltage,
            current,
            power,
            amphour,
            watthour,
        })
    }

    /// Decode a telemetry reply, treating anything unparseable as "not yet".
    pub fn decode(frame: &[u8], layout: ReplyLayout) -> Option<Self> {
        match Self::parse(frame, layout) {
            Ok(reply) => Some(reply),
            Err(e) => {
                log::trace!("Ignoring frame ({} bytes): {}", frame.len(), e);
                None
            }
        }
    }
}

/// Decode a telemetry reply using the current (extended) layout.
pub fn decode(frame: &[u8]) -> Option<TelemetryReply> {
    TelemetryReply::decode(frame, ReplyLayout::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reply_frame(address: u8, voltage: u16, current: u16) -> [u8; FRAME_SIZE] {
        let mut frame = [0u8; FRAME_SIZE];
        frame[..4].copy_from_slice(&[PREAMBLE, REPLY_TYPE_TELEMETRY, REPLY_UNKNOWN1, address]);
        frame[4..6].copy_from_slice(&voltage.to_be_bytes());
        frame[6..8].copy_from_slice(&current.to_be_bytes());
        frame
    }

    #[test]
    fn test_decode_scaling_is_exact() {
        let mut frame = reply_frame(0x02, 1250, 325);
        frame[8..12].copy_from_slice(&40_625u32.to_be_bytes());
        frame[12..16].copy_from_slice(&7_500u32.to_be_bytes());
        frame[16..20].copy_from_slice(&93_001u32.to_be_bytes());

        let reply = decode(&frame).expect("valid telemetry");
        assert_eq!(reply.request_type, 0x1C);
        assert_eq!(reply.unknown1, 0x01);
        assert_eq!(reply.address, 0x02);
        assert_eq!(reply.voltage, 12.50);
        assert_eq!(reply.current, 3.25);
        assert_relative_eq!(reply.power, 40.625);
        assert_relative_eq!(reply.amphour.unwrap(), 7.5);
        assert_relative_eq!(reply.watthour.unwrap(), 93.001);
    }

    #[test]
    fn test_decode_compact_layout() {
        let mut frame = reply_frame(0x05, 2400, 100);
        // Bytes 8..10 are ignored by the compact layout.
        frame[8..10].copy_from_slice(&[0xDE, 0xAD]);
        frame[10..12].copy_from_slice(&24_000u16.to_be_bytes());

        let reply = TelemetryReply::decode(&frame, ReplyLayout::Compact).expect("valid telemetry");
        assert_eq!(reply.voltage, 24.0);
        assert_eq!(reply.current, 1.0);
        assert_eq!(reply.power, 24.0);
        assert_eq!(reply.amphour, None);
        assert_eq!(reply.watthour, None);
    }

    #[test]
    fn test_decode_extended_without_counters() {
        let mut frame = reply_frame(0x02, 500, 0).to_vec();
        frame[8..12].copy_from_slice(&1_000u32.to_be_bytes());
        frame.truncate(16);

        let reply = decode(&frame).expect("valid telemetry");
        assert_eq!(reply.power, 1.0);
        assert_eq!(reply.amphour, None);
        assert_eq!(reply.watthour, None);
    }

    #[test]
    fn test_guard_rejects_other_frames() {
        let mut frame = reply_frame(0x02, 1250, 100);
        frame[1] = 0x1D;
        assert!(decode(&frame).is_none());
        assert_eq!(
            TelemetryReply::parse(&frame, ReplyLayout::Extended),
            Err(ProtocolError::NotTelemetry {
                request_type: 0x1D,
                unknown1: 0x01
            })
        );

        let mut frame = reply_frame(0x02, 1250, 100);
        frame[2] = 0x00;
        assert!(decode(&frame).is_none());

        // Our own outbound request echoed back.
        let echo = crate::encode(crate::Command::RequestTelemetry, 0x02);
        assert!(decode(echo.as_bytes()).is_none());
    }

    #[test]
    fn test_guard_ignores_remaining_content() {
        for fill in [0x00u8, 0x1C, 0x01, 0xFF] {
            let mut frame = [fill; FRAME_SIZE];
            frame[1] = 0x01;
            frame[2] = 0x1C;
            assert!(decode(&frame).is_none());
        }
    }

    #[test]
    fn test_short_frames() {
        assert!(decode(&[]).is_none());
        assert!(decode(&[0xAA, 0x1C]).is_none());

        let frame = reply_frame(0x02, 1250, 100);
        assert!(decode(&frame[..TELEMETRY_MIN_LEN - 1]).is_none());
        assert_eq!(
            TelemetryReply::parse(&frame[..8], ReplyLayout::Compact),
            Err(ProtocolError::FrameTooShort {
                expected: TELEMETRY_MIN_LEN,
                actual: 8
            })
        );
        assert!(decode(&frame[..TELEMETRY_MIN_LEN]).is_some());
    }

    #[test]
    fn test_is_telemetry() {
        assert!(TelemetryReply::is_telemetry(&[0xAA, 0x1C, 0x01]));
        assert!(!TelemetryReply::is_telemetry(&[0xAA, 0x1C]));
        assert!(!TelemetryReply::is_telemetry(&[0xAA, 0x04, 0x01]));
    }
}
