//! Protocol revisions.
//!
//! Sensor firmware revisions differ in three ways:
//!
//! - how long the host waits for a reply before assuming the sensor restarted
//!   and needs to be initialized again,
//! - whether that initialization is a checksummed `InitializeSensor` command or
//!   a pair of raw frames,
//! - how wide the telemetry reply is.
//!
//! [`ProtocolRevision`] captures all of it as data so a single session engine
//! can serve every revision, including ones loaded from a configuration file.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::commands::{Command, CommandTable, OutboundFrame};
use crate::constants::*;
use crate::error::ProtocolError;
use crate::telemetry::{ReplyLayout, TelemetryReply};

/// A raw resync frame: `[preamble, class, opcode, address, address + offset]`.
///
/// Early firmware was woken up with frames whose last byte is the address plus
/// a fixed constant. The constant is kept as-is; no checksum is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineFrame {
    /// Class byte.
    pub class: u8,
    /// Opcode byte.
    pub opcode: u8,
    /// Added (wrapping) to the address to form byte 4.
    pub address_offset: u8,
}

impl InlineFrame {
    /// Encode for the sensor at `address`.
    pub fn encode(&self, address: u8) -> OutboundFrame {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[..HEADER_LEN + 1].copy_from_slice(&[
            PREAMBLE,
            self.class,
            self.opcode,
            address,
            address.wrapping_add(self.address_offset),
        ]);
        OutboundFrame::from_bytes(bytes)
    }
}

/// How a silent sensor is resynchronized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum ResyncStyle {
    /// Send the `InitializeSensor` command from the opcode table.
    Command,
    /// Send these raw frames in order.
    Inline {
        /// Frames to send.
        frames: Vec<InlineFrame>,
    },
}

/// Everything that varies between firmware revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRevision {
    /// Revision name, used in logs.
    pub name: String,
    /// Silence (in milliseconds) after which the sensor is resynchronized.
    pub resync_after_ms: u64,
    /// Resynchronization frames.
    pub resync: ResyncStyle,
    /// Telemetry reply layout.
    pub reply_layout: ReplyLayout,
    /// Command templates.
    #[serde(default)]
    pub commands: CommandTable,
}

impl ProtocolRevision {
    /// Silence after which the sensor is resynchronized.
    pub fn resync_after(&self) -> Duration {
        Duration::from_millis(self.resync_after_ms)
    }

    /// Encode `command` for the sensor at `address`.
    pub fn encode(&self, command: Command, address: u8) -> OutboundFrame {
        self.commands.encode(command, address)
    }

    /// Frames that (re)initialize the sensor at `address`.
    pub fn resync_frames(&self, address: u8) -> Vec<OutboundFrame> {
        match &self.resync {
            ResyncStyle::Command => vec![self.encode(Command::InitializeSensor, address)],
            ResyncStyle::Inline { frames } => frames.iter().map(|f| f.encode(address)).collect(),
        }
    }

    /// Decode a telemetry reply using this revision's layout.
    pub fn decode(&self, frame: &[u8]) -> Option<TelemetryReply> {
        TelemetryReply::decode(frame, self.reply_layout)
    }
}

impl Default for ProtocolRevision {
    fn default() -> Self {
        RevisionId::default().revision()
    }
}

/// Built-in firmware revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionId {
    /// First firmware: 1 s resync threshold, raw resync frames, compact replies.
    V1,
    /// 2 s resync threshold, `InitializeSensor` command, compact replies.
    V2,
    /// 2 s resync threshold, `InitializeSensor` command, energy counters.
    #[default]
    V3,
}

impl RevisionId {
    /// All built-in revisions, oldest first.
    pub const ALL: [RevisionId; 3] = [RevisionId::V1, RevisionId::V2, RevisionId::V3];

    /// Revision name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionId::V1 => "v1",
            RevisionId::V2 => "v2",
            RevisionId::V3 => "v3",
        }
    }

    /// Full revision description.
    pub fn revision(self) -> ProtocolRevision {
        let (resync_after_ms, resync, reply_layout) = match self {
            RevisionId::V1 => (
                1000,
                ResyncStyle::Inline {
                    frames: vec![
                        InlineFrame {
                            class: CLASS_SHORT,
                            opcode: OP_INITIALIZE,
                            address_offset: 0x03,
                        },
                        InlineFrame {
                            class: CLASS_SHORT,
                            opcode: OP_INITIALIZE,
                            address_offset: 0xAD,
                        },
                    ],
                },
                ReplyLayout::Compact,
            ),
            RevisionId::V2 => (2000, ResyncStyle::Command, ReplyLayout::Compact),
            RevisionId::V3 => (2000, ResyncStyle::Command, ReplyLayout::Extended),
        };
        ProtocolRevision {
            name: self.as_str().to_string(),
            resync_after_ms,
            resync,
            reply_layout,
            commands: CommandTable::default(),
        }
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevisionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RevisionId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::UnknownRevision(s.to_string()))
    }
}
