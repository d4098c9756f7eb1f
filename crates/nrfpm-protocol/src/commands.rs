//! Commands that can be sent to a power monitor.
//!
//! Each command is described by a [`CommandTemplate`]: its class and opcode
//! bytes, an opaque payload and the position of the checksum byte. Encoding
//! fills in the sensor address, computes the checksum and zero-pads the frame
//! to [`FRAME_SIZE`] bytes.

use std::fmt;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::checksum::apply_checksum;
use crate::constants::*;
use crate::error::ProtocolError;

/// Commands that can be sent to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Initialize a sensor that has (re)started.
    InitializeSensor,
    /// Close the relay.
    EnableRelay,
    /// Open the relay.
    DisableRelay,
    /// Ask for a telemetry reply.
    RequestTelemetry,
}

impl Command {
    /// All commands, in opcode table order.
    pub const ALL: [Command; 4] = [
        Command::InitializeSensor,
        Command::EnableRelay,
        Command::DisableRelay,
        Command::RequestTelemetry,
    ];

    /// Human readable command name.
    pub fn name(&self) -> &'static str {
        match self {
            Command::InitializeSensor => "initialize",
            Command::EnableRelay => "enable-relay",
            Command::DisableRelay => "disable-relay",
            Command::RequestTelemetry => "request-telemetry",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully encoded outbound frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutboundFrame([u8; FRAME_SIZE]);

impl OutboundFrame {
    /// Wrap raw frame bytes.
    pub fn from_bytes(bytes: [u8; FRAME_SIZE]) -> Self {
        OutboundFrame(bytes)
    }

    /// The frame bytes.
    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    /// Consume the frame, returning its bytes.
    pub fn into_bytes(self) -> [u8; FRAME_SIZE] {
        self.0
    }

    /// Class byte.
    pub fn class(&self) -> u8 {
        self.0[1]
    }

    /// Opcode byte.
    pub fn opcode(&self) -> u8 {
        self.0[2]
    }

    /// Address byte.
    pub fn address(&self) -> u8 {
        self.0[3]
    }
}

impl AsRef<[u8]> for OutboundFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for OutboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutboundFrame(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Byte layout of one command.
///
/// The payload bytes are opaque constants; nothing is known about them beyond
/// the values the sensor firmware accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TemplateRepr", into = "TemplateRepr")]
pub struct CommandTemplate {
    class: u8,
    opcode: u8,
    payload: Vec<u8>,
    checksum_offset: usize,
}

/// Serialized form of a [`CommandTemplate`].
#[derive(Serialize, Deserialize)]
struct TemplateRepr {
    class: u8,
    opcode: u8,
    #[serde(default)]
    payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum_offset: Option<usize>,
}

impl CommandTemplate {
    /// Create a template whose checksum directly follows the payload.
    pub fn new(class: u8, opcode: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        Self::with_checksum_offset(class, opcode, payload, HEADER_LEN + payload.len())
    }

    /// Create a template with an explicit checksum position.
    ///
    /// Bytes between the end of the payload and the checksum stay zero.
    pub fn with_checksum_offset(
        class: u8,
        opcode: u8,
        payload: &[u8],
        checksum_offset: usize,
    ) -> Result<Self, ProtocolError> {
        let body_len = HEADER_LEN + payload.len();
        if checksum_offset < body_len {
            return Err(ProtocolError::InvalidTemplate(format!(
                "checksum offset {} overlaps {} header/payload bytes",
                checksum_offset, body_len
            )));
        }
        if checksum_offset >= FRAME_SIZE {
            return Err(ProtocolError::InvalidTemplate(format!(
                "checksum offset {} outside {}-byte frame",
                checksum_offset, FRAME_SIZE
            )));
        }
        Ok(CommandTemplate {
            class,
            opcode,
            payload: payload.to_vec(),
            checksum_offset,
        })
    }

    /// Template for one of the built-in commands.
    fn fixed(class: u8, opcode: u8, payload: &[u8]) -> Self {
        CommandTemplate {
            class,
            opcode,
            payload: payload.to_vec(),
            checksum_offset: HEADER_LEN + payload.len(),
        }
    }

    /// Class byte.
    pub fn class(&self) -> u8 {
        self.class
    }

    /// Opcode byte.
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Opaque payload bytes following the address.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Position of the checksum byte.
    pub fn checksum_offset(&self) -> usize {
        self.checksum_offset
    }

    /// Encode this command for the sensor at `address`.
    pub fn encode(&self, address: u8) -> OutboundFrame {
        let mut bytes = [0u8; FRAME_SIZE];
        {
            let mut buf = &mut bytes[..];
            buf.put_u8(PREAMBLE);
            buf.put_u8(self.class);
            buf.put_u8(self.opcode);
            buf.put_u8(address);
            buf.put_slice(&self.payload);
        }
        let stored = apply_checksum(&mut bytes, self.checksum_offset);
        debug_assert!(stored.is_some(), "template offsets are checked on construction");
        OutboundFrame(bytes)
    }
}

impl TryFrom<TemplateRepr> for CommandTemplate {
    type Error = ProtocolError;

    fn try_from(repr: TemplateRepr) -> Result<Self, Self::Error> {
        let offset = repr
            .checksum_offset
            .unwrap_or(HEADER_LEN + repr.payload.len());
        CommandTemplate::with_checksum_offset(repr.class, repr.opcode, &repr.payload, offset)
    }
}

impl From<CommandTemplate> for TemplateRepr {
    fn from(template: CommandTemplate) -> Self {
        TemplateRepr {
            class: template.class,
            opcode: template.opcode,
            payload: template.payload,
            checksum_offset: Some(template.checksum_offset),
        }
    }
}

/// Opcode table: one template per [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTable {
    /// `InitializeSensor` template.
    pub initialize: CommandTemplate,
    /// `EnableRelay` template.
    pub enable_relay: CommandTemplate,
    /// `DisableRelay` template.
    pub disable_relay: CommandTemplate,
    /// `RequestTelemetry` template.
    pub request_telemetry: CommandTemplate,
}

impl Default for CommandTable {
    fn default() -> Self {
        CommandTable {
            initialize: CommandTemplate::fixed(CLASS_SHORT, OP_INITIALIZE, &[]),
            enable_relay: CommandTemplate::fixed(CLASS_RELAY, OP_RELAY, &[RELAY_ON]),
            disable_relay: CommandTemplate::fixed(CLASS_RELAY, OP_RELAY, &[RELAY_OFF]),
            request_telemetry: CommandTemplate::fixed(CLASS_SHORT, OP_REQUEST_TELEMETRY, &[]),
        }
    }
}

impl CommandTable {
    /// Template for `command`.
    pub fn template(&self, command: Command) -> &CommandTemplate {
        match command {
            Command::InitializeSensor => &self.initialize,
            Command::EnableRelay => &self.enable_relay,
            Command::DisableRelay => &self.disable_relay,
            Command::RequestTelemetry => &self.request_telemetry,
        }
    }

    /// Encode `command` for the sensor at `address`.
    pub fn encode(&self, command: Command, address: u8) -> OutboundFrame {
        self.template(command).encode(address)
    }
}

/// Encode `command` using the standard opcode table.
pub fn encode(command: Command, address: u8) -> OutboundFrame {
    CommandTable::default().encode(command, address)
}
