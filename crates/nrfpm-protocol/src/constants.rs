//! Protocol constants
//!
//! Byte values and field positions shared by every protocol revision.

// ============================================================================
// Framing
// ============================================================================

/// Size of every frame exchanged over the radio link.
pub const FRAME_SIZE: usize = 32;
/// First byte of every outbound frame.
pub const PREAMBLE: u8 = 0xAA;
/// Bytes before the payload: preamble, class, opcode, address.
pub const HEADER_LEN: usize = 4;
/// Largest read issued against the radio device in one go.
pub const READ_CHUNK: usize = 40;

// ============================================================================
// Command classes and opcodes (host → sensor)
// ============================================================================

/// Class byte of frames without a payload (init, telemetry request).
pub const CLASS_SHORT: u8 = 0x04;
/// Class byte of frames carrying one payload byte (relay control).
pub const CLASS_RELAY: u8 = 0x05;

/// Ask the sensor for a telemetry reply.
pub const OP_REQUEST_TELEMETRY: u8 = 0x01;
/// (Re)initialize the sensor after it has restarted.
pub const OP_INITIALIZE: u8 = 0xFF;
/// Switch the sensor's relay; the payload byte selects the state.
pub const OP_RELAY: u8 = 0x67;

/// Relay payload that closes the relay.
pub const RELAY_ON: u8 = 0x00;
/// Relay payload that opens the relay.
pub const RELAY_OFF: u8 = 0xFF;

// ============================================================================
// Telemetry replies (sensor → host)
// ============================================================================

/// Byte 1 of a telemetry reply.
pub const REPLY_TYPE_TELEMETRY: u8 = 0x1C;
/// Byte 2 of a telemetry reply. Meaning unknown, constant in every revision.
pub const REPLY_UNKNOWN1: u8 = 0x01;

/// Shortest frame that carries a complete telemetry record.
pub const TELEMETRY_MIN_LEN: usize = 12;
/// Length needed for the energy counters of the extended layout.
pub const TELEMETRY_EXTENDED_LEN: usize = 20;

/// Offset of the big-endian voltage field.
pub const OFFSET_VOLTAGE: usize = 4;
/// Offset of the big-endian current field.
pub const OFFSET_CURRENT: usize = 6;
/// Offset of the 32-bit power field (extended layout).
pub const OFFSET_POWER: usize = 8;
/// Offset of the 16-bit power field (compact layout).
pub const OFFSET_POWER_COMPACT: usize = 10;
/// Offset of the amp-hour counter (extended layout).
pub const OFFSET_AMPHOUR: usize = 12;
/// Offset of the watt-hour counter (extended layout).
pub const OFFSET_WATTHOUR: usize = 16;

/// Voltage is reported in centivolts.
pub const VOLTAGE_DIVISOR: f64 = 100.0;
/// Current is reported in centiamps.
pub const CURRENT_DIVISOR: f64 = 100.0;
/// Power is reported in milliwatts.
pub const POWER_DIVISOR: f64 = 1000.0;
/// Energy counters are reported in milli-units.
pub const ENERGY_DIVISOR: f64 = 1000.0;
