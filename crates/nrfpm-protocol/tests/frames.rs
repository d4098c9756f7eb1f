//! Wire-level tests against hand-assembled frames for a sensor at address 0x02.
//!
//! Outbound frames are the byte sequences the sensor firmware accepts. The
//! replies are synthetic, assembled by hand to the compact and extended
//! layouts.

use nrfpm_protocol::{
    compute_checksum, decode, encode, Command, ReplyLayout, RevisionId, TelemetryReply,
    FRAME_SIZE,
};

/// Parse a hex string into a zero-padded 32-byte frame.
fn frame(hex: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("valid hex"))
        .collect();
    bytes.resize(FRAME_SIZE, 0);
    bytes
}

#[test]
fn test_outbound_frames_match_driver_bytes() {
    let cases = [
        (Command::RequestTelemetry, "aa040102b1"),
        (Command::InitializeSensor, "aa04ff02af"),
        (Command::EnableRelay, "aa0567020018"),
        (Command::DisableRelay, "aa056702ff17"),
    ];

    for (command, expected) in cases {
        let encoded = encode(command, 0x02);
        assert_eq!(encoded.as_bytes().to_vec(), frame(expected), "{}", command);
    }
}

#[test]
fn test_every_revision_encodes_the_same_commands() {
    for id in RevisionId::ALL {
        let revision = id.revision();
        for command in Command::ALL {
            assert_eq!(revision.encode(command, 0x31), encode(command, 0x31), "{} {}", id, command);
        }
    }
}

#[test]
fn test_compact_reply() {
    // 12.34 V, 0.56 A, power word 0x1B0A = 6.922 W
    let reply_bytes = frame("aa1c010204d2003800001b0a");
    let reply = RevisionId::V2.revision().decode(&reply_bytes).expect("telemetry");
    assert_eq!(reply.address, 0x02);
    assert_eq!(reply.voltage, 12.34);
    assert_eq!(reply.current, 0.56);
    assert_eq!(reply.power, 6.922);
    assert!(reply.amphour.is_none());
}

#[test]
fn test_extended_reply() {
    // 12.34 V, 0.56 A, 6.922 W, 1.5 Ah, 18.249 Wh
    let reply_bytes = frame("aa1c010204d2003800001b0a000005dc00004749");
    let reply = RevisionId::V3.revision().decode(&reply_bytes).expect("telemetry");
    assert_eq!(reply.power, 6.922);
    assert_eq!(reply.amphour, Some(1.5));
    assert_eq!(reply.watthour, Some(18.249));
}

#[test]
fn test_decode_matches_extended_layout() {
    let reply_bytes = frame("aa1c0102004b0064000003e8");
    assert_eq!(decode(&reply_bytes), TelemetryReply::decode(&reply_bytes, ReplyLayout::Extended));
}

#[test]
fn test_telemetry_frames_checksum_is_not_required() {
    // Replies carry no checksum; a "bad" trailing byte still decodes.
    let mut reply_bytes = frame("aa1c0102004b0064000003e8");
    reply_bytes[12] = compute_checksum(&reply_bytes, 12).wrapping_add(1);
    assert!(decode(&reply_bytes).is_some());
}

#[test]
fn test_reply_serializes_without_missing_counters() {
    let reply_bytes = frame("aa1c0102004b0064000003e8");
    let reply = RevisionId::V1.revision().decode(&reply_bytes).expect("telemetry");
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["voltage"], 0.75);
    assert!(json.get("amphour").is_none());
}
