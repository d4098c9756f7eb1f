//! Additive frame checksum.
//!
//! The checksum byte of an outbound frame is the sum of every byte before it,
//! truncated to eight bits. Its position depends on the payload length.

/// Sum `bytes[..offset]` as unsigned bytes, wrapping at 256.
///
/// An `offset` past the end of `bytes` sums the whole slice.
pub fn compute_checksum(bytes: &[u8], offset: usize) -> u8 {
    bytes[..offset.min(bytes.len())]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Write the checksum of `bytes[..offset]` into `bytes[offset]`.
///
/// Returns the stored value, or `None` when `offset` is outside the buffer.
pub fn apply_checksum(bytes: &mut [u8], offset: usize) -> Option<u8> {
    if offset >= bytes.len() {
        return None;
    }
    let checksum = compute_checksum(bytes, offset);
    bytes[offset] = checksum;
    Some(checksum)
}

/// Check that `bytes[offset]` holds the checksum of the bytes before it.
pub fn verify_checksum(bytes: &[u8], offset: usize) -> bool {
    bytes
        .get(offset)
        .is_some_and(|&stored| stored == compute_checksum(bytes, offset))
}
