//! # Frame Checksum
//!
//! Bitwise complement of the modulo-256 sum of every byte between the
//! header and the checksum itself (length, command and payload).

/// Compute the checksum of `data` (length byte through last payload byte).
///
/// # Arguments
///
/// * `data` - Frame bytes without header and checksum
///
/// # Returns
///
/// * `u8` - Inverted modulo-256 sum
///
/// # Examples
///
/// ```
/// use hoh_control::protocol::checksum::checksum;
///
/// // stop command: FF 03 78 84
/// assert_eq!(checksum(&[0x03, 0x78]), 0x84);
/// ```
pub fn checksum(data: &[u8]) -> u8 {
    !data.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Check a complete frame (header included) against its trailing checksum.
pub fn verify(frame: &[u8]) -> bool {
    match frame {
        [_, body @ .., last] if !body.is_empty() => checksum(body) == *last,
        _ => false,
    }
}
