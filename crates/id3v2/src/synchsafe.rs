//! ID3v2 "synchsafe" integers.
//!
//! Sizes in the tag header (and in v2.4 frame headers) are stored with 7 data
//! bits per byte and the top bit always clear, so that no size field can
//! contain `0xFF` and be mistaken for an MPEG sync marker:
//!
//! ```text
//! 0xxxxxxx 0xxxxxxx 0xxxxxxx 0xxxxxxx   → 28 usable bits
//! ```

use mt_common::{TagError, TagResult};

/// Largest value a 4-byte synchsafe integer can hold (2^28 - 1).
pub const MAX_SYNCHSAFE: u32 = (1 << 28) - 1;

/// Decode a big-endian synchsafe integer of up to 4 bytes. Any byte with the
/// top bit set is a corruption signal.
pub fn decode(bytes: &[u8], offset: u64) -> TagResult<u32> {
    if bytes.len() > 4 {
        return Err(TagError::corrupt(
            offset,
            format!("synchsafe integer of {} bytes", bytes.len()),
        ));
    }
    let n = bytes.len();
    let mut value = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        if b >= 0x80 {
            return Err(TagError::corrupt(
                offset + i as u64,
                format!("synchsafe byte 0x{b:02X} has the top bit set"),
            ));
        }
        value |= ((b & 0x7F) as u32) << (7 * (n - 1 - i));
    }
    Ok(value)
}

/// Encode `value` as a 4-byte synchsafe integer.
pub fn encode(value: u32) -> TagResult<[u8; 4]> {
    if value > MAX_SYNCHSAFE {
        return Err(TagError::invalid_value(format!(
            "{value} does not fit in a 28-bit synchsafe integer"
        )));
    }
    let mut out = [0u8; 4];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = ((value >> (7 * (3 - i))) & 0x7F) as u8;
    }
    Ok(out)
}
