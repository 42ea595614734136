//! ID3v2 unsynchronisation.
//!
//! Legacy MPEG decoders scan for `0xFF` followed by a byte with the top three
//! bits set. The unsynchronisation scheme stuffs a `0x00` after every `0xFF`
//! that is followed by such a byte (or by `0x00`, so the transform stays
//! reversible).

/// Insert a zero byte after every `0xFF` that is followed by `0x00` or by a
/// byte with any of the top three bits set.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    if out.len() < 2 {
        return out;
    }
    // Reverse scan so insertions never shift bytes still to be examined.
    for i in (0..out.len() - 1).rev() {
        if out[i] == 0xFF && (out[i + 1] == 0x00 || (out[i + 1] & 0xE0) != 0) {
            out.insert(i + 1, 0x00);
        }
    }
    out
}

/// Remove the zero byte following every `0xFF`.
pub fn decode(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    if out.len() < 2 {
        return out;
    }
    for i in (0..out.len() - 1).rev() {
        if out[i] == 0xFF && out[i + 1] == 0x00 {
            out.remove(i + 1);
        }
    }
    out
}

/// Whether any false sync pattern would survive in `data` as-is.
pub fn needs_encoding(data: &[u8]) -> bool {
    data.windows(2)
        .any(|w| w[0] == 0xFF && (w[1] == 0x00 || (w[1] & 0xE0) != 0))
}
