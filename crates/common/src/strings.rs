//! String codecs shared by the tag formats.
//!
//! ID3v2 declares one of four encodings per field, ASF stores UTF-16LE,
//! RIFF INFO chunks hold 8-bit text. Decoding is lossy where the input is
//! malformed (unpaired surrogates become U+FFFD) because tags written by
//! broken tools still need to be readable.

/// Decode ISO-8859-1 bytes. Every byte maps to the code point of the same value.
pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode as ISO-8859-1. Characters above U+00FF become `?`.
pub fn latin1_encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

/// Whether `text` survives a Latin-1 round trip.
pub fn is_latin1(text: &str) -> bool {
    text.chars().all(|c| (c as u32) <= 0xFF)
}

/// Decode UTF-16 without a byte order mark. A trailing odd byte is ignored.
pub fn utf16_decode(bytes: &[u8], big_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decode UTF-16 that may start with a byte order mark. Without a BOM the
/// text is read as little-endian.
pub fn utf16_decode_bom(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => utf16_decode(rest, true),
        [0xFF, 0xFE, rest @ ..] => utf16_decode(rest, false),
        _ => utf16_decode(bytes, false),
    }
}

/// Encode as UTF-16 code units without a BOM.
pub fn utf16_encode(text: &str, big_endian: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        if big_endian {
            out.extend_from_slice(&unit.to_be_bytes());
        } else {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    }
    out
}

/// Strip trailing NUL characters.
pub fn trim_nul(text: &str) -> &str {
    text.trim_end_matches('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_roundtrip_and_replacement() {
        let bytes = [b'C', 0xE9, b'l', 0xFF];
        let text = latin1_decode(&bytes);
        assert_eq!(text, "Cél\u{FF}");
        assert_eq!(latin1_encode(&text), bytes);
        assert_eq!(latin1_encode("a\u{263A}b"), b"a?b");
        assert!(is_latin1("Céline"));
        assert!(!is_latin1("日本"));
    }

    #[test]
    fn utf16_bom_detection() {
        assert_eq!(utf16_decode_bom(&[0xFF, 0xFE, b'H', 0, b'i', 0]), "Hi");
        assert_eq!(utf16_decode_bom(&[0xFE, 0xFF, 0, b'H', 0, b'i']), "Hi");
        assert_eq!(utf16_decode_bom(&[b'O', 0, b'K', 0]), "OK");
    }

    #[test]
    fn utf16_encode_both_orders() {
        assert_eq!(utf16_encode("A", false), vec![0x41, 0x00]);
        assert_eq!(utf16_encode("A", true), vec![0x00, 0x41]);
        // Surrogate pair
        let encoded = utf16_encode("\u{1F600}", false);
        assert_eq!(encoded.len(), 4);
        assert_eq!(utf16_decode(&encoded, false), "\u{1F600}");
    }

    #[test]
    fn odd_trailing_byte_ignored() {
        assert_eq!(utf16_decode(&[b'A', 0, 0x42], false), "A");
    }

    #[test]
    fn trims_trailing_nul() {
        assert_eq!(trim_nul("abc\0\0"), "abc");
        assert_eq!(trim_nul("abc"), "abc");
    }
}
