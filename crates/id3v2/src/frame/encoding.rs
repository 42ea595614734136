//! Text encodings declared by the leading byte of string-carrying frames.

use mt_common::strings;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    #[default]
    Latin1,
    /// UTF-16 with a byte order mark.
    Utf16,
    /// UTF-16 big-endian without BOM (v2.4 only).
    Utf16Be,
    /// UTF-8 (v2.4 only).
    Utf8,
}

impl TextEncoding {
    /// Unknown encoding bytes are read as Latin-1.
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => Self::Utf16,
            2 => Self::Utf16Be,
            3 => Self::Utf8,
            _ => Self::Latin1,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Latin1 => 0,
            Self::Utf16 => 1,
            Self::Utf16Be => 2,
            Self::Utf8 => 3,
        }
    }

    pub fn is_wide(self) -> bool {
        matches!(self, Self::Utf16 | Self::Utf16Be)
    }

    pub fn terminator(self) -> &'static [u8] {
        if self.is_wide() {
            &[0, 0]
        } else {
            &[0]
        }
    }

    /// Whether a frame written with this encoding byte can be emitted
    /// unchanged into a tag of `version`.
    pub fn valid_for(self, version: u8) -> bool {
        version >= 4 || matches!(self, Self::Latin1 | Self::Utf16)
    }

    /// The encoding actually used to write `texts` into a tag of `version`.
    pub fn resolve<'a, I>(self, texts: I, version: u8) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted = if self == Self::Latin1 && !texts.into_iter().all(strings::is_latin1) {
            if version >= 4 {
                Self::Utf8
            } else {
                Self::Utf16
            }
        } else {
            self
        };
        if wanted.valid_for(version) {
            wanted
        } else {
            Self::Utf16
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => strings::latin1_decode(bytes),
            Self::Utf16 => strings::utf16_decode_bom(bytes),
            Self::Utf16Be => strings::utf16_decode(bytes, true),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Encode without a terminator. UTF-16 gets a little-endian BOM.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Latin1 => strings::latin1_encode(text),
            Self::Utf16 => {
                let mut out = vec![0xFF, 0xFE];
                out.extend_from_slice(&strings::utf16_encode(text, false));
                out
            }
            Self::Utf16Be => strings::utf16_encode(text, true),
            Self::Utf8 => text.as_bytes().to_vec(),
        }
    }

    pub fn encode_terminated(self, text: &str, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.encode(text));
        out.extend_from_slice(self.terminator());
    }
}

/// Split `data` at the first terminator for `encoding`. Wide terminators
/// must sit on an even offset. Without a terminator the whole input is the
/// field and the rest is empty.
pub fn split_terminated(data: &[u8], encoding: TextEncoding) -> (&[u8], &[u8]) {
    let found = if encoding.is_wide() {
        (0..data.len().saturating_sub(1))
            .step_by(2)
            .find(|&i| data[i] == 0 && data[i + 1] == 0)
    } else {
        data.iter().position(|&b| b == 0)
    };
    match found {
        Some(i) => (&data[..i], &data[i + encoding.terminator().len()..]),
        None => (data, &[]),
    }
}

/// Decode one terminated string and return the remaining bytes.
pub fn decode_terminated(data: &[u8], encoding: TextEncoding) -> (String, &[u8]) {
    let (field, rest) = split_terminated(data, encoding);
    (encoding.decode(field), rest)
}

/// Decode a list of terminator-separated strings. Trailing empty strings
/// (from a final terminator or padding) are dropped.
pub fn decode_list(mut data: &[u8], encoding: TextEncoding) -> Vec<String> {
    let mut values = Vec::new();
    while !data.is_empty() {
        let (value, rest) = decode_terminated(data, encoding);
        values.push(value);
        data = rest;
    }
    while values.last().is_some_and(|v| v.is_empty()) {
        values.pop();
    }
    values
}
