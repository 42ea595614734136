//! ASF GUIDs and the well-known object identifiers.
//!
//! On disk a GUID is the mixed-endian Windows layout: the first three
//! fields little-endian, the last eight bytes as-is. [`Guid`] stores the
//! on-disk bytes; [`fmt::Display`] and [`FromStr`] use the canonical text
//! form `75B22630-668E-11CF-A6D9-00AA0062CE6C`.

use std::fmt;
use std::str::FromStr;

use mt_common::{TagError, TagResult, Window};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    /// Build from the canonical fields.
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        let a = d1.to_le_bytes();
        let b = d2.to_le_bytes();
        let c = d3.to_le_bytes();
        Guid([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d4[0], d4[1], d4[2], d4[3], d4[4],
            d4[5], d4[6], d4[7],
        ])
    }

    pub fn read(w: &mut Window<'_>) -> TagResult<Self> {
        Ok(Guid(w.read_array::<16>()?))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Name of a well-known object GUID, for log lines.
    pub fn name(&self) -> Option<&'static str> {
        KNOWN.iter().find(|(g, _)| g == self).map(|(_, n)| *n)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15]
        )
    }
}

impl FromStr for Guid {
    type Err = TagError;

    fn from_str(s: &str) -> TagResult<Self> {
        let invalid = || TagError::invalid_value(format!("malformed GUID '{s}'"));
        let s = s.strip_prefix('{').and_then(|t| t.strip_suffix('}')).unwrap_or(s);
        let groups: Vec<&str> = s.split('-').collect();
        let widths = [8, 4, 4, 4, 12];
        if groups.len() != widths.len()
            || groups.iter().zip(widths).any(|(g, w)| g.len() != w)
            || !s.chars().all(|c| c == '-' || c.is_ascii_hexdigit())
        {
            return Err(invalid());
        }
        let d1 = u32::from_str_radix(groups[0], 16).map_err(|_| invalid())?;
        let d2 = u16::from_str_radix(groups[1], 16).map_err(|_| invalid())?;
        let d3 = u16::from_str_radix(groups[2], 16).map_err(|_| invalid())?;
        let tail: String = [groups[3], groups[4]].concat();
        let mut d4 = [0u8; 8];
        for (i, byte) in d4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Guid::from_fields(d1, d2, d3, d4))
    }
}

// ─── Known GUIDs ────────────────────────────────────────────────────

pub const HEADER_OBJECT: Guid = Guid::from_fields(
    0x75B2_2630,
    0x668E,
    0x11CF,
    [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C],
);
pub const DATA_OBJECT: Guid = Guid::from_fields(
    0x75B2_2636,
    0x668E,
    0x11CF,
    [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C],
);
pub const FILE_PROPERTIES_OBJECT: Guid = Guid::from_fields(
    0x8CAB_DCA1,
    0xA947,
    0x11CF,
    [0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65],
);
pub const STREAM_PROPERTIES_OBJECT: Guid = Guid::from_fields(
    0xB7DC_0791,
    0xA9B7,
    0x11CF,
    [0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65],
);
pub const HEADER_EXTENSION_OBJECT: Guid = Guid::from_fields(
    0x5FBF_03B5,
    0xA92E,
    0x11CF,
    [0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65],
);
/// Reserved field of the header extension object.
pub const HEADER_EXTENSION_RESERVED: Guid = Guid::from_fields(
    0xABD3_D211,
    0xA9BA,
    0x11CF,
    [0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65],
);
pub const CONTENT_DESCRIPTION_OBJECT: Guid = Guid::from_fields(
    0x75B2_2633,
    0x668E,
    0x11CF,
    [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C],
);
pub const EXTENDED_CONTENT_DESCRIPTION_OBJECT: Guid = Guid::from_fields(
    0xD2D0_A440,
    0xE307,
    0x11D2,
    [0x97, 0xF0, 0x00, 0xA0, 0xC9, 0x5E, 0xA8, 0x50],
);
pub const METADATA_OBJECT: Guid = Guid::from_fields(
    0xC5F8_CBEA,
    0x5BAF,
    0x4877,
    [0x84, 0x67, 0xAA, 0x8C, 0x44, 0xFA, 0x4C, 0xCA],
);
pub const METADATA_LIBRARY_OBJECT: Guid = Guid::from_fields(
    0x4423_1C94,
    0x9498,
    0x49D1,
    [0xA1, 0x41, 0x1D, 0x13, 0x4E, 0x45, 0x70, 0x54],
);
pub const PADDING_OBJECT: Guid = Guid::from_fields(
    0x1806_D474,
    0xCADF,
    0x4509,
    [0xA4, 0xBA, 0x9A, 0xAB, 0xCB, 0x96, 0xAA, 0xE8],
);
pub const AUDIO_MEDIA: Guid = Guid::from_fields(
    0xF869_9E40,
    0x5B4D,
    0x11CF,
    [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B],
);
pub const VIDEO_MEDIA: Guid = Guid::from_fields(
    0xBC19_EFC0,
    0x5B4D,
    0x11CF,
    [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B],
);

const KNOWN: [(Guid, &str); 11] = [
    (HEADER_OBJECT, "Header"),
    (DATA_OBJECT, "Data"),
    (FILE_PROPERTIES_OBJECT, "FileProperties"),
    (STREAM_PROPERTIES_OBJECT, "StreamProperties"),
    (HEADER_EXTENSION_OBJECT, "HeaderExtension"),
    (CONTENT_DESCRIPTION_OBJECT, "ContentDescription"),
    (EXTENDED_CONTENT_DESCRIPTION_OBJECT, "ExtendedContentDescription"),
    (METADATA_OBJECT, "Metadata"),
    (METADATA_LIBRARY_OBJECT, "MetadataLibrary"),
    (PADDING_OBJECT, "Padding"),
    (AUDIO_MEDIA, "AudioMedia"),
];
