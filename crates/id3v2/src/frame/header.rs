//! Frame identifiers, flags and the per-version frame header layout.
//!
//! ```text
//! v2.2: id[3] | size u24 (plain)
//! v2.3: id[4] | size u32 (plain)      | flags[2]
//! v2.4: id[4] | size u32 (synchsafe)  | flags[2]
//! ```

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, WriteBytesExt};
use mt_common::{TagError, TagResult, Window};
use tracing::trace;

use crate::synchsafe;

/// Four-byte frame id. Untranslatable v2.2 ids are kept as three bytes
/// followed by a zero and are never rendered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub [u8; 4]);

impl FrameId {
    pub const fn new(id: &[u8; 4]) -> Self {
        Self(*id)
    }

    pub const fn legacy(id: &[u8; 3]) -> Self {
        Self([id[0], id[1], id[2], 0])
    }

    pub fn is_legacy(&self) -> bool {
        self.0[3] == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        if self.is_legacy() {
            &self.0[..3]
        } else {
            &self.0
        }
    }

    /// Text information frames (`T***` except `TXXX`).
    pub fn is_text(&self) -> bool {
        self.0[0] == b'T' && self.0 != *b"TXXX" && !self.is_legacy()
    }

    /// URL link frames (`W***` except `WXXX`).
    pub fn is_url(&self) -> bool {
        self.0[0] == b'W' && self.0 != *b"WXXX" && !self.is_legacy()
    }

    /// Frame ids are upper-case ASCII letters and the digits 1-9.
    pub fn is_valid_byte(b: u8) -> bool {
        b.is_ascii_uppercase() || (b'1'..=b'9').contains(&b)
    }

    pub fn is_valid(bytes: &[u8]) -> bool {
        !bytes.is_empty() && bytes.iter().all(|&b| Self::is_valid_byte(b))
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({self})")
    }
}

impl FromStr for FrameId {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if !Self::is_valid(bytes) {
            return Err(TagError::invalid_value(format!("invalid frame id {s:?}")));
        }
        match bytes.len() {
            4 => Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]])),
            3 => Ok(Self::legacy(&[bytes[0], bytes[1], bytes[2]])),
            _ => Err(TagError::invalid_value(format!("invalid frame id {s:?}"))),
        }
    }
}

/// Frame status and format flags, normalised across v2.3 and v2.4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameFlags {
    pub tag_alter_preservation: bool,
    pub file_alter_preservation: bool,
    pub read_only: bool,
    pub grouping: bool,
    pub compression: bool,
    pub encryption: bool,
    pub unsynchronisation: bool,
    pub data_length_indicator: bool,
}

impl FrameFlags {
    pub fn parse(bytes: [u8; 2], version: u8, offset: u64) -> TagResult<Self> {
        let [status, format] = bytes;
        let (status_reserved, format_reserved) = match version {
            3 => (0x1F, 0x1F),
            _ => (0x8F, 0xB0),
        };
        if status & status_reserved != 0 || format & format_reserved != 0 {
            return Err(TagError::corrupt(
                offset,
                format!(
                    "reserved frame flag bits set in {status:#04x} {format:#04x} (v2.{version})"
                ),
            ));
        }
        Ok(match version {
            3 => Self {
                tag_alter_preservation: status & 0x80 != 0,
                file_alter_preservation: status & 0x40 != 0,
                read_only: status & 0x20 != 0,
                compression: format & 0x80 != 0,
                encryption: format & 0x40 != 0,
                grouping: format & 0x20 != 0,
                // v2.3 compressed frames carry a 4-byte decompressed size.
                data_length_indicator: format & 0x80 != 0,
                unsynchronisation: false,
            },
            _ => Self {
                tag_alter_preservation: status & 0x40 != 0,
                file_alter_preservation: status & 0x20 != 0,
                read_only: status & 0x10 != 0,
                grouping: format & 0x40 != 0,
                compression: format & 0x08 != 0,
                encryption: format & 0x04 != 0,
                unsynchronisation: format & 0x02 != 0,
                data_length_indicator: format & 0x01 != 0,
            },
        })
    }

    pub fn render(&self, version: u8) -> [u8; 2] {
        let mut status = 0u8;
        let mut format = 0u8;
        match version {
            3 => {
                set(&mut status, 0x80, self.tag_alter_preservation);
                set(&mut status, 0x40, self.file_alter_preservation);
                set(&mut status, 0x20, self.read_only);
                set(&mut format, 0x80, self.compression);
                set(&mut format, 0x40, self.encryption);
                set(&mut format, 0x20, self.grouping);
            }
            _ => {
                set(&mut status, 0x40, self.tag_alter_preservation);
                set(&mut status, 0x20, self.file_alter_preservation);
                set(&mut status, 0x10, self.read_only);
                set(&mut format, 0x40, self.grouping);
                set(&mut format, 0x08, self.compression);
                set(&mut format, 0x04, self.encryption);
                set(&mut format, 0x02, self.unsynchronisation);
                set(&mut format, 0x01, self.data_length_indicator);
            }
        }
        [status, format]
    }

    /// Flags that describe the payload encoding rather than the frame's
    /// status; cleared whenever the payload is re-rendered from fields.
    pub fn clear_format(&mut self) {
        self.compression = false;
        self.encryption = false;
        self.unsynchronisation = false;
        self.data_length_indicator = false;
    }
}

fn set(byte: &mut u8, mask: u8, on: bool) {
    if on {
        *byte |= mask;
    }
}

/// A parsed frame header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub id: FrameId,
    /// Payload size as declared on disk.
    pub size: u32,
    pub flags: FrameFlags,
    /// Group identity byte, when the grouping flag is set.
    pub group_id: Option<u8>,
    /// Tag major version the frame was read from (4 for new frames).
    pub version: u8,
}

impl FrameHeader {
    pub fn new(id: FrameId) -> Self {
        Self {
            id,
            size: 0,
            flags: FrameFlags::default(),
            group_id: None,
            version: 4,
        }
    }

    pub const fn size_for(version: u8) -> usize {
        if version == 2 {
            6
        } else {
            10
        }
    }

    /// Read a frame header. Returns `Ok(None)` at the end of the frame
    /// stream: too few bytes left, padding, or a malformed id.
    pub fn parse(w: &mut Window<'_>, version: u8) -> TagResult<Option<Self>> {
        let header_size = Self::size_for(version);
        let id_len = if version == 2 { 3 } else { 4 };
        let Some(peek) = w.peek(header_size) else {
            return Ok(None);
        };
        if peek[0] == 0 || !FrameId::is_valid(&peek[..id_len]) {
            return Ok(None);
        }

        let offset = w.position();
        let header = if version == 2 {
            let id = w.read_array::<3>()?;
            let size = w.read_u24_be()?;
            Self {
                id: FrameId::legacy(&id),
                size,
                flags: FrameFlags::default(),
                group_id: None,
                version,
            }
        } else {
            let id = w.read_array::<4>()?;
            let size_offset = w.position();
            let size = if version == 4 {
                synchsafe::decode(w.read_bytes(4)?, size_offset)?
            } else {
                w.read_u32::<BigEndian>()?
            };
            let flags_offset = w.position();
            let flags = FrameFlags::parse(w.read_array::<2>()?, version, flags_offset)?;
            Self {
                id: FrameId(id),
                size,
                flags,
                group_id: None,
                version,
            }
        };

        trace!(
            "frame {} at {}: size {}, flags {:?}",
            header.id,
            offset,
            header.size,
            header.flags
        );
        Ok(Some(header))
    }

    /// Render a v2.3 or v2.4 header for a payload of `size` bytes.
    pub fn render(&self, version: u8, size: usize) -> TagResult<Vec<u8>> {
        if self.id.is_legacy() {
            return Err(TagError::unsupported(format!(
                "rendering v2.2 frame {}",
                self.id
            )));
        }
        let size = u32::try_from(size)
            .map_err(|_| TagError::invalid_value(format!("frame {} too large", self.id)))?;
        let mut out = Vec::with_capacity(10);
        out.extend_from_slice(&self.id.0);
        if version == 4 {
            out.extend_from_slice(&synchsafe::encode(size)?);
        } else {
            out.write_u32::<BigEndian>(size)?;
        }
        out.extend_from_slice(&self.flags.render(version));
        Ok(out)
    }
}
