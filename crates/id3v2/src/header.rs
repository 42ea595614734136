//! ID3v2 tag header, footer and extended header.
//!
//! ```text
//! "ID3" | major | revision | flags | size (4 bytes synchsafe)
//! ```
//!
//! The size counts everything after the 10-byte header and before the
//! optional footer: extended header, frames and padding.

use byteorder::BigEndian;
use mt_common::{TagError, TagResult, Window};
use tracing::trace;

use crate::synchsafe;

/// Tag header and footer length.
pub const HEADER_SIZE: usize = 10;

const HEADER_MAGIC: &[u8; 3] = b"ID3";
const FOOTER_MAGIC: &[u8; 3] = b"3DI";

/// Tag-level flags from the header flag byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TagFlags {
    /// 0x80: the tag body (v2.2/2.3) or every frame (v2.4) is unsynchronised.
    pub unsynchronisation: bool,
    /// 0x40: an extended header follows (v2.3/2.4); compression in v2.2.
    pub extended_header: bool,
    /// 0x20: experimental indicator.
    pub experimental: bool,
    /// 0x10: a footer follows the tag (v2.4).
    pub footer: bool,
}

impl TagFlags {
    fn from_byte(byte: u8) -> Self {
        Self {
            unsynchronisation: byte & 0x80 != 0,
            extended_header: byte & 0x40 != 0,
            experimental: byte & 0x20 != 0,
            footer: byte & 0x10 != 0,
        }
    }

    fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.unsynchronisation {
            byte |= 0x80;
        }
        if self.extended_header {
            byte |= 0x40;
        }
        if self.experimental {
            byte |= 0x20;
        }
        if self.footer {
            byte |= 0x10;
        }
        byte
    }
}

/// Parsed 10-byte tag header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagHeader {
    pub major_version: u8,
    pub revision: u8,
    pub flags: TagFlags,
    /// Body size: everything between header and footer.
    pub size: u32,
}

impl Default for TagHeader {
    fn default() -> Self {
        Self {
            major_version: 4,
            revision: 0,
            flags: TagFlags::default(),
            size: 0,
        }
    }
}

impl TagHeader {
    /// Whether `data` starts with an ID3v2 header magic.
    pub fn is_present(data: &[u8]) -> bool {
        data.len() >= HEADER_SIZE && &data[..3] == HEADER_MAGIC
    }

    /// Parse the header at the start of `data`; `offset` is its absolute position.
    pub fn parse(data: &[u8], offset: u64) -> TagResult<Self> {
        Self::parse_with_magic(data, offset, HEADER_MAGIC)
    }

    /// Parse a v2.4 footer (same layout as the header, magic "3DI").
    pub fn parse_footer(data: &[u8], offset: u64) -> TagResult<Self> {
        Self::parse_with_magic(data, offset, FOOTER_MAGIC)
    }

    fn parse_with_magic(data: &[u8], offset: u64, magic: &[u8; 3]) -> TagResult<Self> {
        let mut w = Window::new(data, offset);
        let id = w.read_array::<3>()?;
        if &id != magic {
            return Err(TagError::corrupt(
                offset,
                format!(
                    "expected {:?}, found {:?}",
                    String::from_utf8_lossy(magic),
                    String::from_utf8_lossy(&id)
                ),
            ));
        }

        let major_version = w.read_u8()?;
        let revision = w.read_u8()?;
        if major_version == 0xFF || revision == 0xFF {
            return Err(TagError::corrupt(
                offset + 3,
                format!("invalid version bytes {major_version:#04x} {revision:#04x}"),
            ));
        }
        if !(2..=4).contains(&major_version) {
            return Err(TagError::unsupported(format!(
                "ID3v2.{major_version} tags"
            )));
        }

        let flag_byte = w.read_u8()?;
        let reserved_mask = match major_version {
            2 => 0x3F,
            3 => 0x1F,
            _ => 0x0F,
        };
        if flag_byte & reserved_mask != 0 {
            return Err(TagError::corrupt(
                offset + 5,
                format!(
                    "reserved tag flag bits set in {flag_byte:#04x} (v2.{major_version})"
                ),
            ));
        }
        let mut flags = TagFlags::from_byte(flag_byte);
        if major_version == 2 && flags.extended_header {
            // In v2.2 this bit means the whole tag is compressed.
            return Err(TagError::unsupported("compressed ID3v2.2 tags"));
        }
        if major_version < 4 {
            flags.footer = false;
        }

        let size_offset = w.position();
        let size = synchsafe::decode(w.read_bytes(4)?, size_offset)?;

        trace!(
            "ID3v2.{}.{} header at {}: flags {:#04x}, size {}",
            major_version,
            revision,
            offset,
            flag_byte,
            size
        );

        Ok(Self {
            major_version,
            revision,
            flags,
            size,
        })
    }

    /// Total on-disk size: header, body and footer.
    pub fn total_size(&self) -> u64 {
        let footer = if self.flags.footer { HEADER_SIZE } else { 0 };
        (HEADER_SIZE + footer) as u64 + self.size as u64
    }

    pub fn render(&self) -> TagResult<[u8; HEADER_SIZE]> {
        self.render_with_magic(HEADER_MAGIC)
    }

    pub fn render_footer(&self) -> TagResult<[u8; HEADER_SIZE]> {
        self.render_with_magic(FOOTER_MAGIC)
    }

    fn render_with_magic(&self, magic: &[u8; 3]) -> TagResult<[u8; HEADER_SIZE]> {
        let mut out = [0u8; HEADER_SIZE];
        out[..3].copy_from_slice(magic);
        out[3] = self.major_version;
        out[4] = self.revision;
        out[5] = self.flags.to_byte();
        out[6..].copy_from_slice(&synchsafe::encode(self.size)?);
        Ok(out)
    }
}

/// The optional extended header. It is read past but never written back:
/// its CRC and restriction fields describe the old frame data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedHeader {
    /// Bytes occupied on disk, including the size field itself.
    pub total_size: u32,
    pub data: Vec<u8>,
}

impl ExtendedHeader {
    pub fn parse(w: &mut Window<'_>, major_version: u8) -> TagResult<Self> {
        let offset = w.position();
        let total_size = match major_version {
            // v2.3: plain size that excludes the 4-byte size field.
            3 => w.read_u32::<BigEndian>()?.checked_add(4).ok_or_else(|| {
                TagError::corrupt(offset, "extended header size overflows")
            })?,
            // v2.4: synchsafe size that includes itself.
            _ => synchsafe::decode(w.read_bytes(4)?, offset)?,
        };
        if total_size < 6 {
            return Err(TagError::corrupt(
                offset,
                format!("extended header size {total_size} below minimum"),
            ));
        }
        let data = w.read_bytes(total_size as usize - 4)?.to_vec();
        trace!("extended header at {}: {} bytes", offset, total_size);
        Ok(Self { total_size, data })
    }
}
