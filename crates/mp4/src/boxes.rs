//! ISO BMFF box header codec.
//!
//! Every box is a 4-byte big-endian size plus a 4-byte type. A size of 1
//! escapes to a 64-bit size after the type, a size of 0 runs to the end of
//! the enclosing region, and `uuid` boxes append a 16-byte user type.
//!
//! Reference: ISO 14496-12 (ISO Base Media File Format).

use byteorder::{BigEndian, WriteBytesExt};
use mt_common::{TagError, TagResult, Window};
use tracing::trace;

// ─── Box FourCC constants ────────────────────────────────────────────

/// Convert 4 ASCII bytes to a u32 FourCC code.
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | (d as u32)
}

pub const FTYP: u32 = fourcc(b'f', b't', b'y', b'p');
pub const MOOV: u32 = fourcc(b'm', b'o', b'o', b'v');
pub const MVHD: u32 = fourcc(b'm', b'v', b'h', b'd');
pub const TRAK: u32 = fourcc(b't', b'r', b'a', b'k');
pub const MDIA: u32 = fourcc(b'm', b'd', b'i', b'a');
pub const HDLR: u32 = fourcc(b'h', b'd', b'l', b'r');
pub const MINF: u32 = fourcc(b'm', b'i', b'n', b'f');
pub const STBL: u32 = fourcc(b's', b't', b'b', b'l');
pub const STSD: u32 = fourcc(b's', b't', b's', b'd');
pub const STCO: u32 = fourcc(b's', b't', b'c', b'o');
pub const CO64: u32 = fourcc(b'c', b'o', b'6', b'4');
pub const MDAT: u32 = fourcc(b'm', b'd', b'a', b't');
pub const EDTS: u32 = fourcc(b'e', b'd', b't', b's');
pub const DINF: u32 = fourcc(b'd', b'i', b'n', b'f');
pub const MVEX: u32 = fourcc(b'm', b'v', b'e', b'x');
pub const MOOF: u32 = fourcc(b'm', b'o', b'o', b'f');
pub const TRAF: u32 = fourcc(b't', b'r', b'a', b'f');
pub const TFHD: u32 = fourcc(b't', b'f', b'h', b'd');
pub const UDTA: u32 = fourcc(b'u', b'd', b't', b'a');
pub const META: u32 = fourcc(b'm', b'e', b't', b'a');
pub const ILST: u32 = fourcc(b'i', b'l', b's', b't');
pub const DATA: u32 = fourcc(b'd', b'a', b't', b'a');
pub const MEAN: u32 = fourcc(b'm', b'e', b'a', b'n');
pub const NAME: u32 = fourcc(b'n', b'a', b'm', b'e');
pub const FREE: u32 = fourcc(b'f', b'r', b'e', b'e');
pub const SKIP: u32 = fourcc(b's', b'k', b'i', b'p');
pub const UUID: u32 = fourcc(b'u', b'u', b'i', b'd');

/// Handler types.
pub const SOUN: u32 = fourcc(b's', b'o', b'u', b'n');
pub const VIDE: u32 = fourcc(b'v', b'i', b'd', b'e');
pub const MDIR: u32 = fourcc(b'm', b'd', b'i', b'r');
pub const APPL: u32 = fourcc(b'a', b'p', b'p', b'l');

/// iTunes item names.
pub const ITEM_TITLE: u32 = fourcc(0xA9, b'n', b'a', b'm');
pub const ITEM_ARTIST: u32 = fourcc(0xA9, b'A', b'R', b'T');
pub const ITEM_ALBUM: u32 = fourcc(0xA9, b'a', b'l', b'b');
pub const ITEM_COMMENT: u32 = fourcc(0xA9, b'c', b'm', b't');
pub const ITEM_GENRE: u32 = fourcc(0xA9, b'g', b'e', b'n');
pub const ITEM_YEAR: u32 = fourcc(0xA9, b'd', b'a', b'y');
pub const ITEM_TRACK: u32 = fourcc(b't', b'r', b'k', b'n');
pub const ITEM_COVER: u32 = fourcc(b'c', b'o', b'v', b'r');
pub const ITEM_FREEFORM: u32 = fourcc(b'-', b'-', b'-', b'-');

/// Convert a FourCC u32 to a human-readable string for logging.
pub fn fourcc_to_string(cc: u32) -> String {
    let bytes = cc.to_be_bytes();
    bytes
        .iter()
        .map(|&b| match b {
            0xA9 => '©',
            b if b.is_ascii_graphic() || b == b' ' => b as char,
            _ => '?',
        })
        .collect()
}

// ─── Box Header ─────────────────────────────────────────────────────

/// A parsed ISO BMFF box header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoxHeader {
    /// FourCC type code.
    pub box_type: u32,
    /// Total box size (including header). A size-0 box is resolved to the
    /// end of its enclosing region when parsed.
    pub size: u64,
    /// Size of the header itself (8, 16, 24 or 32 bytes).
    pub header_size: u8,
    /// Extended type of `uuid` boxes.
    pub user_type: Option<[u8; 16]>,
    /// Offset of the box start in the file.
    pub offset: u64,
}

impl BoxHeader {
    /// Header for a box built in memory. Size is filled in on render.
    pub fn new(box_type: u32) -> Self {
        Self {
            box_type,
            size: 8,
            header_size: 8,
            user_type: None,
            offset: 0,
        }
    }

    /// Parse a header whose region extends to the end of `w`.
    pub fn parse(w: &mut Window<'_>) -> TagResult<Self> {
        let available = w.remaining() as u64;
        Self::parse_bounded(w, available)
    }

    /// Parse a header. `available` is the number of bytes from the start of
    /// the header to the end of the enclosing region, used to resolve size 0.
    pub fn parse_bounded(w: &mut Window<'_>, available: u64) -> TagResult<Self> {
        let offset = w.position();
        if w.remaining() < 8 {
            return Err(TagError::corrupt(
                offset,
                format!("box header needs 8 bytes, only {} remain", w.remaining()),
            ));
        }
        let size32 = w.read_u32::<BigEndian>()?;
        let box_type = w.read_u32::<BigEndian>()?;

        let (mut size, mut header_size) = match size32 {
            0 => (available, 8u8),
            1 => {
                if w.remaining() < 8 {
                    return Err(TagError::corrupt(
                        offset,
                        format!(
                            "box '{}' escapes to a 64-bit size but only {} bytes follow",
                            fourcc_to_string(box_type),
                            w.remaining()
                        ),
                    ));
                }
                (w.read_u64::<BigEndian>()?, 16u8)
            }
            _ => (size32 as u64, 8u8),
        };

        let user_type = if box_type == UUID {
            header_size += 16;
            Some(w.read_array::<16>()?)
        } else {
            None
        };
        if size32 == 0 {
            size = size.max(header_size as u64);
        }

        if size < header_size as u64 {
            return Err(TagError::corrupt(
                offset,
                format!(
                    "box '{}' has invalid size {} (less than header)",
                    fourcc_to_string(box_type),
                    size
                ),
            ));
        }

        trace!(
            "Box '{}' at offset {}, size {}",
            fourcc_to_string(box_type),
            offset,
            size
        );

        Ok(Self {
            box_type,
            size,
            header_size,
            user_type,
            offset,
        })
    }

    /// Byte offset where the box content (payload) starts.
    pub fn content_offset(&self) -> u64 {
        self.offset + self.header_size as u64
    }

    /// Byte size of the content (payload), excluding the header.
    pub fn content_size(&self) -> u64 {
        self.size - self.header_size as u64
    }

    /// Byte offset of the first byte after this box.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }

    pub fn is_large(&self) -> bool {
        self.size > u32::MAX as u64
    }

    /// Header bytes for the current `size`. The 64-bit form is used only
    /// when the size does not fit in 32 bits.
    pub fn render(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.header_size as usize);
        if self.is_large() {
            out.write_u32::<BigEndian>(1)?;
            out.write_u32::<BigEndian>(self.box_type)?;
            out.write_u64::<BigEndian>(self.size)?;
        } else {
            out.write_u32::<BigEndian>(self.size as u32)?;
            out.write_u32::<BigEndian>(self.box_type)?;
        }
        if let Some(user_type) = &self.user_type {
            out.extend_from_slice(user_type);
        }
        Ok(out)
    }
}

/// Header size needed for a box carrying `content_len` bytes.
pub fn header_size_for(user_type: bool, content_len: u64) -> u8 {
    let extra = if user_type { 16 } else { 0 };
    if content_len + 8 + extra > u32::MAX as u64 {
        16 + extra as u8
    } else {
        8 + extra as u8
    }
}

/// Wrap `content` in a box header, choosing the 32- or 64-bit size form.
pub fn write_box(box_type: u32, user_type: Option<[u8; 16]>, content: &[u8]) -> TagResult<Vec<u8>> {
    let header_size = header_size_for(user_type.is_some(), content.len() as u64);
    let header = BoxHeader {
        box_type,
        size: header_size as u64 + content.len() as u64,
        header_size,
        user_type,
        offset: 0,
    };
    let mut out = header.render()?;
    out.extend_from_slice(content);
    Ok(out)
}

/// Split a full box's version byte and 24-bit flags.
pub fn read_version_flags(w: &mut Window<'_>) -> TagResult<(u8, u32)> {
    let vf = w.read_u32::<BigEndian>()?;
    Ok(((vf >> 24) as u8, vf & 0x00FF_FFFF))
}

pub fn write_version_flags(out: &mut Vec<u8>, version: u8, flags: u32) -> TagResult<()> {
    let version_flags = ((version as u32) << 24) | (flags & 0x00FF_FFFF);
    out.write_u32::<BigEndian>(version_flags)?;
    Ok(())
}
