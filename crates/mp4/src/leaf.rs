//! Leaf boxes with decoded fields.
//!
//! Each type parses from a window over its content (the bytes after the box
//! header) and renders the same content back. Fields that nothing in this
//! crate interprets are kept as raw bytes so an unmodified box re-renders
//! byte-identical.

use byteorder::{BigEndian, WriteBytesExt};
use mt_common::{TagError, TagResult, Window};
use tracing::debug;

use crate::boxes::{
    fourcc_to_string, read_version_flags, write_version_flags, BoxHeader, APPL, CO64, DATA,
    FREE, HDLR,
};

// ─── ftyp Box ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileTypeBox {
    pub header: BoxHeader,
    pub major_brand: u32,
    pub minor_version: u32,
    pub compatible_brands: Vec<u32>,
}

impl FileTypeBox {
    pub fn parse(header: BoxHeader, w: &mut Window<'_>) -> TagResult<Self> {
        let major_brand = w.read_u32::<BigEndian>()?;
        let minor_version = w.read_u32::<BigEndian>()?;
        if w.remaining() % 4 != 0 {
            return Err(TagError::corrupt(
                w.position(),
                format!("ftyp brand list of {} bytes is not a multiple of 4", w.remaining()),
            ));
        }
        let mut compatible_brands = Vec::with_capacity(w.remaining() / 4);
        while !w.is_empty() {
            compatible_brands.push(w.read_u32::<BigEndian>()?);
        }

        debug!(
            "ftyp: major_brand='{}', minor_version={}, {} compatible brands",
            fourcc_to_string(major_brand),
            minor_version,
            compatible_brands.len()
        );

        Ok(Self {
            header,
            major_brand,
            minor_version,
            compatible_brands,
        })
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(8 + self.compatible_brands.len() * 4);
        out.write_u32::<BigEndian>(self.major_brand)?;
        out.write_u32::<BigEndian>(self.minor_version)?;
        for brand in &self.compatible_brands {
            out.write_u32::<BigEndian>(*brand)?;
        }
        Ok(out)
    }
}

// ─── mvhd Box ───────────────────────────────────────────────────────

/// Movie header: global timescale and duration. Everything after the
/// duration (rate, volume, matrix, next track id) is kept raw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovieHeaderBox {
    pub header: BoxHeader,
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rest: Vec<u8>,
}

impl MovieHeaderBox {
    pub fn parse(header: BoxHeader, w: &mut Window<'_>) -> TagResult<Self> {
        let (version, flags) = read_version_flags(w)?;
        let (creation_time, modification_time, timescale, duration) = if version == 1 {
            let creation = w.read_u64::<BigEndian>()?;
            let modification = w.read_u64::<BigEndian>()?;
            let timescale = w.read_u32::<BigEndian>()?;
            let duration = w.read_u64::<BigEndian>()?;
            (creation, modification, timescale, duration)
        } else {
            let creation = w.read_u32::<BigEndian>()? as u64;
            let modification = w.read_u32::<BigEndian>()? as u64;
            let timescale = w.read_u32::<BigEndian>()?;
            let duration = w.read_u32::<BigEndian>()? as u64;
            (creation, modification, timescale, duration)
        };

        debug!("mvhd: timescale={}, duration={}", timescale, duration);

        Ok(Self {
            header,
            version,
            flags,
            creation_time,
            modification_time,
            timescale,
            duration,
            rest: w.rest().to_vec(),
        })
    }

    /// Duration in seconds, if the timescale is set.
    pub fn duration_seconds(&self) -> Option<f64> {
        (self.timescale != 0).then(|| self.duration as f64 / self.timescale as f64)
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(32 + self.rest.len());
        write_version_flags(&mut out, self.version, self.flags)?;
        if self.version == 1 {
            out.write_u64::<BigEndian>(self.creation_time)?;
            out.write_u64::<BigEndian>(self.modification_time)?;
            out.write_u32::<BigEndian>(self.timescale)?;
            out.write_u64::<BigEndian>(self.duration)?;
        } else {
            let narrow = |v: u64, what: &str| {
                u32::try_from(v).map_err(|_| {
                    TagError::invalid_value(format!("mvhd version 0 cannot hold {what} {v}"))
                })
            };
            out.write_u32::<BigEndian>(narrow(self.creation_time, "creation time")?)?;
            out.write_u32::<BigEndian>(narrow(self.modification_time, "modification time")?)?;
            out.write_u32::<BigEndian>(self.timescale)?;
            out.write_u32::<BigEndian>(narrow(self.duration, "duration")?)?;
        }
        out.extend_from_slice(&self.rest);
        Ok(out)
    }
}

// ─── hdlr Box ───────────────────────────────────────────────────────

/// Handler reference: identifies what the enclosing media or meta box holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerBox {
    pub header: BoxHeader,
    pub version: u8,
    pub flags: u32,
    pub pre_defined: u32,
    /// Handler type FourCC: 'vide', 'soun', 'mdir', ...
    pub handler_type: u32,
    pub reserved: [u8; 12],
    /// Name bytes as stored (C string or QuickTime Pascal string).
    pub name: Vec<u8>,
}

impl HandlerBox {
    /// A handler as iTunes writes it for the metadata `meta` box.
    pub fn new(handler_type: u32) -> Self {
        let mut reserved = [0u8; 12];
        reserved[..4].copy_from_slice(&APPL.to_be_bytes());
        Self {
            header: BoxHeader::new(HDLR),
            version: 0,
            flags: 0,
            pre_defined: 0,
            handler_type,
            reserved,
            name: vec![0],
        }
    }

    pub fn parse(header: BoxHeader, w: &mut Window<'_>) -> TagResult<Self> {
        let (version, flags) = read_version_flags(w)?;
        let pre_defined = w.read_u32::<BigEndian>()?;
        let handler_type = w.read_u32::<BigEndian>()?;
        let reserved = w.read_array::<12>()?;
        let name = w.rest().to_vec();
        debug!("hdlr: type='{}'", fourcc_to_string(handler_type));
        Ok(Self {
            header,
            version,
            flags,
            pre_defined,
            handler_type,
            reserved,
            name,
        })
    }

    pub fn name(&self) -> String {
        let bytes = match self.name.split_first() {
            // Pascal string
            Some((&len, rest)) if len as usize == rest.len() && len != 0 => rest,
            _ => &self.name[..],
        };
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(24 + self.name.len());
        write_version_flags(&mut out, self.version, self.flags)?;
        out.write_u32::<BigEndian>(self.pre_defined)?;
        out.write_u32::<BigEndian>(self.handler_type)?;
        out.extend_from_slice(&self.reserved);
        out.extend_from_slice(&self.name);
        Ok(out)
    }
}

// ─── stco / co64 Boxes ──────────────────────────────────────────────

/// Chunk offset table. Entries are absolute file positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkOffsetBox {
    pub header: BoxHeader,
    pub version: u8,
    pub flags: u32,
    pub offsets: Vec<u64>,
    /// Bytes after the declared entries.
    pub rest: Vec<u8>,
}

impl ChunkOffsetBox {
    pub fn parse(header: BoxHeader, w: &mut Window<'_>) -> TagResult<Self> {
        let (version, flags) = read_version_flags(w)?;
        let count = w.read_u32::<BigEndian>()? as usize;
        let width = if header.box_type == CO64 { 8 } else { 4 };
        if count.saturating_mul(width) > w.remaining() {
            return Err(TagError::corrupt(
                w.position(),
                format!(
                    "{} declares {} entries, only {} bytes remain",
                    fourcc_to_string(header.box_type),
                    count,
                    w.remaining()
                ),
            ));
        }
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(if width == 8 {
                w.read_u64::<BigEndian>()?
            } else {
                w.read_u32::<BigEndian>()? as u64
            });
        }
        let rest = w.rest().to_vec();
        if !rest.is_empty() {
            debug!(
                "Keeping {} bytes after {} entries",
                rest.len(),
                fourcc_to_string(header.box_type)
            );
        }
        Ok(Self {
            header,
            version,
            flags,
            offsets,
            rest,
        })
    }

    pub fn is_64bit(&self) -> bool {
        self.header.box_type == CO64
    }

    /// Shift every offset at or after `from` by `delta`. Returns how many
    /// entries changed.
    pub fn shift(&mut self, from: u64, delta: i64) -> TagResult<usize> {
        let mut changed = 0;
        for offset in self.offsets.iter_mut().filter(|o| **o >= from) {
            *offset = offset.checked_add_signed(delta).ok_or_else(|| {
                TagError::invalid_value(format!("chunk offset {offset} cannot move by {delta}"))
            })?;
            changed += 1;
        }
        Ok(changed)
    }

    /// Whether shifting by `delta` keeps every entry representable.
    pub fn can_shift(&self, from: u64, delta: i64) -> bool {
        let limit = if self.is_64bit() { u64::MAX } else { u32::MAX as u64 };
        self.offsets
            .iter()
            .filter(|o| **o >= from)
            .all(|o| o.checked_add_signed(delta).is_some_and(|v| v <= limit))
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let width = if self.is_64bit() { 8 } else { 4 };
        let mut out = Vec::with_capacity(8 + self.offsets.len() * width + self.rest.len());
        write_version_flags(&mut out, self.version, self.flags)?;
        out.write_u32::<BigEndian>(self.offsets.len() as u32)?;
        for &offset in &self.offsets {
            if self.is_64bit() {
                out.write_u64::<BigEndian>(offset)?;
            } else {
                let narrow = u32::try_from(offset).map_err(|_| {
                    TagError::unsupported(format!(
                        "chunk offset {offset} does not fit a 32-bit stco table"
                    ))
                })?;
                out.write_u32::<BigEndian>(narrow)?;
            }
        }
        out.extend_from_slice(&self.rest);
        Ok(out)
    }
}

// ─── tfhd Box ───────────────────────────────────────────────────────

pub const TFHD_BASE_DATA_OFFSET: u32 = 0x00_0001;

/// Track fragment header. Only the base data offset is absolute; the
/// optional fields after it are kept raw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackFragmentHeaderBox {
    pub header: BoxHeader,
    pub version: u8,
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub rest: Vec<u8>,
}

impl TrackFragmentHeaderBox {
    pub fn parse(header: BoxHeader, w: &mut Window<'_>) -> TagResult<Self> {
        let (version, flags) = read_version_flags(w)?;
        let track_id = w.read_u32::<BigEndian>()?;
        let base_data_offset = if flags & TFHD_BASE_DATA_OFFSET != 0 {
            Some(w.read_u64::<BigEndian>()?)
        } else {
            None
        };
        Ok(Self {
            header,
            version,
            flags,
            track_id,
            base_data_offset,
            rest: w.rest().to_vec(),
        })
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(16 + self.rest.len());
        let mut flags = self.flags & !TFHD_BASE_DATA_OFFSET;
        if self.base_data_offset.is_some() {
            flags |= TFHD_BASE_DATA_OFFSET;
        }
        write_version_flags(&mut out, self.version, flags)?;
        out.write_u32::<BigEndian>(self.track_id)?;
        if let Some(offset) = self.base_data_offset {
            out.write_u64::<BigEndian>(offset)?;
        }
        out.extend_from_slice(&self.rest);
        Ok(out)
    }
}

// ─── ilst value boxes ───────────────────────────────────────────────

/// Well-known `data` box type codes.
pub const DATA_IMPLICIT: u32 = 0;
pub const DATA_UTF8: u32 = 1;
pub const DATA_UTF16: u32 = 2;
pub const DATA_JPEG: u32 = 13;
pub const DATA_PNG: u32 = 14;
pub const DATA_BE_SIGNED: u32 = 21;
pub const DATA_BMP: u32 = 27;

/// The value of an `ilst` item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataBox {
    pub header: BoxHeader,
    /// Type set byte, always 0 in practice.
    pub type_set: u8,
    pub data_type: u32,
    pub locale: u32,
    pub value: Vec<u8>,
}

impl DataBox {
    pub fn new(data_type: u32, value: Vec<u8>) -> Self {
        Self {
            header: BoxHeader::new(DATA),
            type_set: 0,
            data_type,
            locale: 0,
            value,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(DATA_UTF8, text.as_bytes().to_vec())
    }

    pub fn parse(header: BoxHeader, w: &mut Window<'_>) -> TagResult<Self> {
        let (type_set, data_type) = read_version_flags(w)?;
        let locale = w.read_u32::<BigEndian>()?;
        Ok(Self {
            header,
            type_set,
            data_type,
            locale,
            value: w.rest().to_vec(),
        })
    }

    /// The value as text, for the UTF-8 and UTF-16 types.
    pub fn as_text(&self) -> Option<String> {
        match self.data_type {
            DATA_UTF8 => Some(String::from_utf8_lossy(&self.value).into_owned()),
            DATA_UTF16 => Some(mt_common::strings::utf16_decode(&self.value, true)),
            _ => None,
        }
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(8 + self.value.len());
        write_version_flags(&mut out, self.type_set, self.data_type)?;
        out.write_u32::<BigEndian>(self.locale)?;
        out.extend_from_slice(&self.value);
        Ok(out)
    }
}

/// `mean` and `name` boxes of freeform (`----`) items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameBox {
    pub header: BoxHeader,
    pub version: u8,
    pub flags: u32,
    pub value: Vec<u8>,
}

impl NameBox {
    pub fn parse(header: BoxHeader, w: &mut Window<'_>) -> TagResult<Self> {
        let (version, flags) = read_version_flags(w)?;
        Ok(Self {
            header,
            version,
            flags,
            value: w.rest().to_vec(),
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(4 + self.value.len());
        write_version_flags(&mut out, self.version, self.flags)?;
        out.extend_from_slice(&self.value);
        Ok(out)
    }
}

// ─── Padding and opaque boxes ───────────────────────────────────────

/// `free` / `skip` padding. The payload is kept so a re-render does not
/// touch bytes other tools may have hidden there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreeBox {
    pub header: BoxHeader,
    pub data: Vec<u8>,
}

impl FreeBox {
    /// A zero-filled `free` box of `total` bytes (header included).
    pub fn with_size(total: u64) -> TagResult<Self> {
        if total < 8 {
            return Err(TagError::invalid_value(format!(
                "free box of {total} bytes is smaller than its header"
            )));
        }
        let mut header = BoxHeader::new(FREE);
        header.size = total;
        Ok(Self {
            header,
            data: vec![0; (total - 8) as usize],
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownBox {
    pub header: BoxHeader,
    pub data: Vec<u8>,
}
