//! `stsd` and the sample entries inside it.
//!
//! A sample entry's box type names the codec (`mp4a`, `avc1`, ...), so the
//! layout of its fixed fields cannot be told from the type alone. The
//! factory picks audio or visual parsing from the handler of the enclosing
//! track, and only for the entries `stsd` declares.

use byteorder::{BigEndian, WriteBytesExt};
use mt_common::{TagError, TagResult, Window};
use tracing::debug;

use crate::boxes::{fourcc_to_string, read_version_flags, write_version_flags, BoxHeader, STSD};
use crate::tree::{render_children, BoxContext, BoxFactory, Mp4Box};

// ─── stsd Box ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct SampleDescriptionBox {
    pub header: BoxHeader,
    pub version: u8,
    pub flags: u32,
    /// Declared entry count, written back unchanged.
    pub entry_count: u32,
    pub entries: Vec<Mp4Box>,
    pub trailing: Vec<u8>,
}

impl SampleDescriptionBox {
    pub fn parse(
        factory: &BoxFactory,
        header: BoxHeader,
        w: &mut Window<'_>,
        ctx: &BoxContext,
    ) -> TagResult<Self> {
        let (version, flags) = read_version_flags(w)?;
        let entry_count = w.read_u32::<BigEndian>()?;
        let entry_ctx = BoxContext {
            sample_entries: entry_count,
            ..ctx.child_of(STSD)
        };
        let (entries, trailing) = factory.read_children(w, entry_ctx)?;
        debug!(
            "stsd: {} entries declared, {} parsed, handler {:?}",
            entry_count,
            entries.len(),
            ctx.handler
        );
        Ok(Self {
            header,
            version,
            flags,
            entry_count,
            entries,
            trailing,
        })
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut prefix = Vec::with_capacity(8);
        write_version_flags(&mut prefix, self.version, self.flags)?;
        prefix.write_u32::<BigEndian>(self.entry_count)?;
        render_children(&prefix, &self.entries, &self.trailing)
    }
}

// ─── Audio Sample Entry ─────────────────────────────────────────────

/// Audio sample entry (ISO 14496-12 §12.2.3, with the QuickTime v1/v2
/// sound description extensions kept raw).
#[derive(Clone, Debug)]
pub struct AudioSampleEntry {
    pub header: BoxHeader,
    pub reserved: [u8; 6],
    pub data_reference_index: u16,
    pub version: u16,
    pub revision: u16,
    pub vendor: u32,
    pub channels: u16,
    pub sample_size: u16,
    pub compression_id: u16,
    pub packet_size: u16,
    /// 16.16 fixed point.
    pub sample_rate: u32,
    pub extension: Vec<u8>,
    pub children: Vec<Mp4Box>,
    pub trailing: Vec<u8>,
}

impl AudioSampleEntry {
    pub fn parse(
        factory: &BoxFactory,
        header: BoxHeader,
        w: &mut Window<'_>,
        ctx: &BoxContext,
    ) -> TagResult<Self> {
        let reserved = w.read_array::<6>()?;
        let data_reference_index = w.read_u16::<BigEndian>()?;
        let version = w.read_u16::<BigEndian>()?;
        let revision = w.read_u16::<BigEndian>()?;
        let vendor = w.read_u32::<BigEndian>()?;
        let channels = w.read_u16::<BigEndian>()?;
        let sample_size = w.read_u16::<BigEndian>()?;
        let compression_id = w.read_u16::<BigEndian>()?;
        let packet_size = w.read_u16::<BigEndian>()?;
        let sample_rate = w.read_u32::<BigEndian>()?;

        let extension_len = match version {
            0 => 0,
            1 => 16,
            2 => 36,
            other => {
                return Err(TagError::corrupt(
                    header.offset,
                    format!(
                        "audio sample entry '{}' has unknown version {}",
                        fourcc_to_string(header.box_type),
                        other
                    ),
                ))
            }
        };
        let extension = w.read_bytes(extension_len)?.to_vec();
        let (children, trailing) = factory.read_children(w, ctx.child_of(header.box_type))?;

        debug!(
            "audio entry '{}': {} ch, {} bits, {} Hz",
            fourcc_to_string(header.box_type),
            channels,
            sample_size,
            sample_rate >> 16
        );

        Ok(Self {
            header,
            reserved,
            data_reference_index,
            version,
            revision,
            vendor,
            channels,
            sample_size,
            compression_id,
            packet_size,
            sample_rate,
            extension,
            children,
            trailing,
        })
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate as f64 / 65536.0
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut prefix = Vec::with_capacity(28 + self.extension.len());
        prefix.extend_from_slice(&self.reserved);
        prefix.write_u16::<BigEndian>(self.data_reference_index)?;
        prefix.write_u16::<BigEndian>(self.version)?;
        prefix.write_u16::<BigEndian>(self.revision)?;
        prefix.write_u32::<BigEndian>(self.vendor)?;
        prefix.write_u16::<BigEndian>(self.channels)?;
        prefix.write_u16::<BigEndian>(self.sample_size)?;
        prefix.write_u16::<BigEndian>(self.compression_id)?;
        prefix.write_u16::<BigEndian>(self.packet_size)?;
        prefix.write_u32::<BigEndian>(self.sample_rate)?;
        prefix.extend_from_slice(&self.extension);
        render_children(&prefix, &self.children, &self.trailing)
    }
}

// ─── Visual Sample Entry ────────────────────────────────────────────

/// Visual sample entry. Resolution, frame count, compressor name and depth
/// stay in `fields`.
#[derive(Clone, Debug)]
pub struct VisualSampleEntry {
    pub header: BoxHeader,
    pub reserved: [u8; 6],
    pub data_reference_index: u16,
    pub pre_defined: [u8; 16],
    pub width: u16,
    pub height: u16,
    pub fields: [u8; 50],
    pub children: Vec<Mp4Box>,
    pub trailing: Vec<u8>,
}

impl VisualSampleEntry {
    pub fn parse(
        factory: &BoxFactory,
        header: BoxHeader,
        w: &mut Window<'_>,
        ctx: &BoxContext,
    ) -> TagResult<Self> {
        let reserved = w.read_array::<6>()?;
        let data_reference_index = w.read_u16::<BigEndian>()?;
        let pre_defined = w.read_array::<16>()?;
        let width = w.read_u16::<BigEndian>()?;
        let height = w.read_u16::<BigEndian>()?;
        let fields = w.read_array::<50>()?;
        let (children, trailing) = factory.read_children(w, ctx.child_of(header.box_type))?;

        debug!(
            "visual entry '{}': {}x{}",
            fourcc_to_string(header.box_type),
            width,
            height
        );

        Ok(Self {
            header,
            reserved,
            data_reference_index,
            pre_defined,
            width,
            height,
            fields,
            children,
            trailing,
        })
    }

    /// The Pascal-string compressor name.
    pub fn compressor_name(&self) -> String {
        let name = &self.fields[14..46];
        let len = (name[0] as usize).min(31);
        String::from_utf8_lossy(&name[1..1 + len]).into_owned()
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut prefix = Vec::with_capacity(78);
        prefix.extend_from_slice(&self.reserved);
        prefix.write_u16::<BigEndian>(self.data_reference_index)?;
        prefix.extend_from_slice(&self.pre_defined);
        prefix.write_u16::<BigEndian>(self.width)?;
        prefix.write_u16::<BigEndian>(self.height)?;
        prefix.extend_from_slice(&self.fields);
        render_children(&prefix, &self.children, &self.trailing)
    }
}
