//! Chapter (`CHAP`) and table of contents (`CTOC`) frames.
//!
//! Both carry a list of embedded frames after their fixed fields, read with
//! the same frame header layout as the enclosing tag.
//!
//! ```text
//! CHAP: element id NUL | start ms | end ms | start offset | end offset | frames
//! CTOC: element id NUL | flags | entry count | child id NUL ... | frames
//! ```

use byteorder::{BigEndian, WriteBytesExt};
use mt_common::{strings, TagError, TagResult, Window};

use super::encoding::{split_terminated, TextEncoding};
use super::factory::FrameFactory;
use super::header::{FrameHeader, FrameId};
use super::{render_frames, Frame};

/// Offsets of 0xFFFFFFFF mean "not set; use the times instead".
pub const NO_OFFSET: u32 = u32::MAX;

fn read_element_id<'a>(data: &'a [u8], offset: u64) -> (String, Window<'a>) {
    let (id, rest) = split_terminated(data, TextEncoding::Latin1);
    let consumed = (data.len() - rest.len()) as u64;
    (strings::latin1_decode(id), Window::new(rest, offset + consumed))
}

#[derive(Clone, Debug)]
pub struct ChapterFrame {
    pub header: FrameHeader,
    pub element_id: String,
    pub start_time: u32,
    pub end_time: u32,
    pub start_offset: u32,
    pub end_offset: u32,
    pub frames: Vec<Frame>,
}

impl ChapterFrame {
    pub fn new(element_id: &str, start_time: u32, end_time: u32) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"CHAP")),
            element_id: element_id.to_string(),
            start_time,
            end_time,
            start_offset: NO_OFFSET,
            end_offset: NO_OFFSET,
            frames: Vec::new(),
        }
    }

    pub(crate) fn parse(
        header: FrameHeader,
        data: &[u8],
        offset: u64,
        factory: &FrameFactory,
    ) -> TagResult<Self> {
        let (element_id, mut w) = read_element_id(data, offset);
        let start_time = w.read_u32::<BigEndian>()?;
        let end_time = w.read_u32::<BigEndian>()?;
        let start_offset = w.read_u32::<BigEndian>()?;
        let end_offset = w.read_u32::<BigEndian>()?;
        let frames = factory.read_frames(&mut w, header.version)?;
        Ok(Self {
            header,
            element_id,
            start_time,
            end_time,
            start_offset,
            end_offset,
            frames,
        })
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        let mut out = Vec::new();
        TextEncoding::Latin1.encode_terminated(&self.element_id, &mut out);
        out.write_u32::<BigEndian>(self.start_time)?;
        out.write_u32::<BigEndian>(self.end_time)?;
        out.write_u32::<BigEndian>(self.start_offset)?;
        out.write_u32::<BigEndian>(self.end_offset)?;
        out.extend_from_slice(&render_frames(&self.frames, version)?);
        Ok(out)
    }
}

#[derive(Clone, Debug)]
pub struct TableOfContentsFrame {
    pub header: FrameHeader,
    pub element_id: String,
    pub top_level: bool,
    pub ordered: bool,
    pub children: Vec<String>,
    pub frames: Vec<Frame>,
}

impl TableOfContentsFrame {
    pub fn new(element_id: &str) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"CTOC")),
            element_id: element_id.to_string(),
            top_level: false,
            ordered: true,
            children: Vec::new(),
            frames: Vec::new(),
        }
    }

    pub(crate) fn parse(
        header: FrameHeader,
        data: &[u8],
        offset: u64,
        factory: &FrameFactory,
    ) -> TagResult<Self> {
        let (element_id, mut w) = read_element_id(data, offset);
        let flags = w.read_u8()?;
        let count = w.read_u8()?;
        let mut children = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if w.is_empty() {
                return Err(TagError::corrupt(
                    w.position(),
                    format!("CTOC declares {count} entries, found {}", children.len()),
                ));
            }
            let child_offset = w.position();
            let (child, rest) = read_element_id(w.rest(), child_offset);
            children.push(child);
            w = rest;
        }
        let frames = factory.read_frames(&mut w, header.version)?;
        Ok(Self {
            header,
            element_id,
            top_level: flags & 0x02 != 0,
            ordered: flags & 0x01 != 0,
            children,
            frames,
        })
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        let count = u8::try_from(self.children.len()).map_err(|_| {
            TagError::invalid_value(format!(
                "CTOC {:?} has {} children, at most 255 allowed",
                self.element_id,
                self.children.len()
            ))
        })?;
        let mut out = Vec::new();
        TextEncoding::Latin1.encode_terminated(&self.element_id, &mut out);
        let mut flags = 0u8;
        if self.top_level {
            flags |= 0x02;
        }
        if self.ordered {
            flags |= 0x01;
        }
        out.push(flags);
        out.push(count);
        for child in &self.children {
            TextEncoding::Latin1.encode_terminated(child, &mut out);
        }
        out.extend_from_slice(&render_frames(&self.frames, version)?);
        Ok(out)
    }
}
