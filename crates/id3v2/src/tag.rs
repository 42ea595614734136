//! The ID3v2 tag: header plus an ordered list of frames.

use std::borrow::Cow;

use mt_common::tag::{leading_number, non_empty};
use mt_common::{BasicTag, TagConfig, TagError, TagResult, Window};
use tracing::{debug, info};

use crate::frame::{
    render_frame_list, Frame, FrameFactory, FrameId, LocalizedTextFrame, PictureFrame, TextFrame,
};
use crate::header::{ExtendedHeader, TagFlags, TagHeader, HEADER_SIZE};
use crate::{migrate, unsync};

const TITLE: FrameId = FrameId::new(b"TIT2");
const ARTIST: FrameId = FrameId::new(b"TPE1");
const ALBUM: FrameId = FrameId::new(b"TALB");
const GENRE: FrameId = FrameId::new(b"TCON");
const RECORDING_TIME: FrameId = FrameId::new(b"TDRC");
const TRACK: FrameId = FrameId::new(b"TRCK");
const COMMENT: FrameId = FrameId::new(b"COMM");

#[derive(Clone, Debug, Default)]
pub struct Tag {
    header: TagHeader,
    extended: Option<ExtendedHeader>,
    frames: Vec<Frame>,
}

impl Tag {
    /// An empty v2.4 tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete tag (header, body and optional footer) from `data`
    /// using the process-wide frame factory.
    pub fn parse(data: &[u8]) -> TagResult<Self> {
        Self::parse_with(data, 0, &FrameFactory::global())
    }

    /// Parse a tag whose first byte lives at `offset` in the file.
    pub fn parse_with(data: &[u8], offset: u64, factory: &FrameFactory) -> TagResult<Self> {
        let header = TagHeader::parse(data, offset)?;
        let body_end = HEADER_SIZE + header.size as usize;
        let Some(body) = data.get(HEADER_SIZE..body_end) else {
            return Err(TagError::corrupt(
                offset + HEADER_SIZE as u64,
                format!(
                    "tag body declares {} bytes, only {} present",
                    header.size,
                    data.len().saturating_sub(HEADER_SIZE)
                ),
            ));
        };

        if header.flags.footer {
            let footer = data.get(body_end..body_end + HEADER_SIZE).ok_or_else(|| {
                TagError::corrupt(offset + body_end as u64, "footer flag set but footer missing")
            })?;
            TagHeader::parse_footer(footer, offset + body_end as u64)?;
        }

        // v2.2/2.3 unsynchronise the whole body; v2.4 does it per frame.
        let body: Cow<'_, [u8]> = if header.flags.unsynchronisation && header.major_version < 4 {
            Cow::Owned(unsync::decode(body))
        } else {
            Cow::Borrowed(body)
        };

        let mut w = Window::new(&body, offset + HEADER_SIZE as u64);
        let extended = if header.flags.extended_header {
            Some(ExtendedHeader::parse(&mut w, header.major_version)?)
        } else {
            None
        };

        let frames = factory.read_frames(&mut w, header.major_version)?;
        let frames = migrate::upgrade_frames(frames, header.major_version);

        debug!(
            "ID3v2.{} tag at {}: {} frames, {} bytes",
            header.major_version,
            offset,
            frames.len(),
            header.total_size()
        );

        Ok(Self {
            header,
            extended,
            frames,
        })
    }

    pub fn header(&self) -> &TagHeader {
        &self.header
    }

    pub fn extended_header(&self) -> Option<&ExtendedHeader> {
        self.extended.as_ref()
    }

    /// Major version the tag was read from (4 for new tags).
    pub fn version(&self) -> u8 {
        self.header.major_version
    }

    /// Render the full tag, padding included, per `config`.
    pub fn render(&self, config: &TagConfig) -> TagResult<Vec<u8>> {
        Ok(self.render_with_header(config)?.1)
    }

    pub(crate) fn render_with_header(&self, config: &TagConfig) -> TagResult<(TagHeader, Vec<u8>)> {
        config.validate()?;
        let version = config.id3v2_version;

        let frames: Cow<'_, [Frame]> = if version == 3 {
            Cow::Owned(migrate::downgrade_to_v3(&self.frames))
        } else {
            Cow::Borrowed(&self.frames)
        };
        let body = render_frame_list(&frames, version, config.drop_unsupported_frames)?;

        let footer = version == 4 && self.header.flags.footer;
        let padding = if footer {
            0
        } else {
            padding_for(body.len(), self.header.size as usize, config)
        };

        let size = u32::try_from(body.len() + padding)
            .map_err(|_| TagError::invalid_value("tag body exceeds 4 GiB"))?;
        let header = TagHeader {
            major_version: version,
            revision: 0,
            flags: TagFlags {
                experimental: self.header.flags.experimental,
                footer,
                ..TagFlags::default()
            },
            size,
        };

        let mut out = Vec::with_capacity(HEADER_SIZE * 2 + size as usize);
        out.extend_from_slice(&header.render()?);
        out.extend_from_slice(&body);
        out.resize(out.len() + padding, 0);
        if footer {
            out.extend_from_slice(&header.render_footer()?);
        }

        info!(
            version,
            frames = self.frames.len(),
            body = body.len(),
            padding,
            "Rendered ID3v2 tag"
        );
        Ok((header, out))
    }

    /// Adopt the header written by a successful save, so the next render
    /// pads against the new allocation.
    pub(crate) fn set_saved_header(&mut self, header: TagHeader) {
        self.header = header;
        self.extended = None;
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_by_id(&self, id: FrameId) -> impl Iterator<Item = &Frame> {
        self.frames.iter().filter(move |f| f.id() == id)
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.iter().find(|f| f.id() == id)
    }

    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.iter_mut().find(|f| f.id() == id)
    }

    pub fn add_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Remove every frame with `id`; returns how many were removed.
    pub fn remove_frames(&mut self, id: FrameId) -> usize {
        let before = self.frames.len();
        self.frames.retain(|f| f.id() != id);
        before - self.frames.len()
    }

    pub fn remove_frame(&mut self, index: usize) -> Option<Frame> {
        (index < self.frames.len()).then(|| self.frames.remove(index))
    }

    /// Replace the frame at `index`, returning the old one.
    pub fn replace_frame(&mut self, index: usize, frame: Frame) -> TagResult<Frame> {
        let len = self.frames.len();
        let slot = self.frames.get_mut(index).ok_or_else(|| {
            TagError::invalid_value(format!("frame index {index} out of range ({len} frames)"))
        })?;
        Ok(std::mem::replace(slot, frame))
    }

    /// Put `frame` in place of the first frame with the same id and drop
    /// any others with that id; append it when there is none.
    pub fn set_unique(&mut self, frame: Frame) {
        let id = frame.id();
        match self.frames.iter().position(|f| f.id() == id) {
            Some(first) => {
                self.frames[first] = frame;
                let mut index = 0;
                self.frames.retain(|f| {
                    let keep = index == first || f.id() != id;
                    index += 1;
                    keep
                });
            }
            None => self.frames.push(frame),
        }
    }

    /// Text of the first text frame with `id`, values joined with `" / "`.
    pub fn text(&self, id: FrameId) -> Option<String> {
        self.frames.iter().find_map(|f| match f {
            Frame::Text(t) if t.header.id == id => t.text().ok().and_then(non_empty),
            _ => None,
        })
    }

    /// Set a text frame; an empty value removes it.
    pub fn set_text(&mut self, id: FrameId, value: &str) {
        if value.is_empty() {
            self.remove_frames(id);
        } else {
            self.set_unique(Frame::Text(TextFrame::with_text(id, value)));
        }
    }

    pub fn pictures(&self) -> impl Iterator<Item = &PictureFrame> {
        self.frames.iter().filter_map(|f| match f {
            Frame::Picture(p) => Some(p),
            _ => None,
        })
    }

    /// Index of the comment shown as "the" comment: the first one without a
    /// description, else the first one.
    fn main_comment(&self) -> Option<usize> {
        let comments: Vec<(usize, &LocalizedTextFrame)> = self
            .frames
            .iter()
            .enumerate()
            .filter_map(|(i, f)| match f {
                Frame::Comments(c) => Some((i, c)),
                _ => None,
            })
            .collect();
        comments
            .iter()
            .find(|(_, c)| c.fields().is_ok_and(|f| f.description.is_empty()))
            .or(comments.first())
            .map(|(i, _)| *i)
    }

    fn set_optional(&mut self, id: FrameId, value: Option<&str>) {
        self.set_text(id, value.unwrap_or_default());
    }
}

/// Zero bytes to write after `body` given the previous body allocation.
fn padding_for(body: usize, previous: usize, config: &TagConfig) -> usize {
    if body <= previous && (previous - body) as u64 <= config.max_padding {
        previous - body
    } else {
        config.id3v2_padding as usize
    }
}

impl BasicTag for Tag {
    fn title(&self) -> Option<String> {
        self.text(TITLE)
    }

    fn set_title(&mut self, value: Option<&str>) {
        self.set_optional(TITLE, value);
    }

    fn artist(&self) -> Option<String> {
        self.text(ARTIST)
    }

    fn set_artist(&mut self, value: Option<&str>) {
        self.set_optional(ARTIST, value);
    }

    fn album(&self) -> Option<String> {
        self.text(ALBUM)
    }

    fn set_album(&mut self, value: Option<&str>) {
        self.set_optional(ALBUM, value);
    }

    fn comment(&self) -> Option<String> {
        let index = self.main_comment()?;
        match &self.frames[index] {
            Frame::Comments(c) => c.fields().ok().and_then(|f| non_empty(f.text.clone())),
            _ => None,
        }
    }

    fn set_comment(&mut self, value: Option<&str>) {
        match value.filter(|v| !v.is_empty()) {
            Some(text) => {
                let frame = Frame::Comments(LocalizedTextFrame::comment("", text));
                match self.main_comment() {
                    Some(index) => self.frames[index] = frame,
                    None => self.frames.push(frame),
                }
            }
            None => {
                self.remove_frames(COMMENT);
            }
        }
    }

    fn genre(&self) -> Option<String> {
        self.text(GENRE)
    }

    fn set_genre(&mut self, value: Option<&str>) {
        self.set_optional(GENRE, value);
    }

    fn year(&self) -> Option<u32> {
        self.text(RECORDING_TIME).as_deref().and_then(leading_number)
    }

    fn set_year(&mut self, value: Option<u32>) {
        self.set_optional(RECORDING_TIME, value.map(|y| y.to_string()).as_deref());
    }

    fn track(&self) -> Option<u32> {
        self.text(TRACK).as_deref().and_then(leading_number)
    }

    fn set_track(&mut self, value: Option<u32>) {
        self.set_optional(TRACK, value.map(|t| t.to_string()).as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::UnknownFrame;

    /// "ID3" v2.4, size 17, one TIT2 "Hello" frame and one byte of padding.
    fn hello_tag() -> Vec<u8> {
        let mut v = b"ID3\x04\x00\x00\x00\x00\x00\x11".to_vec();
        v.extend_from_slice(b"TIT2\x00\x00\x00\x06\x00\x00");
        v.extend_from_slice(b"\x00Hello");
        v.push(0);
        v
    }

    #[test]
    fn minimal_tag_roundtrip() {
        let data = hello_tag();
        let tag = Tag::parse_with(&data, 0, &FrameFactory::new()).unwrap();
        assert_eq!(tag.title().as_deref(), Some("Hello"));
        assert_eq!(tag.render(&TagConfig::default()).unwrap(), data);
    }

    #[test]
    fn truncated_body_is_corrupt() {
        let data = hello_tag();
        let err = Tag::parse_with(&data[..20], 0, &FrameFactory::new()).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn growth_adds_configured_padding() {
        let mut tag = Tag::parse_with(&hello_tag(), 0, &FrameFactory::new()).unwrap();
        tag.set_album(Some("An album name"));
        let config = TagConfig {
            id3v2_padding: 100,
            ..TagConfig::default()
        };
        let out = tag.render(&config).unwrap();
        let header = TagHeader::parse(&out, 0).unwrap();
        // TIT2 (16) + TALB (10 + 14) + 100 padding
        assert_eq!(header.size, 16 + 24 + 100);
        assert_eq!(out.len(), 10 + 140);
    }

    #[test]
    fn shrink_keeps_allocation() {
        let mut tag = Tag::new();
        tag.set_title(Some("A fairly long title"));
        tag.set_saved_header(TagHeader {
            size: 200,
            ..TagHeader::default()
        });
        tag.set_title(Some("Short"));
        let out = tag.render(&TagConfig::default()).unwrap();
        assert_eq!(out.len(), 210);
    }

    #[test]
    fn excess_padding_is_trimmed() {
        let mut tag = Tag::new();
        tag.set_title(Some("x"));
        tag.set_saved_header(TagHeader {
            size: 10_000,
            ..TagHeader::default()
        });
        let config = TagConfig {
            max_padding: 1000,
            id3v2_padding: 64,
            ..TagConfig::default()
        };
        let out = tag.render(&config).unwrap();
        // TIT2 header + encoding + "x" = 12 bytes, then 64 padding
        assert_eq!(out.len(), 10 + 12 + 64);
    }

    #[test]
    fn footer_tag() {
        let mut data = b"ID3\x04\x00\x10\x00\x00\x00\x10".to_vec();
        data.extend_from_slice(b"TIT2\x00\x00\x00\x06\x00\x00\x00Hello");
        data.extend_from_slice(b"3DI\x04\x00\x10\x00\x00\x00\x10");
        let tag = Tag::parse_with(&data, 0, &FrameFactory::new()).unwrap();
        assert_eq!(tag.header().total_size(), 36);
        assert_eq!(tag.render(&TagConfig::default()).unwrap(), data);

        let err = Tag::parse_with(&data[..30], 0, &FrameFactory::new()).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn v3_tag_level_unsync() {
        // TIT2 payload "\0\xFF\xE0" is stored as "\0\xFF\0\xE0".
        let mut body = b"TIT2\x00\x00\x00\x03\x00\x00".to_vec();
        body.extend_from_slice(&[0x00, 0xFF, 0x00, 0xE0]);
        let mut data = b"ID3\x03\x00\x80\x00\x00\x00".to_vec();
        data.push(body.len() as u8);
        data.extend_from_slice(&body);
        let tag = Tag::parse_with(&data, 0, &FrameFactory::new()).unwrap();
        assert_eq!(tag.title().as_deref(), Some("\u{FF}\u{E0}"));
    }

    #[test]
    fn v3_dates_become_tdrc_and_back() {
        let mut body = Vec::new();
        for (id, text) in [(b"TYER", "2004"), (b"TDAT", "1503")] {
            body.extend_from_slice(id);
            body.extend_from_slice(&(1 + text.len() as u32).to_be_bytes());
            body.extend_from_slice(&[0, 0, 0]);
            body.extend_from_slice(text.as_bytes());
        }
        let mut data = b"ID3\x03\x00\x00\x00\x00\x00".to_vec();
        data.push(body.len() as u8);
        data.extend_from_slice(&body);

        let tag = Tag::parse_with(&data, 0, &FrameFactory::new()).unwrap();
        assert_eq!(tag.text(RECORDING_TIME).as_deref(), Some("2004-03-15"));
        assert_eq!(tag.year(), Some(2004));

        let config = TagConfig {
            id3v2_version: 3,
            ..TagConfig::default()
        };
        let out = tag.render(&config).unwrap();
        assert_eq!(&out[..body.len() + 10], &data[..]);
    }

    #[test]
    fn set_unique_replaces_first_and_removes_rest() {
        let mut tag = Tag::new();
        tag.add_frame(Frame::Text(TextFrame::with_text(ARTIST, "one")));
        tag.add_frame(Frame::Text(TextFrame::with_text(ALBUM, "album")));
        tag.add_frame(Frame::Text(TextFrame::with_text(ARTIST, "two")));
        tag.set_unique(Frame::Text(TextFrame::with_text(ARTIST, "three")));
        let ids: Vec<_> = tag.frames().iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec![ARTIST, ALBUM]);
        assert_eq!(tag.artist().as_deref(), Some("three"));
    }

    #[test]
    fn container_operations() {
        let mut tag = Tag::new();
        tag.set_title(Some("t"));
        tag.set_track(Some(3));
        assert_eq!(tag.track(), Some(3));
        assert_eq!(tag.frames_by_id(TITLE).count(), 1);
        let old = tag
            .replace_frame(0, Frame::Text(TextFrame::with_text(TITLE, "u")))
            .unwrap();
        assert_eq!(old.id(), TITLE);
        assert!(tag.replace_frame(9, Frame::Text(TextFrame::with_text(TITLE, "v"))).is_err());
        assert!(tag.remove_frame(1).is_some());
        assert!(tag.remove_frame(5).is_none());
        tag.set_title(None);
        assert!(tag.is_empty());
    }

    #[test]
    fn comments_prefer_empty_description() {
        let mut tag = Tag::new();
        tag.add_frame(Frame::Comments(LocalizedTextFrame::comment("iTunNORM", "junk")));
        tag.add_frame(Frame::Comments(LocalizedTextFrame::comment("", "real")));
        assert_eq!(tag.comment().as_deref(), Some("real"));
        tag.set_comment(Some("changed"));
        assert_eq!(tag.frames_by_id(COMMENT).count(), 2);
        assert_eq!(tag.comment().as_deref(), Some("changed"));
        tag.set_comment(None);
        assert_eq!(tag.comment(), None);
    }

    #[test]
    fn unknown_frames_pass_through() {
        let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x0D".to_vec();
        data.extend_from_slice(b"XHEX\x00\x00\x00\x03\x00\x00\x01\x02\x03");
        let tag = Tag::parse_with(&data, 0, &FrameFactory::new()).unwrap();
        assert!(matches!(
            &tag.frames()[0],
            Frame::Unknown(UnknownFrame { data, .. }) if data == &[1, 2, 3]
        ));
        assert_eq!(tag.render(&TagConfig::default()).unwrap(), data);
    }

    #[test]
    fn v4_only_frames_dropped_for_v3() {
        let mut tag = Tag::new();
        tag.set_text(FrameId::new(b"TSOP"), "Sort");
        tag.set_title(Some("x"));
        let config = TagConfig {
            id3v2_version: 3,
            id3v2_padding: 0,
            ..TagConfig::default()
        };
        let out = tag.render(&config).unwrap();
        assert_eq!(&out[10..14], b"TIT2");
        assert_eq!(out.len(), 10 + 12);
    }
}
