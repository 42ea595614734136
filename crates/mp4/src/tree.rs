//! Box tree: the [`Mp4Box`] variants, the handler-aware factory and the
//! bounded child walker.
//!
//! Parsing is driven by [`BoxFactory::read_children`], which reads boxes
//! until the enclosing window is exhausted. A child claiming more bytes than
//! its parent has left is corrupt; fewer than 8 trailing bytes are kept
//! verbatim (QuickTime writes a 4-byte zero terminator in some containers).
//! Rendering is bottom-up: every box renders its content first, then its
//! header with the now-known size.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use mt_common::{TagError, TagResult, Window};
use tracing::{debug, trace};

use crate::boxes::{
    fourcc_to_string, read_version_flags, write_box, write_version_flags, BoxHeader, CO64, DATA,
    DINF, EDTS, FREE, FTYP, HDLR, ILST, MDIA, MDIR, MEAN, META, MINF, MOOF, MOOV, MVEX, MVHD,
    NAME, SKIP, SOUN, STBL, STCO, STSD, TFHD, TRAF, TRAK, UDTA, VIDE,
};
use crate::leaf::{
    ChunkOffsetBox, DataBox, FileTypeBox, FreeBox, HandlerBox, MovieHeaderBox, NameBox,
    TrackFragmentHeaderBox, UnknownBox,
};
use crate::sample_entry::{AudioSampleEntry, SampleDescriptionBox, VisualSampleEntry};

// ─── Parse context ──────────────────────────────────────────────────

/// Media type announced by the nearest preceding `hdlr` box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Handler {
    #[default]
    Unknown,
    Audio,
    Video,
    Metadata,
    Other(u32),
}

impl Handler {
    pub fn from_fourcc(cc: u32) -> Self {
        match cc {
            SOUN => Handler::Audio,
            VIDE => Handler::Video,
            MDIR => Handler::Metadata,
            other => Handler::Other(other),
        }
    }
}

/// Where a box sits in the tree. Passed by value down the walk; the handler
/// set by an `hdlr` box applies to its later siblings and their descendants.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxContext {
    pub parent: Option<u32>,
    pub handler: Handler,
    /// Position among the parent's children.
    pub index: usize,
    /// Sample entries declared by the enclosing `stsd`.
    pub sample_entries: u32,
    /// Children of an `ilst` item.
    pub in_item: bool,
}

impl BoxContext {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child_of(&self, parent: u32) -> Self {
        Self {
            parent: Some(parent),
            handler: self.handler,
            index: 0,
            sample_entries: 0,
            in_item: false,
        }
    }

    pub fn is_sample_entry(&self) -> bool {
        self.parent == Some(STSD) && (self.index as u64) < self.sample_entries as u64
    }
}

// ─── Extension points ───────────────────────────────────────────────

/// A box type supplied by the host through a [`BoxCreator`].
pub trait CustomBox: fmt::Debug + Send + Sync {
    fn header(&self) -> &BoxHeader;
    fn header_mut(&mut self) -> &mut BoxHeader;
    /// Content bytes without the box header.
    fn render_content(&self) -> TagResult<Vec<u8>>;
    fn clone_box(&self) -> Box<dyn CustomBox>;
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn CustomBox> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Consulted before the built-in table. Returning `None` passes the box on.
pub trait BoxCreator: Send + Sync {
    fn create(
        &self,
        header: &BoxHeader,
        content: &[u8],
        ctx: &BoxContext,
    ) -> Option<TagResult<Mp4Box>>;
}

impl<F> BoxCreator for F
where
    F: Fn(&BoxHeader, &[u8], &BoxContext) -> Option<TagResult<Mp4Box>> + Send + Sync,
{
    fn create(
        &self,
        header: &BoxHeader,
        content: &[u8],
        ctx: &BoxContext,
    ) -> Option<TagResult<Mp4Box>> {
        self(header, content, ctx)
    }
}

// ─── Box variants ───────────────────────────────────────────────────

/// Hierarchy-only box: its content is nothing but child boxes.
#[derive(Clone, Debug)]
pub struct ContainerBox {
    pub header: BoxHeader,
    pub children: Vec<Mp4Box>,
    pub trailing: Vec<u8>,
}

impl ContainerBox {
    pub fn new(box_type: u32) -> Self {
        Self {
            header: BoxHeader::new(box_type),
            children: Vec::new(),
            trailing: Vec::new(),
        }
    }
}

/// `meta`: a full box in ISO files, a plain container in QuickTime files.
#[derive(Clone, Debug)]
pub struct MetaBox {
    pub header: BoxHeader,
    pub version_flags: Option<(u8, u32)>,
    pub children: Vec<Mp4Box>,
    pub trailing: Vec<u8>,
}

impl MetaBox {
    /// An ISO `meta` box with the `mdir` handler iTunes expects.
    pub fn new_itunes() -> Self {
        Self {
            header: BoxHeader::new(META),
            version_flags: Some((0, 0)),
            children: vec![Mp4Box::Handler(HandlerBox::new(MDIR))],
            trailing: Vec::new(),
        }
    }
}

/// A child of `ilst`: one metadata item holding `data` (and, for
/// freeform items, `mean`/`name`) boxes.
#[derive(Clone, Debug)]
pub struct ItemBox {
    pub header: BoxHeader,
    pub children: Vec<Mp4Box>,
    pub trailing: Vec<u8>,
}

impl ItemBox {
    pub fn new(name: u32, values: Vec<DataBox>) -> Self {
        Self {
            header: BoxHeader::new(name),
            children: values.into_iter().map(Mp4Box::Data).collect(),
            trailing: Vec::new(),
        }
    }

    pub fn name(&self) -> u32 {
        self.header.box_type
    }

    pub fn values(&self) -> impl Iterator<Item = &DataBox> {
        self.children.iter().filter_map(|c| match c {
            Mp4Box::Data(d) => Some(d),
            _ => None,
        })
    }

    /// `mean` and `name` of a freeform item.
    pub fn freeform_key(&self) -> Option<(String, String)> {
        let mut mean = None;
        let mut name = None;
        for child in &self.children {
            if let Mp4Box::Name(n) = child {
                match n.header.box_type {
                    MEAN => mean = Some(n.text()),
                    NAME => name = Some(n.text()),
                    _ => {}
                }
            }
        }
        Some((mean?, name?))
    }
}

#[derive(Clone, Debug)]
pub enum Mp4Box {
    Container(ContainerBox),
    Meta(MetaBox),
    Item(ItemBox),
    Data(DataBox),
    Name(NameBox),
    FileType(FileTypeBox),
    MovieHeader(MovieHeaderBox),
    Handler(HandlerBox),
    SampleDescription(SampleDescriptionBox),
    AudioSampleEntry(AudioSampleEntry),
    VisualSampleEntry(VisualSampleEntry),
    ChunkOffset(ChunkOffsetBox),
    TrackFragmentHeader(TrackFragmentHeaderBox),
    Free(FreeBox),
    Unknown(UnknownBox),
    Custom(Box<dyn CustomBox>),
}

impl Mp4Box {
    /// Parse a single box from `data`, whose first byte lives at `offset`.
    pub fn parse(data: &[u8], offset: u64) -> TagResult<Self> {
        BoxFactory::new().parse_box(&mut Window::new(data, offset), &BoxContext::root())
    }

    pub fn header(&self) -> &BoxHeader {
        match self {
            Mp4Box::Container(b) => &b.header,
            Mp4Box::Meta(b) => &b.header,
            Mp4Box::Item(b) => &b.header,
            Mp4Box::Data(b) => &b.header,
            Mp4Box::Name(b) => &b.header,
            Mp4Box::FileType(b) => &b.header,
            Mp4Box::MovieHeader(b) => &b.header,
            Mp4Box::Handler(b) => &b.header,
            Mp4Box::SampleDescription(b) => &b.header,
            Mp4Box::AudioSampleEntry(b) => &b.header,
            Mp4Box::VisualSampleEntry(b) => &b.header,
            Mp4Box::ChunkOffset(b) => &b.header,
            Mp4Box::TrackFragmentHeader(b) => &b.header,
            Mp4Box::Free(b) => &b.header,
            Mp4Box::Unknown(b) => &b.header,
            Mp4Box::Custom(b) => b.header(),
        }
    }

    pub fn header_mut(&mut self) -> &mut BoxHeader {
        match self {
            Mp4Box::Container(b) => &mut b.header,
            Mp4Box::Meta(b) => &mut b.header,
            Mp4Box::Item(b) => &mut b.header,
            Mp4Box::Data(b) => &mut b.header,
            Mp4Box::Name(b) => &mut b.header,
            Mp4Box::FileType(b) => &mut b.header,
            Mp4Box::MovieHeader(b) => &mut b.header,
            Mp4Box::Handler(b) => &mut b.header,
            Mp4Box::SampleDescription(b) => &mut b.header,
            Mp4Box::AudioSampleEntry(b) => &mut b.header,
            Mp4Box::VisualSampleEntry(b) => &mut b.header,
            Mp4Box::ChunkOffset(b) => &mut b.header,
            Mp4Box::TrackFragmentHeader(b) => &mut b.header,
            Mp4Box::Free(b) => &mut b.header,
            Mp4Box::Unknown(b) => &mut b.header,
            Mp4Box::Custom(b) => b.header_mut(),
        }
    }

    pub fn box_type(&self) -> u32 {
        self.header().box_type
    }

    /// Child boxes; empty for leaves.
    pub fn children(&self) -> &[Mp4Box] {
        match self {
            Mp4Box::Container(b) => &b.children,
            Mp4Box::Meta(b) => &b.children,
            Mp4Box::Item(b) => &b.children,
            Mp4Box::SampleDescription(b) => &b.entries,
            Mp4Box::AudioSampleEntry(b) => &b.children,
            Mp4Box::VisualSampleEntry(b) => &b.children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Mp4Box>> {
        match self {
            Mp4Box::Container(b) => Some(&mut b.children),
            Mp4Box::Meta(b) => Some(&mut b.children),
            Mp4Box::Item(b) => Some(&mut b.children),
            Mp4Box::SampleDescription(b) => Some(&mut b.entries),
            Mp4Box::AudioSampleEntry(b) => Some(&mut b.children),
            Mp4Box::VisualSampleEntry(b) => Some(&mut b.children),
            _ => None,
        }
    }

    pub fn child(&self, box_type: u32) -> Option<&Mp4Box> {
        self.children().iter().find(|c| c.box_type() == box_type)
    }

    pub fn child_mut(&mut self, box_type: u32) -> Option<&mut Mp4Box> {
        self.children_mut()?
            .iter_mut()
            .find(|c| c.box_type() == box_type)
    }

    /// Follow a path of box types below this box, taking the first match at
    /// each level.
    pub fn find_path(&self, path: &[u32]) -> Option<&Mp4Box> {
        path.iter().try_fold(self, |b, &t| b.child(t))
    }

    pub fn find_path_mut(&mut self, path: &[u32]) -> Option<&mut Mp4Box> {
        let mut current = self;
        for &t in path {
            current = current.child_mut(t)?;
        }
        Some(current)
    }

    /// Visit this box and every descendant, depth first.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Mp4Box)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Mp4Box)) {
        f(self);
        if let Some(children) = self.children_mut() {
            for child in children {
                child.visit_mut(f);
            }
        }
    }

    /// Content bytes without the header.
    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        match self {
            Mp4Box::Container(b) => render_children(&[], &b.children, &b.trailing),
            Mp4Box::Item(b) => render_children(&[], &b.children, &b.trailing),
            Mp4Box::Meta(b) => {
                let mut prefix = Vec::new();
                if let Some((version, flags)) = b.version_flags {
                    write_version_flags(&mut prefix, version, flags)?;
                }
                render_children(&prefix, &b.children, &b.trailing)
            }
            Mp4Box::Data(b) => b.render_content(),
            Mp4Box::Name(b) => b.render_content(),
            Mp4Box::FileType(b) => b.render_content(),
            Mp4Box::MovieHeader(b) => b.render_content(),
            Mp4Box::Handler(b) => b.render_content(),
            Mp4Box::SampleDescription(b) => b.render_content(),
            Mp4Box::AudioSampleEntry(b) => b.render_content(),
            Mp4Box::VisualSampleEntry(b) => b.render_content(),
            Mp4Box::ChunkOffset(b) => b.render_content(),
            Mp4Box::TrackFragmentHeader(b) => b.render_content(),
            Mp4Box::Free(b) => Ok(b.data.clone()),
            Mp4Box::Unknown(b) => Ok(b.data.clone()),
            Mp4Box::Custom(b) => b.render_content(),
        }
    }

    /// Full box bytes with a header sized for the rendered content.
    pub fn render(&self) -> TagResult<Vec<u8>> {
        let content = self.render_content()?;
        let header = self.header();
        trace!(
            "Rendered '{}' ({} content bytes)",
            fourcc_to_string(header.box_type),
            content.len()
        );
        write_box(header.box_type, header.user_type, &content)
    }
}

pub(crate) fn render_children(
    prefix: &[u8],
    children: &[Mp4Box],
    trailing: &[u8],
) -> TagResult<Vec<u8>> {
    let mut out = prefix.to_vec();
    for child in children {
        out.extend_from_slice(&child.render()?);
    }
    out.extend_from_slice(trailing);
    Ok(out)
}

// ─── Factory and walker ─────────────────────────────────────────────

/// Maps a box header plus its context to a concrete [`Mp4Box`].
#[derive(Clone, Default)]
pub struct BoxFactory {
    creators: Vec<Arc<dyn BoxCreator>>,
}

impl fmt::Debug for BoxFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxFactory")
            .field("creators", &self.creators.len())
            .finish()
    }
}

impl BoxFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_creator<C: BoxCreator + 'static>(&mut self, creator: C) {
        self.creators.push(Arc::new(creator));
    }

    pub fn with_creator<C: BoxCreator + 'static>(mut self, creator: C) -> Self {
        self.add_creator(creator);
        self
    }

    pub fn creator_count(&self) -> usize {
        self.creators.len()
    }

    /// Parse one box at the window's position. The box must fit in what is
    /// left of the window.
    pub fn parse_box(&self, w: &mut Window<'_>, ctx: &BoxContext) -> TagResult<Mp4Box> {
        let available = w.remaining() as u64;
        let header = BoxHeader::parse_bounded(w, available)?;
        let content_len = header.content_size();
        if content_len > w.remaining() as u64 {
            return Err(TagError::corrupt(
                header.offset,
                format!(
                    "box '{}' declares {} bytes, only {} remain",
                    fourcc_to_string(header.box_type),
                    header.size,
                    w.remaining() + header.header_size as usize
                ),
            ));
        }
        let mut content = w.sub_window(content_len as usize)?;
        self.create(header, &mut content, ctx)
    }

    /// Read boxes until fewer than 8 bytes remain. Returns the children and
    /// any trailing bytes.
    pub fn read_children(
        &self,
        w: &mut Window<'_>,
        ctx: BoxContext,
    ) -> TagResult<(Vec<Mp4Box>, Vec<u8>)> {
        let mut ctx = ctx;
        let mut children = Vec::new();
        while w.remaining() >= 8 {
            let child = self.parse_box(w, &ctx)?;
            if let Mp4Box::Handler(h) = &child {
                ctx.handler = Handler::from_fourcc(h.handler_type);
            }
            children.push(child);
            ctx.index += 1;
        }
        let trailing = w.rest().to_vec();
        if !trailing.is_empty() {
            debug!(
                "{} trailing bytes in '{}'",
                trailing.len(),
                ctx.parent.map(fourcc_to_string).unwrap_or_default()
            );
        }
        Ok((children, trailing))
    }

    /// Build the box for `header` from its content window.
    pub fn create(
        &self,
        header: BoxHeader,
        content: &mut Window<'_>,
        ctx: &BoxContext,
    ) -> TagResult<Mp4Box> {
        if !self.creators.is_empty() {
            let raw = content.clone().rest();
            for creator in &self.creators {
                if let Some(result) = creator.create(&header, raw, ctx) {
                    return result;
                }
            }
        }

        if ctx.is_sample_entry() {
            return match ctx.handler {
                Handler::Audio => Ok(Mp4Box::AudioSampleEntry(AudioSampleEntry::parse(
                    self, header, content, ctx,
                )?)),
                Handler::Video => Ok(Mp4Box::VisualSampleEntry(VisualSampleEntry::parse(
                    self, header, content, ctx,
                )?)),
                _ => Ok(unknown(header, content)),
            };
        }

        if ctx.in_item {
            return Ok(match header.box_type {
                DATA => Mp4Box::Data(DataBox::parse(header, content)?),
                MEAN | NAME => Mp4Box::Name(NameBox::parse(header, content)?),
                _ => unknown(header, content),
            });
        }

        if ctx.parent == Some(ILST) {
            let item_ctx = BoxContext {
                in_item: true,
                ..ctx.child_of(header.box_type)
            };
            let (children, trailing) = self.read_children(content, item_ctx)?;
            return Ok(Mp4Box::Item(ItemBox {
                header,
                children,
                trailing,
            }));
        }

        let created = match header.box_type {
            MOOV | TRAK | MDIA | MINF | STBL | UDTA | EDTS | DINF | MVEX | MOOF | TRAF | ILST => {
                let (children, trailing) =
                    self.read_children(content, ctx.child_of(header.box_type))?;
                Mp4Box::Container(ContainerBox {
                    header,
                    children,
                    trailing,
                })
            }
            META => {
                // QuickTime `meta` has no version/flags: its content starts
                // with the `hdlr` box header.
                let quicktime = content
                    .peek(8)
                    .is_some_and(|b| b[4..8] == HDLR.to_be_bytes());
                let version_flags = if quicktime {
                    None
                } else {
                    Some(read_version_flags(content)?)
                };
                let (children, trailing) = self.read_children(content, ctx.child_of(META))?;
                Mp4Box::Meta(MetaBox {
                    header,
                    version_flags,
                    children,
                    trailing,
                })
            }
            FTYP => Mp4Box::FileType(FileTypeBox::parse(header, content)?),
            MVHD => Mp4Box::MovieHeader(MovieHeaderBox::parse(header, content)?),
            HDLR => Mp4Box::Handler(HandlerBox::parse(header, content)?),
            STSD => Mp4Box::SampleDescription(SampleDescriptionBox::parse(
                self, header, content, ctx,
            )?),
            STCO | CO64 => Mp4Box::ChunkOffset(ChunkOffsetBox::parse(header, content)?),
            TFHD => Mp4Box::TrackFragmentHeader(TrackFragmentHeaderBox::parse(header, content)?),
            FREE | SKIP => Mp4Box::Free(FreeBox {
                header,
                data: content.rest().to_vec(),
            }),
            _ => unknown(header, content),
        };
        trace!(
            "Created '{}' under '{}'",
            fourcc_to_string(created.box_type()),
            ctx.parent.map(fourcc_to_string).unwrap_or_default()
        );
        Ok(created)
    }
}

fn unknown(header: BoxHeader, content: &mut Window<'_>) -> Mp4Box {
    Mp4Box::Unknown(UnknownBox {
        header,
        data: content.rest().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{fourcc, ITEM_TITLE};

    fn make_box(box_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(&box_type.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn hdlr(handler: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 8];
        payload.extend_from_slice(&handler.to_be_bytes());
        payload.extend_from_slice(&[0u8; 13]);
        make_box(HDLR, &payload)
    }

    fn ilst_with_title(title: &str) -> Vec<u8> {
        let mut data = vec![0, 0, 0, 1, 0, 0, 0, 0];
        data.extend_from_slice(title.as_bytes());
        make_box(ILST, &make_box(ITEM_TITLE, &make_box(DATA, &data)))
    }

    #[test]
    fn test_unknown_box_passthrough() {
        let data = make_box(fourcc(b'x', b'y', b'z', b'w'), &[1, 2, 3, 4, 5]);
        let parsed = Mp4Box::parse(&data, 0).unwrap();
        assert!(matches!(parsed, Mp4Box::Unknown(_)));
        assert_eq!(parsed.render().unwrap(), data);
    }

    #[test]
    fn test_container_roundtrip_with_terminator() {
        let mut payload = ilst_with_title("Song");
        payload.extend_from_slice(&[0, 0, 0, 0]);
        let udta = make_box(UDTA, &payload);
        let parsed = Mp4Box::parse(&udta, 0).unwrap();
        match &parsed {
            Mp4Box::Container(c) => assert_eq!(c.trailing, vec![0, 0, 0, 0]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(parsed.render().unwrap(), udta);
    }

    #[test]
    fn test_child_larger_than_parent_is_corrupt() {
        // The inner box claims 64 bytes; its parent only has 16 left, and
        // a sibling follows the parent.
        let mut inner = 64u32.to_be_bytes().to_vec();
        inner.extend_from_slice(&FREE.to_be_bytes());
        inner.extend_from_slice(&[0u8; 8]);
        let mut data = make_box(UDTA, &inner);
        data.extend_from_slice(&make_box(FREE, &[0u8; 64]));

        let mut w = Window::new(&data, 0);
        let err = BoxFactory::new()
            .parse_box(&mut w, &BoxContext::root())
            .unwrap_err();
        match err {
            TagError::CorruptFormat { offset, .. } => assert_eq!(offset, 8),
            other => panic!("expected CorruptFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_meta_full_and_quicktime() {
        let mut iso = vec![0, 0, 0, 0];
        iso.extend_from_slice(&hdlr(MDIR));
        iso.extend_from_slice(&ilst_with_title("A"));
        let iso = make_box(META, &iso);
        let parsed = Mp4Box::parse(&iso, 0).unwrap();
        match &parsed {
            Mp4Box::Meta(m) => {
                assert_eq!(m.version_flags, Some((0, 0)));
                assert_eq!(m.children.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(parsed.render().unwrap(), iso);

        let mut qt = hdlr(MDIR);
        qt.extend_from_slice(&ilst_with_title("A"));
        let qt = make_box(META, &qt);
        let parsed = Mp4Box::parse(&qt, 0).unwrap();
        assert!(matches!(&parsed, Mp4Box::Meta(m) if m.version_flags.is_none()));
        assert_eq!(parsed.render().unwrap(), qt);
    }

    #[test]
    fn test_ilst_items_and_data() {
        let ilst = ilst_with_title("Title");
        let parsed = Mp4Box::parse(&ilst, 0).unwrap();
        let item = match parsed.child(ITEM_TITLE) {
            Some(Mp4Box::Item(item)) => item,
            other => panic!("unexpected {other:?}"),
        };
        let value = item.values().next().unwrap();
        assert_eq!(value.as_text().as_deref(), Some("Title"));
        // A data box outside an item is opaque.
        let stray = make_box(DATA, &[0, 0, 0, 1, 0, 0, 0, 0]);
        assert!(matches!(Mp4Box::parse(&stray, 0).unwrap(), Mp4Box::Unknown(_)));
    }

    #[test]
    fn test_find_path() {
        let udta = make_box(UDTA, &make_box(META, &{
            let mut m = vec![0, 0, 0, 0];
            m.extend_from_slice(&hdlr(MDIR));
            m.extend_from_slice(&ilst_with_title("X"));
            m
        }));
        let moov = make_box(MOOV, &udta);
        let parsed = Mp4Box::parse(&moov, 0).unwrap();
        let ilst = parsed.find_path(&[UDTA, META, ILST]).unwrap();
        assert_eq!(ilst.header().offset, 8 + 8 + 12 + 33);
        assert!(parsed.find_path(&[TRAK]).is_none());
    }

    #[test]
    fn test_registered_creator_runs_first() {
        #[derive(Clone, Debug)]
        struct Marker(BoxHeader);
        impl CustomBox for Marker {
            fn header(&self) -> &BoxHeader {
                &self.0
            }
            fn header_mut(&mut self) -> &mut BoxHeader {
                &mut self.0
            }
            fn render_content(&self) -> TagResult<Vec<u8>> {
                Ok(b"mark".to_vec())
            }
            fn clone_box(&self) -> Box<dyn CustomBox> {
                Box::new(self.clone())
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let factory = BoxFactory::new().with_creator(
            |header: &BoxHeader, _: &[u8], _: &BoxContext| -> Option<TagResult<Mp4Box>> {
                (header.box_type == FREE)
                    .then(|| Ok(Mp4Box::Custom(Box::new(Marker(header.clone())))))
            },
        );
        let data = make_box(FREE, &[0; 4]);
        let parsed = factory
            .parse_box(&mut Window::new(&data, 0), &BoxContext::root())
            .unwrap();
        assert!(matches!(parsed, Mp4Box::Custom(_)));
        assert_eq!(parsed.render().unwrap(), make_box(FREE, b"mark"));
    }
}
