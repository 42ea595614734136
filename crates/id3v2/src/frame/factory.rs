//! Frame construction: the registration hook, the built-in dispatch table
//! and the frame stream walker.
//!
//! Host applications can teach the parser about private frame types by
//! registering a [`FrameCreator`]. Registered creators are consulted in
//! registration order before the built-in table; a creator that returns
//! `None` passes the frame on.
//!
//! Register creators before parsing. [`FrameFactory::global`] takes a
//! snapshot of the registry, so a parse in progress never observes a
//! registration made halfway through.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};

use mt_common::{TagError, TagResult, Window};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::chapter::{ChapterFrame, TableOfContentsFrame};
use super::comments::LocalizedTextFrame;
use super::counter::{PlayCountFrame, PopularimeterFrame};
use super::event_timing::EventTimingFrame;
use super::header::FrameHeader;
use super::object::ObjectFrame;
use super::owner::OwnerDataFrame;
use super::picture::PictureFrame;
use super::sync_lyrics::SyncLyricsFrame;
use super::text::{TextFrame, UserTextFrame};
use super::unknown::UnknownFrame;
use super::url::{UrlFrame, UserUrlFrame};
use super::volume::RelativeVolumeFrame;
use super::Frame;
use crate::{migrate, synchsafe, unsync};

/// A user-supplied frame constructor.
///
/// `data` is the prepared payload (group byte and data length indicator
/// removed, unsynchronisation undone); `offset` is its position in the file.
pub trait FrameCreator: Send + Sync {
    fn create(&self, header: &FrameHeader, data: &[u8], offset: u64) -> Option<TagResult<Frame>>;
}

impl<F> FrameCreator for F
where
    F: Fn(&FrameHeader, &[u8], u64) -> Option<TagResult<Frame>> + Send + Sync,
{
    fn create(&self, header: &FrameHeader, data: &[u8], offset: u64) -> Option<TagResult<Frame>> {
        self(header, data, offset)
    }
}

static CREATORS: LazyLock<RwLock<Vec<Arc<dyn FrameCreator>>>> =
    LazyLock::new(|| RwLock::new(Vec::new()));

/// Add a creator to the process-wide registry.
pub fn register_frame_creator<C: FrameCreator + 'static>(creator: C) {
    let mut creators = CREATORS.write();
    creators.push(Arc::new(creator));
    debug!(count = creators.len(), "Registered frame creator");
}

/// Remove every registered creator.
pub fn clear_frame_creators() {
    CREATORS.write().clear();
}

/// Maps frame headers and payloads to [`Frame`] values.
#[derive(Clone, Default)]
pub struct FrameFactory {
    creators: Vec<Arc<dyn FrameCreator>>,
}

impl fmt::Debug for FrameFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameFactory")
            .field("creators", &self.creators.len())
            .finish()
    }
}

impl FrameFactory {
    /// Factory with only the built-in frame table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with every creator registered so far.
    pub fn global() -> Self {
        Self {
            creators: CREATORS.read().clone(),
        }
    }

    pub fn add_creator<C: FrameCreator + 'static>(&mut self, creator: C) {
        self.creators.push(Arc::new(creator));
    }

    pub fn with_creator<C: FrameCreator + 'static>(mut self, creator: C) -> Self {
        self.add_creator(creator);
        self
    }

    pub fn creator_count(&self) -> usize {
        self.creators.len()
    }

    /// Build a frame from its header and on-disk payload.
    pub fn create(&self, header: FrameHeader, data: &[u8], offset: u64) -> TagResult<Frame> {
        if header.size == 0 {
            warn!("Zero-size frame {} at {}, dropping on save", header.id, offset);
            let mut frame = UnknownFrame::new(header, Vec::new());
            frame.drop = true;
            return Ok(Frame::Unknown(frame));
        }

        if header.flags.compression || header.flags.encryption {
            debug!(
                "Frame {} at {} is compressed or encrypted, keeping it opaque",
                header.id, offset
            );
            return Ok(Frame::Unknown(UnknownFrame::opaque(header, data.to_vec())));
        }

        let (header, payload, offset) = prepare_payload(header, data, offset)?;

        for creator in &self.creators {
            if let Some(result) = creator.create(&header, &payload, offset) {
                debug!("Frame {} built by registered creator", header.id);
                return result;
            }
        }

        self.create_builtin(header, payload, offset)
    }

    fn create_builtin(
        &self,
        header: FrameHeader,
        payload: Cow<'_, [u8]>,
        offset: u64,
    ) -> TagResult<Frame> {
        let id = header.id;
        let frame = match &id.0 {
            _ if id.is_legacy() || migrate::is_v3_only(id) => {
                Frame::Unknown(UnknownFrame::new(header, payload.into_owned()))
            }
            b"TXXX" => Frame::UserText(UserTextFrame::from_raw(
                header,
                payload.into_owned(),
                offset,
            )),
            // v2.3 involved people list shares the text frame layout.
            b"IPLS" => Frame::Text(TextFrame::from_raw(header, payload.into_owned(), offset)),
            _ if id.is_text() => {
                Frame::Text(TextFrame::from_raw(header, payload.into_owned(), offset))
            }
            b"WXXX" => Frame::UserUrl(UserUrlFrame::parse(header, &payload)),
            _ if id.is_url() => Frame::Url(UrlFrame::parse(header, &payload)),
            b"COMM" => Frame::Comments(LocalizedTextFrame::from_raw(
                header,
                payload.into_owned(),
                offset,
            )),
            b"USLT" => Frame::UnsyncLyrics(LocalizedTextFrame::from_raw(
                header,
                payload.into_owned(),
                offset,
            )),
            b"SYLT" => Frame::SyncLyrics(SyncLyricsFrame::parse(header, &payload, offset)?),
            b"APIC" => Frame::Picture(PictureFrame::from_raw(header, payload.into_owned(), offset)),
            b"GEOB" => Frame::Object(ObjectFrame::parse(header, &payload, offset)?),
            b"PCNT" => Frame::PlayCount(PlayCountFrame::parse(header, &payload, offset)?),
            b"POPM" => Frame::Popularimeter(PopularimeterFrame::parse(header, &payload, offset)?),
            b"PRIV" => Frame::Private(OwnerDataFrame::parse(header, &payload)),
            b"UFID" => Frame::UniqueFileId(OwnerDataFrame::parse(header, &payload)),
            b"ETCO" => Frame::EventTiming(EventTimingFrame::parse(header, &payload, offset)?),
            b"RVA2" => Frame::RelativeVolume(RelativeVolumeFrame::parse(header, &payload, offset)?),
            b"CHAP" => Frame::Chapter(ChapterFrame::parse(header, &payload, offset, self)?),
            b"CTOC" => {
                Frame::TableOfContents(TableOfContentsFrame::parse(header, &payload, offset, self)?)
            }
            _ => Frame::Unknown(UnknownFrame::new(header, payload.into_owned())),
        };
        Ok(frame)
    }

    /// Read frames until the window is exhausted, padding starts, or the
    /// next header does not carry a valid frame id.
    pub fn read_frames(&self, w: &mut Window<'_>, version: u8) -> TagResult<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(mut header) = FrameHeader::parse(w, version)? {
            let size = header.size as usize;
            if size > w.remaining() {
                return Err(TagError::corrupt(
                    w.position(),
                    format!(
                        "frame {} declares {} bytes, only {} remain",
                        header.id,
                        size,
                        w.remaining()
                    ),
                ));
            }
            let offset = w.position();
            let data = w.read_bytes(size)?;

            if version == 2 {
                if let Some(id) = migrate::translate_v22(header.id) {
                    header.id = id;
                }
            }

            let frame = self.create(header, data, offset)?;
            debug!("Parsed frame {} ({} bytes) at {}", frame.id(), size, offset);
            frames.push(frame);
        }
        if !w.is_empty() {
            debug!("{} bytes of padding after frames at {}", w.remaining(), w.position());
        }
        Ok(frames)
    }
}

/// Strip the grouping byte and data length indicator and undo per-frame
/// unsynchronisation. Returns the payload and its (approximate, after
/// unsynchronisation) file offset.
fn prepare_payload(
    mut header: FrameHeader,
    data: &[u8],
    offset: u64,
) -> TagResult<(FrameHeader, Cow<'_, [u8]>, u64)> {
    let mut w = Window::new(data, offset);
    if header.flags.grouping {
        header.group_id = Some(w.read_u8()?);
    }
    if header.flags.data_length_indicator {
        let dli_offset = w.position();
        synchsafe::decode(w.read_bytes(4)?, dli_offset)?;
    }
    let offset = w.position();
    let rest = w.rest();
    let payload = if header.flags.unsynchronisation {
        Cow::Owned(unsync::decode(rest))
    } else {
        Cow::Borrowed(rest)
    };
    Ok((header, payload, offset))
}
