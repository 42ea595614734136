//! ID3v2 frames.
//!
//! A tag body is a flat list of frames; `CHAP` and `CTOC` nest further
//! frame lists. [`Frame`] is the closed set of built-in variants plus
//! [`Frame::Custom`] for host-registered types and [`Frame::Unknown`] for
//! everything else, which is carried through a save unchanged.

pub mod chapter;
pub mod comments;
pub mod counter;
pub mod encoding;
pub mod event_timing;
pub mod factory;
pub mod header;
pub mod lazy;
pub mod object;
pub mod owner;
pub mod picture;
pub mod sync_lyrics;
pub mod text;
pub mod unknown;
pub mod url;
pub mod volume;

use std::any::Any;
use std::fmt;

use mt_common::TagResult;
use tracing::warn;

use crate::migrate;

pub use chapter::{ChapterFrame, TableOfContentsFrame};
pub use comments::{LocalizedTextFields, LocalizedTextFrame};
pub use counter::{PlayCountFrame, PopularimeterFrame};
pub use encoding::TextEncoding;
pub use event_timing::{EventTimingFrame, TimedEvent};
pub use factory::{clear_frame_creators, register_frame_creator, FrameCreator, FrameFactory};
pub use header::{FrameFlags, FrameHeader, FrameId};
pub use object::ObjectFrame;
pub use owner::OwnerDataFrame;
pub use picture::{PictureFields, PictureFrame};
pub use sync_lyrics::{SyncLyricsFrame, SyncedText, TimestampFormat};
pub use text::{TextFields, TextFrame, UserTextFields, UserTextFrame};
pub use unknown::UnknownFrame;
pub use url::{UrlFrame, UserUrlFrame};
pub use volume::{ChannelAdjustment, ChannelType, RelativeVolumeFrame};

/// A frame type supplied by the host through a [`FrameCreator`].
pub trait CustomFrame: fmt::Debug + Send + Sync {
    fn header(&self) -> &FrameHeader;
    fn header_mut(&mut self) -> &mut FrameHeader;
    /// Payload bytes for a tag of `version`, without the frame header.
    fn render_fields(&self, version: u8) -> TagResult<Vec<u8>>;
    fn clone_box(&self) -> Box<dyn CustomFrame>;
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn CustomFrame> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[derive(Clone, Debug)]
pub enum Frame {
    Text(TextFrame),
    UserText(UserTextFrame),
    Url(UrlFrame),
    UserUrl(UserUrlFrame),
    Comments(LocalizedTextFrame),
    UnsyncLyrics(LocalizedTextFrame),
    SyncLyrics(SyncLyricsFrame),
    Picture(PictureFrame),
    Object(ObjectFrame),
    PlayCount(PlayCountFrame),
    Popularimeter(PopularimeterFrame),
    Private(OwnerDataFrame),
    UniqueFileId(OwnerDataFrame),
    EventTiming(EventTimingFrame),
    RelativeVolume(RelativeVolumeFrame),
    Chapter(ChapterFrame),
    TableOfContents(TableOfContentsFrame),
    Unknown(UnknownFrame),
    Custom(Box<dyn CustomFrame>),
}

impl Frame {
    pub fn header(&self) -> &FrameHeader {
        match self {
            Frame::Text(f) => &f.header,
            Frame::UserText(f) => &f.header,
            Frame::Url(f) => &f.header,
            Frame::UserUrl(f) => &f.header,
            Frame::Comments(f) | Frame::UnsyncLyrics(f) => &f.header,
            Frame::SyncLyrics(f) => &f.header,
            Frame::Picture(f) => &f.header,
            Frame::Object(f) => &f.header,
            Frame::PlayCount(f) => &f.header,
            Frame::Popularimeter(f) => &f.header,
            Frame::Private(f) | Frame::UniqueFileId(f) => &f.header,
            Frame::EventTiming(f) => &f.header,
            Frame::RelativeVolume(f) => &f.header,
            Frame::Chapter(f) => &f.header,
            Frame::TableOfContents(f) => &f.header,
            Frame::Unknown(f) => &f.header,
            Frame::Custom(f) => f.header(),
        }
    }

    pub fn header_mut(&mut self) -> &mut FrameHeader {
        match self {
            Frame::Text(f) => &mut f.header,
            Frame::UserText(f) => &mut f.header,
            Frame::Url(f) => &mut f.header,
            Frame::UserUrl(f) => &mut f.header,
            Frame::Comments(f) | Frame::UnsyncLyrics(f) => &mut f.header,
            Frame::SyncLyrics(f) => &mut f.header,
            Frame::Picture(f) => &mut f.header,
            Frame::Object(f) => &mut f.header,
            Frame::PlayCount(f) => &mut f.header,
            Frame::Popularimeter(f) => &mut f.header,
            Frame::Private(f) | Frame::UniqueFileId(f) => &mut f.header,
            Frame::EventTiming(f) => &mut f.header,
            Frame::RelativeVolume(f) => &mut f.header,
            Frame::Chapter(f) => &mut f.header,
            Frame::TableOfContents(f) => &mut f.header,
            Frame::Unknown(f) => &mut f.header,
            Frame::Custom(f) => f.header_mut(),
        }
    }

    pub fn id(&self) -> FrameId {
        self.header().id
    }

    /// Frames skipped when rendering a tag of `version`: untranslated v2.2
    /// frames, zero-size frames, and v2.3-only frames in a v2.4 tag.
    pub fn should_drop(&self, version: u8) -> bool {
        let id = self.id();
        if id.is_legacy() {
            return true;
        }
        if let Frame::Unknown(u) = self {
            if u.drop {
                return true;
            }
        }
        version >= 4 && migrate::is_v3_only(id)
    }

    /// Payload bytes without the frame header.
    pub fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        match self {
            Frame::Text(f) => f.render_fields(version),
            Frame::UserText(f) => f.render_fields(version),
            Frame::Url(f) => f.render_fields(),
            Frame::UserUrl(f) => f.render_fields(version),
            Frame::Comments(f) | Frame::UnsyncLyrics(f) => f.render_fields(version),
            Frame::SyncLyrics(f) => f.render_fields(version),
            Frame::Picture(f) => f.render_fields(version),
            Frame::Object(f) => f.render_fields(version),
            Frame::PlayCount(f) => f.render_fields(),
            Frame::Popularimeter(f) => f.render_fields(),
            Frame::Private(f) | Frame::UniqueFileId(f) => f.render_fields(),
            Frame::EventTiming(f) => f.render_fields(),
            Frame::RelativeVolume(f) => f.render_fields(),
            Frame::Chapter(f) => f.render_fields(version),
            Frame::TableOfContents(f) => f.render_fields(version),
            Frame::Unknown(f) => Ok(f.content()?.to_vec()),
            Frame::Custom(f) => f.render_fields(version),
        }
    }

    /// Full frame bytes (header and payload) for a tag of `version`.
    ///
    /// Payloads are written plain: compression, encryption,
    /// unsynchronisation and data length indicator flags are cleared. A
    /// group identity byte is kept. Opaque frames are copied with their
    /// original flags and only into the version they came from.
    pub fn render(&self, version: u8) -> TagResult<Vec<u8>> {
        if let Frame::Unknown(u) = self {
            if u.opaque {
                return u.render_opaque(version);
            }
        }

        let mut header = self.header().clone();
        header.flags.clear_format();
        header.flags.grouping = header.group_id.is_some();

        let fields = self.render_fields(version)?;
        let mut payload = Vec::with_capacity(fields.len() + 1);
        if let Some(group) = header.group_id {
            payload.push(group);
        }
        payload.extend_from_slice(&fields);

        let mut out = header.render(version, payload.len())?;
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

/// Render a frame list, skipping frames that do not belong in `version`.
/// Frames that cannot be rendered fail the whole list unless
/// `skip_unsupported` is set, in which case they are dropped with a warning.
pub fn render_frame_list(
    frames: &[Frame],
    version: u8,
    skip_unsupported: bool,
) -> TagResult<Vec<u8>> {
    let mut out = Vec::new();
    for frame in frames {
        if frame.should_drop(version) {
            continue;
        }
        match frame.render(version) {
            Ok(bytes) => out.extend_from_slice(&bytes),
            Err(err) if skip_unsupported && err.is_unsupported() => {
                warn!("Dropping frame {}: {}", frame.id(), err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(out)
}

pub(crate) fn render_frames(frames: &[Frame], version: u8) -> TagResult<Vec<u8>> {
    render_frame_list(frames, version, false)
}
