//! `mt-id3v2` -- ID3v2.2/2.3/2.4 tag engine.
//!
//! Module overview:
//! - **synchsafe** / **unsync**: the two wire-safe encodings
//! - **header**: tag header, footer and extended header
//! - **frame**: frame header, factory with registration, frame variants
//! - **tag**: the frame container with padding-aware rendering
//! - **migrate**: v2.2 id translation, date frame merge and v2.3 downgrade
//! - **file**: find/read/save/strip against a `ByteStore`

pub mod file;
pub mod frame;
pub mod header;
pub mod migrate;
pub mod synchsafe;
pub mod tag;
pub mod unsync;

pub use file::{find_tag, read_tag, read_tag_with, save_tag, strip_tag};
pub use frame::{
    register_frame_creator, CustomFrame, Frame, FrameCreator, FrameFactory, FrameFlags,
    FrameHeader, FrameId, TextEncoding,
};
pub use header::{TagFlags, TagHeader};
pub use mt_common::{TagError, TagResult};
pub use tag::Tag;
