//! `mt-mp4` -- ISO base media file (MP4/M4A/MOV) box tree and iTunes tags.
//!
//! Module overview:
//! - **boxes**: box header codec and fourcc constants
//! - **leaf**: leaf boxes (ftyp, mvhd, hdlr, stco/co64, tfhd, data, free)
//! - **sample_entry**: stsd and the audio/visual sample entries
//! - **tree**: the `Mp4Box` tree, handler-aware factory and child walker
//! - **ilst**: the `AppleTag` view over `moov/udta/meta/ilst`
//! - **file**: top-level scan, save with free-space reuse, offset fixups

pub mod boxes;
pub mod file;
pub mod ilst;
pub mod leaf;
pub mod sample_entry;
pub mod tree;

pub use boxes::{fourcc, fourcc_to_string, BoxHeader};
pub use file::{read_tag, save_tag, Mp4File};
pub use ilst::{AppleTag, Artwork, ArtworkFormat};
pub use mt_common::{TagError, TagResult};
pub use tree::{BoxContext, BoxCreator, BoxFactory, CustomBox, Handler, Mp4Box};
