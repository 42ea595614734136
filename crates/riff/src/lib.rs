//! `mt-riff` -- chunk walker for RIFF/RIFX (WAV) and AIFF `FORM` files.
//!
//! Module overview:
//! - **chunk**: chunk header codec, byte order per form, pad bytes
//! - **info**: the `LIST/INFO` text tag
//! - **file**: form walk, tag chunk lookup, chunk replacement with form size fixup

pub mod chunk;
pub mod file;
pub mod info;

pub use chunk::{ChunkHeader, ChunkId, Endianness};
pub use file::{read_id3, read_info, RiffFile};
pub use info::InfoTag;
pub use mt_common::{TagError, TagResult};
