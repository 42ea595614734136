//! `mt-common` -- Shared foundation for the media tag engines.
//!
//! Every format crate (ID3v2, MP4, ASF, RIFF) depends on this crate for:
//!
//! - **Errors**: `TagError` with the corrupt / unsupported / invalid-value taxonomy
//! - **Byte store**: `ByteStore`, the seek/read/insert contract files and buffers implement
//! - **Window**: bounded, offset-aware reader used by every record parser
//! - **Strings**: Latin-1 and UTF-16 codecs
//! - **Config**: `TagConfig` padding and version settings (serde)
//! - **BasicTag**: the uniform title/artist/album accessor trait

pub mod config;
pub mod error;
pub mod store;
pub mod strings;
pub mod tag;
pub mod window;

// Re-export commonly used items at crate root
pub use config::TagConfig;
pub use error::{TagError, TagResult};
pub use store::ByteStore;
pub use tag::BasicTag;
pub use window::Window;
