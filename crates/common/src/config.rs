//! Save-time configuration shared by all tag engines.

use serde::{Deserialize, Serialize};

use crate::error::{TagError, TagResult};

/// Rendering and padding settings used when tags are written back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Target ID3v2 major version (3 or 4).
    pub id3v2_version: u8,
    /// Padding appended when an ID3v2 tag outgrows its old allocation.
    pub id3v2_padding: u32,
    /// Size of the `free` box reserved when an MP4 tag grows.
    pub mp4_padding: u64,
    /// Size of the padding object reserved when an ASF header grows.
    pub asf_padding: u64,
    /// Leftover free space above this is returned to the file.
    pub max_padding: u64,
    /// Skip frames that cannot be re-encoded instead of failing the render.
    pub drop_unsupported_frames: bool,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            id3v2_version: 4,
            id3v2_padding: 1024,
            mp4_padding: 2048,
            asf_padding: 4096,
            max_padding: 1024 * 1024,
            drop_unsupported_frames: false,
        }
    }
}

impl TagConfig {
    /// Parse a (possibly partial) JSON document. Missing keys keep defaults.
    pub fn from_json_str(json: &str) -> TagResult<Self> {
        let config: TagConfig = serde_json::from_str(json)
            .map_err(|e| TagError::invalid_value(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TagResult<()> {
        if !matches!(self.id3v2_version, 3 | 4) {
            return Err(TagError::invalid_value(format!(
                "ID3v2 version 2.{} cannot be rendered",
                self.id3v2_version
            )));
        }
        Ok(())
    }
}
