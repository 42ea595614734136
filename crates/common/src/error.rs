//! Central error types for the tag engines (thiserror-based).

use thiserror::Error;

/// Error raised while parsing, rendering or saving tag structures.
#[derive(Error, Debug)]
pub enum TagError {
    /// The bytes do not describe a valid record: declared size below the
    /// header minimum, identifier mismatch, reserved bits set, or a field
    /// running past the end of its window.
    #[error("Corrupt data at offset {offset}: {reason}")]
    CorruptFormat { offset: u64, reason: String },

    /// The data is well-formed but uses a feature this library recognises
    /// without implementing (compressed or encrypted ID3v2 frames, ...).
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A caller-supplied value cannot be represented on disk.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TagError {
    /// Create a corrupt-format error at the given absolute offset.
    pub fn corrupt<S: Into<String>>(offset: u64, reason: S) -> Self {
        TagError::CorruptFormat {
            offset,
            reason: reason.into(),
        }
    }

    /// Create an unsupported-feature error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        TagError::UnsupportedFeature(msg.into())
    }

    /// Create an invalid-value error.
    pub fn invalid_value<S: Into<String>>(msg: S) -> Self {
        TagError::InvalidValue(msg.into())
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, TagError::CorruptFormat { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, TagError::UnsupportedFeature(_))
    }
}

/// Convenience Result type for tag operations.
pub type TagResult<T> = Result<T, TagError>;
