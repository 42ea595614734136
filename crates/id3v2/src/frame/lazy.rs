//! Deferred decoding of frame fields.
//!
//! Most frames in a tag are never looked at by the host, so the string and
//! picture frames keep their payload as raw bytes until a caller first asks
//! for the fields. Read-only access decodes once into a cache next to the
//! bytes; mutable access moves the frame to the decoded state for good.

use std::sync::OnceLock;

use mt_common::{TagError, TagResult};

/// Field set that can be decoded from and encoded to a frame payload.
pub trait FrameFields: Clone {
    fn decode(data: &[u8], version: u8, offset: u64) -> TagResult<Self>;
    fn encode(&self, version: u8) -> TagResult<Vec<u8>>;
}

#[derive(Clone, Debug)]
pub enum Lazy<T> {
    Raw {
        data: Vec<u8>,
        version: u8,
        offset: u64,
        cache: OnceLock<T>,
    },
    Decoded(T),
}

impl<T: FrameFields> Lazy<T> {
    pub fn raw(data: Vec<u8>, version: u8, offset: u64) -> Self {
        Self::Raw {
            data,
            version,
            offset,
            cache: OnceLock::new(),
        }
    }

    /// True once the fields were handed out for mutation.
    pub fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }

    /// True when a read has already decoded the raw payload.
    pub fn is_cached(&self) -> bool {
        match self {
            Self::Raw { cache, .. } => cache.get().is_some(),
            Self::Decoded(_) => true,
        }
    }

    /// Decoded fields. The first call on a raw payload decodes it and keeps
    /// the result; the raw bytes stay authoritative for rendering.
    pub fn get(&self) -> TagResult<&T> {
        match self {
            Self::Raw {
                data,
                version,
                offset,
                cache,
            } => {
                if let Some(fields) = cache.get() {
                    return Ok(fields);
                }
                let fields = T::decode(data, *version, *offset)?;
                Ok(cache.get_or_init(|| fields))
            }
            Self::Decoded(fields) => Ok(fields),
        }
    }

    /// Decode once and hand out the fields for mutation.
    pub fn get_mut(&mut self) -> TagResult<&mut T> {
        if let Self::Raw {
            data,
            version,
            offset,
            cache,
        } = self
        {
            let fields = match cache.take() {
                Some(fields) => fields,
                None => T::decode(data, *version, *offset)?,
            };
            *self = Self::Decoded(fields);
        }
        match self {
            Self::Decoded(fields) => Ok(fields),
            Self::Raw { offset, .. } => Err(TagError::corrupt(*offset, "frame fields not decoded")),
        }
    }

    /// Payload for a tag of `version`. Payloads never handed out for
    /// mutation and going back to their source version are copied verbatim.
    pub fn render(&self, version: u8) -> TagResult<Vec<u8>> {
        match self {
            Self::Raw {
                data, version: v, ..
            } if *v == version => Ok(data.clone()),
            _ => self.get()?.encode(version),
        }
    }
}
