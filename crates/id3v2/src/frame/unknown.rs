//! Frames kept as raw bytes.

use mt_common::{TagError, TagResult};

use super::header::FrameHeader;

/// A frame with an unrecognised id, or one whose payload cannot be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownFrame {
    pub header: FrameHeader,
    pub data: Vec<u8>,
    /// The payload is still compressed or encrypted, exactly as on disk
    /// (group byte and data length indicator included).
    pub opaque: bool,
    /// Dropped on the next render (zero-size frames).
    pub drop: bool,
}

impl UnknownFrame {
    pub fn new(header: FrameHeader, data: Vec<u8>) -> Self {
        Self {
            header,
            data,
            opaque: false,
            drop: false,
        }
    }

    pub(crate) fn opaque(header: FrameHeader, data: Vec<u8>) -> Self {
        Self {
            opaque: true,
            ..Self::new(header, data)
        }
    }

    /// Payload bytes. Fails for compressed or encrypted frames.
    pub fn content(&self) -> TagResult<&[u8]> {
        if self.opaque {
            return Err(self.unsupported());
        }
        Ok(&self.data)
    }

    fn unsupported(&self) -> TagError {
        let kind = if self.header.flags.encryption {
            "encrypted"
        } else {
            "compressed"
        };
        TagError::unsupported(format!("{kind} frame {}", self.header.id))
    }

    /// Re-emit an opaque frame with its original header flags. Only
    /// possible into the version it was read from.
    pub(crate) fn render_opaque(&self, version: u8) -> TagResult<Vec<u8>> {
        if version != self.header.version {
            return Err(self.unsupported());
        }
        let mut out = self.header.render(version, self.data.len())?;
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::header::{FrameFlags, FrameId};

    fn compressed_header(version: u8) -> FrameHeader {
        FrameHeader {
            flags: FrameFlags {
                compression: true,
                data_length_indicator: true,
                ..FrameFlags::default()
            },
            version,
            ..FrameHeader::new(FrameId::new(b"TIT2"))
        }
    }

    #[test]
    fn opaque_content_is_unsupported() {
        let frame = UnknownFrame::opaque(compressed_header(4), vec![0, 0, 0, 5, 0x78]);
        assert!(frame.content().unwrap_err().is_unsupported());
    }

    #[test]
    fn opaque_renders_only_to_source_version() {
        let frame = UnknownFrame::opaque(compressed_header(4), vec![0, 0, 0, 5, 0x78]);
        let out = frame.render_opaque(4).unwrap();
        assert_eq!(&out[..4], b"TIT2");
        assert_eq!(&out[8..10], &[0x00, 0x09]);
        assert_eq!(&out[10..], &[0, 0, 0, 5, 0x78]);
        assert!(frame.render_opaque(3).unwrap_err().is_unsupported());
    }

    #[test]
    fn plain_unknown_content() {
        let frame = UnknownFrame::new(FrameHeader::new(FrameId::new(b"XYZW")), vec![1, 2]);
        assert_eq!(frame.content().unwrap(), &[1, 2]);
    }
}
