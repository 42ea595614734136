//! ASF object header: 16-byte GUID followed by the total object size as a
//! little-endian QWORD.

use byteorder::{LittleEndian, WriteBytesExt};
use mt_common::{TagError, TagResult, Window};
use tracing::trace;

use crate::guid::Guid;

pub const OBJECT_HEADER_SIZE: u64 = 24;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectHeader {
    pub guid: Guid,
    /// Total size including these 24 bytes.
    pub size: u64,
    /// Absolute offset of the GUID.
    pub offset: u64,
}

impl ObjectHeader {
    pub fn new(guid: Guid) -> Self {
        Self {
            guid,
            size: OBJECT_HEADER_SIZE,
            offset: 0,
        }
    }

    pub fn parse(w: &mut Window<'_>) -> TagResult<Self> {
        let offset = w.position();
        let guid = Guid::read(w)?;
        let size = w.read_u64::<LittleEndian>()?;
        if size < OBJECT_HEADER_SIZE {
            return Err(TagError::corrupt(
                offset,
                format!("object {guid} declares {size} bytes, less than its header"),
            ));
        }
        trace!(
            "Object {} ({}) at {}: {} bytes",
            guid,
            guid.name().unwrap_or("unknown"),
            offset,
            size
        );
        Ok(Self { guid, size, offset })
    }

    pub fn content_size(&self) -> u64 {
        self.size - OBJECT_HEADER_SIZE
    }

    pub fn content_offset(&self) -> u64 {
        self.offset + OBJECT_HEADER_SIZE
    }

    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }
}

/// Header plus content.
pub fn write_object(guid: &Guid, content: &[u8]) -> TagResult<Vec<u8>> {
    let mut out = Vec::with_capacity(content.len() + OBJECT_HEADER_SIZE as usize);
    out.extend_from_slice(guid.as_bytes());
    out.write_u64::<LittleEndian>(content.len() as u64 + OBJECT_HEADER_SIZE)?;
    out.extend_from_slice(content);
    Ok(out)
}

/// Fail with a corrupt error unless `header` carries `expected`. Runs
/// before any field of the object is read.
pub fn expect_guid(header: &ObjectHeader, expected: &Guid) -> TagResult<()> {
    if header.guid != *expected {
        return Err(TagError::corrupt(
            header.offset,
            format!(
                "expected {} object {}, found {}",
                expected.name().unwrap_or("ASF"),
                expected,
                header.guid
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{HEADER_OBJECT, PADDING_OBJECT};

    #[test]
    fn test_parse_header() {
        let mut bytes = PADDING_OBJECT.0.to_vec();
        bytes.extend_from_slice(&30u64.to_le_bytes());
        let mut w = Window::new(&bytes, 100);
        let header = ObjectHeader::parse(&mut w).unwrap();
        assert_eq!(header.guid, PADDING_OBJECT);
        assert_eq!(header.content_size(), 6);
        assert_eq!(header.content_offset(), 124);
        assert_eq!(header.end_offset(), 130);
    }

    #[test]
    fn test_size_below_header_is_corrupt() {
        let mut bytes = HEADER_OBJECT.0.to_vec();
        bytes.extend_from_slice(&23u64.to_le_bytes());
        let err = ObjectHeader::parse(&mut Window::new(&bytes, 0)).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_write_object() {
        let bytes = write_object(&PADDING_OBJECT, &[0; 4]).unwrap();
        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[16..24], &28u64.to_le_bytes());
    }
}
