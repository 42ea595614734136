//! Attached pictures (`APIC`, v2.2 `PIC`).
//!
//! ```text
//! APIC: encoding | mime NUL     | type | description NUL | data
//! PIC:  encoding | format[3]    | type | description NUL | data
//! ```

use mt_common::{strings, TagError, TagResult};

use super::encoding::{decode_terminated, split_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};
use super::lazy::{FrameFields, Lazy};

pub const PICTURE_OTHER: u8 = 0;
pub const PICTURE_FRONT_COVER: u8 = 3;
pub const PICTURE_BACK_COVER: u8 = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PictureFields {
    pub encoding: TextEncoding,
    pub mime_type: String,
    pub picture_type: u8,
    pub description: String,
    pub data: Vec<u8>,
}

fn mime_from_legacy_format(format: &[u8]) -> String {
    match format {
        b"JPG" | b"jpg" => "image/jpeg".to_string(),
        b"PNG" | b"png" => "image/png".to_string(),
        other => format!("image/{}", strings::latin1_decode(other).to_lowercase()),
    }
}

impl FrameFields for PictureFields {
    fn decode(data: &[u8], version: u8, offset: u64) -> TagResult<Self> {
        let Some((&enc, rest)) = data.split_first() else {
            return Err(TagError::corrupt(offset, "empty picture frame"));
        };
        let encoding = TextEncoding::from_byte(enc);

        let (mime_type, rest) = if version == 2 {
            if rest.len() < 3 {
                return Err(TagError::corrupt(offset + 1, "truncated PIC image format"));
            }
            (mime_from_legacy_format(&rest[..3]), &rest[3..])
        } else {
            let (mime, rest) = split_terminated(rest, TextEncoding::Latin1);
            (strings::latin1_decode(mime), rest)
        };

        let Some((&picture_type, rest)) = rest.split_first() else {
            return Err(TagError::corrupt(offset, "picture frame ends before picture type"));
        };
        let (description, picture) = decode_terminated(rest, encoding);

        Ok(Self {
            encoding,
            mime_type,
            picture_type,
            description,
            data: picture.to_vec(),
        })
    }

    fn encode(&self, version: u8) -> TagResult<Vec<u8>> {
        let encoding = self.encoding.resolve([self.description.as_str()], version);
        let mut out = Vec::with_capacity(self.data.len() + self.mime_type.len() + 16);
        out.push(encoding.as_byte());
        out.extend_from_slice(&strings::latin1_encode(&self.mime_type));
        out.push(0);
        out.push(self.picture_type);
        encoding.encode_terminated(&self.description, &mut out);
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

#[derive(Clone, Debug)]
pub struct PictureFrame {
    pub header: FrameHeader,
    fields: Lazy<PictureFields>,
}

impl PictureFrame {
    pub fn new(mime_type: &str, picture_type: u8, description: &str, data: Vec<u8>) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"APIC")),
            fields: Lazy::Decoded(PictureFields {
                encoding: TextEncoding::Latin1,
                mime_type: mime_type.to_string(),
                picture_type,
                description: description.to_string(),
                data,
            }),
        }
    }

    pub(crate) fn from_raw(header: FrameHeader, data: Vec<u8>, offset: u64) -> Self {
        let version = header.version;
        Self {
            header,
            fields: Lazy::raw(data, version, offset),
        }
    }

    pub fn fields(&self) -> TagResult<&PictureFields> {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> TagResult<&mut PictureFields> {
        self.fields.get_mut()
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        self.fields.render(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u8) -> FrameHeader {
        FrameHeader {
            version,
            ..FrameHeader::new(FrameId::new(b"APIC"))
        }
    }

    #[test]
    fn parses_apic() {
        let mut data = b"\0image/png\0\x03cover\0".to_vec();
        data.extend_from_slice(&[0x89, b'P', b'N', b'G']);
        let frame = PictureFrame::from_raw(header(4), data.clone(), 0);
        let fields = frame.fields().unwrap();
        assert_eq!(fields.mime_type, "image/png");
        assert_eq!(fields.picture_type, PICTURE_FRONT_COVER);
        assert_eq!(fields.description, "cover");
        assert_eq!(fields.data, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(frame.render_fields(4).unwrap(), data);
        assert_eq!(frame.render_fields(3).unwrap(), data);
    }

    #[test]
    fn legacy_pic_is_converted() {
        let data = b"\0JPG\x03\0\xFF\xD8".to_vec();
        let frame = PictureFrame::from_raw(header(2), data, 0);
        assert_eq!(frame.fields().unwrap().mime_type, "image/jpeg");
        assert_eq!(
            frame.render_fields(3).unwrap(),
            b"\0image/jpeg\0\x03\0\xFF\xD8".to_vec()
        );
    }

    #[test]
    fn truncated_picture_is_corrupt() {
        let frame = PictureFrame::from_raw(header(4), b"\0image/png\0".to_vec(), 100);
        assert!(frame.fields().unwrap_err().is_corrupt());
    }
}
