//! General encapsulated object (`GEOB`).

use mt_common::{strings, TagError, TagResult};

use super::encoding::{decode_terminated, split_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectFrame {
    pub header: FrameHeader,
    pub encoding: TextEncoding,
    pub mime_type: String,
    pub file_name: String,
    pub description: String,
    pub data: Vec<u8>,
}

impl ObjectFrame {
    pub fn new(mime_type: &str, file_name: &str, description: &str, data: Vec<u8>) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"GEOB")),
            encoding: TextEncoding::Latin1,
            mime_type: mime_type.to_string(),
            file_name: file_name.to_string(),
            description: description.to_string(),
            data,
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8], offset: u64) -> TagResult<Self> {
        let Some((&enc, rest)) = data.split_first() else {
            return Err(TagError::corrupt(offset, "empty GEOB frame"));
        };
        let encoding = TextEncoding::from_byte(enc);
        let (mime, rest) = split_terminated(rest, TextEncoding::Latin1);
        let (file_name, rest) = decode_terminated(rest, encoding);
        let (description, rest) = decode_terminated(rest, encoding);
        Ok(Self {
            header,
            encoding,
            mime_type: strings::latin1_decode(mime),
            file_name,
            description,
            data: rest.to_vec(),
        })
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        let encoding = self
            .encoding
            .resolve([self.file_name.as_str(), self.description.as_str()], version);
        let mut out = vec![encoding.as_byte()];
        TextEncoding::Latin1.encode_terminated(&self.mime_type, &mut out);
        encoding.encode_terminated(&self.file_name, &mut out);
        encoding.encode_terminated(&self.description, &mut out);
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}
