//! Comments (`COMM`) and unsynchronised lyrics (`USLT`).
//!
//! Both share one layout:
//!
//! ```text
//! encoding | language[3] | description NUL | text
//! ```

use mt_common::{TagError, TagResult};

use super::encoding::{decode_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};
use super::lazy::{FrameFields, Lazy};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalizedTextFields {
    pub encoding: TextEncoding,
    /// ISO-639-2 language code.
    pub language: [u8; 3],
    pub description: String,
    pub text: String,
}

impl Default for LocalizedTextFields {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Latin1,
            language: *b"eng",
            description: String::new(),
            text: String::new(),
        }
    }
}

impl FrameFields for LocalizedTextFields {
    fn decode(data: &[u8], _version: u8, offset: u64) -> TagResult<Self> {
        if data.len() < 4 {
            return Err(TagError::corrupt(
                offset,
                format!("localized text frame of {} bytes", data.len()),
            ));
        }
        let encoding = TextEncoding::from_byte(data[0]);
        let language = [data[1], data[2], data[3]];
        let (description, rest) = decode_terminated(&data[4..], encoding);
        let (text, _) = decode_terminated(rest, encoding);
        Ok(Self {
            encoding,
            language,
            description,
            text,
        })
    }

    fn encode(&self, version: u8) -> TagResult<Vec<u8>> {
        let encoding = self
            .encoding
            .resolve([self.description.as_str(), self.text.as_str()], version);
        let mut out = vec![encoding.as_byte()];
        out.extend_from_slice(&self.language);
        encoding.encode_terminated(&self.description, &mut out);
        out.extend_from_slice(&encoding.encode(&self.text));
        Ok(out)
    }
}

/// A `COMM` or `USLT` frame.
#[derive(Clone, Debug)]
pub struct LocalizedTextFrame {
    pub header: FrameHeader,
    fields: Lazy<LocalizedTextFields>,
}

impl LocalizedTextFrame {
    pub fn comment(description: &str, text: &str) -> Self {
        Self::new(FrameId::new(b"COMM"), description, text)
    }

    pub fn lyrics(description: &str, text: &str) -> Self {
        Self::new(FrameId::new(b"USLT"), description, text)
    }

    fn new(id: FrameId, description: &str, text: &str) -> Self {
        Self {
            header: FrameHeader::new(id),
            fields: Lazy::Decoded(LocalizedTextFields {
                description: description.to_string(),
                text: text.to_string(),
                ..LocalizedTextFields::default()
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

    pub fn fields(&self) -> TagResult<&LocalizedTextFields> {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> TagResult<&mut LocalizedTextFields> {
        self.fields.get_mut()
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        self.fields.render(version)
    }
}
