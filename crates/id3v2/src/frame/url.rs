//! URL link frames (`W***`) and user-defined links (`WXXX`).

use mt_common::{strings, TagResult};

use super::encoding::{decode_terminated, split_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlFrame {
    pub header: FrameHeader,
    pub url: String,
}

impl UrlFrame {
    pub fn new(id: FrameId, url: &str) -> Self {
        Self {
            header: FrameHeader::new(id),
            url: url.to_string(),
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8]) -> Self {
        let (url, _) = split_terminated(data, TextEncoding::Latin1);
        Self {
            header,
            url: strings::latin1_decode(url),
        }
    }

    pub(crate) fn render_fields(&self) -> TagResult<Vec<u8>> {
        Ok(strings::latin1_encode(&self.url))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserUrlFrame {
    pub header: FrameHeader,
    pub encoding: TextEncoding,
    pub description: String,
    pub url: String,
}

impl UserUrlFrame {
    pub fn new(description: &str, url: &str) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"WXXX")),
            encoding: TextEncoding::Latin1,
            description: description.to_string(),
            url: url.to_string(),
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8]) -> Self {
        let (encoding, rest) = match data.split_first() {
            Some((&b, rest)) => (TextEncoding::from_byte(b), rest),
            None => (TextEncoding::Latin1, data),
        };
        let (description, rest) = decode_terminated(rest, encoding);
        let (url, _) = split_terminated(rest, TextEncoding::Latin1);
        Self {
            header,
            encoding,
            description,
            url: strings::latin1_decode(url),
        }
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        let encoding = self.encoding.resolve([self.description.as_str()], version);
        let mut out = vec![encoding.as_byte()];
        encoding.encode_terminated(&self.description, &mut out);
        out.extend_from_slice(&strings::latin1_encode(&self.url));
        Ok(out)
    }
}
