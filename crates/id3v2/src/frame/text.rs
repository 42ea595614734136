//! Text information frames (`T***`) and user-defined text (`TXXX`).
//!
//! ```text
//! T***: encoding | text [NUL text ...]
//! TXXX: encoding | description NUL | value [NUL value ...]
//! ```
//!
//! Only v2.4 defines the NUL-separated list, but v2.3 writers use the same
//! layout for `IPLS` and multi-artist frames, so lists are read and written
//! for every version.

use mt_common::TagResult;

use super::encoding::{decode_list, decode_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};
use super::lazy::{FrameFields, Lazy};

fn encode_values(values: &[String], encoding: TextEncoding, out: &mut Vec<u8>) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(encoding.terminator());
        }
        out.extend_from_slice(&encoding.encode(value));
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextFields {
    pub encoding: TextEncoding,
    pub values: Vec<String>,
}

impl FrameFields for TextFields {
    fn decode(data: &[u8], _version: u8, _offset: u64) -> TagResult<Self> {
        let Some((&enc, rest)) = data.split_first() else {
            return Ok(Self::default());
        };
        let encoding = TextEncoding::from_byte(enc);
        Ok(Self {
            encoding,
            values: decode_list(rest, encoding),
        })
    }

    fn encode(&self, version: u8) -> TagResult<Vec<u8>> {
        let encoding = self
            .encoding
            .resolve(self.values.iter().map(String::as_str), version);
        let mut out = vec![encoding.as_byte()];
        encode_values(&self.values, encoding, &mut out);
        Ok(out)
    }
}

#[derive(Clone, Debug)]
pub struct TextFrame {
    pub header: FrameHeader,
    fields: Lazy<TextFields>,
}

impl TextFrame {
    pub fn new(id: FrameId, values: Vec<String>) -> Self {
        Self {
            header: FrameHeader::new(id),
            fields: Lazy::Decoded(TextFields {
                encoding: TextEncoding::Latin1,
                values,
            }),
        }
    }

    pub fn with_text(id: FrameId, text: &str) -> Self {
        Self::new(id, vec![text.to_string()])
    }

    pub(crate) fn from_raw(header: FrameHeader, data: Vec<u8>, offset: u64) -> Self {
        let version = header.version;
        Self {
            header,
            fields: Lazy::raw(data, version, offset),
        }
    }

    pub fn fields(&self) -> TagResult<&TextFields> {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> TagResult<&mut TextFields> {
        self.fields.get_mut()
    }

    pub fn is_decoded(&self) -> bool {
        self.fields.is_decoded()
    }

    /// All values joined with `" / "`.
    pub fn text(&self) -> TagResult<String> {
        Ok(self.fields()?.values.join(" / "))
    }

    pub fn set_values(&mut self, values: Vec<String>) -> TagResult<()> {
        self.fields_mut()?.values = values;
        Ok(())
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        self.fields.render(version)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserTextFields {
    pub encoding: TextEncoding,
    pub description: String,
    pub values: Vec<String>,
}

impl FrameFields for UserTextFields {
    fn decode(data: &[u8], _version: u8, _offset: u64) -> TagResult<Self> {
        let Some((&enc, rest)) = data.split_first() else {
            return Ok(Self::default());
        };
        let encoding = TextEncoding::from_byte(enc);
        let (description, rest) = decode_terminated(rest, encoding);
        Ok(Self {
            encoding,
            description,
            values: decode_list(rest, encoding),
        })
    }

    fn encode(&self, version: u8) -> TagResult<Vec<u8>> {
        let texts = std::iter::once(self.description.as_str())
            .chain(self.values.iter().map(String::as_str));
        let encoding = self.encoding.resolve(texts, version);
        let mut out = vec![encoding.as_byte()];
        encoding.encode_terminated(&self.description, &mut out);
        encode_values(&self.values, encoding, &mut out);
        Ok(out)
    }
}

#[derive(Clone, Debug)]
pub struct UserTextFrame {
    pub header: FrameHeader,
    fields: Lazy<UserTextFields>,
}

impl UserTextFrame {
    pub fn new(description: &str, values: Vec<String>) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"TXXX")),
            fields: Lazy::Decoded(UserTextFields {
                encoding: TextEncoding::Latin1,
                description: description.to_string(),
                values,
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

    pub fn fields(&self) -> TagResult<&UserTextFields> {
        self.fields.get()
    }

    pub fn fields_mut(&mut self) -> TagResult<&mut UserTextFields> {
        self.fields.get_mut()
    }

    pub fn description(&self) -> TagResult<String> {
        Ok(self.fields()?.description.clone())
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        self.fields.render(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(id: &[u8; 4], version: u8) -> FrameHeader {
        FrameHeader {
            version,
            ..FrameHeader::new(FrameId::new(id))
        }
    }

    #[test]
    fn decodes_latin1_text() {
        let frame = TextFrame::from_raw(header(b"TIT2", 4), b"\0Hello".to_vec(), 0);
        assert_eq!(frame.text().unwrap(), "Hello");
        assert!(!frame.is_decoded());
        assert_eq!(frame.render_fields(4).unwrap(), b"\0Hello");
    }

    #[test]
    fn v4_lists() {
        let frame = TextFrame::from_raw(header(b"TPE1", 4), b"\x03A\0B\0".to_vec(), 0);
        assert_eq!(frame.fields().unwrap().values, vec!["A", "B"]);
        assert_eq!(frame.text().unwrap(), "A / B");
        // Re-rendered to v2.3 as UTF-16 with BOM, one BOM per value.
        let v3 = frame.render_fields(3).unwrap();
        assert_eq!(v3[0], 1);
        assert_eq!(&v3[1..3], &[0xFF, 0xFE]);
        let back = TextFrame::from_raw(header(b"TPE1", 3), v3, 0);
        assert_eq!(back.fields().unwrap().values, vec!["A", "B"]);
    }

    #[test]
    fn trailing_terminator_is_ignored() {
        let frame = TextFrame::from_raw(header(b"TALB", 3), b"\0Album\0".to_vec(), 0);
        assert_eq!(frame.fields().unwrap().values, vec!["Album"]);
    }

    #[test]
    fn empty_payload() {
        let frame = TextFrame::from_raw(header(b"TALB", 4), Vec::new(), 0);
        assert!(frame.fields().unwrap().values.is_empty());
    }

    #[test]
    fn mutation_upgrades_encoding() {
        let mut frame = TextFrame::with_text(FrameId::new(b"TIT2"), "plain");
        frame.set_values(vec!["Ünïcødé ☃".into()]).unwrap();
        let out = frame.render_fields(4).unwrap();
        assert_eq!(out[0], 3);
        assert_eq!(&out[1..], "Ünïcødé ☃".as_bytes());
    }

    #[test]
    fn user_text_roundtrip() {
        let frame = UserTextFrame::new("MusicBrainz Album Id", vec!["abc".into()]);
        let out = frame.render_fields(4).unwrap();
        assert_eq!(out, b"\0MusicBrainz Album Id\0abc");
        let back = UserTextFrame::from_raw(header(b"TXXX", 4), out, 0);
        let fields = back.fields().unwrap();
        assert_eq!(fields.description, "MusicBrainz Album Id");
        assert_eq!(fields.values, vec!["abc"]);
    }
}
