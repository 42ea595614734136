//! Synchronised lyrics (`SYLT`).
//!
//! ```text
//! encoding | language[3] | timestamp format | content type | description NUL
//! { text NUL | time u32 }*
//! ```

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use mt_common::{TagError, TagResult};

use super::encoding::{decode_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimestampFormat {
    #[default]
    Unknown,
    MpegFrames,
    Milliseconds,
}

impl TimestampFormat {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => Self::MpegFrames,
            2 => Self::Milliseconds,
            _ => Self::Unknown,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::MpegFrames => 1,
            Self::Milliseconds => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncedText {
    pub text: String,
    pub time: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncLyricsFrame {
    pub header: FrameHeader,
    pub encoding: TextEncoding,
    pub language: [u8; 3],
    pub timestamp_format: TimestampFormat,
    /// 0 other, 1 lyrics, 2 transcription, ... up to 8.
    pub content_type: u8,
    pub description: String,
    pub lines: Vec<SyncedText>,
}

impl SyncLyricsFrame {
    pub fn new(description: &str) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"SYLT")),
            encoding: TextEncoding::Latin1,
            language: *b"eng",
            timestamp_format: TimestampFormat::Milliseconds,
            content_type: 1,
            description: description.to_string(),
            lines: Vec::new(),
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8], offset: u64) -> TagResult<Self> {
        if data.len() < 6 {
            return Err(TagError::corrupt(
                offset,
                format!("SYLT frame of {} bytes", data.len()),
            ));
        }
        let encoding = TextEncoding::from_byte(data[0]);
        let language = [data[1], data[2], data[3]];
        let timestamp_format = TimestampFormat::from_byte(data[4]);
        let content_type = data[5];
        let (description, mut rest) = decode_terminated(&data[6..], encoding);

        let mut lines = Vec::new();
        while !rest.is_empty() {
            let (text, after) = decode_terminated(rest, encoding);
            if after.len() < 4 {
                // A trailing string without a timestamp is dropped.
                break;
            }
            lines.push(SyncedText {
                text,
                time: BigEndian::read_u32(&after[..4]),
            });
            rest = &after[4..];
        }

        Ok(Self {
            header,
            encoding,
            language,
            timestamp_format,
            content_type,
            description,
            lines,
        })
    }

    pub(crate) fn render_fields(&self, version: u8) -> TagResult<Vec<u8>> {
        let texts = std::iter::once(self.description.as_str())
            .chain(self.lines.iter().map(|l| l.text.as_str()));
        let encoding = self.encoding.resolve(texts, version);
        let mut out = vec![encoding.as_byte()];
        out.extend_from_slice(&self.language);
        out.push(self.timestamp_format.as_byte());
        out.push(self.content_type);
        encoding.encode_terminated(&self.description, &mut out);
        for line in &self.lines {
            encoding.encode_terminated(&line.text, &mut out);
            out.write_u32::<BigEndian>(line.time)?;
        }
        Ok(out)
    }
}
