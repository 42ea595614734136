//! `LIST/INFO` text tags.

use mt_common::strings::{latin1_decode, trim_nul};
use mt_common::tag::{leading_number, non_empty};
use mt_common::{BasicTag, TagResult, Window};
use tracing::{debug, warn};

use crate::chunk::{id_to_string, write_chunk, ChunkHeader, ChunkId, Endianness, INFO};

pub const TITLE: ChunkId = *b"INAM";
pub const ARTIST: ChunkId = *b"IART";
pub const ALBUM: ChunkId = *b"IPRD";
pub const COMMENT: ChunkId = *b"ICMT";
pub const GENRE: ChunkId = *b"IGNR";
pub const DATE: ChunkId = *b"ICRD";
pub const TRACK: ChunkId = *b"ITRK";

/// Ordered INFO fields. Text is decoded as UTF-8 when valid, Latin-1
/// otherwise, and always written as UTF-8.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InfoTag {
    fields: Vec<(ChunkId, String)>,
}

impl InfoTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the payload of a `LIST` chunk. Returns `None` when the list
    /// type is not `INFO`.
    pub fn parse(payload: &[u8], offset: u64) -> TagResult<Option<Self>> {
        let mut w = Window::new(payload, offset);
        if w.read_array::<4>()? != INFO {
            return Ok(None);
        }
        let mut fields = Vec::new();
        while w.remaining() >= 8 {
            let header = ChunkHeader::parse(&mut w, Endianness::Little)?;
            let data = w.read_bytes(header.size as usize)?;
            if header.size & 1 == 1 && !w.is_empty() {
                w.skip(1)?;
            }
            let text = decode_text(data);
            if text.is_empty() {
                debug!("Skipping empty INFO field '{}'", id_to_string(&header.id));
                continue;
            }
            fields.push((header.id, text));
        }
        if !w.is_empty() {
            warn!(
                "Ignoring {} bytes at the end of LIST/INFO at {}",
                w.remaining(),
                w.position()
            );
        }
        Ok(Some(Self { fields }))
    }

    /// The `LIST` payload: `INFO` and one NUL-terminated sub-chunk per field.
    pub fn render_payload(&self) -> TagResult<Vec<u8>> {
        let mut out = INFO.to_vec();
        for (id, text) in &self.fields {
            let mut data = text.as_bytes().to_vec();
            data.push(0);
            out.extend_from_slice(&write_chunk(id, &data, Endianness::Little)?);
        }
        Ok(out)
    }

    pub fn fields(&self) -> &[(ChunkId, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, id: &ChunkId) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| f == id)
            .map(|(_, t)| t.as_str())
    }

    /// Set a field in place, or append it. `None` or an empty string
    /// removes it.
    pub fn set(&mut self, id: ChunkId, value: Option<&str>) {
        match value {
            Some(text) if !text.is_empty() => {
                match self.fields.iter_mut().find(|(f, _)| *f == id) {
                    Some(field) => field.1 = text.to_string(),
                    None => self.fields.push((id, text.to_string())),
                }
                let mut seen = false;
                self.fields.retain(|(f, _)| {
                    if *f != id {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            _ => self.fields.retain(|(f, _)| *f != id),
        }
    }

    fn text(&self, id: &ChunkId) -> Option<String> {
        self.get(id).map(str::to_string).and_then(non_empty)
    }
}

fn decode_text(data: &[u8]) -> String {
    let text = match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        Err(_) => latin1_decode(data),
    };
    trim_nul(&text).to_string()
}

impl BasicTag for InfoTag {
    fn title(&self) -> Option<String> {
        self.text(&TITLE)
    }

    fn set_title(&mut self, value: Option<&str>) {
        self.set(TITLE, value);
    }

    fn artist(&self) -> Option<String> {
        self.text(&ARTIST)
    }

    fn set_artist(&mut self, value: Option<&str>) {
        self.set(ARTIST, value);
    }

    fn album(&self) -> Option<String> {
        self.text(&ALBUM)
    }

    fn set_album(&mut self, value: Option<&str>) {
        self.set(ALBUM, value);
    }

    fn comment(&self) -> Option<String> {
        self.text(&COMMENT)
    }

    fn set_comment(&mut self, value: Option<&str>) {
        self.set(COMMENT, value);
    }

    fn genre(&self) -> Option<String> {
        self.text(&GENRE)
    }

    fn set_genre(&mut self, value: Option<&str>) {
        self.set(GENRE, value);
    }

    fn year(&self) -> Option<u32> {
        self.get(&DATE).and_then(leading_number)
    }

    fn set_year(&mut self, value: Option<u32>) {
        self.set(DATE, value.map(|y| y.to_string()).as_deref());
    }

    fn track(&self) -> Option<u32> {
        self.get(&TRACK).and_then(leading_number).filter(|&t| t != 0)
    }

    fn set_track(&mut self, value: Option<u32>) {
        self.set(TRACK, value.map(|t| t.to_string()).as_deref());
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
