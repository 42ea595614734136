//! Chunk header codec.
//!
//! A chunk is a 4-byte id, a u32 payload size and the payload, followed by
//! one pad byte when the size is odd. `RIFF` files store sizes
//! little-endian, `RIFX` and AIFF `FORM` files big-endian.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use mt_common::{TagError, TagResult, Window};
use tracing::trace;

pub const CHUNK_HEADER_SIZE: u64 = 8;

pub type ChunkId = [u8; 4];

pub const RIFF: ChunkId = *b"RIFF";
pub const RIFX: ChunkId = *b"RIFX";
pub const FORM: ChunkId = *b"FORM";
pub const LIST: ChunkId = *b"LIST";
pub const INFO: ChunkId = *b"INFO";
pub const ID3_LOWER: ChunkId = *b"id3 ";
pub const ID3_UPPER: ChunkId = *b"ID3 ";

/// Printable form of a chunk id.
pub fn id_to_string(id: &ChunkId) -> String {
    id.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order implied by a form id, if it is one.
    pub fn for_form(id: &ChunkId) -> Option<Self> {
        match id {
            &RIFF => Some(Self::Little),
            &RIFX | &FORM => Some(Self::Big),
            _ => None,
        }
    }

    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            Self::Little => LittleEndian::read_u32(bytes),
            Self::Big => BigEndian::read_u32(bytes),
        }
    }

    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: ChunkId,
    /// Payload size, pad byte excluded.
    pub size: u32,
    /// Absolute offset of the id.
    pub offset: u64,
}

impl ChunkHeader {
    pub fn parse(w: &mut Window<'_>, endian: Endianness) -> TagResult<Self> {
        let offset = w.position();
        let id = w.read_array::<4>()?;
        let size = match endian {
            Endianness::Little => w.read_u32::<LittleEndian>()?,
            Endianness::Big => w.read_u32::<BigEndian>()?,
        };
        trace!("Chunk '{}' at {}: {} bytes", id_to_string(&id), offset, size);
        Ok(Self { id, size, offset })
    }

    pub fn data_offset(&self) -> u64 {
        self.offset + CHUNK_HEADER_SIZE
    }

    /// Header, payload and pad byte.
    pub fn padded_len(&self) -> u64 {
        CHUNK_HEADER_SIZE + self.size as u64 + (self.size & 1) as u64
    }

    pub fn end_offset(&self) -> u64 {
        self.offset + self.padded_len()
    }
}

/// Header, payload and pad byte for a chunk.
pub fn write_chunk(id: &ChunkId, data: &[u8], endian: Endianness) -> TagResult<Vec<u8>> {
    let size = u32::try_from(data.len()).map_err(|_| {
        TagError::invalid_value(format!(
            "chunk '{}' of {} bytes exceeds 4 GiB",
            id_to_string(id),
            data.len()
        ))
    })?;
    let mut out = Vec::with_capacity(data.len() + 9);
    out.extend_from_slice(id);
    out.extend_from_slice(&endian.u32_bytes(size));
    out.extend_from_slice(data);
    if size & 1 == 1 {
        out.push(0);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_orders() {
        let le = b"data\x05\x00\x00\x00";
        let h = ChunkHeader::parse(&mut Window::new(le, 12), Endianness::Little).unwrap();
        assert_eq!(h.id, *b"data");
        assert_eq!(h.size, 5);
        assert_eq!(h.data_offset(), 20);
        assert_eq!(h.padded_len(), 14);
        assert_eq!(h.end_offset(), 26);

        let be = b"COMM\x00\x00\x00\x12";
        let h = ChunkHeader::parse(&mut Window::new(be, 0), Endianness::Big).unwrap();
        assert_eq!(h.size, 18);
        assert_eq!(h.padded_len(), 26);
    }

    #[test]
    fn test_write_pads_odd_sizes() {
        let bytes = write_chunk(b"ICMT", b"abc", Endianness::Little).unwrap();
        assert_eq!(bytes, b"ICMT\x03\x00\x00\x00abc\x00");
        let bytes = write_chunk(b"ID3 ", &[1, 2], Endianness::Big).unwrap();
        assert_eq!(bytes, b"ID3 \x00\x00\x00\x02\x01\x02");
    }

    #[test]
    fn test_form_endianness() {
        assert_eq!(Endianness::for_form(&RIFF), Some(Endianness::Little));
        assert_eq!(Endianness::for_form(&FORM), Some(Endianness::Big));
        assert_eq!(Endianness::for_form(b"OggS"), None);
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        let err = ChunkHeader::parse(&mut Window::new(b"LIS", 40), Endianness::Little).unwrap_err();
        assert!(err.is_corrupt());
    }
}
