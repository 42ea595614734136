//! Form-level reading and saving for RIFF/WAV and AIFF files.
//!
//! Reading walks the chunk headers of the outer form without loading
//! payloads. Tag chunks are loaded on demand. Saving replaces (or appends,
//! or removes) one chunk with a single `insert` and then rewrites the form
//! size.

use mt_common::{ByteStore, TagConfig, TagError, TagResult, Window};
use mt_id3v2::{FrameFactory, Tag as Id3Tag};
use tracing::{debug, error, info, warn};

use crate::chunk::{
    id_to_string, write_chunk, ChunkHeader, ChunkId, Endianness, CHUNK_HEADER_SIZE, FORM,
    ID3_LOWER, ID3_UPPER, LIST,
};
use crate::info::InfoTag;

/// Form header: id, size and form type.
pub const FORM_HEADER_SIZE: u64 = 12;

#[derive(Clone, Debug)]
pub struct RiffFile {
    pub endian: Endianness,
    pub form_id: ChunkId,
    pub form_type: ChunkId,
    /// Declared form size (everything after the size field).
    pub form_size: u32,
    chunks: Vec<ChunkHeader>,
}

impl RiffFile {
    pub fn read<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Self> {
        let len = store.len()?;
        if len < FORM_HEADER_SIZE {
            return Err(TagError::corrupt(0, format!("{len} bytes is too short for a form")));
        }
        let head = store.read_exact_at(0, FORM_HEADER_SIZE as usize)?;
        let mut w = Window::new(&head, 0);
        let form_id = w.read_array::<4>()?;
        let endian = Endianness::for_form(&form_id).ok_or_else(|| {
            TagError::corrupt(0, format!("'{}' is not a RIFF or FORM id", id_to_string(&form_id)))
        })?;
        let form_size = endian.read_u32(w.read_bytes(4)?);
        let form_type = w.read_array::<4>()?;

        let declared_end = CHUNK_HEADER_SIZE + form_size as u64;
        let end = if declared_end > len {
            warn!(declared_end, len, "Form size runs past the end of the file");
            len
        } else {
            declared_end
        };

        let mut chunks = Vec::new();
        let mut pos = FORM_HEADER_SIZE;
        while end.saturating_sub(pos) >= CHUNK_HEADER_SIZE {
            let bytes = store.read_exact_at(pos, CHUNK_HEADER_SIZE as usize)?;
            let header = ChunkHeader::parse(&mut Window::new(&bytes, pos), endian)?;
            if header.data_offset() + header.size as u64 > end {
                return Err(TagError::corrupt(
                    pos,
                    format!(
                        "chunk '{}' declares {} bytes, form has {} left",
                        id_to_string(&header.id),
                        header.size,
                        end - header.data_offset()
                    ),
                ));
            }
            pos = header.end_offset();
            chunks.push(header);
        }

        info!(
            form = %id_to_string(&form_type),
            form_size,
            chunks = chunks.len(),
            "Read chunk structure"
        );
        Ok(Self {
            endian,
            form_id,
            form_type,
            form_size,
            chunks,
        })
    }

    pub fn chunks(&self) -> &[ChunkHeader] {
        &self.chunks
    }

    pub fn is_aiff(&self) -> bool {
        self.form_id == FORM
    }

    pub fn chunk_data<S: ByteStore + ?Sized>(
        &self,
        store: &mut S,
        header: &ChunkHeader,
    ) -> TagResult<Vec<u8>> {
        store.read_exact_at(header.data_offset(), header.size as usize)
    }

    fn info_chunk<S: ByteStore + ?Sized>(
        &self,
        store: &mut S,
    ) -> TagResult<Option<(ChunkHeader, InfoTag)>> {
        for header in self.chunks.iter().filter(|c| c.id == LIST) {
            let data = self.chunk_data(store, header)?;
            if let Some(tag) = InfoTag::parse(&data, header.data_offset())? {
                return Ok(Some((header.clone(), tag)));
            }
        }
        Ok(None)
    }

    fn id3_chunk(&self) -> Option<&ChunkHeader> {
        self.chunks
            .iter()
            .find(|c| c.id == ID3_LOWER || c.id == ID3_UPPER)
    }

    pub fn info_tag<S: ByteStore + ?Sized>(&self, store: &mut S) -> TagResult<Option<InfoTag>> {
        Ok(self.info_chunk(store)?.map(|(_, tag)| tag))
    }

    pub fn id3_tag<S: ByteStore + ?Sized>(&self, store: &mut S) -> TagResult<Option<Id3Tag>> {
        let Some(header) = self.id3_chunk() else {
            return Ok(None);
        };
        let data = self.chunk_data(store, header)?;
        Id3Tag::parse_with(&data, header.data_offset(), &FrameFactory::global()).map(Some)
    }

    /// Write `tag` as the `LIST/INFO` chunk. An empty tag removes the chunk.
    pub fn save_info<S: ByteStore + ?Sized>(
        &mut self,
        store: &mut S,
        tag: &InfoTag,
    ) -> TagResult<()> {
        let existing = self.info_chunk(store)?.map(|(header, _)| header);
        let bytes = if tag.is_empty() {
            Vec::new()
        } else {
            write_chunk(&LIST, &tag.render_payload()?, self.endian)?
        };
        self.replace_chunk(store, existing.as_ref(), &bytes)
    }

    /// Write `tag` as the embedded ID3v2 chunk (`ID3 ` in AIFF, `id3 `
    /// otherwise, keeping an existing chunk's id). An empty tag removes it.
    pub fn save_id3<S: ByteStore + ?Sized>(
        &mut self,
        store: &mut S,
        tag: &Id3Tag,
        config: &TagConfig,
    ) -> TagResult<()> {
        let existing = self.id3_chunk().cloned();
        let bytes = if tag.frames().is_empty() {
            Vec::new()
        } else {
            let id = match &existing {
                Some(header) => header.id,
                None if self.is_aiff() => ID3_UPPER,
                None => ID3_LOWER,
            };
            write_chunk(&id, &tag.render(config)?, self.endian)?
        };
        self.replace_chunk(store, existing.as_ref(), &bytes)
    }

    /// Replace `existing` by `bytes` (appending at the end of the form when
    /// there is no existing chunk), fix the form size and re-read.
    ///
    /// Every check runs before the store is touched. The chunk is written
    /// first and the 4-byte form size second; if that second write fails the
    /// chunk is already in place and the error is returned with the form size
    /// left stale, so a later save must rewrite it.
    fn replace_chunk<S: ByteStore + ?Sized>(
        &mut self,
        store: &mut S,
        existing: Option<&ChunkHeader>,
        bytes: &[u8],
    ) -> TagResult<()> {
        let len = store.len()?;
        let (at, old_len) = match existing {
            Some(header) => (header.offset, header.padded_len().min(len - header.offset)),
            None => (self.form_end().min(len), 0),
        };
        if old_len == 0 && bytes.is_empty() {
            debug!("Nothing to write");
            return Ok(());
        }

        let delta = bytes.len() as i64 - old_len as i64;
        let form_size = (self.form_size as i64)
            .checked_add(delta)
            .and_then(|s| u32::try_from(s).ok())
            .ok_or_else(|| {
                TagError::unsupported(format!(
                    "form of {} bytes cannot change by {}",
                    self.form_size, delta
                ))
            })?;

        store.insert(bytes, at, old_len)?;
        if let Err(err) = store.write_at(4, &self.endian.u32_bytes(form_size)) {
            error!(
                offset = at,
                form_size,
                "Chunk written but the form size is stale: {}",
                err
            );
            return Err(err);
        }
        info!(
            offset = at,
            old_size = old_len,
            new_size = bytes.len(),
            form_size,
            "Saved chunk"
        );
        *self = Self::read(store)?;
        Ok(())
    }

    fn form_end(&self) -> u64 {
        CHUNK_HEADER_SIZE + self.form_size as u64
    }
}

/// Read the `LIST/INFO` tag of a RIFF or AIFF file, if it has one.
pub fn read_info<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Option<InfoTag>> {
    RiffFile::read(store)?.info_tag(store)
}

/// Read the embedded ID3v2 tag of a RIFF or AIFF file, if it has one.
pub fn read_id3<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Option<Id3Tag>> {
    RiffFile::read(store)?.id3_tag(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_common::BasicTag;
    use std::io::Cursor;

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(&body);
        out
    }

    fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
        write_chunk(id, data, Endianness::Little).unwrap()
    }

    fn wav() -> Vec<u8> {
        riff(&[chunk(b"fmt ", &[1; 16]), chunk(b"data", &[7; 9])])
    }

    #[test]
    fn test_walk_chunks() {
        let mut store = Cursor::new(wav());
        let file = RiffFile::read(&mut store).unwrap();
        assert_eq!(file.form_type, *b"WAVE");
        let ids: Vec<ChunkId> = file.chunks().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![*b"fmt ", *b"data"]);
        assert_eq!(file.chunks()[1].padded_len(), 18);
        assert!(file.info_tag(&mut store).unwrap().is_none());
    }

    #[test]
    fn test_chunk_past_form_is_corrupt() {
        let mut bytes = wav();
        // data chunk size field
        bytes[12 + 24 + 4] = 200;
        let err = RiffFile::read(&mut Cursor::new(bytes)).unwrap_err();
        match err {
            TagError::CorruptFormat { offset, .. } => assert_eq!(offset, 36),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_not_a_form() {
        let err = RiffFile::read(&mut Cursor::new(b"OggS\0\0\0\0\0\0\0\0".to_vec())).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_append_then_replace_info() {
        let original = wav();
        let mut store = Cursor::new(original.clone());
        let mut file = RiffFile::read(&mut store).unwrap();

        let mut tag = InfoTag::new();
        tag.set_title(Some("Take"));
        file.save_info(&mut store, &tag).unwrap();
        // LIST + INFO + INAM "Take\0" + pad
        assert_eq!(store.get_ref().len(), original.len() + 8 + 4 + 8 + 6);
        assert_eq!(file.form_size as usize, store.get_ref().len() - 8);
        assert_eq!(file.chunks().last().unwrap().id, LIST);

        tag.set_artist(Some("Band"));
        file.save_info(&mut store, &tag).unwrap();
        assert_eq!(file.chunks().len(), 3);
        let back = read_info(&mut store).unwrap().unwrap();
        assert_eq!(back.artist().as_deref(), Some("Band"));
        assert_eq!(&store.get_ref()[..original.len()][12..], &original[12..]);
    }

    #[test]
    fn test_empty_info_removes_chunk() {
        let mut store = Cursor::new(wav());
        let mut file = RiffFile::read(&mut store).unwrap();
        let mut tag = InfoTag::new();
        tag.set_genre(Some("Folk"));
        file.save_info(&mut store, &tag).unwrap();
        file.save_info(&mut store, &InfoTag::new()).unwrap();
        assert_eq!(store.get_ref(), &wav());
    }

    /// Memory store whose in-place writes fail.
    struct NoPatch(Cursor<Vec<u8>>);

    impl ByteStore for NoPatch {
        fn len(&mut self) -> TagResult<u64> {
            self.0.len()
        }
        fn seek(&mut self, pos: u64) -> TagResult<()> {
            ByteStore::seek(&mut self.0, pos)
        }
        fn tell(&mut self) -> TagResult<u64> {
            self.0.tell()
        }
        fn read_block(&mut self, n: usize) -> TagResult<Vec<u8>> {
            self.0.read_block(n)
        }
        fn insert(&mut self, data: &[u8], at: u64, replace_len: u64) -> TagResult<()> {
            self.0.insert(data, at, replace_len)
        }
        fn write_at(&mut self, _pos: u64, _data: &[u8]) -> TagResult<()> {
            Err(std::io::Error::other("read-only header").into())
        }
    }

    #[test]
    fn test_failed_form_size_patch_is_reported() {
        let original = wav();
        let mut store = NoPatch(Cursor::new(original.clone()));
        let mut file = RiffFile::read(&mut store).unwrap();
        let mut tag = InfoTag::new();
        tag.set_title(Some("Take"));
        let err = file.save_info(&mut store, &tag).unwrap_err();
        assert!(matches!(err, TagError::Io(_)));

        // The chunk went in; the form size still describes the old layout.
        let bytes = store.0.get_ref();
        assert!(bytes.len() > original.len());
        assert_eq!(&bytes[4..8], &original[4..8]);
        assert_eq!(file.form_size as usize, original.len() - 8);
    }

    #[test]
    fn test_other_list_types_are_left_alone() {
        let adtl = chunk(b"LIST", b"adtlnote");
        let mut store = Cursor::new(riff(&[chunk(b"fmt ", &[1; 16]), adtl]));
        let mut file = RiffFile::read(&mut store).unwrap();
        assert!(file.info_tag(&mut store).unwrap().is_none());
        let mut tag = InfoTag::new();
        tag.set_title(Some("x"));
        file.save_info(&mut store, &tag).unwrap();
        assert_eq!(file.chunks().iter().filter(|c| c.id == LIST).count(), 2);
    }
}
