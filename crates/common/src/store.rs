//! Random-access byte store consumed by every record engine.
//!
//! The engines never touch files directly: they seek, read blocks and
//! replace byte ranges through this narrow contract. Saves assemble the new
//! region fully in memory and hand it to a single [`ByteStore::insert`].

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use tracing::trace;

use crate::error::{TagError, TagResult};

/// Sequential, single-user access to a seekable byte container.
pub trait ByteStore {
    /// Total length in bytes.
    fn len(&mut self) -> TagResult<u64>;

    /// Move the cursor to an absolute position.
    fn seek(&mut self, pos: u64) -> TagResult<()>;

    /// Current absolute position.
    fn tell(&mut self) -> TagResult<u64>;

    /// Read up to `n` bytes from the cursor. Returns fewer at end of store.
    fn read_block(&mut self, n: usize) -> TagResult<Vec<u8>>;

    /// Replace `replace_len` bytes at `at` with `data`, shifting everything
    /// after the replaced range.
    fn insert(&mut self, data: &[u8], at: u64, replace_len: u64) -> TagResult<()>;

    /// Overwrite bytes in place without changing the length.
    fn write_at(&mut self, pos: u64, data: &[u8]) -> TagResult<()>;

    fn is_empty(&mut self) -> TagResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read exactly `n` bytes at `pos`; a short read means the structure that
    /// promised those bytes is corrupt.
    fn read_exact_at(&mut self, pos: u64, n: usize) -> TagResult<Vec<u8>> {
        self.seek(pos)?;
        let block = self.read_block(n)?;
        if block.len() < n {
            return Err(TagError::corrupt(
                pos,
                format!("expected {n} bytes, store ends after {}", block.len()),
            ));
        }
        Ok(block)
    }

    /// Remove `len` bytes at `at`.
    fn remove(&mut self, at: u64, len: u64) -> TagResult<()> {
        self.insert(&[], at, len)
    }
}

fn check_range(at: u64, replace_len: u64, len: u64) -> TagResult<()> {
    if at.checked_add(replace_len).map_or(true, |end| end > len) {
        return Err(TagError::invalid_value(format!(
            "replace range {at}+{replace_len} exceeds store length {len}"
        )));
    }
    Ok(())
}

impl ByteStore for Cursor<Vec<u8>> {
    fn len(&mut self) -> TagResult<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn seek(&mut self, pos: u64) -> TagResult<()> {
        Seek::seek(self, SeekFrom::Start(pos))?;
        Ok(())
    }

    fn tell(&mut self) -> TagResult<u64> {
        Ok(self.position())
    }

    fn read_block(&mut self, n: usize) -> TagResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(n);
        Read::by_ref(self).take(n as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn insert(&mut self, data: &[u8], at: u64, replace_len: u64) -> TagResult<()> {
        let len = self.get_ref().len() as u64;
        check_range(at, replace_len, len)?;
        let start = at as usize;
        let end = (at + replace_len) as usize;
        self.get_mut().splice(start..end, data.iter().copied());
        trace!("memory insert: {} bytes at {} replacing {}", data.len(), at, replace_len);
        Ok(())
    }

    fn write_at(&mut self, pos: u64, data: &[u8]) -> TagResult<()> {
        let len = self.get_ref().len() as u64;
        check_range(pos, data.len() as u64, len)?;
        let start = pos as usize;
        self.get_mut()[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

impl ByteStore for File {
    fn len(&mut self) -> TagResult<u64> {
        Ok(self.metadata()?.len())
    }

    fn seek(&mut self, pos: u64) -> TagResult<()> {
        Seek::seek(self, SeekFrom::Start(pos))?;
        Ok(())
    }

    fn tell(&mut self) -> TagResult<u64> {
        Ok(self.stream_position()?)
    }

    fn read_block(&mut self, n: usize) -> TagResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(n);
        Read::by_ref(self).take(n as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn insert(&mut self, data: &[u8], at: u64, replace_len: u64) -> TagResult<()> {
        let len = ByteStore::len(self)?;
        check_range(at, replace_len, len)?;

        // Same size: plain overwrite.
        if data.len() as u64 == replace_len {
            return self.write_at(at, data);
        }

        // Read everything after the replaced range, then write new bytes and
        // tail in one pass.
        Seek::seek(self, SeekFrom::Start(at + replace_len))?;
        let mut tail = Vec::with_capacity((len - at - replace_len) as usize);
        self.read_to_end(&mut tail)?;

        Seek::seek(self, SeekFrom::Start(at))?;
        self.write_all(data)?;
        self.write_all(&tail)?;
        let new_len = at + data.len() as u64 + tail.len() as u64;
        self.set_len(new_len)?;
        self.flush()?;
        trace!(
            "file insert: {} bytes at {} replacing {}, new length {}",
            data.len(),
            at,
            replace_len,
            new_len
        );
        Ok(())
    }

    fn write_at(&mut self, pos: u64, data: &[u8]) -> TagResult<()> {
        Seek::seek(self, SeekFrom::Start(pos))?;
        self.write_all(data)?;
        self.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(bytes: &[u8]) -> Cursor<Vec<u8>> {
        Cursor::new(bytes.to_vec())
    }

    #[test]
    fn memory_insert_grows_and_shrinks() {
        let mut s = store(b"0123456789");
        s.insert(b"abc", 2, 1).unwrap();
        assert_eq!(s.get_ref().as_slice(), b"01abc3456789");
        s.insert(b"", 0, 4).unwrap();
        assert_eq!(s.get_ref().as_slice(), b"bc3456789");
        s.remove(7, 2).unwrap();
        assert_eq!(s.get_ref().as_slice(), b"bc34567");
    }

    #[test]
    fn memory_insert_out_of_range() {
        let mut s = store(b"0123");
        assert!(matches!(s.insert(b"x", 3, 2), Err(TagError::InvalidValue(_))));
    }

    #[test]
    fn read_block_short_at_end() {
        let mut s = store(b"abcdef");
        ByteStore::seek(&mut s, 4).unwrap();
        assert_eq!(s.read_block(10).unwrap(), b"ef");
        assert!(s.read_exact_at(4, 3).unwrap_err().is_corrupt());
        assert_eq!(s.read_exact_at(1, 2).unwrap(), b"bc");
    }

    #[test]
    fn file_store_insert_and_overwrite() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"HEADERpayload-tail").unwrap();

        file.insert(b"NEWHEADER!", 0, 6).unwrap();
        assert_eq!(ByteStore::len(&mut file).unwrap(), 22);
        assert_eq!(file.read_exact_at(0, 22).unwrap(), b"NEWHEADER!payload-tail");

        file.insert(b"HDR", 0, 10).unwrap();
        assert_eq!(ByteStore::len(&mut file).unwrap(), 15);
        assert_eq!(file.read_exact_at(0, 15).unwrap(), b"HDRpayload-tail");

        file.write_at(3, b"PAY").unwrap();
        assert_eq!(file.read_exact_at(0, 15).unwrap(), b"HDRPAYload-tail");
    }
}
