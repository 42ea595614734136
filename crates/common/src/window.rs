//! Bounded byte window reader.
//!
//! Every record engine parses from an in-memory slice that covers exactly
//! one record (or one container payload). `Window` tracks the absolute file
//! offset of its first byte so that corruption errors point at the real
//! position in the file, and refuses to read past its end.

use byteorder::ByteOrder;

use crate::error::{TagError, TagResult};

/// A read cursor over a byte slice with an absolute base offset.
#[derive(Clone, Debug)]
pub struct Window<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> Window<'a> {
    /// Wrap `data`, whose first byte lives at `base` in the underlying store.
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Offset of the next byte relative to the start of the window.
    pub fn relative_position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn need(&self, n: usize, what: &str) -> TagResult<()> {
        if self.remaining() < n {
            return Err(TagError::corrupt(
                self.position(),
                format!(
                    "{what} needs {n} bytes, only {} remain",
                    self.remaining()
                ),
            ));
        }
        Ok(())
    }

    /// Look at the next `n` bytes without consuming them.
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos + n)
    }

    pub fn read_bytes(&mut self, n: usize) -> TagResult<&'a [u8]> {
        self.need(n, "field")?;
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> TagResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> TagResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Consume and return everything left in the window.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// Split off the next `n` bytes as their own window.
    pub fn sub_window(&mut self, n: usize) -> TagResult<Window<'a>> {
        let base = self.position();
        let data = self.read_bytes(n)?;
        Ok(Window::new(data, base))
    }

    pub fn read_u8(&mut self) -> TagResult<u8> {
        self.need(1, "u8")?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16<B: ByteOrder>(&mut self) -> TagResult<u16> {
        self.need(2, "u16")?;
        let v = B::read_u16(&self.data[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_i16<B: ByteOrder>(&mut self) -> TagResult<i16> {
        self.need(2, "i16")?;
        let v = B::read_i16(&self.data[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    /// Three-byte big-endian integer (ID3v2.2 frame sizes, MP4 full-box flags).
    pub fn read_u24_be(&mut self) -> TagResult<u32> {
        self.need(3, "u24")?;
        let b = &self.data[self.pos..self.pos + 3];
        self.pos += 3;
        Ok(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32)
    }

    pub fn read_u32<B: ByteOrder>(&mut self) -> TagResult<u32> {
        self.need(4, "u32")?;
        let v = B::read_u32(&self.data[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32<B: ByteOrder>(&mut self) -> TagResult<i32> {
        self.need(4, "i32")?;
        let v = B::read_i32(&self.data[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64<B: ByteOrder>(&mut self) -> TagResult<u64> {
        self.need(8, "u64")?;
        let v = B::read_u64(&self.data[self.pos..]);
        self.pos += 8;
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian};

    #[test]
    fn reads_mixed_endianness() {
        let data = [0x00, 0x01, 0x02, 0x00, 0xAA, 0xBB, 0xCC];
        let mut w = Window::new(&data, 100);
        assert_eq!(w.read_u16::<BigEndian>().unwrap(), 1);
        assert_eq!(w.read_u16::<LittleEndian>().unwrap(), 2);
        assert_eq!(w.position(), 104);
        assert_eq!(w.read_u24_be().unwrap(), 0xAABBCC);
        assert!(w.is_empty());
    }

    #[test]
    fn short_read_is_corrupt_with_absolute_offset() {
        let data = [0u8; 3];
        let mut w = Window::new(&data, 50);
        w.skip(2).unwrap();
        match w.read_u32::<BigEndian>() {
            Err(TagError::CorruptFormat { offset, .. }) => assert_eq!(offset, 52),
            other => panic!("expected corrupt format, got {other:?}"),
        }
        // A failed read consumes nothing.
        assert_eq!(w.remaining(), 1);
    }

    #[test]
    fn sub_window_keeps_base() {
        let data = [1, 2, 3, 4, 5, 6];
        let mut w = Window::new(&data, 10);
        w.skip(1).unwrap();
        let mut sub = w.sub_window(3).unwrap();
        assert_eq!(sub.position(), 11);
        assert_eq!(sub.rest(), &[2, 3, 4]);
        assert_eq!(w.position(), 14);
        assert_eq!(w.peek(2), Some(&[5u8, 6][..]));
        assert_eq!(w.peek(3), None);
    }

    #[test]
    fn read_array_and_rest() {
        let data = *b"ftypisom";
        let mut w = Window::new(&data, 0);
        assert_eq!(&w.read_array::<4>().unwrap(), b"ftyp");
        assert_eq!(w.rest(), b"isom");
        assert!(w.read_u8().is_err());
    }
}
