//! Play counter (`PCNT`) and popularimeter (`POPM`).
//!
//! Counters are big-endian integers of at least four bytes; longer values
//! are allowed when the count outgrows 32 bits.

use mt_common::{strings, TagError, TagResult};

use super::encoding::{split_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};

fn decode_counter(bytes: &[u8], offset: u64) -> TagResult<u64> {
    let significant = bytes.iter().skip_while(|&&b| b == 0).count();
    if significant > 8 {
        return Err(TagError::unsupported(format!(
            "counter at {offset} wider than 64 bits"
        )));
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

fn encode_counter(value: u64, out: &mut Vec<u8>) {
    if value <= u32::MAX as u64 {
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(0);
        out.extend_from_slice(&bytes[first..]);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayCountFrame {
    pub header: FrameHeader,
    pub count: u64,
}

impl PlayCountFrame {
    pub fn new(count: u64) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"PCNT")),
            count,
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8], offset: u64) -> TagResult<Self> {
        if data.len() < 4 {
            return Err(TagError::corrupt(
                offset,
                format!("PCNT counter of {} bytes", data.len()),
            ));
        }
        Ok(Self {
            header,
            count: decode_counter(data, offset)?,
        })
    }

    pub(crate) fn render_fields(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(8);
        encode_counter(self.count, &mut out);
        Ok(out)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopularimeterFrame {
    pub header: FrameHeader,
    pub email: String,
    /// 1 (worst) to 255 (best); 0 is unknown.
    pub rating: u8,
    pub counter: Option<u64>,
}

impl PopularimeterFrame {
    pub fn new(email: &str, rating: u8) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"POPM")),
            email: email.to_string(),
            rating,
            counter: None,
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8], offset: u64) -> TagResult<Self> {
        let (email, rest) = split_terminated(data, TextEncoding::Latin1);
        let Some((&rating, counter)) = rest.split_first() else {
            return Err(TagError::corrupt(offset, "POPM frame without rating"));
        };
        let counter = if counter.is_empty() {
            None
        } else {
            Some(decode_counter(counter, offset)?)
        };
        Ok(Self {
            header,
            email: strings::latin1_decode(email),
            rating,
            counter,
        })
    }

    pub(crate) fn render_fields(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::new();
        TextEncoding::Latin1.encode_terminated(&self.email, &mut out);
        out.push(self.rating);
        if let Some(counter) = self.counter {
            encode_counter(counter, &mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_counter() {
        let frame =
            PlayCountFrame::parse(FrameHeader::new(FrameId::new(b"PCNT")), &[0, 0, 1, 0], 0)
                .unwrap();
        assert_eq!(frame.count, 256);
        assert_eq!(frame.render_fields().unwrap(), vec![0, 0, 1, 0]);

        let big = PlayCountFrame::new(1 << 40);
        assert_eq!(big.render_fields().unwrap(), vec![1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn short_counter_is_corrupt() {
        assert!(
            PlayCountFrame::parse(FrameHeader::new(FrameId::new(b"PCNT")), &[1, 2], 0)
                .unwrap_err()
                .is_corrupt()
        );
    }

    #[test]
    fn popularimeter() {
        let data = b"a@b.example\0\xC8\0\0\0\x05";
        let frame =
            PopularimeterFrame::parse(FrameHeader::new(FrameId::new(b"POPM")), data, 0).unwrap();
        assert_eq!(frame.email, "a@b.example");
        assert_eq!(frame.rating, 200);
        assert_eq!(frame.counter, Some(5));
        assert_eq!(frame.render_fields().unwrap(), data.to_vec());

        let no_counter = PopularimeterFrame::new("x", 1);
        assert_eq!(no_counter.render_fields().unwrap(), b"x\0\x01".to_vec());
    }
}
