//! Relative volume adjustment (`RVA2`, v2.4 only).
//!
//! ```text
//! identification NUL
//! { channel type | adjustment i16 (1/512 dB) | peak bits | peak[ceil(bits/8)] }*
//! ```

use byteorder::{BigEndian, WriteBytesExt};
use mt_common::{strings, TagResult, Window};

use super::encoding::{split_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelType {
    #[default]
    Other,
    MasterVolume,
    FrontRight,
    FrontLeft,
    BackRight,
    BackLeft,
    FrontCentre,
    BackCentre,
    Subwoofer,
}

impl ChannelType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => Self::MasterVolume,
            2 => Self::FrontRight,
            3 => Self::FrontLeft,
            4 => Self::BackRight,
            5 => Self::BackLeft,
            6 => Self::FrontCentre,
            7 => Self::BackCentre,
            8 => Self::Subwoofer,
            _ => Self::Other,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Other => 0,
            Self::MasterVolume => 1,
            Self::FrontRight => 2,
            Self::FrontLeft => 3,
            Self::BackRight => 4,
            Self::BackLeft => 5,
            Self::FrontCentre => 6,
            Self::BackCentre => 7,
            Self::Subwoofer => 8,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelAdjustment {
    pub channel: ChannelType,
    /// Volume adjustment in 1/512 dB steps.
    pub adjustment: i16,
    pub peak_bits: u8,
    pub peak: Vec<u8>,
}

impl ChannelAdjustment {
    pub fn volume_db(&self) -> f32 {
        self.adjustment as f32 / 512.0
    }

    pub fn set_volume_db(&mut self, db: f32) {
        self.adjustment = (db * 512.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelativeVolumeFrame {
    pub header: FrameHeader,
    pub identification: String,
    pub channels: Vec<ChannelAdjustment>,
}

impl RelativeVolumeFrame {
    pub fn new(identification: &str) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"RVA2")),
            identification: identification.to_string(),
            channels: Vec::new(),
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8], offset: u64) -> TagResult<Self> {
        let (identification, rest) = split_terminated(data, TextEncoding::Latin1);
        let consumed = (data.len() - rest.len()) as u64;
        let mut w = Window::new(rest, offset + consumed);
        let mut channels = Vec::new();
        while !w.is_empty() {
            let channel = ChannelType::from_byte(w.read_u8()?);
            let adjustment = w.read_i16::<BigEndian>()?;
            let peak_bits = w.read_u8()?;
            let peak = w.read_bytes((peak_bits as usize).div_ceil(8))?.to_vec();
            channels.push(ChannelAdjustment {
                channel,
                adjustment,
                peak_bits,
                peak,
            });
        }
        Ok(Self {
            header,
            identification: strings::latin1_decode(identification),
            channels,
        })
    }

    pub(crate) fn render_fields(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::new();
        TextEncoding::Latin1.encode_terminated(&self.identification, &mut out);
        for ch in &self.channels {
            out.push(ch.channel.as_byte());
            out.write_i16::<BigEndian>(ch.adjustment)?;
            out.push(ch.peak_bits);
            out.extend_from_slice(&ch.peak);
        }
        Ok(out)
    }
}
