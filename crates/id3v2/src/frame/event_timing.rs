//! Event timing codes (`ETCO`).

use byteorder::{BigEndian, WriteBytesExt};
use mt_common::{TagError, TagResult, Window};

use super::header::{FrameHeader, FrameId};
use super::sync_lyrics::TimestampFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    /// Event type code (0x03 main part start, 0x0A end of initial silence, ...).
    pub event_type: u8,
    pub time: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventTimingFrame {
    pub header: FrameHeader,
    pub timestamp_format: TimestampFormat,
    pub events: Vec<TimedEvent>,
}

impl EventTimingFrame {
    pub fn new(timestamp_format: TimestampFormat) -> Self {
        Self {
            header: FrameHeader::new(FrameId::new(b"ETCO")),
            timestamp_format,
            events: Vec::new(),
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8], offset: u64) -> TagResult<Self> {
        let mut w = Window::new(data, offset);
        let timestamp_format = TimestampFormat::from_byte(w.read_u8()?);
        if w.remaining() % 5 != 0 {
            return Err(TagError::corrupt(
                w.position(),
                format!("ETCO event list of {} bytes", w.remaining()),
            ));
        }
        let mut events = Vec::with_capacity(w.remaining() / 5);
        while !w.is_empty() {
            events.push(TimedEvent {
                event_type: w.read_u8()?,
                time: w.read_u32::<BigEndian>()?,
            });
        }
        Ok(Self {
            header,
            timestamp_format,
            events,
        })
    }

    pub(crate) fn render_fields(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(1 + self.events.len() * 5);
        out.push(self.timestamp_format.as_byte());
        for event in &self.events {
            out.push(event.event_type);
            out.write_u32::<BigEndian>(event.time)?;
        }
        Ok(out)
    }
}
