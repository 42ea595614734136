//! Typed leaf objects of the ASF header.
//!
//! Every `parse` checks the object GUID before reading a single field, so a
//! mismatched object is reported as corrupt at its own offset.

use byteorder::{LittleEndian, WriteBytesExt};
use mt_common::strings::{trim_nul, utf16_decode, utf16_encode};
use mt_common::{TagError, TagResult, Window};
use tracing::{debug, warn};

use crate::attribute::{AttributeValue, ValueContext};
use crate::guid::{
    Guid, AUDIO_MEDIA, CONTENT_DESCRIPTION_OBJECT, EXTENDED_CONTENT_DESCRIPTION_OBJECT,
    FILE_PROPERTIES_OBJECT, METADATA_LIBRARY_OBJECT, METADATA_OBJECT, PADDING_OBJECT,
    STREAM_PROPERTIES_OBJECT, VIDEO_MEDIA,
};
use crate::object::{expect_guid, ObjectHeader, OBJECT_HEADER_SIZE};

// ─── Helpers ────────────────────────────────────────────────────────

/// UTF-16LE with a NUL terminator; an empty string stays empty.
fn encode_text(text: &str) -> Vec<u8> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut out = utf16_encode(text, false);
    out.extend_from_slice(&[0, 0]);
    out
}

fn decode_text(bytes: &[u8]) -> String {
    trim_nul(&utf16_decode(bytes, false)).to_string()
}

fn u16_len(len: usize, what: &str) -> TagResult<u16> {
    u16::try_from(len)
        .map_err(|_| TagError::invalid_value(format!("{what} of {len} bytes exceeds 65535")))
}

// ─── File Properties ────────────────────────────────────────────────

/// Flag: the file is being broadcast and sizes are not final.
pub const FILE_BROADCAST: u32 = 0x01;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePropertiesObject {
    pub header: ObjectHeader,
    pub file_id: Guid,
    pub file_size: u64,
    /// 100-ns units since 1601-01-01.
    pub creation_date: u64,
    pub data_packets: u64,
    /// 100-ns units, preroll included.
    pub play_duration: u64,
    pub send_duration: u64,
    /// Milliseconds.
    pub preroll: u64,
    pub flags: u32,
    pub min_packet_size: u32,
    pub max_packet_size: u32,
    pub max_bitrate: u32,
    pub rest: Vec<u8>,
}

impl FilePropertiesObject {
    /// Parse a complete object from `data`, whose first byte is at `offset`.
    pub fn from_bytes(data: &[u8], offset: u64) -> TagResult<Self> {
        let mut w = Window::new(data, offset);
        let header = ObjectHeader::parse(&mut w)?;
        Self::parse(header, &mut w)
    }

    pub fn parse(header: ObjectHeader, w: &mut Window<'_>) -> TagResult<Self> {
        expect_guid(&header, &FILE_PROPERTIES_OBJECT)?;
        let file_id = Guid::read(w)?;
        let file_size = w.read_u64::<LittleEndian>()?;
        let creation_date = w.read_u64::<LittleEndian>()?;
        let data_packets = w.read_u64::<LittleEndian>()?;
        let play_duration = w.read_u64::<LittleEndian>()?;
        let send_duration = w.read_u64::<LittleEndian>()?;
        let preroll = w.read_u64::<LittleEndian>()?;
        let flags = w.read_u32::<LittleEndian>()?;
        let min_packet_size = w.read_u32::<LittleEndian>()?;
        let max_packet_size = w.read_u32::<LittleEndian>()?;
        let max_bitrate = w.read_u32::<LittleEndian>()?;
        debug!(
            "File properties: size={}, packets={}, duration={}",
            file_size, data_packets, play_duration
        );
        Ok(Self {
            header,
            file_id,
            file_size,
            creation_date,
            data_packets,
            play_duration,
            send_duration,
            preroll,
            flags,
            min_packet_size,
            max_packet_size,
            max_bitrate,
            rest: w.rest().to_vec(),
        })
    }

    /// Play duration without the preroll, in seconds.
    pub fn duration_seconds(&self) -> f64 {
        let total = self.play_duration as f64 / 10_000_000.0;
        (total - self.preroll as f64 / 1000.0).max(0.0)
    }

    pub fn is_broadcast(&self) -> bool {
        self.flags & FILE_BROADCAST != 0
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(80 + self.rest.len());
        out.extend_from_slice(self.file_id.as_bytes());
        out.write_u64::<LittleEndian>(self.file_size)?;
        out.write_u64::<LittleEndian>(self.creation_date)?;
        out.write_u64::<LittleEndian>(self.data_packets)?;
        out.write_u64::<LittleEndian>(self.play_duration)?;
        out.write_u64::<LittleEndian>(self.send_duration)?;
        out.write_u64::<LittleEndian>(self.preroll)?;
        out.write_u32::<LittleEndian>(self.flags)?;
        out.write_u32::<LittleEndian>(self.min_packet_size)?;
        out.write_u32::<LittleEndian>(self.max_packet_size)?;
        out.write_u32::<LittleEndian>(self.max_bitrate)?;
        out.extend_from_slice(&self.rest);
        Ok(out)
    }
}

// ─── Stream Properties ──────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamPropertiesObject {
    pub header: ObjectHeader,
    pub stream_type: Guid,
    pub error_correction_type: Guid,
    pub time_offset: u64,
    pub flags: u16,
    pub reserved: u32,
    /// Codec-specific data (WAVEFORMATEX, BITMAPINFOHEADER, ...), kept raw.
    pub type_specific: Vec<u8>,
    pub error_correction: Vec<u8>,
}

impl StreamPropertiesObject {
    pub fn parse(header: ObjectHeader, w: &mut Window<'_>) -> TagResult<Self> {
        expect_guid(&header, &STREAM_PROPERTIES_OBJECT)?;
        let stream_type = Guid::read(w)?;
        let error_correction_type = Guid::read(w)?;
        let time_offset = w.read_u64::<LittleEndian>()?;
        let type_specific_len = w.read_u32::<LittleEndian>()? as usize;
        let error_correction_len = w.read_u32::<LittleEndian>()? as usize;
        let flags = w.read_u16::<LittleEndian>()?;
        let reserved = w.read_u32::<LittleEndian>()?;
        let type_specific = w.read_bytes(type_specific_len)?.to_vec();
        let error_correction = w.read_bytes(error_correction_len)?.to_vec();
        if !w.is_empty() {
            warn!(
                "Ignoring {} bytes after stream properties at {}",
                w.remaining(),
                w.position()
            );
        }
        Ok(Self {
            header,
            stream_type,
            error_correction_type,
            time_offset,
            flags,
            reserved,
            type_specific,
            error_correction,
        })
    }

    pub fn stream_number(&self) -> u16 {
        self.flags & 0x7F
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    pub fn is_audio(&self) -> bool {
        self.stream_type == AUDIO_MEDIA
    }

    pub fn is_video(&self) -> bool {
        self.stream_type == VIDEO_MEDIA
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(54 + self.type_specific.len());
        out.extend_from_slice(self.stream_type.as_bytes());
        out.extend_from_slice(self.error_correction_type.as_bytes());
        out.write_u64::<LittleEndian>(self.time_offset)?;
        out.write_u32::<LittleEndian>(self.type_specific.len() as u32)?;
        out.write_u32::<LittleEndian>(self.error_correction.len() as u32)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u32::<LittleEndian>(self.reserved)?;
        out.extend_from_slice(&self.type_specific);
        out.extend_from_slice(&self.error_correction);
        Ok(out)
    }
}

// ─── Content Description ────────────────────────────────────────────

/// The five fixed strings: title, author, copyright, description, rating.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentDescriptionObject {
    pub header: Option<ObjectHeader>,
    pub title: String,
    pub author: String,
    pub copyright: String,
    pub description: String,
    pub rating: String,
}

impl ContentDescriptionObject {
    pub fn parse(header: ObjectHeader, w: &mut Window<'_>) -> TagResult<Self> {
        expect_guid(&header, &CONTENT_DESCRIPTION_OBJECT)?;
        let mut lengths = [0usize; 5];
        for len in &mut lengths {
            *len = w.read_u16::<LittleEndian>()? as usize;
        }
        let mut fields = Vec::with_capacity(5);
        for len in lengths {
            fields.push(decode_text(w.read_bytes(len)?));
        }
        let [title, author, copyright, description, rating]: [String; 5] = fields
            .try_into()
            .map_err(|_| TagError::corrupt(header.offset, "content description field count"))?;
        Ok(Self {
            header: Some(header),
            title,
            author,
            copyright,
            description,
            rating,
        })
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.author,
            &self.copyright,
            &self.description,
            &self.rating,
        ]
        .iter()
        .all(|s| s.is_empty())
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let fields = [
            encode_text(&self.title),
            encode_text(&self.author),
            encode_text(&self.copyright),
            encode_text(&self.description),
            encode_text(&self.rating),
        ];
        let mut out = Vec::new();
        for field in &fields {
            out.write_u16::<LittleEndian>(u16_len(field.len(), "content description field")?)?;
        }
        for field in &fields {
            out.extend_from_slice(field);
        }
        Ok(out)
    }
}

// ─── Extended Content Description ───────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtendedContentDescriptionObject {
    pub header: Option<ObjectHeader>,
    pub descriptors: Vec<(String, AttributeValue)>,
}

impl ExtendedContentDescriptionObject {
    pub fn parse(header: ObjectHeader, w: &mut Window<'_>) -> TagResult<Self> {
        expect_guid(&header, &EXTENDED_CONTENT_DESCRIPTION_OBJECT)?;
        let count = w.read_u16::<LittleEndian>()?;
        let mut descriptors = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name_len = w.read_u16::<LittleEndian>()? as usize;
            let name = decode_text(w.read_bytes(name_len)?);
            let value_type = w.read_u16::<LittleEndian>()?;
            let value_len = w.read_u16::<LittleEndian>()? as usize;
            let at = w.position();
            let data = w.read_bytes(value_len)?;
            let value = AttributeValue::decode(value_type, data, ValueContext::Descriptor, at)?;
            descriptors.push((name, value));
        }
        debug!("Extended content description: {} descriptors", descriptors.len());
        Ok(Self {
            header: Some(header),
            descriptors,
        })
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u16::<LittleEndian>(u16_len(self.descriptors.len(), "descriptor count")?)?;
        for (name, value) in &self.descriptors {
            let name = encode_text(name);
            let data = value.encode(ValueContext::Descriptor);
            out.write_u16::<LittleEndian>(u16_len(name.len(), "descriptor name")?)?;
            out.extend_from_slice(&name);
            out.write_u16::<LittleEndian>(value.value_type() as u16)?;
            out.write_u16::<LittleEndian>(u16_len(data.len(), "descriptor value")?)?;
            out.extend_from_slice(&data);
        }
        Ok(out)
    }
}

// ─── Metadata / Metadata Library ────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataRecord {
    pub name: String,
    /// Always 0 in the metadata object.
    pub language: u16,
    pub stream: u16,
    pub value: AttributeValue,
}

/// The metadata object and the metadata library share one record layout;
/// only the library may carry a language index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataObject {
    pub header: Option<ObjectHeader>,
    pub library: bool,
    pub records: Vec<MetadataRecord>,
}

impl MetadataObject {
    pub fn new(library: bool) -> Self {
        Self {
            header: None,
            library,
            records: Vec::new(),
        }
    }

    pub fn guid(&self) -> Guid {
        if self.library {
            METADATA_LIBRARY_OBJECT
        } else {
            METADATA_OBJECT
        }
    }

    pub fn parse(header: ObjectHeader, w: &mut Window<'_>) -> TagResult<Self> {
        let library = header.guid == METADATA_LIBRARY_OBJECT;
        if !library {
            expect_guid(&header, &METADATA_OBJECT)?;
        }
        let count = w.read_u16::<LittleEndian>()?;
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let language = w.read_u16::<LittleEndian>()?;
            let stream = w.read_u16::<LittleEndian>()?;
            let name_len = w.read_u16::<LittleEndian>()? as usize;
            let value_type = w.read_u16::<LittleEndian>()?;
            let data_len = w.read_u32::<LittleEndian>()? as usize;
            let name = decode_text(w.read_bytes(name_len)?);
            let at = w.position();
            let data = w.read_bytes(data_len)?;
            let value = AttributeValue::decode(value_type, data, ValueContext::Record, at)?;
            records.push(MetadataRecord {
                name,
                language,
                stream,
                value,
            });
        }
        debug!(
            "{}: {} records",
            if library { "Metadata library" } else { "Metadata" },
            records.len()
        );
        Ok(Self {
            header: Some(header),
            library,
            records,
        })
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u16::<LittleEndian>(u16_len(self.records.len(), "metadata record count")?)?;
        for record in &self.records {
            let name = encode_text(&record.name);
            let data = record.value.encode(ValueContext::Record);
            let data_len = u32::try_from(data.len()).map_err(|_| {
                TagError::invalid_value(format!("metadata value of {} bytes", data.len()))
            })?;
            out.write_u16::<LittleEndian>(if self.library { record.language } else { 0 })?;
            out.write_u16::<LittleEndian>(record.stream)?;
            out.write_u16::<LittleEndian>(u16_len(name.len(), "metadata name")?)?;
            out.write_u16::<LittleEndian>(record.value.value_type() as u16)?;
            out.write_u32::<LittleEndian>(data_len)?;
            out.extend_from_slice(&name);
            out.extend_from_slice(&data);
        }
        Ok(out)
    }
}

// ─── Padding and opaque objects ─────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaddingObject {
    pub header: ObjectHeader,
    pub data: Vec<u8>,
}

impl PaddingObject {
    /// A zero-filled padding object of `total` bytes (header included).
    pub fn with_size(total: u64) -> TagResult<Self> {
        if total < OBJECT_HEADER_SIZE {
            return Err(TagError::invalid_value(format!(
                "padding object of {total} bytes is smaller than its header"
            )));
        }
        let mut header = ObjectHeader::new(PADDING_OBJECT);
        header.size = total;
        Ok(Self {
            header,
            data: vec![0; (total - OBJECT_HEADER_SIZE) as usize],
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownObject {
    pub header: ObjectHeader,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::HEADER_OBJECT;

    fn object(guid: &Guid, content: &[u8]) -> Vec<u8> {
        let mut out = guid.0.to_vec();
        out.extend_from_slice(&(content.len() as u64 + 24).to_le_bytes());
        out.extend_from_slice(content);
        out
    }

    fn parse_with<T>(
        bytes: &[u8],
        parse: impl FnOnce(ObjectHeader, &mut Window<'_>) -> TagResult<T>,
    ) -> TagResult<T> {
        let mut w = Window::new(bytes, 0);
        let header = ObjectHeader::parse(&mut w)?;
        parse(header, &mut w)
    }

    fn file_properties_content() -> Vec<u8> {
        let mut c = vec![0xAB; 16];
        for v in [1000u64, 1, 2, 50_000_000, 40_000_000, 3000] {
            c.extend_from_slice(&v.to_le_bytes());
        }
        for v in [2u32, 3200, 3200, 128_000] {
            c.extend_from_slice(&v.to_le_bytes());
        }
        c
    }

    #[test]
    fn test_file_properties_roundtrip() {
        let content = file_properties_content();
        let bytes = object(&FILE_PROPERTIES_OBJECT, &content);
        let props = FilePropertiesObject::from_bytes(&bytes, 0).unwrap();
        assert_eq!(props.file_size, 1000);
        assert_eq!(props.max_bitrate, 128_000);
        assert!((props.duration_seconds() - 2.0).abs() < 1e-9);
        assert_eq!(props.render_content().unwrap(), content);
    }

    #[test]
    fn test_file_properties_guid_mismatch_reads_nothing() {
        // Header GUID with a size claiming far more than is present: a
        // field read would fail differently, at a later offset.
        let mut bytes = HEADER_OBJECT.0.to_vec();
        bytes.extend_from_slice(&104u64.to_le_bytes());
        let err = FilePropertiesObject::from_bytes(&bytes, 500).unwrap_err();
        match err {
            TagError::CorruptFormat { offset, reason } => {
                assert_eq!(offset, 500);
                assert!(reason.contains("8CABDCA1"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_stream_properties() {
        let mut c = AUDIO_MEDIA.0.to_vec();
        c.extend_from_slice(&[0; 16]);
        c.extend_from_slice(&0u64.to_le_bytes());
        c.extend_from_slice(&4u32.to_le_bytes());
        c.extend_from_slice(&0u32.to_le_bytes());
        c.extend_from_slice(&0x0002u16.to_le_bytes());
        c.extend_from_slice(&0u32.to_le_bytes());
        c.extend_from_slice(&[0x61, 0x01, 0x02, 0x00]);
        let bytes = object(&STREAM_PROPERTIES_OBJECT, &c);
        let stream = parse_with(&bytes, StreamPropertiesObject::parse).unwrap();
        assert!(stream.is_audio());
        assert_eq!(stream.stream_number(), 2);
        assert_eq!(stream.type_specific, vec![0x61, 0x01, 0x02, 0x00]);
        assert_eq!(stream.render_content().unwrap(), c);
    }

    #[test]
    fn test_content_description() {
        let desc = ContentDescriptionObject {
            title: "Song".into(),
            rating: "G".into(),
            ..Default::default()
        };
        let content = desc.render_content().unwrap();
        assert_eq!(&content[..10], &[10, 0, 0, 0, 0, 0, 0, 0, 4, 0]);
        let bytes = object(&CONTENT_DESCRIPTION_OBJECT, &content);
        let parsed = parse_with(&bytes, ContentDescriptionObject::parse).unwrap();
        assert_eq!(parsed.title, "Song");
        assert_eq!(parsed.rating, "G");
        assert!(parsed.author.is_empty());
    }

    #[test]
    fn test_extended_content_description() {
        let ecd = ExtendedContentDescriptionObject {
            header: None,
            descriptors: vec![
                ("WM/AlbumTitle".into(), AttributeValue::Unicode("Album".into())),
                ("IsVBR".into(), AttributeValue::Bool(true)),
            ],
        };
        let content = ecd.render_content().unwrap();
        let bytes = object(&EXTENDED_CONTENT_DESCRIPTION_OBJECT, &content);
        let parsed = parse_with(&bytes, ExtendedContentDescriptionObject::parse).unwrap();
        assert_eq!(parsed.descriptors, ecd.descriptors);
    }

    #[test]
    fn test_metadata_library_keeps_language() {
        let mut lib = MetadataObject::new(true);
        lib.records.push(MetadataRecord {
            name: "WM/Lyrics".into(),
            language: 3,
            stream: 0,
            value: AttributeValue::Unicode("la".into()),
        });
        let bytes = object(&lib.guid(), &lib.render_content().unwrap());
        let parsed = parse_with(&bytes, MetadataObject::parse).unwrap();
        assert!(parsed.library);
        assert_eq!(parsed.records, lib.records);
    }

    #[test]
    fn test_metadata_record_overrun_is_corrupt() {
        let mut c = 1u16.to_le_bytes().to_vec();
        c.extend_from_slice(&[0, 0, 1, 0, 2, 0, 3, 0]);
        c.extend_from_slice(&100u32.to_le_bytes());
        c.extend_from_slice(&[b'a', 0]);
        let bytes = object(&METADATA_OBJECT, &c);
        assert!(parse_with(&bytes, MetadataObject::parse)
            .unwrap_err()
            .is_corrupt());
    }

    #[test]
    fn test_padding_size() {
        assert_eq!(PaddingObject::with_size(30).unwrap().data.len(), 6);
        assert!(PaddingObject::with_size(23).is_err());
    }
}
