//! The header object tree.
//!
//! The header object holds a flat list of objects; the header extension
//! object holds a second list. [`ObjectFactory`] asks its registered
//! [`ObjectCreator`]s first, then picks the variant from the GUID; anything
//! nobody knows is kept as [`UnknownObject`] bytes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use mt_common::{TagError, TagResult, Window};
use tracing::{debug, trace, warn};

use crate::guid::{
    Guid, CONTENT_DESCRIPTION_OBJECT, EXTENDED_CONTENT_DESCRIPTION_OBJECT,
    FILE_PROPERTIES_OBJECT, HEADER_EXTENSION_OBJECT, HEADER_EXTENSION_RESERVED, HEADER_OBJECT,
    METADATA_LIBRARY_OBJECT, METADATA_OBJECT, PADDING_OBJECT, STREAM_PROPERTIES_OBJECT,
};
use crate::object::{expect_guid, write_object, ObjectHeader, OBJECT_HEADER_SIZE};
use crate::objects::{
    ContentDescriptionObject, ExtendedContentDescriptionObject, FilePropertiesObject,
    MetadataObject, PaddingObject, StreamPropertiesObject, UnknownObject,
};

/// Header object content before the first child: count and two reserved bytes.
pub const HEADER_PREFIX_SIZE: u64 = 6;
/// Header extension content before its data: reserved GUID, u16, data size.
pub const EXTENSION_PREFIX_SIZE: u64 = 22;

// ─── Extension points ───────────────────────────────────────────────

/// An object type supplied by the host through an [`ObjectCreator`].
pub trait CustomObject: fmt::Debug + Send + Sync {
    fn guid(&self) -> Guid;
    /// Header the object was read with, if any.
    fn source_header(&self) -> Option<&ObjectHeader>;
    /// Content bytes without the 24-byte object header.
    fn render_content(&self) -> TagResult<Vec<u8>>;
    fn clone_box(&self) -> Box<dyn CustomObject>;
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn CustomObject> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Consulted before the built-in table. Returning `None` passes the object on.
pub trait ObjectCreator: Send + Sync {
    fn create(
        &self,
        header: &ObjectHeader,
        content: &[u8],
        in_extension: bool,
    ) -> Option<TagResult<AsfObject>>;
}

impl<F> ObjectCreator for F
where
    F: Fn(&ObjectHeader, &[u8], bool) -> Option<TagResult<AsfObject>> + Send + Sync,
{
    fn create(
        &self,
        header: &ObjectHeader,
        content: &[u8],
        in_extension: bool,
    ) -> Option<TagResult<AsfObject>> {
        self(header, content, in_extension)
    }
}

// ─── Objects ────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub enum AsfObject {
    HeaderExtension(HeaderExtensionObject),
    FileProperties(FilePropertiesObject),
    StreamProperties(StreamPropertiesObject),
    ContentDescription(ContentDescriptionObject),
    ExtendedContentDescription(ExtendedContentDescriptionObject),
    Metadata(MetadataObject),
    Padding(PaddingObject),
    Unknown(UnknownObject),
    Custom(Box<dyn CustomObject>),
}

impl AsfObject {
    pub fn guid(&self) -> Guid {
        match self {
            Self::HeaderExtension(_) => HEADER_EXTENSION_OBJECT,
            Self::FileProperties(_) => FILE_PROPERTIES_OBJECT,
            Self::StreamProperties(_) => STREAM_PROPERTIES_OBJECT,
            Self::ContentDescription(_) => CONTENT_DESCRIPTION_OBJECT,
            Self::ExtendedContentDescription(_) => EXTENDED_CONTENT_DESCRIPTION_OBJECT,
            Self::Metadata(o) => o.guid(),
            Self::Padding(_) => PADDING_OBJECT,
            Self::Unknown(o) => o.header.guid,
            Self::Custom(o) => o.guid(),
        }
    }

    /// The header this object was parsed with, if it came from a file.
    pub fn source_header(&self) -> Option<&ObjectHeader> {
        match self {
            Self::HeaderExtension(o) => Some(&o.header),
            Self::FileProperties(o) => Some(&o.header),
            Self::StreamProperties(o) => Some(&o.header),
            Self::ContentDescription(o) => o.header.as_ref(),
            Self::ExtendedContentDescription(o) => o.header.as_ref(),
            Self::Metadata(o) => o.header.as_ref(),
            Self::Padding(o) => Some(&o.header),
            Self::Unknown(o) => Some(&o.header),
            Self::Custom(o) => o.source_header(),
        }
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        match self {
            Self::HeaderExtension(o) => o.render_content(),
            Self::FileProperties(o) => o.render_content(),
            Self::StreamProperties(o) => o.render_content(),
            Self::ContentDescription(o) => o.render_content(),
            Self::ExtendedContentDescription(o) => o.render_content(),
            Self::Metadata(o) => o.render_content(),
            Self::Padding(o) => Ok(o.data.clone()),
            Self::Unknown(o) => Ok(o.data.clone()),
            Self::Custom(o) => o.render_content(),
        }
    }

    pub fn render(&self) -> TagResult<Vec<u8>> {
        let content = self.render_content()?;
        let guid = self.guid();
        trace!(
            "Rendered {} ({} content bytes)",
            guid.name().unwrap_or("unknown object"),
            content.len()
        );
        write_object(&guid, &content)
    }
}

fn render_list(prefix: &[u8], children: &[AsfObject], trailing: &[u8]) -> TagResult<Vec<u8>> {
    let mut out = prefix.to_vec();
    for child in children {
        out.extend_from_slice(&child.render()?);
    }
    out.extend_from_slice(trailing);
    Ok(out)
}

// ─── Containers ─────────────────────────────────────────────────────

/// Root of an ASF file's metadata.
#[derive(Clone, Debug)]
pub struct HeaderObject {
    pub header: ObjectHeader,
    pub reserved: [u8; 2],
    pub children: Vec<AsfObject>,
    pub trailing: Vec<u8>,
}

impl HeaderObject {
    pub fn parse(factory: &ObjectFactory, w: &mut Window<'_>) -> TagResult<Self> {
        let header = ObjectHeader::parse(w)?;
        expect_guid(&header, &HEADER_OBJECT)?;
        let len = content_len(&header, w)?;
        let mut content = w.sub_window(len)?;
        let declared = content.read_u32::<LittleEndian>()?;
        let reserved = content.read_array::<2>()?;
        let (children, trailing) = factory.read_objects(&mut content, false)?;
        if children.len() != declared as usize {
            warn!(
                declared,
                found = children.len(),
                "Header object child count mismatch"
            );
        }
        debug!("Header object: {} children", children.len());
        Ok(Self {
            header,
            reserved,
            children,
            trailing,
        })
    }

    pub fn render(&self) -> TagResult<Vec<u8>> {
        let mut prefix = Vec::with_capacity(HEADER_PREFIX_SIZE as usize);
        prefix.write_u32::<LittleEndian>(self.children.len() as u32)?;
        prefix.extend_from_slice(&self.reserved);
        write_object(
            &HEADER_OBJECT,
            &render_list(&prefix, &self.children, &self.trailing)?,
        )
    }

    pub fn find(&self, guid: &Guid) -> Option<&AsfObject> {
        self.children.iter().find(|c| c.guid() == *guid)
    }

    pub fn extension(&self) -> Option<&HeaderExtensionObject> {
        self.children.iter().find_map(|c| match c {
            AsfObject::HeaderExtension(e) => Some(e),
            _ => None,
        })
    }

    pub fn extension_mut(&mut self) -> Option<&mut HeaderExtensionObject> {
        self.children.iter_mut().find_map(|c| match c {
            AsfObject::HeaderExtension(e) => Some(e),
            _ => None,
        })
    }

    pub fn file_properties(&self) -> Option<&FilePropertiesObject> {
        self.children.iter().find_map(|c| match c {
            AsfObject::FileProperties(p) => Some(p),
            _ => None,
        })
    }

    pub fn file_properties_mut(&mut self) -> Option<&mut FilePropertiesObject> {
        self.children.iter_mut().find_map(|c| match c {
            AsfObject::FileProperties(p) => Some(p),
            _ => None,
        })
    }

    pub fn streams(&self) -> impl Iterator<Item = &StreamPropertiesObject> {
        self.children.iter().filter_map(|c| match c {
            AsfObject::StreamProperties(s) => Some(s),
            _ => None,
        })
    }
}

#[derive(Clone, Debug)]
pub struct HeaderExtensionObject {
    pub header: ObjectHeader,
    pub reserved_guid: Guid,
    pub reserved: u16,
    pub children: Vec<AsfObject>,
    /// Bytes inside the data block after the last child.
    pub trailing: Vec<u8>,
    /// Bytes after the data block, outside the declared data size.
    pub after_data: Vec<u8>,
}

impl Default for HeaderExtensionObject {
    fn default() -> Self {
        Self {
            header: ObjectHeader::new(HEADER_EXTENSION_OBJECT),
            reserved_guid: HEADER_EXTENSION_RESERVED,
            reserved: 6,
            children: Vec::new(),
            trailing: Vec::new(),
            after_data: Vec::new(),
        }
    }
}

impl HeaderExtensionObject {
    pub fn parse(
        factory: &ObjectFactory,
        header: ObjectHeader,
        w: &mut Window<'_>,
    ) -> TagResult<Self> {
        expect_guid(&header, &HEADER_EXTENSION_OBJECT)?;
        let reserved_guid = Guid::read(w)?;
        let reserved = w.read_u16::<LittleEndian>()?;
        let data_size = w.read_u32::<LittleEndian>()? as usize;
        if data_size > w.remaining() {
            return Err(TagError::corrupt(
                header.offset,
                format!(
                    "header extension declares {} data bytes, only {} remain",
                    data_size,
                    w.remaining()
                ),
            ));
        }
        let mut data = w.sub_window(data_size)?;
        let (children, trailing) = factory.read_objects(&mut data, true)?;
        let after_data = w.rest().to_vec();
        if !after_data.is_empty() {
            debug!("{} bytes after the header extension data", after_data.len());
        }
        Ok(Self {
            header,
            reserved_guid,
            reserved,
            children,
            trailing,
            after_data,
        })
    }

    pub fn render_content(&self) -> TagResult<Vec<u8>> {
        let body = render_list(&[], &self.children, &self.trailing)?;
        let data_size = u32::try_from(body.len()).map_err(|_| {
            TagError::invalid_value(format!("header extension data of {} bytes", body.len()))
        })?;
        let mut out = Vec::with_capacity(
            EXTENSION_PREFIX_SIZE as usize + body.len() + self.after_data.len(),
        );
        out.extend_from_slice(self.reserved_guid.as_bytes());
        out.write_u16::<LittleEndian>(self.reserved)?;
        out.write_u32::<LittleEndian>(data_size)?;
        out.extend_from_slice(&body);
        out.extend_from_slice(&self.after_data);
        Ok(out)
    }
}

// ─── Factory ────────────────────────────────────────────────────────

fn content_len(header: &ObjectHeader, w: &Window<'_>) -> TagResult<usize> {
    let content = header.content_size();
    if content > w.remaining() as u64 {
        return Err(TagError::corrupt(
            header.offset,
            format!(
                "{} object declares {} bytes, only {} remain",
                header.guid.name().unwrap_or("unknown"),
                header.size,
                w.remaining() as u64 + OBJECT_HEADER_SIZE
            ),
        ));
    }
    Ok(content as usize)
}

/// Maps an object GUID to its typed variant.
#[derive(Clone, Default)]
pub struct ObjectFactory {
    creators: Vec<Arc<dyn ObjectCreator>>,
}

impl fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectFactory")
            .field("creators", &self.creators.len())
            .finish()
    }
}

impl ObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_creator<C: ObjectCreator + 'static>(&mut self, creator: C) {
        self.creators.push(Arc::new(creator));
    }

    pub fn with_creator<C: ObjectCreator + 'static>(mut self, creator: C) -> Self {
        self.add_creator(creator);
        self
    }

    pub fn creator_count(&self) -> usize {
        self.creators.len()
    }

    /// Parse one object. It must fit in what is left of `w`.
    pub fn parse_object(&self, w: &mut Window<'_>, in_extension: bool) -> TagResult<AsfObject> {
        let header = ObjectHeader::parse(w)?;
        let len = content_len(&header, w)?;
        let mut content = w.sub_window(len)?;
        self.create(header, &mut content, in_extension)
    }

    /// Read objects until fewer than 24 bytes remain. Returns the objects
    /// and any trailing bytes.
    pub fn read_objects(
        &self,
        w: &mut Window<'_>,
        in_extension: bool,
    ) -> TagResult<(Vec<AsfObject>, Vec<u8>)> {
        let mut objects = Vec::new();
        while w.remaining() as u64 >= OBJECT_HEADER_SIZE {
            objects.push(self.parse_object(w, in_extension)?);
        }
        let trailing = w.rest().to_vec();
        if !trailing.is_empty() {
            debug!("{} trailing bytes after object list", trailing.len());
        }
        Ok((objects, trailing))
    }

    pub fn create(
        &self,
        header: ObjectHeader,
        content: &mut Window<'_>,
        in_extension: bool,
    ) -> TagResult<AsfObject> {
        let guid = header.guid;
        if !self.creators.is_empty() {
            let raw = content.clone().rest();
            for creator in &self.creators {
                if let Some(result) = creator.create(&header, raw, in_extension) {
                    debug!("Object {} built by registered creator", guid);
                    return result;
                }
            }
        }

        let object = if guid == HEADER_EXTENSION_OBJECT && !in_extension {
            AsfObject::HeaderExtension(HeaderExtensionObject::parse(self, header, content)?)
        } else if guid == FILE_PROPERTIES_OBJECT {
            AsfObject::FileProperties(FilePropertiesObject::parse(header, content)?)
        } else if guid == STREAM_PROPERTIES_OBJECT {
            AsfObject::StreamProperties(StreamPropertiesObject::parse(header, content)?)
        } else if guid == CONTENT_DESCRIPTION_OBJECT {
            AsfObject::ContentDescription(ContentDescriptionObject::parse(header, content)?)
        } else if guid == EXTENDED_CONTENT_DESCRIPTION_OBJECT {
            AsfObject::ExtendedContentDescription(ExtendedContentDescriptionObject::parse(
                header, content,
            )?)
        } else if (guid == METADATA_OBJECT || guid == METADATA_LIBRARY_OBJECT) && in_extension {
            AsfObject::Metadata(MetadataObject::parse(header, content)?)
        } else if guid == PADDING_OBJECT {
            AsfObject::Padding(PaddingObject {
                header,
                data: content.rest().to_vec(),
            })
        } else {
            AsfObject::Unknown(UnknownObject {
                header,
                data: content.rest().to_vec(),
            })
        };
        trace!(
            "Created {} ({})",
            guid,
            guid.name().unwrap_or("unknown")
        );
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeValue;
    use crate::objects::MetadataRecord;

    fn object(guid: &Guid, content: &[u8]) -> Vec<u8> {
        let mut out = guid.0.to_vec();
        out.extend_from_slice(&(content.len() as u64 + 24).to_le_bytes());
        out.extend_from_slice(content);
        out
    }

    fn header_object(children: &[Vec<u8>], count: u32) -> Vec<u8> {
        let mut content = count.to_le_bytes().to_vec();
        content.extend_from_slice(&[1, 2]);
        for child in children {
            content.extend_from_slice(child);
        }
        object(&HEADER_OBJECT, &content)
    }

    fn extension(children: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = children.concat();
        let mut content = HEADER_EXTENSION_RESERVED.0.to_vec();
        content.extend_from_slice(&6u16.to_le_bytes());
        content.extend_from_slice(&(body.len() as u32).to_le_bytes());
        content.extend_from_slice(&body);
        object(&HEADER_EXTENSION_OBJECT, &content)
    }

    fn parse(bytes: &[u8]) -> TagResult<HeaderObject> {
        HeaderObject::parse(&ObjectFactory::new(), &mut Window::new(bytes, 0))
    }

    #[test]
    fn test_unknown_objects_roundtrip() {
        let unknown = object(&Guid([7; 16]), &[1, 2, 3]);
        let padding = object(&PADDING_OBJECT, &[0; 10]);
        let bytes = header_object(&[unknown, padding], 2);
        let header = parse(&bytes).unwrap();
        assert!(matches!(header.children[0], AsfObject::Unknown(_)));
        assert!(matches!(header.children[1], AsfObject::Padding(_)));
        assert_eq!(header.render().unwrap(), bytes);
    }

    #[test]
    fn test_extension_children() {
        let mut meta = MetadataObject::new(false);
        meta.records.push(MetadataRecord {
            name: "n".into(),
            language: 0,
            stream: 1,
            value: AttributeValue::Word(9),
        });
        let meta_bytes = AsfObject::Metadata(meta).render().unwrap();
        let bytes = header_object(&[extension(&[meta_bytes])], 1);
        let header = parse(&bytes).unwrap();
        let ext = header.extension().unwrap();
        assert!(matches!(&ext.children[0], AsfObject::Metadata(m) if m.records.len() == 1));
        assert_eq!(header.render().unwrap(), bytes);
    }

    #[test]
    fn test_metadata_outside_extension_is_opaque() {
        let meta = object(&METADATA_OBJECT, &[0, 0]);
        let header = parse(&header_object(&[meta], 1)).unwrap();
        assert!(matches!(header.children[0], AsfObject::Unknown(_)));
    }

    #[test]
    fn test_child_larger_than_header_is_corrupt() {
        let mut child = object(&Guid([7; 16]), &[0; 4]);
        child[16] = 200;
        let err = parse(&header_object(&[child], 1)).unwrap_err();
        match err {
            TagError::CorruptFormat { offset, .. } => assert_eq!(offset, 30),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_extension_data_size_overrun_is_corrupt() {
        let mut ext = extension(&[]);
        ext[24 + 18] = 50;
        let err = parse(&header_object(&[ext], 1)).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_not_a_header_object() {
        let bytes = object(&PADDING_OBJECT, &[0; 6]);
        assert!(parse(&bytes).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_bytes_after_extension_data_stay_outside_it() {
        let mut content = HEADER_EXTENSION_RESERVED.0.to_vec();
        content.extend_from_slice(&6u16.to_le_bytes());
        content.extend_from_slice(&0u32.to_le_bytes());
        content.extend_from_slice(&[0xAB; 3]);
        let bytes = header_object(&[object(&HEADER_EXTENSION_OBJECT, &content)], 1);
        let header = parse(&bytes).unwrap();
        let ext = header.extension().unwrap();
        assert!(ext.trailing.is_empty());
        assert_eq!(ext.after_data, vec![0xAB; 3]);
        assert_eq!(header.render().unwrap(), bytes);
    }

    #[derive(Clone, Debug)]
    struct Tagged {
        header: ObjectHeader,
        body: Vec<u8>,
    }

    impl CustomObject for Tagged {
        fn guid(&self) -> Guid {
            self.header.guid
        }
        fn source_header(&self) -> Option<&ObjectHeader> {
            Some(&self.header)
        }
        fn render_content(&self) -> TagResult<Vec<u8>> {
            Ok(self.body.iter().rev().copied().collect())
        }
        fn clone_box(&self) -> Box<dyn CustomObject> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_registered_creator_wins_over_builtin() {
        let factory = ObjectFactory::new().with_creator(
            |header: &ObjectHeader, content: &[u8], _: bool| -> Option<TagResult<AsfObject>> {
                (header.guid == PADDING_OBJECT).then(|| {
                    Ok(AsfObject::Custom(Box::new(Tagged {
                        header: header.clone(),
                        body: content.iter().rev().copied().collect(),
                    })))
                })
            },
        );
        assert_eq!(factory.creator_count(), 1);

        let padding = object(&PADDING_OBJECT, &[1, 2, 3]);
        let other = object(&Guid([7; 16]), &[4]);
        let bytes = header_object(&[padding, other], 2);
        let header = HeaderObject::parse(&factory, &mut Window::new(&bytes, 0)).unwrap();

        let AsfObject::Custom(custom) = &header.children[0] else {
            panic!("expected a custom object, got {:?}", header.children[0]);
        };
        let tagged = custom.as_any().downcast_ref::<Tagged>().unwrap();
        assert_eq!(tagged.body, vec![3, 2, 1]);
        assert_eq!(header.children[0].guid(), PADDING_OBJECT);
        assert!(matches!(header.children[1], AsfObject::Unknown(_)));
        assert_eq!(header.render().unwrap(), bytes);
    }

    #[test]
    fn test_render_rewrites_child_count() {
        let bytes = header_object(&[object(&Guid([7; 16]), &[])], 5);
        let header = parse(&bytes).unwrap();
        let rendered = header.render().unwrap();
        assert_eq!(&rendered[24..28], &1u32.to_le_bytes());
    }
}
