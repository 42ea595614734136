//! File-level reading and saving.
//!
//! An ASF file starts with the header object; everything after it (data
//! object, indexes) is never parsed. Saving rebuilds the header object and
//! commits it with one `insert` over the old one.

use mt_common::{ByteStore, TagConfig, TagError, TagResult, Window};
use tracing::{debug, info};

use crate::guid::HEADER_OBJECT;
use crate::object::{expect_guid, ObjectHeader, OBJECT_HEADER_SIZE};
use crate::objects::{FilePropertiesObject, PaddingObject};
use crate::tag::AsfTag;
use crate::tree::{AsfObject, HeaderObject, ObjectFactory, HEADER_PREFIX_SIZE};

#[derive(Clone, Debug)]
pub struct AsfFile {
    header: HeaderObject,
    factory: ObjectFactory,
}

impl AsfFile {
    pub fn read<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Self> {
        Self::read_with(store, ObjectFactory::new())
    }

    /// Read with a factory that may carry registered object creators. The
    /// factory is kept for the re-read after [`AsfFile::save`].
    pub fn read_with<S: ByteStore + ?Sized>(
        store: &mut S,
        factory: ObjectFactory,
    ) -> TagResult<Self> {
        let len = store.len()?;
        if len < OBJECT_HEADER_SIZE + HEADER_PREFIX_SIZE {
            return Err(TagError::corrupt(0, format!("{len} bytes is too short for ASF")));
        }
        let head = store.read_exact_at(0, OBJECT_HEADER_SIZE as usize)?;
        let object = ObjectHeader::parse(&mut Window::new(&head, 0))?;
        expect_guid(&object, &HEADER_OBJECT)?;
        if object.size > len {
            return Err(TagError::corrupt(
                0,
                format!("header object declares {} bytes, file has {}", object.size, len),
            ));
        }
        let size = usize::try_from(object.size).map_err(|_| {
            TagError::unsupported(format!("header object of {} bytes", object.size))
        })?;
        let data = store.read_exact_at(0, size)?;
        let header = HeaderObject::parse(&factory, &mut Window::new(&data, 0))?;
        info!(
            header_size = object.size,
            objects = header.children.len(),
            "Read ASF header"
        );
        Ok(Self { header, factory })
    }

    pub fn header(&self) -> &HeaderObject {
        &self.header
    }

    pub fn file_properties(&self) -> Option<&FilePropertiesObject> {
        self.header.file_properties()
    }

    pub fn tag(&self) -> AsfTag {
        AsfTag::from_header(&self.header)
    }

    /// Write `tag` into the header object and refresh from the store.
    pub fn save<S: ByteStore + ?Sized>(
        &mut self,
        store: &mut S,
        tag: &AsfTag,
        config: &TagConfig,
    ) -> TagResult<()> {
        config.validate()?;
        let old_size = self.header.header.size;
        let mut header = self.header.clone();
        header
            .children
            .retain(|c| !matches!(c, AsfObject::Padding(_)));
        tag.apply_to(&mut header)?;

        let natural = header.render()?.len() as u64;
        let padding = if natural == old_size {
            0
        } else if natural + OBJECT_HEADER_SIZE <= old_size
            && old_size - natural <= config.max_padding
        {
            old_size - natural
        } else if config.asf_padding >= OBJECT_HEADER_SIZE {
            config.asf_padding
        } else {
            0
        };
        if padding > 0 {
            header
                .children
                .push(AsfObject::Padding(PaddingObject::with_size(padding)?));
        }

        let new_size = natural + padding;
        let new_len = store.len()? - old_size + new_size;
        if let Some(props) = header.file_properties_mut() {
            if props.is_broadcast() {
                debug!("Broadcast file, leaving file size unset");
            } else {
                props.file_size = new_len;
            }
        }

        let bytes = header.render()?;
        if bytes.len() as u64 == old_size {
            store.write_at(0, &bytes)?;
        } else {
            store.insert(&bytes, 0, old_size)?;
        }
        info!(
            old_size,
            new_size = bytes.len(),
            padding,
            file_size = new_len,
            "Saved ASF tag"
        );

        *self = Self::read_with(store, self.factory.clone())?;
        Ok(())
    }
}

pub fn read_tag<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<AsfTag> {
    Ok(AsfFile::read(store)?.tag())
}

pub fn save_tag<S: ByteStore + ?Sized>(
    store: &mut S,
    tag: &AsfTag,
    config: &TagConfig,
) -> TagResult<()> {
    AsfFile::read(store)?.save(store, tag, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{Guid, CONTENT_DESCRIPTION_OBJECT, DATA_OBJECT, FILE_PROPERTIES_OBJECT};
    use crate::objects::ContentDescriptionObject;
    use mt_common::BasicTag;
    use std::io::Cursor;

    fn object(guid: &Guid, content: &[u8]) -> Vec<u8> {
        let mut out = guid.0.to_vec();
        out.extend_from_slice(&(content.len() as u64 + 24).to_le_bytes());
        out.extend_from_slice(content);
        out
    }

    fn file_properties(file_size: u64) -> Vec<u8> {
        let mut c = vec![0x11; 16];
        for v in [file_size, 0, 1, 0, 0, 0] {
            c.extend_from_slice(&v.to_le_bytes());
        }
        for v in [2u32, 100, 100, 0] {
            c.extend_from_slice(&v.to_le_bytes());
        }
        object(&FILE_PROPERTIES_OBJECT, &c)
    }

    fn sample(title: &str) -> Vec<u8> {
        let desc = ContentDescriptionObject {
            title: title.into(),
            ..Default::default()
        };
        let cd = object(&CONTENT_DESCRIPTION_OBJECT, &desc.render_content().unwrap());
        let build = |file_size: u64| {
            let children = [file_properties(file_size), cd.clone()];
            let mut content = (children.len() as u32).to_le_bytes().to_vec();
            content.extend_from_slice(&[1, 2]);
            content.extend_from_slice(&children.concat());
            let mut file = object(&HEADER_OBJECT, &content);
            file.extend_from_slice(&object(&DATA_OBJECT, &[0xDD; 26]));
            file
        };
        let len = build(0).len() as u64;
        build(len)
    }

    #[test]
    fn test_read_tag() {
        let mut store = Cursor::new(sample("Song"));
        let asf = AsfFile::read(&mut store).unwrap();
        assert_eq!(asf.tag().title().as_deref(), Some("Song"));
        assert_eq!(asf.file_properties().unwrap().file_size, store.get_ref().len() as u64);
    }

    #[test]
    fn test_not_asf_is_corrupt() {
        let mut store = Cursor::new(vec![0u8; 64]);
        assert!(AsfFile::read(&mut store).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_same_size_overwrite() {
        let original = sample("Song");
        let mut store = Cursor::new(original.clone());
        let mut tag = read_tag(&mut store).unwrap();
        tag.set_title(Some("Tune"));
        save_tag(&mut store, &tag, &TagConfig::default()).unwrap();
        assert_eq!(store.get_ref().len(), original.len());
        assert_eq!(read_tag(&mut store).unwrap().title().as_deref(), Some("Tune"));
    }

    #[test]
    fn test_shrink_pads_to_original_size() {
        let original = sample("A rather long title for a song");
        let mut store = Cursor::new(original.clone());
        let mut asf = AsfFile::read(&mut store).unwrap();
        let mut tag = asf.tag();
        tag.set_title(Some("Short"));
        asf.save(&mut store, &tag, &TagConfig::default()).unwrap();

        assert_eq!(store.get_ref().len(), original.len());
        assert!(matches!(
            asf.header().children.last(),
            Some(AsfObject::Padding(p)) if p.header.size == 50
        ));
        assert_eq!(asf.tag().title().as_deref(), Some("Short"));
    }

    #[test]
    fn test_grow_reserves_padding_and_updates_file_size() {
        let original = sample("A");
        let mut store = Cursor::new(original.clone());
        let mut asf = AsfFile::read(&mut store).unwrap();
        let mut tag = asf.tag();
        tag.set_album(Some("Album"));
        let config = TagConfig {
            asf_padding: 100,
            ..TagConfig::default()
        };
        asf.save(&mut store, &tag, &config).unwrap();

        let len = store.get_ref().len() as u64;
        assert!(len > original.len() as u64 + 100);
        assert_eq!(asf.file_properties().unwrap().file_size, len);
        assert_eq!(&store.get_ref()[len as usize - 26..], &[0xDD; 26]);
        assert_eq!(asf.tag().album().as_deref(), Some("Album"));
    }
}
