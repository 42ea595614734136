use std::io::Cursor;

use mt_asf::guid::{
    DATA_OBJECT, FILE_PROPERTIES_OBJECT, HEADER_EXTENSION_OBJECT, HEADER_EXTENSION_RESERVED,
    HEADER_OBJECT, METADATA_LIBRARY_OBJECT, STREAM_PROPERTIES_OBJECT,
};
use mt_asf::objects::FilePropertiesObject;
use mt_asf::{
    read_tag, save_tag, AsfFile, AsfObject, Attribute, AttributeValue, CustomObject, Guid,
    ObjectFactory, ObjectHeader, TagError, TagResult,
};
use mt_common::{BasicTag, TagConfig};

fn object(guid: &Guid, content: &[u8]) -> Vec<u8> {
    let mut out = guid.0.to_vec();
    out.extend_from_slice(&(content.len() as u64 + 24).to_le_bytes());
    out.extend_from_slice(content);
    out
}

fn file_properties(file_size: u64) -> Vec<u8> {
    let mut c = vec![0x42; 16];
    for v in [file_size, 0, 10, 30_000_000, 0, 0] {
        c.extend_from_slice(&v.to_le_bytes());
    }
    for v in [2u32, 200, 200, 64_000] {
        c.extend_from_slice(&v.to_le_bytes());
    }
    object(&FILE_PROPERTIES_OBJECT, &c)
}

fn stream_properties() -> Vec<u8> {
    let mut c = mt_asf::guid::AUDIO_MEDIA.0.to_vec();
    c.extend_from_slice(&[0; 16]);
    c.extend_from_slice(&0u64.to_le_bytes());
    c.extend_from_slice(&2u32.to_le_bytes());
    c.extend_from_slice(&0u32.to_le_bytes());
    c.extend_from_slice(&1u16.to_le_bytes());
    c.extend_from_slice(&0u32.to_le_bytes());
    c.extend_from_slice(&[0x61, 0x01]);
    object(&STREAM_PROPERTIES_OBJECT, &c)
}

fn extension(children: &[Vec<u8>]) -> Vec<u8> {
    let body = children.concat();
    let mut c = HEADER_EXTENSION_RESERVED.0.to_vec();
    c.extend_from_slice(&6u16.to_le_bytes());
    c.extend_from_slice(&(body.len() as u32).to_le_bytes());
    c.extend_from_slice(&body);
    object(&HEADER_EXTENSION_OBJECT, &c)
}

/// Header with file and stream properties, an opaque object and an
/// extension holding another opaque object, then a data object.
fn sample_file() -> Vec<u8> {
    let opaque = object(&Guid([0x5A; 16]), b"vendor");
    let nested = object(&Guid([0x6B; 16]), &[1, 2, 3, 4]);
    let build = |file_size: u64| {
        let children = [
            file_properties(file_size),
            stream_properties(),
            opaque.clone(),
            extension(&[nested.clone()]),
        ];
        let mut c = (children.len() as u32).to_le_bytes().to_vec();
        c.extend_from_slice(&[1, 2]);
        c.extend_from_slice(&children.concat());
        let mut file = object(&HEADER_OBJECT, &c);
        file.extend_from_slice(&object(&DATA_OBJECT, &[0xEE; 40]));
        file
    };
    let len = build(0).len() as u64;
    build(len)
}

#[test]
fn file_properties_guid_mismatch_is_corrupt() {
    // A stream properties object handed to the file properties parser.
    let bytes = stream_properties();
    let err = FilePropertiesObject::from_bytes(&bytes, 0).unwrap_err();
    assert!(matches!(err, TagError::CorruptFormat { offset: 0, .. }));
}

#[test]
fn empty_file_has_empty_tag() {
    let mut store = Cursor::new(sample_file());
    let asf = AsfFile::read(&mut store).unwrap();
    assert!(asf.tag().is_empty());
    assert_eq!(asf.header().streams().count(), 1);
    assert!(asf.header().streams().all(|s| s.is_audio()));
    assert!((asf.file_properties().unwrap().duration_seconds() - 3.0).abs() < 1e-9);
}

#[test]
fn save_keeps_unknown_objects_and_routes_attributes() {
    let original = sample_file();
    let mut store = Cursor::new(original.clone());

    let mut tag = read_tag(&mut store).unwrap();
    tag.set_title(Some("Title"));
    tag.set_artist(Some("Artist"));
    tag.set_track(Some(9));
    tag.add_attribute(
        "WM/MediaClassPrimaryID",
        Attribute::new(AttributeValue::Guid(Guid([0x77; 16]))),
    );
    tag.add_attribute("Rating", Attribute::from("5").with_stream(1));
    save_tag(&mut store, &tag, &TagConfig::default()).unwrap();

    let asf = AsfFile::read(&mut store).unwrap();
    let len = store.get_ref().len() as u64;
    assert_eq!(asf.file_properties().unwrap().file_size, len);
    assert_eq!(&store.get_ref()[len as usize - 40..], &[0xEE; 40]);

    // Opaque objects survive byte for byte.
    let opaque = asf.header().find(&Guid([0x5A; 16])).unwrap();
    assert!(matches!(opaque, AsfObject::Unknown(u) if u.data == b"vendor"));
    let ext = asf.header().extension().unwrap();
    assert!(ext
        .children
        .iter()
        .any(|c| matches!(c, AsfObject::Unknown(u) if u.header.guid == Guid([0x6B; 16]))));
    assert!(ext
        .children
        .iter()
        .any(|c| c.guid() == METADATA_LIBRARY_OBJECT));

    let back = asf.tag();
    assert_eq!(back.title().as_deref(), Some("Title"));
    assert_eq!(back.artist().as_deref(), Some("Artist"));
    assert_eq!(back.track(), Some(9));
    assert_eq!(back.attribute("Rating").unwrap().stream, 1);
    assert_eq!(
        back.attribute("WM/MediaClassPrimaryID").unwrap().value.to_guid(),
        Some(Guid([0x77; 16]))
    );
}

#[test]
fn second_small_edit_reuses_padding() {
    let mut store = Cursor::new(sample_file());
    let mut tag = read_tag(&mut store).unwrap();
    tag.set_album(Some("Album"));
    save_tag(&mut store, &tag, &TagConfig::default()).unwrap();
    let len = store.get_ref().len();

    tag.set_genre(Some("Ambient"));
    save_tag(&mut store, &tag, &TagConfig::default()).unwrap();
    assert_eq!(store.get_ref().len(), len);
    assert_eq!(read_tag(&mut store).unwrap().genre().as_deref(), Some("Ambient"));
}

#[derive(Clone, Debug)]
struct Vendor {
    header: ObjectHeader,
    payload: Vec<u8>,
}

impl CustomObject for Vendor {
    fn guid(&self) -> Guid {
        self.header.guid
    }

    fn source_header(&self) -> Option<&ObjectHeader> {
        Some(&self.header)
    }

    fn render_content(&self) -> TagResult<Vec<u8>> {
        Ok(self.payload.clone())
    }

    fn clone_box(&self) -> Box<dyn CustomObject> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn registered_creator_is_kept_across_save() {
    let vendor_guid = Guid([0x5A; 16]);
    let factory = ObjectFactory::new().with_creator(
        move |header: &ObjectHeader, content: &[u8], _: bool| -> Option<TagResult<AsfObject>> {
            (header.guid == vendor_guid).then(|| {
                Ok(AsfObject::Custom(Box::new(Vendor {
                    header: header.clone(),
                    payload: content.to_vec(),
                })))
            })
        },
    );

    let mut store = Cursor::new(sample_file());
    let mut asf = AsfFile::read_with(&mut store, factory).unwrap();
    assert!(matches!(asf.header().find(&vendor_guid), Some(AsfObject::Custom(_))));

    let mut tag = asf.tag();
    tag.set_title(Some("Title"));
    asf.save(&mut store, &tag, &TagConfig::default()).unwrap();

    let Some(AsfObject::Custom(custom)) = asf.header().find(&vendor_guid) else {
        panic!("vendor object lost its custom type");
    };
    let vendor = custom.as_any().downcast_ref::<Vendor>().unwrap();
    assert_eq!(vendor.payload, b"vendor");
    assert_eq!(asf.tag().title().as_deref(), Some("Title"));
}

#[test]
fn saves_to_a_real_file() {
    use std::io::{Seek, SeekFrom, Write};

    let mut file = tempfile::tempfile().unwrap();
    file.write_all(&sample_file()).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    let mut tag = read_tag(&mut file).unwrap();
    tag.set_comment(Some("on disk"));
    save_tag(&mut file, &tag, &TagConfig::default()).unwrap();
    assert_eq!(read_tag(&mut file).unwrap().comment().as_deref(), Some("on disk"));
}
