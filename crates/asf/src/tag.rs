//! `AsfTag`: the content description strings plus named attributes.
//!
//! Attributes come from three places in the header: the extended content
//! description (stream 0, no language), the metadata object (per stream)
//! and the metadata library (anything). [`AsfTag::apply_to`] writes them
//! back, choosing the smallest object that can hold each one.

use mt_common::tag::{leading_number, non_empty};
use mt_common::{BasicTag, TagResult};
use tracing::debug;

use crate::attribute::{Attribute, AttributeValue, ValueType};
use crate::objects::{
    ContentDescriptionObject, ExtendedContentDescriptionObject, MetadataObject, MetadataRecord,
};
use crate::tree::{AsfObject, HeaderExtensionObject, HeaderObject};

pub const ALBUM: &str = "WM/AlbumTitle";
pub const GENRE: &str = "WM/Genre";
pub const YEAR: &str = "WM/Year";
pub const TRACK_NUMBER: &str = "WM/TrackNumber";
pub const ALBUM_ARTIST: &str = "WM/AlbumArtist";

/// Where a saved attribute goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeSlot {
    ExtendedContent,
    Metadata,
    MetadataLibrary,
}

/// Descriptor values are limited by their 16-bit length field.
const DESCRIPTOR_VALUE_LIMIT: usize = u16::MAX as usize;

impl Attribute {
    pub fn slot(&self, name: &str) -> AttributeSlot {
        let large = self.data_size() > DESCRIPTOR_VALUE_LIMIT
            || (name.len() + 1) * 2 > DESCRIPTOR_VALUE_LIMIT;
        if large || self.language != 0 {
            AttributeSlot::MetadataLibrary
        } else if self.stream != 0 {
            AttributeSlot::Metadata
        } else if self.value.value_type() == ValueType::Guid {
            AttributeSlot::MetadataLibrary
        } else {
            AttributeSlot::ExtendedContent
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AsfTag {
    pub title: String,
    pub author: String,
    pub copyright: String,
    pub comment: String,
    pub rating: String,
    attributes: Vec<(String, Attribute)>,
}

impl AsfTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the tag from a parsed header object.
    pub fn from_header(header: &HeaderObject) -> Self {
        let mut tag = Self::new();
        let extension = header.extension().map(|e| e.children.as_slice()).unwrap_or(&[]);
        for object in header.children.iter().chain(extension) {
            match object {
                AsfObject::ContentDescription(cd) => {
                    tag.title = cd.title.clone();
                    tag.author = cd.author.clone();
                    tag.copyright = cd.copyright.clone();
                    tag.comment = cd.description.clone();
                    tag.rating = cd.rating.clone();
                }
                AsfObject::ExtendedContentDescription(ecd) => {
                    for (name, value) in &ecd.descriptors {
                        tag.add_attribute(name, Attribute::new(value.clone()));
                    }
                }
                AsfObject::Metadata(meta) => {
                    for record in &meta.records {
                        let attribute = Attribute::new(record.value.clone())
                            .with_stream(record.stream)
                            .with_language(record.language);
                        tag.add_attribute(&record.name, attribute);
                    }
                }
                _ => {}
            }
        }
        tag
    }

    pub fn attributes(&self) -> &[(String, Attribute)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    pub fn attributes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attribute> {
        self.attributes
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, a)| a)
    }

    pub fn add_attribute(&mut self, name: &str, attribute: Attribute) {
        self.attributes.push((name.to_string(), attribute));
    }

    /// Replace the first attribute named `name` in place and drop the rest,
    /// or append.
    pub fn set_attribute(&mut self, name: &str, attribute: Attribute) {
        match self.attributes.iter().position(|(n, _)| n == name) {
            Some(first) => {
                self.attributes[first].1 = attribute;
                let mut index = 0;
                self.attributes.retain(|(n, _)| {
                    let keep = index == first || n != name;
                    index += 1;
                    keep
                });
            }
            None => self.add_attribute(name, attribute),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> usize {
        let before = self.attributes.len();
        self.attributes.retain(|(n, _)| n != name);
        before - self.attributes.len()
    }

    fn string_attribute(&self, name: &str) -> Option<String> {
        self.attribute(name)
            .map(|a| a.value.to_string_value())
            .and_then(non_empty)
    }

    fn set_string_attribute(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(text) if !text.is_empty() => self.set_attribute(name, Attribute::from(text)),
            _ => {
                self.remove_attribute(name);
            }
        }
    }

    /// Replace the tag-bearing objects of `header` with this tag's content.
    /// Empty objects are removed; a header extension is created when an
    /// attribute needs the metadata object or library.
    pub fn apply_to(&self, header: &mut HeaderObject) -> TagResult<()> {
        let mut descriptors = Vec::new();
        let mut metadata = MetadataObject::new(false);
        let mut library = MetadataObject::new(true);
        for (name, attribute) in &self.attributes {
            match attribute.slot(name) {
                AttributeSlot::ExtendedContent => {
                    descriptors.push((name.clone(), attribute.value.clone()));
                }
                AttributeSlot::Metadata | AttributeSlot::MetadataLibrary => {
                    let target = if attribute.slot(name) == AttributeSlot::Metadata {
                        &mut metadata
                    } else {
                        &mut library
                    };
                    target.records.push(MetadataRecord {
                        name: name.clone(),
                        language: attribute.language,
                        stream: attribute.stream,
                        value: attribute.value.clone(),
                    });
                }
            }
        }
        debug!(
            descriptors = descriptors.len(),
            metadata = metadata.records.len(),
            library = library.records.len(),
            "Routing ASF attributes"
        );

        let description = ContentDescriptionObject {
            header: None,
            title: self.title.clone(),
            author: self.author.clone(),
            copyright: self.copyright.clone(),
            description: self.comment.clone(),
            rating: self.rating.clone(),
        };
        let description =
            (!description.is_empty()).then_some(AsfObject::ContentDescription(description));
        let extended = (!descriptors.is_empty()).then_some(AsfObject::ExtendedContentDescription(
            ExtendedContentDescriptionObject {
                header: None,
                descriptors,
            },
        ));
        replace_or_insert(&mut header.children, description, |o| {
            matches!(o, AsfObject::ContentDescription(_))
        });
        replace_or_insert(&mut header.children, extended, |o| {
            matches!(o, AsfObject::ExtendedContentDescription(_))
        });

        let needs_extension = !metadata.records.is_empty() || !library.records.is_empty();
        if header.extension().is_none() && needs_extension {
            header
                .children
                .push(AsfObject::HeaderExtension(HeaderExtensionObject::default()));
        }
        if let Some(extension) = header.extension_mut() {
            let metadata = (!metadata.records.is_empty()).then_some(AsfObject::Metadata(metadata));
            let library = (!library.records.is_empty()).then_some(AsfObject::Metadata(library));
            replace_or_insert(&mut extension.children, metadata, |o| {
                matches!(o, AsfObject::Metadata(m) if !m.library)
            });
            replace_or_insert(&mut extension.children, library, |o| {
                matches!(o, AsfObject::Metadata(m) if m.library)
            });
        }
        Ok(())
    }
}

/// Put `object` where the first match of `is_slot` was, dropping any other
/// matches, or append it. `None` removes every match.
fn replace_or_insert(
    children: &mut Vec<AsfObject>,
    object: Option<AsfObject>,
    is_slot: impl Fn(&AsfObject) -> bool,
) {
    let first = children.iter().position(&is_slot);
    let mut index = 0;
    children.retain(|c| {
        let keep = !is_slot(c) || Some(index) == first;
        index += 1;
        keep
    });
    match (first, object) {
        (Some(i), Some(o)) => children[i] = o,
        (Some(i), None) => {
            children.remove(i);
        }
        (None, Some(o)) => children.push(o),
        (None, None) => {}
    }
}

impl BasicTag for AsfTag {
    fn title(&self) -> Option<String> {
        non_empty(self.title.clone())
    }

    fn set_title(&mut self, value: Option<&str>) {
        self.title = value.unwrap_or_default().to_string();
    }

    fn artist(&self) -> Option<String> {
        non_empty(self.author.clone())
    }

    fn set_artist(&mut self, value: Option<&str>) {
        self.author = value.unwrap_or_default().to_string();
    }

    fn album(&self) -> Option<String> {
        self.string_attribute(ALBUM)
    }

    fn set_album(&mut self, value: Option<&str>) {
        self.set_string_attribute(ALBUM, value);
    }

    fn comment(&self) -> Option<String> {
        non_empty(self.comment.clone())
    }

    fn set_comment(&mut self, value: Option<&str>) {
        self.comment = value.unwrap_or_default().to_string();
    }

    fn genre(&self) -> Option<String> {
        self.string_attribute(GENRE)
    }

    fn set_genre(&mut self, value: Option<&str>) {
        self.set_string_attribute(GENRE, value);
    }

    fn year(&self) -> Option<u32> {
        self.string_attribute(YEAR).as_deref().and_then(leading_number)
    }

    fn set_year(&mut self, value: Option<u32>) {
        self.set_string_attribute(YEAR, value.map(|y| y.to_string()).as_deref());
    }

    fn track(&self) -> Option<u32> {
        self.attribute(TRACK_NUMBER)
            .map(|a| a.value.to_dword())
            .filter(|&t| t != 0)
    }

    fn set_track(&mut self, value: Option<u32>) {
        match value {
            Some(track) => {
                self.set_attribute(TRACK_NUMBER, Attribute::new(AttributeValue::DWord(track)))
            }
            None => {
                self.remove_attribute(TRACK_NUMBER);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::{Guid, HEADER_OBJECT};
    use crate::object::ObjectHeader;
    use crate::tree::ObjectFactory;
    use mt_common::Window;

    fn empty_header() -> HeaderObject {
        HeaderObject {
            header: ObjectHeader::new(HEADER_OBJECT),
            reserved: [1, 2],
            children: Vec::new(),
            trailing: Vec::new(),
        }
    }

    #[test]
    fn test_slot_routing() {
        let plain = Attribute::from("x");
        assert_eq!(plain.slot("a"), AttributeSlot::ExtendedContent);
        assert_eq!(plain.clone().with_stream(2).slot("a"), AttributeSlot::Metadata);
        assert_eq!(
            plain.clone().with_stream(2).with_language(1).slot("a"),
            AttributeSlot::MetadataLibrary
        );
        let guid = Attribute::new(AttributeValue::Guid(Guid([1; 16])));
        assert_eq!(guid.slot("a"), AttributeSlot::MetadataLibrary);
        let big = Attribute::new(AttributeValue::Bytes(vec![0; 70_000]));
        assert_eq!(big.slot("WM/Picture"), AttributeSlot::MetadataLibrary);
    }

    #[test]
    fn test_basic_fields() {
        let mut tag = AsfTag::new();
        assert!(tag.is_empty());
        tag.set_title(Some("Song"));
        tag.set_album(Some("Album"));
        tag.set_year(Some(1999));
        tag.set_track(Some(4));
        assert_eq!(tag.title().as_deref(), Some("Song"));
        assert_eq!(tag.album().as_deref(), Some("Album"));
        assert_eq!(tag.year(), Some(1999));
        assert_eq!(tag.track(), Some(4));
        tag.set_album(None);
        assert!(tag.attribute(ALBUM).is_none());
    }

    #[test]
    fn test_apply_and_collect() {
        let mut tag = AsfTag::new();
        tag.title = "T".into();
        tag.set_genre(Some("Rock"));
        tag.add_attribute("Stream", Attribute::from("s").with_stream(1));
        tag.add_attribute("Lang", Attribute::from("l").with_language(2));

        let mut header = empty_header();
        tag.apply_to(&mut header).unwrap();
        assert_eq!(header.children.len(), 3);
        let ext = header.extension().unwrap();
        assert_eq!(ext.children.len(), 2);

        let bytes = header.render().unwrap();
        let parsed =
            HeaderObject::parse(&ObjectFactory::new(), &mut Window::new(&bytes, 0)).unwrap();
        let back = AsfTag::from_header(&parsed);
        assert_eq!(back.title, "T");
        assert_eq!(back.genre().as_deref(), Some("Rock"));
        assert_eq!(back.attribute("Stream").unwrap().stream, 1);
        assert_eq!(back.attribute("Lang").unwrap().language, 2);
    }

    #[test]
    fn test_apply_removes_emptied_objects() {
        let mut tag = AsfTag::new();
        tag.title = "T".into();
        tag.set_genre(Some("Rock"));
        let mut header = empty_header();
        tag.apply_to(&mut header).unwrap();
        assert_eq!(header.children.len(), 2);

        AsfTag::new().apply_to(&mut header).unwrap();
        assert!(header.children.is_empty());
    }

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let mut tag = AsfTag::new();
        tag.add_attribute("a", Attribute::from("1"));
        tag.add_attribute("b", Attribute::from("2"));
        tag.add_attribute("a", Attribute::from("3"));
        tag.set_attribute("a", Attribute::from("4"));
        let names: Vec<&str> = tag.attributes().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(tag.attribute("a").unwrap().value.to_string_value(), "4");
        assert_eq!(tag.attributes_named("a").count(), 1);
    }
}
