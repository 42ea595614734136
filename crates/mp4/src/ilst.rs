//! iTunes-style metadata: the items of `moov/udta/meta/ilst`.

use mt_common::tag::{leading_number, non_empty};
use mt_common::BasicTag;

use crate::boxes::{
    ILST, ITEM_ALBUM, ITEM_ARTIST, ITEM_COMMENT, ITEM_COVER, ITEM_GENRE, ITEM_TITLE, ITEM_TRACK,
    ITEM_YEAR,
};
use crate::leaf::{DataBox, DATA_BMP, DATA_IMPLICIT, DATA_JPEG, DATA_PNG};
use crate::tree::{ContainerBox, ItemBox, Mp4Box};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtworkFormat {
    Jpeg,
    Png,
    Bmp,
}

impl ArtworkFormat {
    fn from_data_type(data_type: u32) -> Option<Self> {
        match data_type {
            DATA_JPEG => Some(Self::Jpeg),
            DATA_PNG => Some(Self::Png),
            DATA_BMP => Some(Self::Bmp),
            _ => None,
        }
    }

    fn data_type(self) -> u32 {
        match self {
            Self::Jpeg => DATA_JPEG,
            Self::Png => DATA_PNG,
            Self::Bmp => DATA_BMP,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artwork {
    pub format: ArtworkFormat,
    pub data: Vec<u8>,
}

/// Ordered list of `ilst` items. Items this type has no accessor for are
/// kept as parsed and written back unchanged.
#[derive(Clone, Debug, Default)]
pub struct AppleTag {
    items: Vec<ItemBox>,
}

impl AppleTag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the items of a parsed `ilst` box.
    pub fn from_ilst(ilst: &Mp4Box) -> Self {
        let items = ilst
            .children()
            .iter()
            .filter_map(|c| match c {
                Mp4Box::Item(item) => Some(item.clone()),
                _ => None,
            })
            .collect();
        Self { items }
    }

    /// A fresh `ilst` box holding the items.
    pub fn to_ilst(&self) -> Mp4Box {
        let mut ilst = ContainerBox::new(ILST);
        ilst.children = self.items.iter().cloned().map(Mp4Box::Item).collect();
        Mp4Box::Container(ilst)
    }

    pub fn items(&self) -> &[ItemBox] {
        &self.items
    }

    pub fn item(&self, name: u32) -> Option<&ItemBox> {
        self.items.iter().find(|i| i.name() == name)
    }

    /// Replace the first item with the same name in place and drop the
    /// rest, or append.
    pub fn set_item(&mut self, item: ItemBox) {
        let name = item.name();
        match self.items.iter().position(|i| i.name() == name) {
            Some(first) => {
                self.items[first] = item;
                let mut index = 0;
                self.items.retain(|i| {
                    let keep = index == first || i.name() != name;
                    index += 1;
                    keep
                });
            }
            None => self.items.push(item),
        }
    }

    /// Remove every item named `name`. Returns how many were removed.
    pub fn remove_item(&mut self, name: u32) -> usize {
        let before = self.items.len();
        self.items.retain(|i| i.name() != name);
        before - self.items.len()
    }

    /// First text value of an item.
    pub fn text(&self, name: u32) -> Option<String> {
        self.item(name)?
            .values()
            .find_map(|d| d.as_text())
            .and_then(non_empty)
    }

    /// Set a UTF-8 text item; `None` or an empty string removes it.
    pub fn set_text(&mut self, name: u32, value: Option<&str>) {
        match value {
            Some(text) if !text.is_empty() => {
                self.set_item(ItemBox::new(name, vec![DataBox::text(text)]))
            }
            _ => {
                self.remove_item(name);
            }
        }
    }

    /// Track number and total from `trkn`.
    pub fn track_number(&self) -> Option<(u16, u16)> {
        let value = self.item(ITEM_TRACK)?.values().next()?;
        match value.value.as_slice() {
            [_, _, t0, t1, n0, n1, ..] => Some((
                u16::from_be_bytes([*t0, *t1]),
                u16::from_be_bytes([*n0, *n1]),
            )),
            [_, _, t0, t1] => Some((u16::from_be_bytes([*t0, *t1]), 0)),
            _ => None,
        }
    }

    pub fn set_track_number(&mut self, track: u16, total: u16) {
        let mut value = vec![0, 0];
        value.extend_from_slice(&track.to_be_bytes());
        value.extend_from_slice(&total.to_be_bytes());
        value.extend_from_slice(&[0, 0]);
        self.set_item(ItemBox::new(
            ITEM_TRACK,
            vec![DataBox::new(DATA_IMPLICIT, value)],
        ));
    }

    pub fn artwork(&self) -> Vec<Artwork> {
        self.item(ITEM_COVER)
            .map(|item| {
                item.values()
                    .filter_map(|d| {
                        Some(Artwork {
                            format: ArtworkFormat::from_data_type(d.data_type)?,
                            data: d.value.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace all cover art. An empty list removes `covr`.
    pub fn set_artwork(&mut self, artwork: &[Artwork]) {
        if artwork.is_empty() {
            self.remove_item(ITEM_COVER);
            return;
        }
        let values = artwork
            .iter()
            .map(|a| DataBox::new(a.format.data_type(), a.data.clone()))
            .collect();
        self.set_item(ItemBox::new(ITEM_COVER, values));
    }
}

impl BasicTag for AppleTag {
    fn title(&self) -> Option<String> {
        self.text(ITEM_TITLE)
    }

    fn set_title(&mut self, value: Option<&str>) {
        self.set_text(ITEM_TITLE, value);
    }

    fn artist(&self) -> Option<String> {
        self.text(ITEM_ARTIST)
    }

    fn set_artist(&mut self, value: Option<&str>) {
        self.set_text(ITEM_ARTIST, value);
    }

    fn album(&self) -> Option<String> {
        self.text(ITEM_ALBUM)
    }

    fn set_album(&mut self, value: Option<&str>) {
        self.set_text(ITEM_ALBUM, value);
    }

    fn comment(&self) -> Option<String> {
        self.text(ITEM_COMMENT)
    }

    fn set_comment(&mut self, value: Option<&str>) {
        self.set_text(ITEM_COMMENT, value);
    }

    fn genre(&self) -> Option<String> {
        self.text(ITEM_GENRE)
    }

    fn set_genre(&mut self, value: Option<&str>) {
        self.set_text(ITEM_GENRE, value);
    }

    fn year(&self) -> Option<u32> {
        self.text(ITEM_YEAR).as_deref().and_then(leading_number)
    }

    fn set_year(&mut self, value: Option<u32>) {
        self.set_text(ITEM_YEAR, value.map(|y| y.to_string()).as_deref());
    }

    fn track(&self) -> Option<u32> {
        self.track_number()
            .map(|(track, _)| track as u32)
            .filter(|&t| t != 0)
    }

    fn set_track(&mut self, value: Option<u32>) {
        match value.and_then(|v| u16::try_from(v).ok()) {
            Some(track) => {
                let total = self.track_number().map_or(0, |(_, total)| total);
                self.set_track_number(track, total);
            }
            None => {
                self.remove_item(ITEM_TRACK);
            }
        }
    }
}
