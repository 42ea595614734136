//! File-level reading and saving.
//!
//! Reading scans the top-level box headers without loading media data and
//! parses `moov` in full. Saving rebuilds `moov` with the new `ilst` and
//! commits it with a single write into the space the old `moov` and any
//! directly following `free`/`skip` boxes occupied. When the size changes,
//! every absolute offset pointing past that space is fixed up afterwards.

use mt_common::{ByteStore, TagConfig, TagError, TagResult, Window};
use tracing::{debug, info, warn};

use crate::boxes::{fourcc_to_string, BoxHeader, FREE, ILST, META, MOOF, MOOV, MVHD, SKIP, UDTA};
use crate::ilst::AppleTag;
use crate::leaf::{FreeBox, MovieHeaderBox};
use crate::tree::{BoxContext, BoxFactory, ContainerBox, MetaBox, Mp4Box};

const ILST_PATH: [u32; 3] = [UDTA, META, ILST];

/// The parsed structure of an MP4 file: top-level box headers plus the
/// fully parsed `moov`.
#[derive(Clone, Debug)]
pub struct Mp4File {
    boxes: Vec<BoxHeader>,
    moov: Mp4Box,
    factory: BoxFactory,
}

impl Mp4File {
    pub fn read<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Self> {
        Self::read_with(store, BoxFactory::new())
    }

    pub fn read_with<S: ByteStore + ?Sized>(store: &mut S, factory: BoxFactory) -> TagResult<Self> {
        let boxes = scan_top_level(store)?;
        let moov_header = boxes
            .iter()
            .find(|h| h.box_type == MOOV)
            .cloned()
            .ok_or_else(|| TagError::corrupt(0, "no moov box"))?;
        let moov = load_box(store, &moov_header, &factory)?;

        info!(
            boxes = boxes.len(),
            moov_offset = moov_header.offset,
            moov_size = moov_header.size,
            "Read MP4 structure"
        );
        Ok(Self {
            boxes,
            moov,
            factory,
        })
    }

    pub fn top_level(&self) -> &[BoxHeader] {
        &self.boxes
    }

    pub fn moov(&self) -> &Mp4Box {
        &self.moov
    }

    pub fn movie_header(&self) -> Option<&MovieHeaderBox> {
        match self.moov.child(MVHD)? {
            Mp4Box::MovieHeader(mvhd) => Some(mvhd),
            _ => None,
        }
    }

    /// The tag in `moov/udta/meta/ilst`, if there is one.
    pub fn tag(&self) -> Option<AppleTag> {
        self.moov.find_path(&ILST_PATH).map(AppleTag::from_ilst)
    }

    /// Write `tag` into the file and refresh this structure from the store.
    pub fn save<S: ByteStore + ?Sized>(
        &mut self,
        store: &mut S,
        tag: &AppleTag,
        config: &TagConfig,
    ) -> TagResult<()> {
        config.validate()?;
        let moov_offset = self.moov.header().offset;
        let old_end = self.allocation_end();
        let allocation = old_end - moov_offset;

        let mut moov = self.moov.clone();
        install_ilst(&mut moov, tag)?;
        let rendered = moov.render()?;
        let natural = rendered.len() as u64;

        let mut bytes = None;
        if natural == allocation {
            bytes = Some(rendered);
        } else if natural + 8 <= allocation && allocation - natural <= config.max_padding {
            let padded = render_padded(&moov, allocation - natural)?;
            if padded.len() as u64 == allocation {
                bytes = Some(padded);
            }
        }
        let bytes = match bytes {
            Some(b) => b,
            None if config.mp4_padding >= 8 => render_padded(&moov, config.mp4_padding)?,
            None => moov.render()?,
        };

        let delta = bytes.len() as i64 - allocation as i64;
        if delta != 0 {
            self.check_offsets_fit(old_end, delta)?;
        }

        if delta == 0 {
            store.write_at(moov_offset, &bytes)?;
        } else {
            store.insert(&bytes, moov_offset, allocation)?;
        }
        info!(
            offset = moov_offset,
            old_size = allocation,
            new_size = bytes.len(),
            "Saved MP4 tag"
        );

        if delta != 0 {
            fix_offsets(store, &self.factory, old_end, delta)?;
        }
        *self = Self::read_with(store, self.factory.clone())?;
        Ok(())
    }

    /// End of `moov` plus the `free`/`skip` boxes directly after it.
    fn allocation_end(&self) -> u64 {
        let moov_offset = self.moov.header().offset;
        let mut end = self.moov.header().end_offset();
        let following = self
            .boxes
            .iter()
            .skip_while(|h| h.offset != moov_offset)
            .skip(1);
        for header in following {
            if header.box_type != FREE && header.box_type != SKIP {
                break;
            }
            end = header.end_offset();
        }
        end
    }

    /// Refuse a save whose shift would overflow a 32-bit `stco` table before
    /// anything is written.
    fn check_offsets_fit(&self, from: u64, delta: i64) -> TagResult<()> {
        let mut result = Ok(());
        self.moov.visit(&mut |b| {
            if let Mp4Box::ChunkOffset(table) = b {
                if result.is_ok() && !table.can_shift(from, delta) {
                    result = Err(TagError::unsupported(format!(
                        "chunk offsets in '{}' at {} cannot move by {}",
                        fourcc_to_string(table.header.box_type),
                        table.header.offset,
                        delta
                    )));
                }
            }
        });
        result
    }
}

/// Read the tag of an MP4 file, if it has one.
pub fn read_tag<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Option<AppleTag>> {
    Ok(Mp4File::read(store)?.tag())
}

pub fn save_tag<S: ByteStore + ?Sized>(
    store: &mut S,
    tag: &AppleTag,
    config: &TagConfig,
) -> TagResult<()> {
    Mp4File::read(store)?.save(store, tag, config)
}

// ─── Store access ───────────────────────────────────────────────────

/// Headers of every top-level box. Payloads are not read.
pub fn scan_top_level<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Vec<BoxHeader>> {
    let len = store.len()?;
    let mut pos = 0u64;
    let mut headers = Vec::new();
    while len - pos >= 8 {
        let head = store.read_exact_at(pos, (len - pos).min(32) as usize)?;
        let header = BoxHeader::parse_bounded(&mut Window::new(&head, pos), len - pos)?;
        if header.size > len - pos {
            return Err(TagError::corrupt(
                pos,
                format!(
                    "box '{}' declares {} bytes, file has {} left",
                    fourcc_to_string(header.box_type),
                    header.size,
                    len - pos
                ),
            ));
        }
        debug!(
            "Top-level '{}' at {} ({} bytes)",
            fourcc_to_string(header.box_type),
            header.offset,
            header.size
        );
        pos = header.end_offset();
        headers.push(header);
    }
    if pos < len {
        warn!(trailing = len - pos, "Ignoring bytes after the last top-level box");
    }
    Ok(headers)
}

fn load_box<S: ByteStore + ?Sized>(
    store: &mut S,
    header: &BoxHeader,
    factory: &BoxFactory,
) -> TagResult<Mp4Box> {
    let size = usize::try_from(header.size).map_err(|_| {
        TagError::unsupported(format!(
            "box '{}' of {} bytes cannot be loaded",
            fourcc_to_string(header.box_type),
            header.size
        ))
    })?;
    let data = store.read_exact_at(header.offset, size)?;
    factory.parse_box(&mut Window::new(&data, header.offset), &BoxContext::root())
}

/// Shift absolute offsets at or after `from` by `delta`: `stco`/`co64`
/// entries in `moov` and `tfhd` base data offsets in `moof` boxes. The
/// tables are re-read from the store, since they may have moved.
fn fix_offsets<S: ByteStore + ?Sized>(
    store: &mut S,
    factory: &BoxFactory,
    from: u64,
    delta: i64,
) -> TagResult<()> {
    let boxes = scan_top_level(store)?;
    let mut patches: Vec<(u64, Vec<u8>)> = Vec::new();
    let mut changed = 0usize;

    for header in boxes.iter().filter(|h| h.box_type == MOOV || h.box_type == MOOF) {
        let mut root = load_box(store, header, factory)?;
        let mut failure = None;
        root.visit_mut(&mut |b| {
            if failure.is_some() {
                return;
            }
            let patched = match b {
                Mp4Box::ChunkOffset(table) => match table.shift(from, delta) {
                    Ok(0) => None,
                    Ok(n) => {
                        changed += n;
                        Some((table.header.content_offset(), table.render_content()))
                    }
                    Err(e) => Some((0, Err(e))),
                },
                Mp4Box::TrackFragmentHeader(tfhd) => match tfhd.base_data_offset {
                    Some(base) if base >= from => {
                        match base.checked_add_signed(delta) {
                            Some(moved) => {
                                tfhd.base_data_offset = Some(moved);
                                changed += 1;
                                Some((tfhd.header.content_offset(), tfhd.render_content()))
                            }
                            None => Some((
                                0,
                                Err(TagError::invalid_value(format!(
                                    "base data offset {base} cannot move by {delta}"
                                ))),
                            )),
                        }
                    }
                    _ => None,
                },
                _ => None,
            };
            match patched {
                Some((offset, Ok(bytes))) => patches.push((offset, bytes)),
                Some((_, Err(e))) => failure = Some(e),
                None => {}
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
    }

    for (offset, bytes) in &patches {
        store.write_at(*offset, bytes)?;
    }
    info!(
        tables = patches.len(),
        entries = changed,
        delta,
        "Fixed up absolute offsets"
    );
    Ok(())
}

// ─── Tree edits ─────────────────────────────────────────────────────

fn child_or_insert(
    children: &mut Vec<Mp4Box>,
    box_type: u32,
    make: impl FnOnce() -> Mp4Box,
) -> &mut Mp4Box {
    let index = match children.iter().position(|c| c.box_type() == box_type) {
        Some(i) => i,
        None => {
            children.push(make());
            children.len() - 1
        }
    };
    &mut children[index]
}

fn children_of(b: &mut Mp4Box) -> TagResult<&mut Vec<Mp4Box>> {
    let (box_type, offset) = (b.box_type(), b.header().offset);
    b.children_mut().ok_or_else(|| {
        TagError::unsupported(format!(
            "'{}' at {} cannot hold child boxes",
            fourcc_to_string(box_type),
            offset
        ))
    })
}

/// Put the tag's items into `moov/udta/meta/ilst`, creating missing boxes,
/// and drop `free` boxes directly after `ilst`.
fn install_ilst(moov: &mut Mp4Box, tag: &AppleTag) -> TagResult<()> {
    let udta = child_or_insert(children_of(moov)?, UDTA, || {
        Mp4Box::Container(ContainerBox::new(UDTA))
    });
    let meta = child_or_insert(children_of(udta)?, META, || {
        Mp4Box::Meta(MetaBox::new_itunes())
    });
    let children = children_of(meta)?;

    let ilst = tag.to_ilst();
    match children.iter().position(|c| c.box_type() == ILST) {
        Some(index) => {
            children[index] = ilst;
            while children
                .get(index + 1)
                .is_some_and(|c| matches!(c, Mp4Box::Free(_)))
            {
                children.remove(index + 1);
            }
        }
        None => children.push(ilst),
    }
    Ok(())
}

/// Render `moov` with a `free` box of `padding` bytes after `ilst`.
fn render_padded(moov: &Mp4Box, padding: u64) -> TagResult<Vec<u8>> {
    let mut moov = moov.clone();
    let meta = moov
        .find_path_mut(&[UDTA, META])
        .ok_or_else(|| TagError::corrupt(0, "moov has no udta/meta after installing the tag"))?;
    let children = children_of(meta)?;
    let at = children
        .iter()
        .position(|c| c.box_type() == ILST)
        .map_or(children.len(), |i| i + 1);
    children.insert(at, Mp4Box::Free(FreeBox::with_size(padding)?));
    moov.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{fourcc, DATA, FTYP, HDLR, ITEM_TITLE, MDAT, MDIR};
    use mt_common::BasicTag;
    use std::io::Cursor;

    fn make_box(box_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(&box_type.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn ftyp() -> Vec<u8> {
        let mut p = fourcc(b'M', b'4', b'A', b' ').to_be_bytes().to_vec();
        p.extend_from_slice(&[0, 0, 0, 0]);
        make_box(FTYP, &p)
    }

    fn moov_with_title(title: &str) -> Vec<u8> {
        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(&MDIR.to_be_bytes());
        hdlr.extend_from_slice(&[0u8; 13]);
        let mut data = vec![0, 0, 0, 1, 0, 0, 0, 0];
        data.extend_from_slice(title.as_bytes());
        let ilst = make_box(ILST, &make_box(ITEM_TITLE, &make_box(DATA, &data)));
        let mut meta = vec![0, 0, 0, 0];
        meta.extend_from_slice(&make_box(HDLR, &hdlr));
        meta.extend_from_slice(&ilst);
        make_box(MOOV, &make_box(UDTA, &make_box(META, &meta)))
    }

    fn file(parts: &[Vec<u8>]) -> Cursor<Vec<u8>> {
        Cursor::new(parts.concat())
    }

    #[test]
    fn test_read_tag() {
        let mut store = file(&[ftyp(), moov_with_title("Song"), make_box(MDAT, &[1, 2, 3])]);
        let mp4 = Mp4File::read(&mut store).unwrap();
        assert_eq!(mp4.top_level().len(), 3);
        assert_eq!(mp4.tag().unwrap().title().as_deref(), Some("Song"));
    }

    #[test]
    fn test_missing_moov_is_corrupt() {
        let mut store = file(&[ftyp(), make_box(MDAT, &[1, 2, 3])]);
        assert!(Mp4File::read(&mut store).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_truncated_top_level_box_is_corrupt() {
        let mut mdat = make_box(MDAT, &[0; 16]);
        mdat.truncate(12);
        let mut store = file(&[ftyp(), moov_with_title("a"), mdat]);
        assert!(Mp4File::read(&mut store).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_same_size_save_overwrites() {
        let original = [ftyp(), moov_with_title("Song"), make_box(MDAT, &[9; 8])].concat();
        let mut store = Cursor::new(original.clone());
        let mut mp4 = Mp4File::read(&mut store).unwrap();
        let mut tag = mp4.tag().unwrap();
        tag.set_title(Some("Tune"));
        mp4.save(&mut store, &tag, &TagConfig::default()).unwrap();

        assert_eq!(store.get_ref().len(), original.len());
        assert_eq!(mp4.tag().unwrap().title().as_deref(), Some("Tune"));
    }

    #[test]
    fn test_shrinking_save_pads_inside_meta() {
        let original = [
            ftyp(),
            moov_with_title("A much longer title here"),
            make_box(MDAT, &[9; 8]),
        ]
        .concat();
        let mut store = Cursor::new(original.clone());
        let mut mp4 = Mp4File::read(&mut store).unwrap();
        let mut tag = mp4.tag().unwrap();
        tag.set_title(Some("Short"));
        mp4.save(&mut store, &tag, &TagConfig::default()).unwrap();

        assert_eq!(store.get_ref().len(), original.len());
        let meta = mp4.moov().find_path(&[UDTA, META]).unwrap();
        let free = meta.children().last().unwrap();
        assert!(matches!(free, Mp4Box::Free(f) if f.header.size == 19));
        assert_eq!(&store.get_ref()[original.len() - 16..], &make_box(MDAT, &[9; 8])[..]);
    }

    #[test]
    fn test_growing_save_absorbs_following_free_box() {
        let original = [
            ftyp(),
            moov_with_title("A"),
            make_box(FREE, &[0; 100]),
            make_box(MDAT, &[9; 8]),
        ]
        .concat();
        let mut store = Cursor::new(original.clone());
        let mut mp4 = Mp4File::read(&mut store).unwrap();
        let mut tag = mp4.tag().unwrap();
        tag.set_title(Some("A bit longer"));
        mp4.save(&mut store, &tag, &TagConfig::default()).unwrap();

        // The free box was folded into the padding inside meta.
        assert_eq!(store.get_ref().len(), original.len());
        let kinds: Vec<u32> = mp4.top_level().iter().map(|h| h.box_type).collect();
        assert_eq!(kinds, vec![FTYP, MOOV, MDAT]);
    }

    #[test]
    fn test_creates_udta_meta_ilst() {
        let mut store = file(&[ftyp(), make_box(MOOV, &[]), make_box(MDAT, &[])]);
        let mut tag = AppleTag::new();
        tag.set_album(Some("Album"));
        save_tag(&mut store, &tag, &TagConfig::default()).unwrap();

        let mp4 = Mp4File::read(&mut store).unwrap();
        let meta = mp4.moov().find_path(&[UDTA, META]).unwrap();
        assert_eq!(meta.children()[0].box_type(), HDLR);
        assert_eq!(meta.children()[1].box_type(), ILST);
        assert!(matches!(meta.children()[2], Mp4Box::Free(_)));
        assert_eq!(read_tag(&mut store).unwrap().unwrap().album().as_deref(), Some("Album"));
    }
}
