//! Reading and writing the ID3v2 tag at the start of a byte store.

use mt_common::{ByteStore, TagConfig, TagResult};
use tracing::info;

use crate::frame::FrameFactory;
use crate::header::{TagHeader, HEADER_SIZE};
use crate::tag::Tag;

/// Size in bytes (header, body and footer) of the tag at offset 0, if any.
pub fn find_tag<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Option<u64>> {
    store.seek(0)?;
    let head = store.read_block(HEADER_SIZE)?;
    if !TagHeader::is_present(&head) {
        return Ok(None);
    }
    let header = TagHeader::parse(&head, 0)?;
    Ok(Some(header.total_size()))
}

pub fn read_tag<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<Option<Tag>> {
    read_tag_with(store, &FrameFactory::global())
}

pub fn read_tag_with<S: ByteStore + ?Sized>(
    store: &mut S,
    factory: &FrameFactory,
) -> TagResult<Option<Tag>> {
    let Some(size) = find_tag(store)? else {
        return Ok(None);
    };
    let data = store.read_exact_at(0, size as usize)?;
    let tag = Tag::parse_with(&data, 0, factory)?;
    info!(size, frames = tag.frames().len(), "Read ID3v2 tag");
    Ok(Some(tag))
}

/// Write `tag` at the start of the store, replacing any existing tag in a
/// single insert. An empty tag removes the existing one.
pub fn save_tag<S: ByteStore + ?Sized>(
    store: &mut S,
    tag: &mut Tag,
    config: &TagConfig,
) -> TagResult<()> {
    let old_size = find_tag(store)?.unwrap_or(0);
    if tag.frames().is_empty() {
        if old_size > 0 {
            store.remove(0, old_size)?;
            info!(removed = old_size, "Removed empty ID3v2 tag");
        }
        return Ok(());
    }

    let (header, bytes) = tag.render_with_header(config)?;
    store.insert(&bytes, 0, old_size)?;
    info!(
        old_size,
        new_size = bytes.len(),
        version = header.major_version,
        "Saved ID3v2 tag"
    );
    tag.set_saved_header(header);
    Ok(())
}

/// Remove the tag at offset 0. Returns whether one was present.
pub fn strip_tag<S: ByteStore + ?Sized>(store: &mut S) -> TagResult<bool> {
    match find_tag(store)? {
        Some(size) => {
            store.remove(0, size)?;
            info!(removed = size, "Stripped ID3v2 tag");
            Ok(true)
        }
        None => Ok(false),
    }
}
