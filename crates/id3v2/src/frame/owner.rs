//! Owner-tagged binary frames: private (`PRIV`) and unique file id (`UFID`).

use mt_common::{strings, TagResult};

use super::encoding::{split_terminated, TextEncoding};
use super::header::{FrameHeader, FrameId};

/// `owner NUL | data`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerDataFrame {
    pub header: FrameHeader,
    pub owner: String,
    pub data: Vec<u8>,
}

impl OwnerDataFrame {
    pub fn private(owner: &str, data: Vec<u8>) -> Self {
        Self::new(FrameId::new(b"PRIV"), owner, data)
    }

    pub fn unique_file_id(owner: &str, identifier: Vec<u8>) -> Self {
        Self::new(FrameId::new(b"UFID"), owner, identifier)
    }

    fn new(id: FrameId, owner: &str, data: Vec<u8>) -> Self {
        Self {
            header: FrameHeader::new(id),
            owner: owner.to_string(),
            data,
        }
    }

    pub(crate) fn parse(header: FrameHeader, data: &[u8]) -> Self {
        let (owner, rest) = split_terminated(data, TextEncoding::Latin1);
        Self {
            header,
            owner: strings::latin1_decode(owner),
            data: rest.to_vec(),
        }
    }

    pub(crate) fn render_fields(&self) -> TagResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.owner.len() + 1 + self.data.len());
        TextEncoding::Latin1.encode_terminated(&self.owner, &mut out);
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_frame() {
        let data = b"WM/MediaClassPrimaryID\0\x01\x02";
        let frame = OwnerDataFrame::parse(FrameHeader::new(FrameId::new(b"PRIV")), data);
        assert_eq!(frame.owner, "WM/MediaClassPrimaryID");
        assert_eq!(frame.data, vec![1, 2]);
        assert_eq!(frame.render_fields().unwrap(), data.to_vec());
    }

    #[test]
    fn ufid_constructor() {
        let frame = OwnerDataFrame::unique_file_id("http://musicbrainz.org", b"id".to_vec());
        assert_eq!(frame.header.id, FrameId::new(b"UFID"));
    }
}
