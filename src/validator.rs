// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Advisory container check for retrieved clips.
//!
//! An ISO-BMFF file opens with a box header:
//!
//! ```text
//! [size : u32 BE][type : 4 bytes = b"ftyp"][major brand ...]
//! ```
//!
//! A mismatch is reported, never enforced: some servers emit a leading
//! `styp`/`moof` or other layouts that still play.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use tracing::warn;

pub const FILE_TYPE_BOX: &[u8; 4] = b"ftyp";
pub const BOX_TYPE_OFFSET: usize = 4;
/// Payloads below this size almost always mean "no recordings" error bodies.
pub const SUSPICIOUSLY_SMALL: usize = 100;

/// `true` when bytes `4..8` carry the `ftyp` box tag.
pub fn looks_like_valid_container(buffer: &[u8]) -> bool {
    buffer.get(BOX_TYPE_OFFSET..BOX_TYPE_OFFSET + 4) == Some(FILE_TYPE_BOX.as_slice())
}

/// What the leading bytes of a payload look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCheck {
    pub signature_ok: bool,
    /// Declared size of the first box, when a header is present.
    pub first_box_size: Option<u32>,
    /// Tag of the first box, lossy UTF-8.
    pub first_box_type: Option<String>,
    pub too_small: bool,
}

impl ContainerCheck {
    pub fn is_clean(&self) -> bool {
        self.signature_ok && !self.too_small
    }
}

pub fn inspect(buffer: &[u8]) -> ContainerCheck {
    let mut cursor = Cursor::new(buffer);
    let first_box_size = cursor.read_u32::<BigEndian>().ok();
    let first_box_type = buffer
        .get(BOX_TYPE_OFFSET..BOX_TYPE_OFFSET + 4)
        .map(|tag| String::from_utf8_lossy(tag).into_owned());

    ContainerCheck {
        signature_ok: looks_like_valid_container(buffer),
        first_box_size,
        first_box_type,
        too_small: buffer.len() < SUSPICIOUSLY_SMALL,
    }
}

/// Inspect and log; the payload is accepted either way.
pub fn flag_suspect(camera: &str, source: &str, buffer: &[u8]) -> ContainerCheck {
    let check = inspect(buffer);
    if !check.signature_ok {
        warn!(
            camera,
            source,
            bytes = buffer.len(),
            box_type = check.first_box_type.as_deref().unwrap_or("-"),
            "Payload lacks ftyp signature, accepting anyway"
        );
    }
    if check.too_small {
        warn!(camera, source, bytes = buffer.len(), "Payload is tiny, likely no recordings");
    }
    check
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp4_header() -> Vec<u8> {
        let mut buf = vec![0x00, 0x00, 0x00, 0x20];
        buf.extend_from_slice(b"ftypisom");
        buf.resize(512, 0);
        buf
    }

    #[test]
    fn accepts_ftyp() {
        let buf = mp4_header();
        assert!(looks_like_valid_container(&buf));
        let check = inspect(&buf);
        assert_eq!(check.first_box_size, Some(0x20));
        assert_eq!(check.first_box_type.as_deref(), Some("ftyp"));
        assert!(check.is_clean());
    }

    #[test]
    fn flags_other_layouts() {
        let mut buf = vec![0x00, 0x00, 0x00, 0x18];
        buf.extend_from_slice(b"styp");
        buf.resize(256, 0);
        assert!(!looks_like_valid_container(&buf));
        assert_eq!(inspect(&buf).first_box_type.as_deref(), Some("styp"));
    }

    #[test]
    fn short_buffers_are_not_containers() {
        assert!(!looks_like_valid_container(b""));
        assert!(!looks_like_valid_container(b"\0\0\0\x08fty"));
        let check = inspect(b"{\"error\":1}");
        assert!(check.too_small);
        assert!(!check.is_clean());
    }
}
