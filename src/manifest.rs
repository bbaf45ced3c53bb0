//! HLS playlist reading — master and media (variant) playlists.
//!
//! Only what clip reassembly needs is extracted: which variant to follow, the
//! `#EXT-X-MAP` init segment, and the media segment URIs in file order. Every
//! URI is resolved against the playlist it appeared in.

use hls_m3u8::tags::{ExtXMap, VariantStream};
use hls_m3u8::MasterPlaylist;
use tracing::debug;
use url::Url;

use crate::error::{NvrError, Result};

const MAP_TAG: &str = "#EXT-X-MAP:";
const SEGMENT_TAG: &str = "#EXTINF";

/// Segment list extracted from a media playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    /// Initialisation segment that must precede all media segments.
    pub init_uri: Option<Url>,
    /// Media segments in playback (= file) order.
    pub segment_uris: Vec<Url>,
}

impl ManifestDocument {
    /// All URIs to fetch, init first.
    pub fn fetch_order(&self) -> impl Iterator<Item = &Url> {
        self.init_uri.iter().chain(self.segment_uris.iter())
    }
}

/// The variant chosen from a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    /// A separate media playlist to fetch.
    Playlist(Url),
    /// The "master" already lists segments; parse it directly.
    Inline,
}

/// Parse a media playlist into its ordered segment list.
///
/// Segment lines are read as they appear, without the duration checks a
/// strict media playlist parse would apply; NVR playlists often miss them.
pub fn parse(text: &str, base: &Url) -> Result<ManifestDocument> {
    let mut init_uri = None;
    let mut segment_uris = Vec::new();

    for line in lines(text) {
        if line.starts_with(MAP_TAG) {
            let map = ExtXMap::try_from(line)
                .map_err(|e| NvrError::ManifestParse(format!("bad EXT-X-MAP in {base}: {e}")))?;
            let uri = resolve(base, &map.uri().to_string())?;
            if init_uri.is_none() {
                init_uri = Some(uri);
            } else if init_uri.as_ref() != Some(&uri) {
                debug!(base = %base, uri = %uri, "Ignoring additional init segment");
            }
        } else if line.starts_with('#') {
            continue;
        } else {
            segment_uris.push(resolve(base, line)?);
        }
    }

    if segment_uris.is_empty() {
        return Err(NvrError::ManifestParse(format!("no segments in playlist {base}")));
    }

    Ok(ManifestDocument { init_uri, segment_uris })
}

/// Pick the first variant stream of a master playlist.
///
/// No bandwidth negotiation: the first `EXT-X-STREAM-INF` wins.
pub fn select_variant(text: &str, base: &Url) -> Result<Variant> {
    if lines(text).any(|l| l.starts_with(SEGMENT_TAG)) {
        return Ok(Variant::Inline);
    }
    let master = MasterPlaylist::try_from(text)
        .map_err(|e| NvrError::ManifestParse(format!("master playlist {base}: {e}")))?;
    let first = master
        .variant_streams
        .iter()
        .find_map(|stream| match stream {
            VariantStream::ExtXStreamInf { uri, .. } => Some(uri.to_string()),
            _ => None,
        })
        .ok_or_else(|| NvrError::ManifestParse(format!("no variants in master playlist {base}")))?;
    Ok(Variant::Playlist(resolve(base, first.trim())?))
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn resolve(base: &Url, reference: &str) -> Result<Url> {
    base.join(reference)
        .map_err(|e| NvrError::ManifestParse(format!("bad URI '{reference}' in {base}: {e}")))
}
