pub mod dash;
pub mod hls;

pub use dash::{LiveManifest, parse_live_manifest};
pub use hls::parse_playlist;

/// One addressable media segment from a live manifest or HLS playlist.
/// Segment lists are replaced wholesale on every manifest re-parse.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    pub url: String,
    pub duration_secs: f64,
    pub sequence: Option<u64>,
}

/// Joins a possibly-relative reference against the playlist's own URL.
pub(crate) fn resolve_url(base: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], reference.trim_start_matches('/')),
        None => reference.to_string(),
    }
}
