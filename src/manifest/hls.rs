use crate::common::errors::StreamError;
use crate::manifest::{SegmentDescriptor, resolve_url};

/// Small line-oriented playlist parser, handling just enough of the format
/// for segmented audio delivery: `#EXTINF:<seconds>` declares the next
/// segment's duration, the following non-comment line is its URL.
pub fn parse_playlist(text: &str, base_url: &str) -> Result<Vec<SegmentDescriptor>, StreamError> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    if !lines.iter().any(|l| l.starts_with("#EXTM3U") || l.starts_with("#EXTINF")) {
        return Err(StreamError::ManifestParse("not an m3u8 playlist".into()));
    }

    let mut segments = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let duration = rest
                .split(',')
                .next()
                .and_then(|d| d.trim().parse::<f64>().ok())
                .ok_or_else(|| {
                    StreamError::ManifestParse(format!("bad EXTINF line: {}", line))
                })?;

            let mut j = i + 1;
            while j < lines.len() && (lines[j].starts_with('#') || lines[j].is_empty()) {
                j += 1;
            }
            if j < lines.len() {
                segments.push(SegmentDescriptor {
                    url: resolve_url(base_url, lines[j]),
                    duration_secs: duration,
                    sequence: None,
                });
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }

    if segments.is_empty() {
        return Err(StreamError::ManifestParse("playlist contained no segments".into()));
    }
    Ok(segments)
}
