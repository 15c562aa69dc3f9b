use crate::common::errors::StreamError;
use crate::manifest::SegmentDescriptor;

/// Default steady-state segment interval when the manifest carries no
/// target duration of its own.
const DEFAULT_TARGET_DURATION_SECS: u64 = 5;

/// The slice of a live DASH-style manifest the streaming engine acts on:
/// the base segment URL, the most recent segment references and the
/// steady-state fetch interval.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveManifest {
    pub base_url: String,
    pub segments: Vec<SegmentDescriptor>,
    pub target_duration_secs: u64,
}

impl LiveManifest {
    /// Sequence number of the first listed segment, the seed for the
    /// steady-state counter.
    pub fn first_sequence(&self) -> Option<u64> {
        self.segments.iter().find_map(|s| s.sequence)
    }
}

/// Text-parses a live manifest: within the `<AdaptationSet id="0">` block,
/// the last `<Representation>` carries the `<BaseURL>` and a
/// `<SegmentList>` of `<SegmentURL media="…"/>` entries whose trailing
/// path segment after `sq/` is the sequence number.
pub fn parse_live_manifest(text: &str) -> Result<LiveManifest, StreamError> {
    let adaptation = block(text, r#"<AdaptationSet id="0""#, "</AdaptationSet>")
        .ok_or_else(|| StreamError::ManifestParse("no audio AdaptationSet".into()))?;

    let representation = rblock(adaptation, "<Representation", "</Representation>")
        .ok_or_else(|| StreamError::ManifestParse("no Representation in AdaptationSet".into()))?;

    let base_url = block(representation, "<BaseURL>", "</BaseURL>")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StreamError::ManifestParse("no BaseURL in Representation".into()))?
        .to_string();

    let segment_list = block(representation, "<SegmentList", "</SegmentList>")
        .ok_or_else(|| StreamError::ManifestParse("no SegmentList in Representation".into()))?;

    let target_duration_secs = regex::Regex::new(r#"duration="(\d+)""#)
        .ok()
        .and_then(|re| re.captures(segment_list))
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(DEFAULT_TARGET_DURATION_SECS);

    let media_re = regex::Regex::new(r#"<SegmentURL\s+media="([^"]+)""#)
        .map_err(|e| StreamError::ManifestParse(e.to_string()))?;

    let mut segments = Vec::new();
    for cap in media_re.captures_iter(segment_list) {
        let media = cap[1].to_string();
        let sequence = media
            .rsplit_once("sq/")
            .map(|(_, tail)| tail)
            .and_then(|tail| {
                tail.split(['/', '?'])
                    .next()
                    .and_then(|s| s.parse::<u64>().ok())
            });
        segments.push(SegmentDescriptor {
            url: media,
            duration_secs: target_duration_secs as f64,
            sequence,
        });
    }

    if segments.is_empty() {
        return Err(StreamError::ManifestParse("SegmentList contained no segments".into()));
    }

    Ok(LiveManifest {
        base_url,
        segments,
        target_duration_secs,
    })
}

/// First `start…end` slice, exclusive of the delimiters' own text.
fn block<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let to = text[from..].find(end)? + from;
    Some(&text[from..to])
}

/// Like `block`, but anchored on the last occurrence of `start`.
fn rblock<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.rfind(start)? + start.len();
    let to = text[from..].find(end)? + from;
    Some(&text[from..to])
}
