/// Containers the streaming engine knows how to reassemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioContainer {
    Webm,
    Mp4,
    /// MPEG-TS / AAC segments delivered via an HLS-style playlist.
    Ts,
    Unknown,
}

impl AudioContainer {
    pub fn from_mime(mime: &str) -> Self {
        match mime.split(';').next().unwrap_or(mime).trim() {
            "audio/webm" | "video/webm" => Self::Webm,
            "audio/mp4" | "video/mp4" => Self::Mp4,
            "video/mp2t" | "audio/aac" => Self::Ts,
            _ => Self::Unknown,
        }
    }

    /// Detects the container from a resolved stream URL, using itag and
    /// mime hints before falling back to the path extension.
    pub fn from_url(url: &str) -> Self {
        if url.contains(".m3u8") || url.contains("/playlist") {
            return Self::Ts;
        }

        let itag: Option<u32> = url.split('?').nth(1).and_then(|qs| {
            qs.split('&').find_map(|kv| {
                let mut parts = kv.splitn(2, '=');
                if parts.next() == Some("itag") {
                    parts.next().and_then(|v| v.parse().ok())
                } else {
                    None
                }
            })
        });

        match itag {
            Some(249) | Some(250) | Some(251) => return Self::Webm,
            Some(139) | Some(140) | Some(141) => return Self::Mp4,
            _ => {}
        }

        if url.contains("mime=audio%2Fwebm") || url.contains("mime=audio/webm") {
            return Self::Webm;
        }
        if url.contains("mime=audio%2Fmp4") || url.contains("mime=audio/mp4") {
            return Self::Mp4;
        }

        match std::path::Path::new(url.split('?').next().unwrap_or(url))
            .extension()
            .and_then(|s| s.to_str())
        {
            Some("webm") => Self::Webm,
            Some("mp4") | Some("m4a") => Self::Mp4,
            Some("ts") | Some("aac") => Self::Ts,
            _ => Self::Unknown,
        }
    }
}
