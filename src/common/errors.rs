use thiserror::Error;

/// Failure taxonomy for a streaming session.
///
/// Transport-level failures are handled inside the fetch loop by
/// re-resolving the stream URL; everything else terminates the session.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// Connection-level or HTTP failure. Retryable by re-resolution.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A previously valid stream URL now answers 403/404.
    #[error("stream URL expired (HTTP {0})")]
    FormatExpired(u16),

    /// The player script no longer matches the known cipher layout.
    #[error("cipher layout not recognized")]
    CipherLayout,

    /// Malformed EBML, missing cues, or no cluster boundary in range.
    #[error("container parse failure: {0}")]
    ContainerParse(String),

    /// Malformed DASH/HLS manifest text.
    #[error("manifest parse failure: {0}")]
    ManifestParse(String),

    /// Requested start time outside the track's duration.
    #[error("seek target {requested}s outside 0..{duration}s")]
    SeekOutOfRange { requested: u64, duration: u64 },
}

impl StreamError {
    /// Whether the fetch loop may recover by re-resolving the format URL.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::FormatExpired(_))
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
