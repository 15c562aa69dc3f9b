pub mod hls;
pub mod live;
pub mod range;
pub mod seek;
pub mod session;

pub use session::{SessionContext, StreamSession};

use bytes::Bytes;

use crate::common::errors::StreamError;
use crate::common::types::AudioContainer;
use crate::transport::ResolvedFormat;

/// The four source-addressing strategies. Selected once at session
/// creation from the format's container and live status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Continuous range-fetch of an on-demand resource.
    RangeFetch,
    /// Range-fetch prefixed by a head parse + cue lookup, piped through
    /// the container parser.
    SeekFetch,
    /// DASH-style live manifest with a rolling sequence counter.
    LiveManifest,
    /// HLS-style playlist of discrete segments.
    HlsSegment,
}

impl StreamKind {
    pub fn select(format: &ResolvedFormat, start_time_secs: Option<u64>) -> Self {
        if format.live {
            return Self::LiveManifest;
        }
        if format.container == AudioContainer::Ts {
            return Self::HlsSegment;
        }
        if start_time_secs.unwrap_or(0) > 0 && format.container == AudioContainer::Webm {
            return Self::SeekFetch;
        }
        Self::RangeFetch
    }
}

/// What a consumer receives on the session's output channel: payload
/// bytes in strict source order, then either a clean end or exactly one
/// terminal error. Never both, never silent truncation.
#[derive(Debug)]
pub enum StreamEvent {
    Data(Bytes),
    Error(StreamError),
    End,
}
