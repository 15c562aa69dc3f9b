use std::sync::Arc;

use tracing::debug;

use crate::common::errors::StreamError;
use crate::container::{SeekMode, WebmSeeker};
use crate::stream::range;
use crate::stream::session::{SessionContext, SessionShared, resolve_playback_url};
use crate::transport::{ByteRange, FetchOptions, ResolvedFormat};

/// How much of the file front to fetch for head parsing. Covers the EBML
/// head, track table and cue index of typical audio-only WebM files.
const HEAD_FETCH_BYTES: u64 = 256 * 1024;

/// Seek-then-range-fetch: parse the container head from a small prefix
/// range, translate the requested start time into a byte offset via the
/// cue index, then run the plain range loop from that offset with every
/// byte piped through the parser so only audio frames are emitted.
pub(crate) async fn run(
    ctx: &SessionContext,
    shared: &Arc<SessionShared>,
    format: ResolvedFormat,
) -> Result<(), StreamError> {
    let target_secs = ctx.start_time_secs.unwrap_or(0);
    let url = resolve_playback_url(ctx, &format).await?;

    let head = ctx
        .transport
        .fetch(
            &url,
            FetchOptions {
                range: Some(ByteRange {
                    start: 0,
                    end: Some(HEAD_FETCH_BYTES),
                }),
                ..Default::default()
            },
        )
        .await?;
    if !head.is_success() {
        return Err(StreamError::FormatExpired(head.status));
    }

    let mut seeker = WebmSeeker::new(SeekMode::Precise);
    seeker.push(&head.body)?;
    if !seeker.head_complete() {
        // The prefix ended inside the head; seal what we have. Fails if
        // the track table never arrived.
        seeker.mark_head_complete()?;
    }

    let offset = seeker.seek(target_secs)?;
    debug!("seek to {}s resolved to byte offset {}", target_secs, offset);
    seeker.begin_data_at(offset);

    range::run_loop(ctx, shared, format, offset, Some(seeker)).await
}
