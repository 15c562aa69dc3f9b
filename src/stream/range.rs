use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::common::errors::StreamError;
use crate::container::WebmSeeker;
use crate::stream::session::{SessionContext, SessionShared, resolve_playback_url};
use crate::timer::Timer;
use crate::transport::{ByteRange, FetchOptions, ResolvedFormat};

/// Derived pacing for one on-demand resource: how many bytes one second
/// of playback occupies, from total length over duration.
pub(crate) struct RangePlan {
    pub bytes_per_sec: u64,
    pub content_length: u64,
}

pub(crate) fn plan(format: &ResolvedFormat) -> Result<RangePlan, StreamError> {
    let content_length = format
        .content_length
        .ok_or_else(|| StreamError::Transport("format reports no content length".into()))?;
    let duration = format
        .duration_secs
        .filter(|d| *d > 0)
        .ok_or_else(|| StreamError::Transport("format reports no duration".into()))?;

    Ok(RangePlan {
        bytes_per_sec: (content_length / duration).max(1),
        content_length,
    })
}

/// Continuous range-fetch of a non-live resource, from byte zero.
pub(crate) async fn run(
    ctx: &SessionContext,
    shared: &Arc<SessionShared>,
    format: ResolvedFormat,
) -> Result<(), StreamError> {
    run_loop(ctx, shared, format, 0, None).await
}

/// The shared pull/retry loop. Each iteration requests one
/// chunk-seconds-equivalent byte range (open-ended when it would run past
/// the end), streams the body downstream and advances `bytes_sent`. A
/// non-success status or a retryable transport error discards the handle,
/// waits out the keep-alive interval, then re-resolves the format URL and
/// resumes at the same `bytes_sent`, so the output never duplicates or
/// skips a byte and a persistently failing source cannot hammer the
/// resolver. The same timer re-requests if the transport stalls short of
/// the expected boundary.
pub(crate) async fn run_loop(
    ctx: &SessionContext,
    shared: &Arc<SessionShared>,
    mut format: ResolvedFormat,
    start_offset: u64,
    mut seeker: Option<WebmSeeker>,
) -> Result<(), StreamError> {
    let plan = plan(&format)?;
    let chunk_bytes = ctx.config.chunk_secs * plan.bytes_per_sec;
    let mut bytes_sent = start_offset;
    let mut url = resolve_playback_url(ctx, &format).await?;

    let (tick_tx, tick_rx) = flume::bounded(1);
    let keepalive = Timer::new(
        move || {
            let _ = tick_tx.try_send(());
        },
        ctx.config.keepalive(),
    );
    shared.register_timer(keepalive.clone());

    loop {
        let range_end = bytes_sent + chunk_bytes;
        let range = ByteRange {
            start: bytes_sent,
            end: if range_end >= plan.content_length {
                None
            } else {
                Some(range_end)
            },
        };

        let response = ctx
            .transport
            .fetch_stream(
                &url,
                FetchOptions {
                    range: Some(range),
                    ..Default::default()
                },
            )
            .await;

        let mut body = match response {
            Ok(r) if r.status < 400 => r.body,
            Ok(r) => {
                warn!(
                    "range fetch got HTTP {} at offset {}, re-resolving on next tick",
                    r.status, bytes_sent
                );
                // Retries ride the keep-alive interval; a channel error
                // means the timer was destroyed by teardown.
                if tick_rx.recv_async().await.is_err() {
                    return Ok(());
                }
                format = ctx
                    .resolver
                    .resolve_format(&ctx.media_url, ctx.quality)
                    .await?;
                url = resolve_playback_url(ctx, &format).await?;
                keepalive.reuse();
                continue;
            }
            Err(e) if e.is_retryable() => {
                warn!("range fetch failed ({}), re-resolving on next tick", e);
                if tick_rx.recv_async().await.is_err() {
                    return Ok(());
                }
                format = ctx
                    .resolver
                    .resolve_format(&ctx.media_url, ctx.quality)
                    .await?;
                url = resolve_playback_url(ctx, &format).await?;
                keepalive.reuse();
                continue;
            }
            Err(e) => return Err(e),
        };

        // Drain the body, racing the keep-alive. The keep-alive only wins
        // when the transport has gone quiet past its interval.
        loop {
            tokio::select! {
                chunk = body.next_chunk() => match chunk {
                    Ok(Some(bytes)) => {
                        bytes_sent += bytes.len() as u64;
                        if !emit(shared, &mut seeker, bytes).await? {
                            return Ok(());
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("body read failed mid-range ({}), re-requesting", e);
                        break;
                    }
                },
                _ = tick_rx.recv_async() => {
                    debug!("keep-alive fired, re-requesting at offset {}", bytes_sent);
                    body.abort();
                    break;
                }
            }
        }

        if bytes_sent >= plan.content_length {
            debug!("range fetch complete at {} bytes", bytes_sent);
            keepalive.destroy();
            return Ok(());
        }
        keepalive.reuse();
    }
}

/// Pushes a body chunk downstream, through the container parser when one
/// is attached so only audio frames reach the output.
async fn emit(
    shared: &Arc<SessionShared>,
    seeker: &mut Option<WebmSeeker>,
    bytes: Bytes,
) -> Result<bool, StreamError> {
    match seeker {
        None => Ok(shared.send_data(bytes).await),
        Some(parser) => {
            for frame in parser.push(&bytes)? {
                if !shared.send_data(frame).await {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}
