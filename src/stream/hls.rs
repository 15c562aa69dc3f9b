use std::sync::Arc;

use tracing::{debug, warn};

use crate::common::errors::StreamError;
use crate::manifest::parse_playlist;
use crate::stream::session::{SessionContext, SessionShared};
use crate::timer::Timer;
use crate::transport::{FetchOptions, ResolvedFormat};

/// HLS-segment streaming. Each cycle re-parses the playlist (its segment
/// URLs expire), resumes at `downloaded_segments`, and pushes segments
/// until roughly `playlist_cap_secs` of declared duration has gone
/// downstream. A refresh timer paces the cycles; an exhausted playlist
/// ends the stream cleanly.
pub(crate) async fn run(
    ctx: &SessionContext,
    shared: &Arc<SessionShared>,
    format: ResolvedFormat,
) -> Result<(), StreamError> {
    let mut playlist_url = format.url.clone();
    let mut downloaded_segments = 0usize;

    let (tick_tx, tick_rx) = flume::bounded(1);
    let refresh = Timer::new(
        move || {
            let _ = tick_tx.try_send(());
        },
        ctx.config.playlist_refresh(),
    );
    shared.register_timer(refresh.clone());

    loop {
        let res = ctx.transport.fetch(&playlist_url, FetchOptions::default()).await;
        let segments = match res {
            Ok(r) if r.is_success() => match parse_playlist(&r.text(), &playlist_url) {
                Ok(segments) => segments,
                Err(e) => {
                    // A mangled playlist fails this cycle only; the next
                    // refresh fetches a fresh copy.
                    warn!("playlist parse failed, retrying next cycle: {}", e);
                    let _ = tick_rx.recv_async().await;
                    refresh.reuse();
                    continue;
                }
            },
            Ok(r) => {
                warn!("playlist fetch got HTTP {}, re-resolving", r.status);
                let fresh = ctx
                    .resolver
                    .resolve_format(&ctx.media_url, ctx.quality)
                    .await?;
                playlist_url = fresh.url;
                refresh.reuse();
                continue;
            }
            Err(e) if e.is_retryable() => {
                warn!("playlist fetch failed ({}), re-resolving", e);
                let fresh = ctx
                    .resolver
                    .resolve_format(&ctx.media_url, ctx.quality)
                    .await?;
                playlist_url = fresh.url;
                refresh.reuse();
                continue;
            }
            Err(e) => return Err(e),
        };

        if downloaded_segments >= segments.len() {
            debug!("playlist exhausted after {} segments", downloaded_segments);
            return Ok(());
        }

        let mut downloaded_time = 0.0f64;
        let mut cycle_ok = true;
        for segment in &segments[downloaded_segments..] {
            let res = match ctx.transport.fetch(&segment.url, FetchOptions::default()).await {
                Ok(res) => res,
                Err(e) if e.is_retryable() => {
                    // Same treatment as an expired URL: the re-parse next
                    // cycle retries this segment with a fresh reference.
                    warn!(
                        "segment {} fetch failed ({}), deferring to refresh",
                        downloaded_segments, e
                    );
                    cycle_ok = false;
                    break;
                }
                Err(e) => return Err(e),
            };
            if !res.is_success() {
                // The segment URL likely expired; the re-parse next cycle
                // hands out fresh ones for everything not yet downloaded.
                warn!(
                    "segment {} failed with HTTP {}, deferring to refresh",
                    downloaded_segments, res.status
                );
                cycle_ok = false;
                break;
            }
            if !shared.send_data(res.body).await {
                return Ok(());
            }
            downloaded_segments += 1;
            downloaded_time += segment.duration_secs;
            if downloaded_time >= ctx.config.playlist_cap_secs {
                break;
            }
        }

        if cycle_ok && downloaded_segments >= segments.len() {
            debug!("playlist exhausted after {} segments", downloaded_segments);
            return Ok(());
        }

        // Wait out the refresh interval, then re-parse and resume.
        let _ = tick_rx.recv_async().await;
        refresh.reuse();
    }
}
