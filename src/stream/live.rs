use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::common::errors::StreamError;
use crate::manifest::{LiveManifest, parse_live_manifest};
use crate::stream::session::{SessionContext, SessionShared};
use crate::timer::Timer;
use crate::transport::{FetchOptions, ResolvedFormat};

/// Live-manifest streaming. Precaches the most recent N segments, seeds
/// the sequence counter from the first of them, then fetches
/// `base_url + "sq/" + sequence` on every interval tick. An independent
/// timer re-resolves the signed manifest URL without touching the
/// counter. Transport failures are fatal here: live segments age out and
/// cannot be retried.
pub(crate) async fn run(
    ctx: &SessionContext,
    shared: &Arc<SessionShared>,
    format: ResolvedFormat,
) -> Result<(), StreamError> {
    let mut manifest = fetch_manifest(ctx, &format.url).await?;

    let precache = ctx.config.live_precache.max(1);
    let skip = manifest.segments.len().saturating_sub(precache);
    let mut sequence = manifest.segments[skip..]
        .iter()
        .find_map(|s| s.sequence)
        .ok_or_else(|| StreamError::ManifestParse("segment without sequence number".into()))?;

    debug!(
        "live session precaching {} segments from sequence {}",
        manifest.segments.len() - skip,
        sequence
    );
    for _ in skip..manifest.segments.len() {
        if !push_segment(ctx, shared, &manifest.base_url, sequence).await? {
            return Ok(());
        }
        sequence += 1;
    }

    let mut interval_secs = manifest.target_duration_secs.max(1);
    let (tick_tx, tick_rx) = flume::bounded(1);
    let interval = Timer::new(
        move || {
            let _ = tick_tx.try_send(());
        },
        Duration::from_secs(interval_secs),
    );
    shared.register_timer(interval.clone());

    let (refresh_tx, refresh_rx) = flume::bounded(1);
    let refresh = Timer::new(
        move || {
            let _ = refresh_tx.try_send(());
        },
        ctx.config.manifest_refresh(),
    );
    shared.register_timer(refresh.clone());

    loop {
        tokio::select! {
            _ = tick_rx.recv_async() => {
                if !push_segment(ctx, shared, &manifest.base_url, sequence).await? {
                    return Ok(());
                }
                sequence += 1;
                interval.reuse();
            }
            _ = refresh_rx.recv_async() => {
                // Signed manifest URLs expire; re-resolve and re-parse,
                // keeping `sequence` where it is.
                let fresh = ctx
                    .resolver
                    .resolve_format(&ctx.media_url, ctx.quality)
                    .await?;
                manifest = fetch_manifest(ctx, &fresh.url).await?;
                debug!("live manifest refreshed, base_url now {}", manifest.base_url);

                // The fresh manifest may declare a new segment cadence.
                let fresh_secs = manifest.target_duration_secs.max(1);
                if fresh_secs != interval_secs {
                    interval_secs = fresh_secs;
                    interval.reuse_for(Duration::from_secs(interval_secs));
                }
                refresh.reuse();
            }
        }
    }
}

async fn fetch_manifest(ctx: &SessionContext, url: &str) -> Result<LiveManifest, StreamError> {
    let res = ctx.transport.fetch(url, FetchOptions::default()).await?;
    if !res.is_success() {
        return Err(StreamError::Transport(format!(
            "manifest fetch failed: HTTP {}",
            res.status
        )));
    }
    parse_live_manifest(&res.text())
}

async fn push_segment(
    ctx: &SessionContext,
    shared: &Arc<SessionShared>,
    base_url: &str,
    sequence: u64,
) -> Result<bool, StreamError> {
    let url = format!("{}sq/{}", base_url, sequence);
    let res = ctx.transport.fetch(&url, FetchOptions::default()).await?;
    if !res.is_success() {
        warn!("live segment {} failed with HTTP {}", sequence, res.status);
        return Err(StreamError::Transport(format!(
            "live segment {} failed: HTTP {}",
            sequence, res.status
        )));
    }
    Ok(shared.send_data(res.body).await)
}
