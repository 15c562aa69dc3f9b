use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cipher::CipherCache;
use crate::common::errors::StreamError;
use crate::config::StreamConfig;
use crate::stream::{StreamEvent, StreamKind, hls, live, range, seek};
use crate::timer::Timer;
use crate::transport::{FormatResolver, ResolvedFormat, Transport};

/// Everything a session needs to (re)resolve and pull its source.
/// The retry path re-runs format resolution from here, so the original
/// media URL and quality index stay immutable for the session's lifetime.
pub struct SessionContext {
    pub media_url: String,
    pub quality: u32,
    pub start_time_secs: Option<u64>,
    pub config: StreamConfig,
    pub transport: Arc<dyn Transport>,
    pub resolver: Arc<dyn FormatResolver>,
    pub cipher: Arc<CipherCache>,
}

/// State shared between the session handle and its driving task: the
/// output sink and every Timer the loops register, so pause/close act on
/// all of them without reaching into the loop.
pub(crate) struct SessionShared {
    sink: flume::Sender<StreamEvent>,
    timers: Mutex<Vec<Timer>>,
    closed: AtomicBool,
}

impl SessionShared {
    fn new(sink: flume::Sender<StreamEvent>) -> Self {
        Self {
            sink,
            timers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn register_timer(&self, timer: Timer) {
        if self.closed.load(Ordering::Acquire) {
            timer.destroy();
            return;
        }
        self.timers.lock().push(timer);
    }

    /// Pushes payload bytes downstream, honoring backpressure.
    /// Returns false once the consumer has dropped the receiver.
    pub(crate) async fn send_data(&self, bytes: Bytes) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.sink.send_async(StreamEvent::Data(bytes)).await.is_ok()
    }

    fn pause_all(&self) -> bool {
        let timers = self.timers.lock();
        let mut any = false;
        for timer in timers.iter() {
            any |= timer.pause();
        }
        any
    }

    fn resume_all(&self) -> bool {
        let timers = self.timers.lock();
        let mut any = false;
        for timer in timers.iter() {
            any |= timer.resume();
        }
        any
    }

    /// Idempotent teardown of session-owned resources.
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for timer in self.timers.lock().drain(..) {
            timer.destroy();
        }
    }

    /// Terminal transition: a clean end or exactly one error event,
    /// after which the session is unusable.
    async fn finish(&self, result: Result<(), StreamError>) {
        let event = match result {
            Ok(()) => StreamEvent::End,
            Err(e) => StreamEvent::Error(e),
        };
        if !self.closed.load(Ordering::Acquire) {
            let _ = self.sink.send_async(event).await;
        }
        self.close();
    }
}

/// One active playback. Owns the driving task; at most one transport
/// body is ever in flight, and bytes reach the output in source order.
pub struct StreamSession {
    kind: StreamKind,
    shared: Arc<SessionShared>,
    task: JoinHandle<()>,
}

impl StreamSession {
    /// Resolves the format, validates the seek target, selects the
    /// variant and spawns the session loop. The returned receiver is the
    /// output sink; dropping it closes the session.
    pub async fn open(
        ctx: SessionContext,
    ) -> Result<(Self, flume::Receiver<StreamEvent>), StreamError> {
        let format = ctx
            .resolver
            .resolve_format(&ctx.media_url, ctx.quality)
            .await?;

        // Reject out-of-range seeks before touching the stream itself.
        if let (Some(target), Some(duration)) = (ctx.start_time_secs, format.duration_secs) {
            if !format.live && target >= duration {
                return Err(StreamError::SeekOutOfRange {
                    requested: target,
                    duration,
                });
            }
        }

        let kind = StreamKind::select(&format, ctx.start_time_secs);
        debug!("opening {:?} session for {}", kind, ctx.media_url);

        let (tx, rx) = flume::bounded(64);
        let shared = Arc::new(SessionShared::new(tx));

        let task_shared = shared.clone();
        let task = tokio::spawn(async move {
            let result = match kind {
                StreamKind::RangeFetch => range::run(&ctx, &task_shared, format).await,
                StreamKind::SeekFetch => seek::run(&ctx, &task_shared, format).await,
                StreamKind::LiveManifest => live::run(&ctx, &task_shared, format).await,
                StreamKind::HlsSegment => hls::run(&ctx, &task_shared, format).await,
            };
            task_shared.finish(result).await;
        });

        Ok((
            Self {
                kind,
                shared,
                task,
            },
            rx,
        ))
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Pauses every timer feeding this session. Other sessions are
    /// unaffected.
    pub fn pause(&self) -> bool {
        self.shared.pause_all()
    }

    pub fn resume(&self) -> bool {
        self.shared.resume_all()
    }

    /// Consuming teardown: destroys the timers, aborts the in-flight
    /// transport handle and makes the session unusable. Safe to reach
    /// from an error handler; the underlying cleanup runs once.
    pub fn close(self) {
        self.shared.close();
        self.task.abort();
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.shared.close();
        self.task.abort();
    }
}

/// Applies the signature cipher when the format is protected; plain
/// formats pass their URL through untouched.
pub(crate) async fn resolve_playback_url(
    ctx: &SessionContext,
    format: &ResolvedFormat,
) -> Result<String, StreamError> {
    match &format.cipher {
        Some(cipher) => {
            ctx.cipher
                .resolve_url(
                    &format.url,
                    &cipher.script_url,
                    &cipher.signature,
                    cipher.sp.as_deref(),
                )
                .await
        }
        None => Ok(format.url.clone()),
    }
}
