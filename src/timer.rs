use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// A restartable, pausable single-shot delay.
///
/// Every looping component schedules delayed work through this and nothing
/// else, so pausing a session's timers pauses everything feeding its stream.
/// Each timer belongs to exactly one session; pausing one never affects
/// another.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    callback: Option<Callback>,
    duration: Duration,
    remaining: Duration,
    armed_at: Option<Instant>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
    paused: bool,
    destroyed: bool,
}

impl Timer {
    /// Creates the timer and arms it immediately for `duration`.
    pub fn new<F>(callback: F, duration: Duration) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let timer = Self {
            inner: Arc::new(Mutex::new(Inner {
                callback: Some(Arc::new(callback)),
                duration,
                remaining: duration,
                armed_at: None,
                handle: None,
                generation: 0,
                paused: false,
                destroyed: false,
            })),
        };
        Self::arm(&timer.inner, duration);
        timer
    }

    fn arm(inner: &Arc<Mutex<Inner>>, delay: Duration) {
        let generation;
        {
            let mut state = inner.lock();
            if state.destroyed {
                return;
            }
            state.generation += 1;
            generation = state.generation;
            state.armed_at = Some(Instant::now());
            state.remaining = delay;

            if let Some(handle) = state.handle.take() {
                handle.abort();
            }
        }

        let inner_clone = inner.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let callback = {
                let mut state = inner_clone.lock();
                if state.destroyed || state.paused || state.generation != generation {
                    return;
                }
                state.armed_at = None;
                state.handle = None;
                state.callback.clone()
            };

            // Fired outside the lock so the callback may re-arm us.
            if let Some(cb) = callback {
                cb();
            }
        });

        inner.lock().handle = Some(handle);
    }

    /// Stops the countdown, remembering how much time is left.
    /// Returns false if already paused or destroyed.
    pub fn pause(&self) -> bool {
        let mut state = self.inner.lock();
        if state.destroyed || state.paused {
            return false;
        }

        let elapsed = state
            .armed_at
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        state.remaining = state.remaining.saturating_sub(elapsed);
        state.paused = true;

        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
        trace!("timer paused with {:?} remaining", state.remaining);
        true
    }

    /// Re-arms for the remaining time recorded by `pause()`.
    /// Returns false if not paused or destroyed.
    pub fn resume(&self) -> bool {
        let remaining = {
            let mut state = self.inner.lock();
            if state.destroyed || !state.paused {
                return false;
            }
            state.paused = false;
            state.remaining
        };
        Self::arm(&self.inner, remaining);
        true
    }

    /// Cancels any countdown and re-arms for the full original duration,
    /// clearing paused state. Returns false if destroyed.
    pub fn reuse(&self) -> bool {
        let duration = {
            let mut state = self.inner.lock();
            if state.destroyed {
                return false;
            }
            state.paused = false;
            if let Some(handle) = state.handle.take() {
                handle.abort();
            }
            state.duration
        };
        Self::arm(&self.inner, duration);
        true
    }

    /// Like `reuse`, but with a new interval that also becomes the
    /// duration for later `reuse` calls. Returns false if destroyed.
    pub fn reuse_for(&self, duration: Duration) -> bool {
        {
            let mut state = self.inner.lock();
            if state.destroyed {
                return false;
            }
            state.paused = false;
            state.duration = duration;
            if let Some(handle) = state.handle.take() {
                handle.abort();
            }
        }
        Self::arm(&self.inner, duration);
        true
    }

    /// Cancels permanently and drops the callback. Idempotent; after this
    /// no other operation succeeds.
    pub fn destroy(&self) {
        let mut state = self.inner.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.callback = None;
        state.armed_at = None;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
