//! Synchronization between the ingestion and render contexts.
//!
//! Neither side ever blocks on the other. All shared state sits behind a
//! [`TimedLock`]: a mutex that is only ever acquired with a bounded wait.
//! When the wait expires the caller gives up and drops whatever it was
//! doing (a packet, a render attempt, a reap); the next packet or tick
//! recovers.
//!
//! A handful of flags are mirrored into [`FrameSignals`] so that the hot
//! loops can skip work without touching a lock at all. Those reads may be
//! stale; every decision taken from them is re-checked under the lock
//! before anything is mutated.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

// ── Lock budgets ─────────────────────────────────────────────────

/// Wait budget for ingesting one packet.
pub const INGEST_LOCK_WAIT: Duration = Duration::from_millis(5);

/// Wait budget for the timeout reaper.
pub const REAP_LOCK_WAIT: Duration = Duration::from_millis(2);

/// Wait budget for entering the render phase.
pub const RENDER_LOCK_WAIT: Duration = Duration::from_millis(15);

/// Wait budget for finalizing under the frame-state lock.
pub const FINALIZE_LOCK_WAIT: Duration = Duration::from_millis(10);

/// Wait budget for read-only status queries (monitor).
pub const STATUS_LOCK_WAIT: Duration = Duration::from_millis(1);

// ── TimedLock ────────────────────────────────────────────────────

/// A mutex that can only be taken with a deadline.
///
/// No blocking `lock()` is offered.
#[derive(Debug)]
pub struct TimedLock<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> TimedLock<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
        }
    }

    /// Try to acquire the lock, waiting at most `wait`.
    pub fn acquire(&self, wait: Duration) -> Option<MutexGuard<'_, T>> {
        let guard = self.inner.try_lock_for(wait);
        if guard.is_none() {
            tracing::trace!(lock = self.name, ?wait, "lock contended");
        }
        guard
    }

    /// Run `f` under the lock, or return `None` on contention.
    pub fn with<R>(&self, wait: Duration, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.acquire(wait).map(|mut guard| f(&mut guard))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

// ── FrameSignals ─────────────────────────────────────────────────

/// Lock-free mirrors of the in-flight frame's flags.
///
/// `assembling`, `complete` and the start time are written under the
/// frame-state lock; `rendering` is written under the render-phase lock.
/// All of them are read anywhere.
#[derive(Debug)]
pub struct FrameSignals {
    epoch: Instant,
    complete: AtomicBool,
    rendering: AtomicBool,
    assembling: AtomicBool,
    /// Assembly start, as microseconds since `epoch`.
    started_us: AtomicU64,
}

impl FrameSignals {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            complete: AtomicBool::new(false),
            rendering: AtomicBool::new(false),
            assembling: AtomicBool::new(false),
            started_us: AtomicU64::new(0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::Acquire)
    }

    pub fn is_assembling(&self) -> bool {
        self.assembling.load(Ordering::Acquire)
    }

    /// Fast-path age of the in-flight assembly, `None` when idle.
    pub fn assembly_age(&self, now: Instant) -> Option<Duration> {
        if !self.is_assembling() {
            return None;
        }
        let started = Duration::from_micros(self.started_us.load(Ordering::Acquire));
        let since_epoch = now.saturating_duration_since(self.epoch);
        Some(since_epoch.saturating_sub(started))
    }

    /// Call with the render-phase lock held.
    pub(crate) fn set_rendering(&self, rendering: bool) {
        self.rendering.store(rendering, Ordering::Release);
    }

    /// Mirror the assembly flags. Call with the frame-state lock held.
    pub(crate) fn publish(&self, assembling: bool, complete: bool, started_at: Option<Instant>) {
        if let Some(started) = started_at {
            let us = started.saturating_duration_since(self.epoch).as_micros();
            self.started_us
                .store(u64::try_from(us).unwrap_or(u64::MAX), Ordering::Release);
        }
        self.assembling.store(assembling, Ordering::Release);
        self.complete.store(complete, Ordering::Release);
    }
}

impl Default for FrameSignals {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
