//! Passive frame counters.
//!
//! Counters are increment-only atomics shared by the ingestion, render
//! and monitor contexts. Nothing here influences control flow.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::memory::MemoryProbe;

/// Increment-only counters for the frame pipeline.
#[derive(Debug, Default)]
pub struct FrameMetrics {
    /// Frames whose first packet was accepted.
    frames_started: AtomicU64,
    /// Frames that passed finalize validation.
    frames_completed: AtomicU64,
    /// Frames the renderer reported as drawn.
    frames_rendered: AtomicU64,
    /// Assemblies aborted by the timeout reaper.
    frames_incomplete: AtomicU64,
    /// Frames that failed finalize validation.
    frames_corrupt: AtomicU64,
    /// Samples where free memory was below the threshold.
    memory_errors: AtomicU64,
}

impl FrameMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.frames_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rendered(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_incomplete(&self) {
        self.frames_incomplete.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_corrupt(&self) {
        self.frames_corrupt.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_memory_error(&self) {
        self.memory_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_started(&self) -> u64 {
        self.frames_started.load(Ordering::Relaxed)
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn frames_incomplete(&self) -> u64 {
        self.frames_incomplete.load(Ordering::Relaxed)
    }

    pub fn frames_corrupt(&self) -> u64 {
        self.frames_corrupt.load(Ordering::Relaxed)
    }

    pub fn memory_errors(&self) -> u64 {
        self.memory_errors.load(Ordering::Relaxed)
    }

    /// Completed frames as a percentage of started frames.
    pub fn completion_rate(&self) -> f64 {
        self.snapshot().completion_rate()
    }

    /// Rendered frames as a percentage of completed frames.
    pub fn render_rate(&self) -> f64 {
        self.snapshot().render_rate()
    }

    /// Sample free memory and count a memory error when it is below
    /// `threshold`. Returns `true` when memory is low.
    ///
    /// A probe that cannot report free memory never counts as low.
    pub fn check_memory(&self, probe: &dyn MemoryProbe, threshold: u64) -> bool {
        match probe.free_bytes() {
            Some(free) if free < threshold => {
                self.record_memory_error();
                tracing::debug!(free, threshold, "free memory below threshold");
                true
            }
            _ => false,
        }
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_started: self.frames_started(),
            frames_completed: self.frames_completed(),
            frames_rendered: self.frames_rendered(),
            frames_incomplete: self.frames_incomplete(),
            frames_corrupt: self.frames_corrupt(),
            memory_errors: self.memory_errors(),
        }
    }
}

// ── MetricsSnapshot ──────────────────────────────────────────────

/// Plain copy of [`FrameMetrics`] for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_started: u64,
    pub frames_completed: u64,
    pub frames_rendered: u64,
    pub frames_incomplete: u64,
    pub frames_corrupt: u64,
    pub memory_errors: u64,
}

impl MetricsSnapshot {
    pub fn completion_rate(&self) -> f64 {
        percent(self.frames_completed, self.frames_started)
    }

    pub fn render_rate(&self) -> f64 {
        percent(self.frames_rendered, self.frames_completed)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedMemory;

    #[test]
    fn rates_are_zero_without_data() {
        let m = FrameMetrics::new();
        assert_eq!(m.completion_rate(), 0.0);
        assert_eq!(m.render_rate(), 0.0);
    }

    #[test]
    fn rates_follow_counters() {
        let m = FrameMetrics::new();
        for _ in 0..4 {
            m.record_started();
        }
        m.record_completed();
        m.record_completed();
        m.record_rendered();

        assert_eq!(m.completion_rate(), 50.0);
        assert_eq!(m.render_rate(), 50.0);
    }

    #[test]
    fn snapshot_copies_counters() {
        let m = FrameMetrics::new();
        m.record_incomplete();
        m.record_corrupt();
        m.record_corrupt();

        let snap = m.snapshot();
        assert_eq!(snap.frames_incomplete, 1);
        assert_eq!(snap.frames_corrupt, 2);
        assert_eq!(snap.frames_started, 0);
    }

    #[test]
    fn low_memory_counts_an_error() {
        let m = FrameMetrics::new();
        assert!(m.check_memory(&FixedMemory(10_000), 15_000));
        assert!(!m.check_memory(&FixedMemory(20_000), 15_000));
        assert_eq!(m.memory_errors(), 1);
    }
}
