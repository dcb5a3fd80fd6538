//! Adaptive render pacing.
//!
//! The render loop ticks at a fixed base period, but only renders when
//! the adaptive interval has elapsed since the last successful render.
//! Every `pacing_window` renders the achieved rate is compared with the
//! target: more than 10% fast relaxes the interval by one step toward the
//! slow ceiling, more than 10% slow tightens it toward the fast floor.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::EngineConfig;

/// Interval adjustment per recomputation.
pub const PACING_STEP: Duration = Duration::from_millis(1);

/// Tolerance band around the target rate.
const TOLERANCE: f64 = 0.10;

/// Result of one pacing recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingDecision {
    /// Too fast; interval lengthened.
    Relaxed,
    /// Too slow; interval shortened.
    Tightened,
    /// Within tolerance.
    Held,
    /// Not at a window boundary.
    NotDue,
}

/// Self-tuning minimum time between renders.
#[derive(Debug, Clone)]
pub struct AdaptivePacer {
    interval: Duration,
    fast: Duration,
    slow: Duration,
    target_fps: f64,
    window: u32,
    last_render: Option<Instant>,
    window_start: Option<Instant>,
    /// Render-to-render gaps measured since `window_start`.
    window_gaps: u32,
    rendered: u64,
    /// Render count at the last recomputation.
    evaluated_at: u64,
}

impl AdaptivePacer {
    /// Start at the slow ceiling.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            interval: config.slow_render_interval(),
            fast: config.fast_render_interval(),
            slow: config.slow_render_interval(),
            target_fps: config.target_fps as f64,
            window: config.pacing_window,
            last_render: None,
            window_start: None,
            window_gaps: 0,
            rendered: 0,
            evaluated_at: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.fast, self.slow)
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn last_render(&self) -> Option<Instant> {
        self.last_render
    }

    /// Whether enough time has passed since the last successful render.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_render
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Note a successful render at `now`.
    pub fn record_render(&mut self, now: Instant) {
        if self.last_render.is_some() {
            self.window_gaps += 1;
        } else {
            self.window_start = Some(now);
        }
        self.last_render = Some(now);
        self.rendered += 1;
    }

    /// Re-tune the interval if a full window of renders has completed
    /// since the last recomputation.
    pub fn recompute(&mut self) -> PacingDecision {
        if self.window == 0
            || self.rendered == 0
            || self.rendered % self.window as u64 != 0
            || self.rendered == self.evaluated_at
        {
            return PacingDecision::NotDue;
        }
        self.evaluated_at = self.rendered;

        let (Some(start), Some(end)) = (self.window_start, self.last_render) else {
            return PacingDecision::NotDue;
        };
        // The first window has one gap fewer than it has renders.
        let gaps = std::mem::take(&mut self.window_gaps);
        self.window_start = Some(end);
        if gaps == 0 {
            return PacingDecision::Held;
        }
        let elapsed = end
            .saturating_duration_since(start)
            .max(Duration::from_millis(1));
        let achieved = gaps as f64 / elapsed.as_secs_f64();

        let decision = if achieved > self.target_fps * (1.0 + TOLERANCE) {
            self.interval = (self.interval + PACING_STEP).min(self.slow);
            PacingDecision::Relaxed
        } else if achieved < self.target_fps * (1.0 - TOLERANCE) {
            self.interval = self.interval.saturating_sub(PACING_STEP).max(self.fast);
            PacingDecision::Tightened
        } else {
            PacingDecision::Held
        };

        debug!(
            achieved_fps = achieved,
            interval_ms = self.interval.as_millis() as u64,
            ?decision,
            "render pacing recomputed"
        );
        decision
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pacer() -> AdaptivePacer {
        AdaptivePacer::new(&EngineConfig::default())
    }

    /// Render `n` frames `spacing` apart starting at `t`; returns the last time.
    fn render_n(p: &mut AdaptivePacer, t: Instant, n: u32, spacing: Duration) -> Instant {
        let mut now = t;
        for _ in 0..n {
            now += spacing;
            p.record_render(now);
        }
        now
    }

    #[test]
    fn starts_at_slow_ceiling_and_is_due() {
        let p = pacer();
        assert_eq!(p.interval(), Duration::from_millis(16));
        assert!(p.is_due(Instant::now()));
    }

    #[test]
    fn due_only_after_interval() {
        let mut p = pacer();
        let t0 = Instant::now();
        p.record_render(t0);
        assert!(!p.is_due(t0 + Duration::from_millis(15)));
        assert!(p.is_due(t0 + Duration::from_millis(16)));
    }

    #[test]
    fn slow_rendering_tightens() {
        let mut p = pacer();
        // 30 renders 25ms apart: ~40 fps against a 60 fps target.
        render_n(&mut p, Instant::now(), 30, Duration::from_millis(25));
        assert_eq!(p.recompute(), PacingDecision::Tightened);
        assert_eq!(p.interval(), Duration::from_millis(15));
        // Same window is not evaluated twice.
        assert_eq!(p.recompute(), PacingDecision::NotDue);
    }

    #[test]
    fn first_window_counts_gaps_not_renders() {
        let mut p = pacer();
        // 30 renders 19ms apart: 52.6 fps, just under the 54 fps band.
        render_n(&mut p, Instant::now(), 30, Duration::from_millis(19));
        assert_eq!(p.recompute(), PacingDecision::Tightened);
    }

    #[test]
    fn later_windows_measure_from_previous_last_render() {
        let mut p = pacer();
        let t = render_n(&mut p, Instant::now(), 30, Duration::from_millis(17));
        let _ = p.recompute();
        render_n(&mut p, t, 30, Duration::from_millis(19));
        assert_eq!(p.recompute(), PacingDecision::Tightened);
    }

    #[test]
    fn fast_rendering_relaxes_but_not_past_ceiling() {
        let mut p = pacer();
        render_n(&mut p, Instant::now(), 30, Duration::from_millis(5));
        assert_eq!(p.recompute(), PacingDecision::Relaxed);
        assert_eq!(p.interval(), Duration::from_millis(16));
    }

    #[test]
    fn on_target_holds() {
        let mut p = pacer();
        let t = render_n(&mut p, Instant::now(), 30, Duration::from_millis(17));
        // The second window spans exactly 30 intervals of ~16.7ms.
        let _ = p.recompute();
        render_n(&mut p, t, 30, Duration::from_micros(16_667));
        assert_eq!(p.recompute(), PacingDecision::Held);
    }

    #[test]
    fn never_below_fast_floor() {
        let mut p = pacer();
        let mut t = Instant::now();
        for _ in 0..20 {
            t = render_n(&mut p, t, 30, Duration::from_millis(100));
            p.recompute();
        }
        assert_eq!(p.interval(), Duration::from_millis(8));
    }

    proptest! {
        #[test]
        fn interval_stays_in_bounds(spacings in prop::collection::vec(1u64..200, 1..400)) {
            let mut p = pacer();
            let (fast, slow) = p.bounds();
            let mut now = Instant::now();
            for ms in spacings {
                now += Duration::from_millis(ms);
                p.record_render(now);
                p.recompute();
                prop_assert!(p.interval() >= fast && p.interval() <= slow);
            }
        }
    }
}
