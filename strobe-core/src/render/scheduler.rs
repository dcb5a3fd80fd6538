//! Render scheduler.
//!
//! Runs on its own periodic tick. When a complete frame is waiting and
//! the adaptive interval has elapsed, it enters the render phase,
//! finalizes the frame into the stable buffer and hands it to the
//! [`Renderer`]. The pending frame is cleared whether or not finalize and
//! render succeed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::engine::FrameEngine;
use crate::frame::{FinalizeOutcome, StableFrame};
use crate::memory::MemoryProbe;
use crate::render::canvas::{Canvas, Panel, PanelSink, PixelSink};
use crate::render::pacing::AdaptivePacer;
use crate::sync::{FINALIZE_LOCK_WAIT, RENDER_LOCK_WAIT};

// ── Renderer ─────────────────────────────────────────────────────

/// Turns an encoded frame into pixels.
pub trait Renderer: Send {
    /// Decode `frame` into `sink`. Returns `false` if the frame could not
    /// be drawn.
    fn render(&mut self, frame: &[u8], sink: &mut dyn PixelSink) -> bool;
}

// ── RenderStage ──────────────────────────────────────────────────

/// Everything guarded by the render-phase lock.
#[derive(Debug)]
pub struct RenderStage {
    pub(crate) stable: StableFrame,
    pub(crate) canvas: Option<Canvas>,
}

impl RenderStage {
    pub fn new(stable: StableFrame, canvas: Option<Canvas>) -> Self {
        Self { stable, canvas }
    }

    pub fn stable(&self) -> &StableFrame {
        &self.stable
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }
}

// ── TickOutcome ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No complete frame waiting, or a render already under way.
    Idle,
    /// A frame is waiting but the pacing interval has not elapsed.
    NotDue,
    /// A lock could not be taken in time; retried next tick.
    Busy,
    /// The frame was drawn.
    Rendered { frame_id: u32, len: usize },
    /// The frame was finalized but the renderer refused it.
    RenderFailed { frame_id: u32 },
    /// Finalize rejected the frame.
    Discarded(FinalizeOutcome),
}

// ── RenderScheduler ──────────────────────────────────────────────

pub struct RenderScheduler<R: Renderer, P: Panel> {
    engine: Arc<FrameEngine>,
    pacer: AdaptivePacer,
    renderer: R,
    panel: P,
    strip_height: u16,
    width: u16,
    height: u16,
    memory: Option<Arc<dyn MemoryProbe>>,
    min_free_memory: u64,
    memory_period: Duration,
    last_memory_sample: Option<Instant>,
    tick: Duration,
}

impl<R: Renderer, P: Panel> RenderScheduler<R, P> {
    pub fn new(engine: Arc<FrameEngine>, renderer: R, panel: P) -> Self {
        let config = engine.config();
        Self {
            pacer: AdaptivePacer::new(config),
            strip_height: config.transfer_strip_height(),
            width: config.canvas.width,
            height: config.canvas.height,
            min_free_memory: config.min_free_memory,
            memory_period: config.memory_sample_period(),
            last_memory_sample: None,
            tick: config.render_tick(),
            memory: None,
            engine,
            renderer,
            panel,
        }
    }

    /// Sample free memory from the tick, at most once per
    /// `memory_sample_ms`.
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory = Some(probe);
        self
    }

    pub fn pacer(&self) -> &AdaptivePacer {
        &self.pacer
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// One scheduler tick at `now`.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let outcome = self.try_render(now);
        self.sample_memory(now);
        outcome
    }

    fn sample_memory(&mut self, now: Instant) {
        let Some(probe) = &self.memory else {
            return;
        };
        let due = self
            .last_memory_sample
            .is_none_or(|last| now.saturating_duration_since(last) >= self.memory_period);
        if due {
            self.last_memory_sample = Some(now);
            self.engine
                .metrics()
                .check_memory(probe.as_ref(), self.min_free_memory);
        }
    }

    fn try_render(&mut self, now: Instant) -> TickOutcome {
        self.pacer.recompute();

        let engine = Arc::clone(&self.engine);
        let signals = engine.assembler().signals();
        if !signals.is_complete() || signals.is_rendering() {
            return TickOutcome::Idle;
        }
        if !self.pacer.is_due(now) {
            return TickOutcome::NotDue;
        }

        let Some(mut stage) = engine.render_stage().acquire(RENDER_LOCK_WAIT) else {
            return TickOutcome::Busy;
        };
        signals.set_rendering(true);

        let finalized = engine
            .assembler()
            .finalize_into(&mut stage.stable, FINALIZE_LOCK_WAIT);
        let outcome = match finalized {
            None => TickOutcome::Busy,
            Some(FinalizeOutcome::Ready { frame_id, len }) => {
                if self.draw(&mut stage) {
                    self.pacer.record_render(now);
                    engine.metrics().record_rendered();
                    trace!(frame_id, bytes = len, "frame rendered");
                    TickOutcome::Rendered { frame_id, len }
                } else {
                    debug!(frame_id, bytes = len, "renderer rejected frame");
                    TickOutcome::RenderFailed { frame_id }
                }
            }
            Some(rejected) => TickOutcome::Discarded(rejected),
        };

        signals.set_rendering(false);
        outcome
    }

    /// Draw the stable frame, through the canvas when there is one.
    fn draw(&mut self, stage: &mut RenderStage) -> bool {
        let RenderStage { stable, canvas } = stage;
        match canvas {
            Some(canvas) => {
                canvas.clear();
                if !self.renderer.render(stable.as_bytes(), &mut *canvas) {
                    return false;
                }
                let width = canvas.width();
                for strip in canvas.strips(self.strip_height) {
                    self.panel
                        .push_pixels(0, strip.y, width, strip.height, strip.pixels);
                }
                true
            }
            None => {
                let mut sink = PanelSink::new(&mut self.panel, self.width, self.height);
                self.renderer.render(stable.as_bytes(), &mut sink)
            }
        }
    }

    /// Tick until `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) {
        info!(
            tick_ms = self.tick.as_millis() as u64,
            interval_ms = self.pacer.interval().as_millis() as u64,
            strip_height = self.strip_height,
            "render scheduler started"
        );
        while running.load(Ordering::Relaxed) {
            self.tick();
            std::thread::sleep(self.tick);
        }
        info!(rendered = self.pacer.rendered(), "render scheduler stopped");
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CanvasConfig, EngineConfig};
    use crate::memory::{FixedMemory, UnknownMemory};
    use crate::packet::PacketHeader;

    /// Paints one pixel per frame byte count and remembers what it saw.
    #[derive(Default)]
    struct RecordingRenderer {
        frames: Vec<Vec<u8>>,
        fail: bool,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, frame: &[u8], sink: &mut dyn PixelSink) -> bool {
            self.frames.push(frame.to_vec());
            sink.write(0, 0, 1, 1, &[frame.len() as u16]);
            !self.fail
        }
    }

    #[derive(Default)]
    struct StripPanel {
        rows: u32,
    }

    impl Panel for StripPanel {
        fn push_pixels(&mut self, _x: u16, _y: u16, _w: u16, h: u16, _pixels: &[u16]) {
            self.rows += h as u32;
        }
    }

    fn engine(canvas: bool) -> Arc<FrameEngine> {
        let config = EngineConfig {
            max_frame_size: 256,
            max_packets: 8,
            canvas: CanvasConfig {
                enabled: canvas,
                width: 8,
                height: 6,
                ..CanvasConfig::default()
            },
            ..EngineConfig::default()
        };
        Arc::new(FrameEngine::with_memory_probe(config, &UnknownMemory).unwrap())
    }

    fn single(frame_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut dg = PacketHeader {
            frame_id,
            total_packets: 1,
            index: 0,
            payload_len: payload.len() as u32,
        }
        .encode()
        .to_vec();
        dg.extend_from_slice(payload);
        dg
    }

    const GOOD: &[u8] = &[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9];

    #[test]
    fn idle_without_frame() {
        let mut s = RenderScheduler::new(engine(true), RecordingRenderer::default(), StripPanel::default());
        assert_eq!(s.tick(), TickOutcome::Idle);
    }

    #[test]
    fn renders_through_canvas_in_strips() {
        let eng = engine(true);
        let mut s = RenderScheduler::new(Arc::clone(&eng), RecordingRenderer::default(), StripPanel::default());
        eng.ingest(&single(1, GOOD));

        let out = s.tick();
        assert_eq!(out, TickOutcome::Rendered { frame_id: 1, len: GOOD.len() });
        assert_eq!(s.renderer().frames, vec![GOOD.to_vec()]);
        assert_eq!(s.panel().rows, 6);
        assert_eq!(eng.metrics().frames_rendered(), 1);
        assert!(!eng.is_frame_complete());
        assert!(!eng.assembler().signals().is_rendering());
    }

    #[test]
    fn renders_direct_without_canvas() {
        let eng = engine(false);
        assert!(!eng.has_canvas());
        let mut s = RenderScheduler::new(Arc::clone(&eng), RecordingRenderer::default(), StripPanel::default());
        eng.ingest(&single(1, GOOD));
        assert!(matches!(s.tick(), TickOutcome::Rendered { .. }));
        // Only the renderer's single 1x1 block reached the panel.
        assert_eq!(s.panel().rows, 1);
    }

    #[test]
    fn second_frame_waits_for_interval() {
        let eng = engine(true);
        let mut s = RenderScheduler::new(Arc::clone(&eng), RecordingRenderer::default(), StripPanel::default());
        let t0 = Instant::now();

        eng.ingest(&single(1, GOOD));
        assert!(matches!(s.tick_at(t0), TickOutcome::Rendered { .. }));

        eng.ingest(&single(2, GOOD));
        assert_eq!(s.tick_at(t0 + Duration::from_millis(5)), TickOutcome::NotDue);
        assert!(matches!(
            s.tick_at(t0 + Duration::from_millis(16)),
            TickOutcome::Rendered { frame_id: 2, .. }
        ));
    }

    #[test]
    fn corrupt_frame_is_discarded_and_cleared() {
        let eng = engine(true);
        let mut s = RenderScheduler::new(Arc::clone(&eng), RecordingRenderer::default(), StripPanel::default());
        eng.ingest(&single(1, &[0xFF, 0xD8, 0, 0, 0]));

        assert_eq!(s.tick(), TickOutcome::Discarded(FinalizeOutcome::Corrupt));
        assert!(s.renderer().frames.is_empty());
        assert!(!eng.is_frame_complete());
        assert_eq!(eng.metrics().frames_corrupt(), 1);
        assert_eq!(eng.metrics().frames_rendered(), 0);
    }

    #[test]
    fn renderer_failure_still_clears_frame() {
        let eng = engine(true);
        let renderer = RecordingRenderer {
            fail: true,
            ..RecordingRenderer::default()
        };
        let mut s = RenderScheduler::new(Arc::clone(&eng), renderer, StripPanel::default());
        eng.ingest(&single(7, GOOD));

        assert_eq!(s.tick(), TickOutcome::RenderFailed { frame_id: 7 });
        assert!(!eng.is_frame_complete());
        assert_eq!(eng.metrics().frames_completed(), 1);
        assert_eq!(eng.metrics().frames_rendered(), 0);
        assert_eq!(s.pacer().rendered(), 0);
    }

    #[test]
    fn held_render_stage_skips_tick() {
        let eng = engine(true);
        let mut s = RenderScheduler::new(Arc::clone(&eng), RecordingRenderer::default(), StripPanel::default());
        eng.ingest(&single(1, GOOD));

        let guard = eng.render_stage().acquire(Duration::from_millis(1)).unwrap();
        assert_eq!(s.tick(), TickOutcome::Busy);
        drop(guard);

        // The frame survived and renders on the next tick.
        assert!(matches!(s.tick(), TickOutcome::Rendered { .. }));
    }

    #[test]
    fn low_memory_is_sampled_once_per_period() {
        let eng = engine(true);
        let mut s = RenderScheduler::new(Arc::clone(&eng), RecordingRenderer::default(), StripPanel::default())
            .with_memory_probe(Arc::new(FixedMemory(1_000)));
        let t0 = Instant::now();
        s.tick_at(t0);
        s.tick_at(t0 + Duration::from_millis(8));
        s.tick_at(t0 + Duration::from_millis(249));
        assert_eq!(eng.metrics().memory_errors(), 1);

        s.tick_at(t0 + Duration::from_millis(250));
        assert_eq!(eng.metrics().memory_errors(), 2);
    }
}
