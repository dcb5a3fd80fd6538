//! The frame engine: every buffer and lock, allocated once.
//!
//! A [`FrameEngine`] is built at startup and shared behind an `Arc` by the
//! ingestion loop, the render scheduler and the monitor. It owns the two
//! locks the contexts coordinate through:
//!
//! - the frame-state lock (inside [`FrameAssembler`]): assembly state,
//!   receipt record and scratch buffer;
//! - the render-phase lock: the stable frame buffer and the canvas.
//!
//! A render takes the render-phase lock first and the frame-state lock
//! second. Nothing takes them in the other order.

use std::mem::size_of;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::frame::{FrameAssembler, FrameAssemblyState, IngestOutcome, Span, StableFrame};
use crate::memory::{MemoryProbe, UnknownMemory};
use crate::metrics::{FrameMetrics, MetricsSnapshot};
use crate::render::{Canvas, RenderStage};
use crate::sync::{RENDER_LOCK_WAIT, TimedLock};

/// Free memory that must remain after the frame buffers are allocated.
pub const STARTUP_HEADROOM: u64 = 20_000;

/// Free memory that must remain after the canvas is allocated.
pub const CANVAS_HEADROOM: u64 = 60_000;

/// Counters plus the in-flight frame, for the monitor.
#[derive(Debug, Clone, Copy)]
pub struct EngineReport {
    pub metrics: MetricsSnapshot,
    /// `None` when the frame-state lock was busy.
    pub current: Option<FrameAssemblyState>,
}

#[derive(Debug)]
pub struct FrameEngine {
    config: EngineConfig,
    metrics: Arc<FrameMetrics>,
    assembler: FrameAssembler,
    render_stage: TimedLock<RenderStage>,
    canvas_enabled: bool,
}

impl FrameEngine {
    /// Build an engine without consulting free memory.
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        Self::with_memory_probe(config, &UnknownMemory)
    }

    /// Build an engine, refusing to start when `probe` reports too little
    /// memory for the frame buffers. The canvas is only allocated when
    /// enough memory remains after that.
    pub fn with_memory_probe(config: EngineConfig, probe: &dyn MemoryProbe) -> Result<Self, CoreError> {
        config.validate()?;

        let needed = required_memory(&config);
        let available = probe.free_bytes();
        if let Some(available) = available.filter(|&a| a < needed) {
            return Err(CoreError::InsufficientMemory { needed, available });
        }

        let metrics = Arc::new(FrameMetrics::new());
        let assembler = FrameAssembler::new(&config, Arc::clone(&metrics))?;
        let stable = StableFrame::allocate(config.max_frame_size)?;
        let canvas = allocate_canvas(&config, available.map(|a| a - needed));
        let canvas_enabled = canvas.is_some();

        info!(
            max_frame_size = config.max_frame_size,
            max_packets = config.max_packets,
            frame_timeout_ms = config.frame_timeout_ms,
            target_fps = config.target_fps,
            canvas = canvas_enabled,
            "frame engine ready"
        );

        Ok(Self {
            config,
            metrics,
            assembler,
            render_stage: TimedLock::new("render-phase", RenderStage::new(stable, canvas)),
            canvas_enabled,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<FrameMetrics> {
        &self.metrics
    }

    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// Whether rendering goes through the off-screen canvas.
    pub fn has_canvas(&self) -> bool {
        self.canvas_enabled
    }

    pub fn ingest(&self, datagram: &[u8]) -> IngestOutcome {
        self.assembler.ingest(datagram)
    }

    pub fn ingest_at(&self, datagram: &[u8], now: Instant) -> IngestOutcome {
        self.assembler.ingest_at(datagram, now)
    }

    pub fn reap(&self) -> bool {
        self.assembler.reap()
    }

    pub fn reap_at(&self, now: Instant) -> bool {
        self.assembler.reap_at(now)
    }

    pub fn status(&self) -> Option<FrameAssemblyState> {
        self.assembler.status()
    }

    pub fn is_frame_complete(&self) -> bool {
        self.assembler.is_frame_complete()
    }

    pub fn report(&self) -> EngineReport {
        EngineReport {
            metrics: self.metrics.snapshot(),
            current: self.status(),
        }
    }

    /// Run `f` against the last finalized frame. `None` if the render
    /// phase is busy.
    pub fn with_stable_frame<T>(&self, f: impl FnOnce(&StableFrame) -> T) -> Option<T> {
        self.render_stage.with(RENDER_LOCK_WAIT, |stage| f(stage.stable()))
    }

    pub(crate) fn render_stage(&self) -> &TimedLock<RenderStage> {
        &self.render_stage
    }
}

/// Bytes the engine needs before anything else may run: both frame
/// buffers, the receipt record and the startup headroom.
pub fn required_memory(config: &EngineConfig) -> u64 {
    let buffers = 2 * config.max_frame_size as u64;
    let receipts = config.max_packets as u64 * size_of::<Option<Span>>() as u64;
    buffers + receipts + STARTUP_HEADROOM
}

fn allocate_canvas(config: &EngineConfig, remaining: Option<u64>) -> Option<Canvas> {
    if !config.canvas.enabled {
        return None;
    }

    let wanted = config.canvas_bytes() + CANVAS_HEADROOM;
    if remaining.is_some_and(|r| r <= wanted) {
        warn!(
            remaining,
            wanted, "not enough memory for the canvas, rendering direct to panel"
        );
        return None;
    }

    match Canvas::allocate(config.canvas.width, config.canvas.height) {
        Ok(canvas) => Some(canvas),
        Err(err) => {
            warn!(%err, "canvas allocation failed, rendering direct to panel");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
