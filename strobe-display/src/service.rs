//! Receiver service.
//!
//! Owns the frame engine and the three execution contexts around it:
//!
//! 1. **Ingestion** (OS thread): drains the UDP socket every
//!    `ingest_tick_ms`, then runs the timeout reaper.
//! 2. **Render** (OS thread): the render scheduler tick.
//! 3. **Monitor** (tokio task): logs counters every `monitor.interval_ms`.
//!
//! All three stop when the `running` flag is cleared.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use strobe_core::{
    CoreError, EngineReport, FrameEngine, IngestLoop, MemoryProbe, RenderScheduler, SystemMemory,
};

use crate::config::StrobeConfig;
use crate::renderer::{CountingPanel, SnapshotRenderer};
use crate::source::UdpPacketSource;

// ── DisplayService ───────────────────────────────────────────────

pub struct DisplayService {
    config: StrobeConfig,
    snapshot: Option<PathBuf>,
    running: Arc<AtomicBool>,
}

impl DisplayService {
    pub fn new(config: StrobeConfig) -> Self {
        Self {
            config,
            snapshot: None,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Keep the most recent rendered frame at `path`.
    pub fn with_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot = path;
        self
    }

    /// Handle for stopping the service from another task. Clearing it
    /// before `run` has started makes `run` return once setup is done.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// `false` once a stop was requested or `run` has returned.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind, start every context and run until stopped.
    ///
    /// Setup failures (invalid config, not enough memory, bind errors)
    /// are returned before any context starts.
    pub async fn run(&self) -> Result<(), CoreError> {
        let (engine, source) = match self.prepare() {
            Ok(prepared) => prepared,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        if !self.is_running() {
            info!("stop requested during setup");
            return Ok(());
        }

        let ingest = match self.spawn_ingest(Arc::clone(&engine), source) {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let render = match self.spawn_render(Arc::clone(&engine)) {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        monitor(
            Arc::clone(&engine),
            Arc::new(SystemMemory),
            self.config.monitor_interval(),
            Arc::clone(&self.running),
        )
        .await;

        self.running.store(false, Ordering::SeqCst);
        for (name, handle) in [("ingestion", ingest), ("render", render)] {
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                error!("{name} context panicked");
            }
        }

        log_report(&engine.report(), SystemMemory.free_bytes());
        info!("display service stopped");
        Ok(())
    }

    /// Validate the config, build the engine and bind the socket.
    pub fn prepare(&self) -> Result<(Arc<FrameEngine>, UdpPacketSource), CoreError> {
        self.config.validate()?;
        let engine = Arc::new(FrameEngine::with_memory_probe(
            self.config.engine.clone(),
            &SystemMemory,
        )?);
        let source =
            UdpPacketSource::bind(self.config.bind_addr()?, self.config.network.recv_buffer)?;
        Ok((engine, source))
    }

    fn spawn_ingest(
        &self,
        engine: Arc<FrameEngine>,
        source: UdpPacketSource,
    ) -> Result<JoinHandle<()>, CoreError> {
        let net = &self.config.network;
        let mut ingest = IngestLoop::new(engine, source, net.max_datagram, net.packets_per_cycle)?;
        let tick = self.config.ingest_tick();
        let running = Arc::clone(&self.running);

        let handle = thread::Builder::new()
            .name("strobe-ingest".into())
            .spawn(move || ingest.run(&running, tick))?;
        Ok(handle)
    }

    fn spawn_render(&self, engine: Arc<FrameEngine>) -> Result<JoinHandle<()>, CoreError> {
        let renderer = SnapshotRenderer::new(self.snapshot.clone());
        let mut scheduler = RenderScheduler::new(engine, renderer, CountingPanel::default())
            .with_memory_probe(Arc::new(SystemMemory));
        let running = Arc::clone(&self.running);

        let handle = thread::Builder::new()
            .name("strobe-render".into())
            .spawn(move || scheduler.run(&running))?;
        Ok(handle)
    }
}

// ── Monitor ──────────────────────────────────────────────────────

/// Log engine statistics every `interval` until `running` is cleared.
pub async fn monitor(
    engine: Arc<FrameEngine>,
    probe: Arc<dyn MemoryProbe>,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    let mut memory_errors = 0;

    while running.load(Ordering::SeqCst) {
        // Wake often enough to notice a stop request.
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::time::sleep(Duration::from_millis(50)) => continue,
        }

        let report = engine.report();
        log_report(&report, probe.free_bytes());
        if report.metrics.memory_errors > memory_errors {
            warn!(
                new = report.metrics.memory_errors - memory_errors,
                total = report.metrics.memory_errors,
                "low-memory samples since last report"
            );
            memory_errors = report.metrics.memory_errors;
        }
    }
}

/// One structured statistics record.
pub fn log_report(report: &EngineReport, free_memory: Option<u64>) {
    let m = &report.metrics;
    let (frame_id, received, total, size) = report
        .current
        .map(|c| (c.frame_id, c.received_packets, c.total_packets, c.total_size))
        .unwrap_or_default();

    info!(
        started = m.frames_started,
        completed = m.frames_completed,
        completion_pct = m.completion_rate(),
        rendered = m.frames_rendered,
        render_pct = m.render_rate(),
        incomplete = m.frames_incomplete,
        corrupt = m.frames_corrupt,
        frame_id,
        received,
        total,
        size,
        free_kb = free_memory.map(|b| b / 1024),
        memory_errors = m.memory_errors,
        "frame statistics"
    );
}

// ── Tests ────────────────────────────────────────────────────────
