//! Packet source seam and the ingestion loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use crate::engine::FrameEngine;
use crate::error::CoreError;
use crate::frame::IngestOutcome;

/// Yields raw datagrams. No ordering, delivery or uniqueness guarantee.
pub trait PacketSource: Send {
    /// Copy the next datagram into `buf` and return its length, or 0 when
    /// nothing is ready. Never blocks.
    fn try_read_packet(&mut self, buf: &mut [u8]) -> usize;
}

/// What one ingestion cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub read: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub dropped: usize,
    pub reaped: bool,
}

/// Drains a [`PacketSource`] into the engine, then runs the reaper.
pub struct IngestLoop<S: PacketSource> {
    engine: Arc<FrameEngine>,
    source: S,
    buf: Vec<u8>,
    packets_per_cycle: usize,
}

impl<S: PacketSource> IngestLoop<S> {
    pub fn new(
        engine: Arc<FrameEngine>,
        source: S,
        max_datagram: usize,
        packets_per_cycle: usize,
    ) -> Result<Self, CoreError> {
        if max_datagram == 0 || packets_per_cycle == 0 {
            return Err(CoreError::InvalidConfig(
                "datagram size and packets per cycle must be non-zero".into(),
            ));
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(max_datagram)
            .map_err(|_| CoreError::Allocation {
                what: "datagram buffer",
                bytes: max_datagram,
            })?;
        buf.resize(max_datagram, 0);

        Ok(Self {
            engine,
            source,
            buf,
            packets_per_cycle,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn poll(&mut self) -> CycleStats {
        self.poll_at(Instant::now())
    }

    /// Read up to `packets_per_cycle` datagrams, then reap at `now`.
    pub fn poll_at(&mut self, now: Instant) -> CycleStats {
        let mut stats = CycleStats::default();

        for _ in 0..self.packets_per_cycle {
            let len = self.source.try_read_packet(&mut self.buf).min(self.buf.len());
            if len == 0 {
                break;
            }
            stats.read += 1;
            match self.engine.ingest_at(&self.buf[..len], now) {
                IngestOutcome::Accepted(_) => stats.accepted += 1,
                IngestOutcome::Rejected(_) => stats.rejected += 1,
                IngestOutcome::Dropped => stats.dropped += 1,
            }
        }

        stats.reaped = self.engine.reap_at(now);
        stats
    }

    /// Poll every `tick` until `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool, tick: Duration) {
        info!(
            tick_ms = tick.as_millis() as u64,
            packets_per_cycle = self.packets_per_cycle,
            "ingestion loop started"
        );
        while running.load(Ordering::Relaxed) {
            self.poll();
            std::thread::sleep(tick);
        }
        info!("ingestion loop stopped");
    }
}

// ── Tests ────────────────────────────────────────────────────────
