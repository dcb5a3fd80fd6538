//! Packet ingestion and the timeout reaper.
//!
//! The ingestion hot path does header checks before touching the lock,
//! holds the frame-state lock only for a bounded wait, and never performs
//! structural image validation; that is deferred to the
//! [`finalizer`](super::finalizer).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::MutexGuard;
use tracing::{debug, trace};

use crate::buffer::FixedBuffer;
use crate::config::EngineConfig;
use crate::error::{CoreError, Rejection};
use crate::frame::finalizer::{self, FinalizeOutcome, StableFrame};
use crate::frame::state::{FrameAssemblyState, FramePhase, ReceiptRecord, Span};
use crate::metrics::FrameMetrics;
use crate::packet::{Packet, SOI_MARKER};
use crate::sync::{FrameSignals, INGEST_LOCK_WAIT, REAP_LOCK_WAIT, STATUS_LOCK_WAIT, TimedLock};

// ── Outcomes ─────────────────────────────────────────────────────

/// Assembly progress after an accepted packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub frame_id: u32,
    pub received: u16,
    pub total: u16,
    /// Every packet of the frame is now present.
    pub complete: bool,
    /// This packet opened a new frame.
    pub started: bool,
}

/// What happened to one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted(Progress),
    Rejected(Rejection),
    /// The frame-state lock was contended; the packet was dropped.
    Dropped,
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted(_))
    }
}

// ── Assembly ─────────────────────────────────────────────────────

/// Everything guarded by the frame-state lock.
#[derive(Debug)]
pub struct Assembly {
    pub(crate) state: FrameAssemblyState,
    pub(crate) receipts: ReceiptRecord,
    pub(crate) scratch: FixedBuffer,
}

impl Assembly {
    pub fn allocate(config: &EngineConfig) -> Result<Self, CoreError> {
        Ok(Self {
            state: FrameAssemblyState::default(),
            receipts: ReceiptRecord::allocate(config.max_packets)?,
            scratch: FixedBuffer::allocate("assembly buffer", config.max_frame_size)?,
        })
    }

    pub fn state(&self) -> &FrameAssemblyState {
        &self.state
    }

    pub fn receipts(&self) -> &ReceiptRecord {
        &self.receipts
    }

    /// Apply one already-parsed packet.
    pub fn apply(&mut self, packet: &Packet<'_>, now: Instant) -> Result<Progress, Rejection> {
        if packet.is_first() {
            self.start_frame(packet, now)
        } else {
            self.continue_frame(packet)
        }
    }

    fn start_frame(&mut self, packet: &Packet<'_>, now: Instant) -> Result<Progress, Rejection> {
        let payload = packet.payload();
        if !payload.starts_with(&SOI_MARKER) {
            return Err(Rejection::InvalidLeadingMarker);
        }

        // The new frame supersedes whatever was in flight, even when it
        // cannot itself be held.
        if payload.len() > self.scratch.capacity() {
            self.state.abort();
            return Err(Rejection::Overflow {
                max: self.scratch.capacity(),
            });
        }

        self.state
            .begin(packet.frame_id(), packet.total_packets(), payload.len(), now);
        self.receipts.clear();
        self.receipts.mark(
            0,
            Span {
                offset: 0,
                len: payload.len(),
            },
        );
        self.scratch.write_at(0, payload);

        Ok(self.progress(true))
    }

    fn continue_frame(&mut self, packet: &Packet<'_>) -> Result<Progress, Rejection> {
        let index = packet.index();
        let payload = packet.payload();

        if !self.state.is_assembling()
            || packet.frame_id() != self.state.frame_id
            || packet.total_packets() != self.state.total_packets
        {
            return Err(Rejection::FrameMismatch {
                frame_id: packet.frame_id(),
            });
        }
        if self.receipts.is_received(index) {
            return Err(Rejection::DuplicateIndex { index });
        }

        let offset = self.state.total_size;
        let span = Span {
            offset,
            len: payload.len(),
        };
        if !self.scratch.write_at(offset, payload) {
            // The frame can no longer be completed within budget.
            self.state.abort();
            return Err(Rejection::Overflow {
                max: self.scratch.capacity(),
            });
        }

        self.receipts.mark(index, span);
        self.state.total_size += payload.len();
        self.state.received_packets += 1;
        if self.state.received_packets == self.state.total_packets {
            self.state.complete = true;
        }

        Ok(self.progress(false))
    }

    fn progress(&self, started: bool) -> Progress {
        Progress {
            frame_id: self.state.frame_id,
            received: self.state.received_packets,
            total: self.state.total_packets,
            complete: self.state.complete,
            started,
        }
    }
}

// ── FrameAssembler ───────────────────────────────────────────────

/// Owner of the in-flight frame and its frame-state lock.
#[derive(Debug)]
pub struct FrameAssembler {
    assembly: TimedLock<Assembly>,
    signals: FrameSignals,
    metrics: Arc<FrameMetrics>,
    max_packets: usize,
    timeout: Duration,
}

impl FrameAssembler {
    pub fn new(config: &EngineConfig, metrics: Arc<FrameMetrics>) -> Result<Self, CoreError> {
        Ok(Self {
            assembly: TimedLock::new("frame-state", Assembly::allocate(config)?),
            signals: FrameSignals::new(),
            metrics,
            max_packets: config.max_packets as usize,
            timeout: config.frame_timeout(),
        })
    }

    /// Ingest one raw datagram.
    pub fn ingest(&self, datagram: &[u8]) -> IngestOutcome {
        self.ingest_at(datagram, Instant::now())
    }

    /// Ingest one raw datagram, using `now` as the arrival time.
    pub fn ingest_at(&self, datagram: &[u8], now: Instant) -> IngestOutcome {
        let packet = match Packet::parse(datagram, self.max_packets) {
            Ok(p) => p,
            Err(reason) => {
                trace!(%reason, len = datagram.len(), "packet rejected before lock");
                return IngestOutcome::Rejected(reason);
            }
        };

        let Some(mut assembly) = self.assembly.acquire(INGEST_LOCK_WAIT) else {
            return IngestOutcome::Dropped;
        };
        let result = assembly.apply(&packet, now);
        self.publish(&assembly.state);
        drop(assembly);

        match result {
            Ok(progress) => {
                if progress.started {
                    self.metrics.record_started();
                }
                if progress.complete {
                    debug!(
                        frame_id = progress.frame_id,
                        packets = progress.total,
                        "frame fully received"
                    );
                }
                IngestOutcome::Accepted(progress)
            }
            Err(reason) => {
                debug!(
                    frame_id = packet.frame_id(),
                    index = packet.index(),
                    %reason,
                    "packet rejected"
                );
                IngestOutcome::Rejected(reason)
            }
        }
    }

    /// Abort the in-flight assembly if it has outlived the timeout.
    pub fn reap(&self) -> bool {
        self.reap_at(Instant::now())
    }

    /// Reap using `now` as the current time. Returns `true` when an
    /// assembly was aborted.
    pub fn reap_at(&self, now: Instant) -> bool {
        match self.signals.assembly_age(now) {
            Some(age) if age > self.timeout => {}
            _ => return false,
        }

        // Missing the lock is fine; the next tick tries again.
        let Some(mut assembly) = self.assembly.acquire(REAP_LOCK_WAIT) else {
            return false;
        };

        let state = &mut assembly.state;
        let expired = state.phase() == FramePhase::Assembling
            && state
                .started_at
                .is_some_and(|t| now.saturating_duration_since(t) > self.timeout);
        if !expired {
            return false;
        }

        debug!(
            frame_id = state.frame_id,
            received = state.received_packets,
            total = state.total_packets,
            "frame assembly timed out"
        );
        state.abort();
        self.publish(&assembly.state);
        drop(assembly);

        self.metrics.record_incomplete();
        true
    }

    /// Finalize the pending frame into `stable` and clear it.
    ///
    /// Returns `None` when the frame-state lock could not be taken within
    /// `wait`, or when the frame is no longer complete once the lock is
    /// held. The frame is cleared whatever the finalize outcome.
    pub(crate) fn finalize_into(
        &self,
        stable: &mut StableFrame,
        wait: Duration,
    ) -> Option<FinalizeOutcome> {
        let mut assembly = self.assembly.acquire(wait)?;
        if !assembly.state.complete {
            self.publish(&assembly.state);
            return None;
        }

        assembly.state.rendering = true;
        let outcome = finalizer::finalize(&mut assembly, stable, &self.metrics);
        assembly.state.clear_after_render();
        self.publish(&assembly.state);
        Some(outcome)
    }

    /// Copy of the in-flight state, if the lock is free right now.
    pub fn status(&self) -> Option<FrameAssemblyState> {
        self.assembly.with(STATUS_LOCK_WAIT, |a| a.state)
    }

    pub fn signals(&self) -> &FrameSignals {
        &self.signals
    }

    /// Lock-free hint that a frame is waiting to be finalized.
    pub fn is_frame_complete(&self) -> bool {
        self.signals.is_complete()
    }

    /// Take the frame-state lock directly (tests, diagnostics).
    pub fn lock(&self, wait: Duration) -> Option<MutexGuard<'_, Assembly>> {
        self.assembly.acquire(wait)
    }

    fn publish(&self, state: &FrameAssemblyState) {
        self.signals.publish(
            state.phase() == FramePhase::Assembling,
            state.complete,
            state.started_at,
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────
