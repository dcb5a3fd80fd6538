//! In-flight frame bookkeeping.

use std::time::Instant;

use crate::error::CoreError;

// ── FramePhase ───────────────────────────────────────────────────

/// Where the single in-flight frame currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// No packets held.
    Idle,
    /// Some, but not all, packets received.
    Assembling,
    /// Every packet received; waiting for the render side to finalize.
    PendingFinalize,
}

// ── FrameAssemblyState ───────────────────────────────────────────

/// Progress of the frame currently being assembled.
///
/// There is exactly one of these per engine. It is reset in place, never
/// reallocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameAssemblyState {
    pub frame_id: u32,
    pub total_packets: u16,
    pub received_packets: u16,
    /// Bytes written to the scratch buffer so far.
    pub total_size: usize,
    pub started_at: Option<Instant>,
    pub complete: bool,
    pub valid: bool,
    pub rendering: bool,
}

impl FrameAssemblyState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Re-initialize for a new frame whose first packet just arrived.
    pub fn begin(&mut self, frame_id: u32, total_packets: u16, first_len: usize, now: Instant) {
        *self = Self {
            frame_id,
            total_packets,
            received_packets: 1,
            total_size: first_len,
            started_at: Some(now),
            complete: total_packets == 1,
            valid: false,
            rendering: false,
        };
    }

    /// Drop the in-flight progress; late packets for it are then refused.
    pub fn abort(&mut self) {
        self.received_packets = 0;
        self.complete = false;
    }

    /// Clear the frame after a render attempt, whatever its outcome.
    pub fn clear_after_render(&mut self) {
        self.complete = false;
        self.valid = false;
        self.rendering = false;
        self.received_packets = 0;
    }

    pub fn is_assembling(&self) -> bool {
        self.received_packets > 0
    }

    pub fn phase(&self) -> FramePhase {
        if self.received_packets == 0 {
            FramePhase::Idle
        } else if self.complete {
            FramePhase::PendingFinalize
        } else {
            FramePhase::Assembling
        }
    }
}

// ── ReceiptRecord ────────────────────────────────────────────────

/// Where one packet's payload landed in the scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

/// One slot per trackable packet index.
///
/// A slot is filled at most once per frame; the whole record is cleared
/// in bulk when a new frame begins.
#[derive(Debug)]
pub struct ReceiptRecord {
    slots: Vec<Option<Span>>,
}

impl ReceiptRecord {
    pub fn allocate(max_packets: u16) -> Result<Self, CoreError> {
        let capacity = max_packets as usize;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| CoreError::Allocation {
                what: "packet receipt record",
                bytes: capacity * std::mem::size_of::<Option<Span>>(),
            })?;
        slots.resize(capacity, None);
        Ok(Self { slots })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
    }

    pub fn is_received(&self, index: u16) -> bool {
        self.span(index).is_some()
    }

    pub fn span(&self, index: u16) -> Option<Span> {
        self.slots.get(index as usize).copied().flatten()
    }

    /// Record `index`. Returns `false` if it was already marked or lies
    /// outside the record.
    pub fn mark(&mut self, index: u16, span: Span) -> bool {
        match self.slots.get_mut(index as usize) {
            Some(slot) if slot.is_none() => {
                *slot = Some(span);
                true
            }
            _ => false,
        }
    }

    /// First index in `0..total` that has not been received.
    pub fn first_missing(&self, total: u16) -> Option<u16> {
        (0..total).find(|&i| !self.is_received(i))
    }
}

// ── Tests ────────────────────────────────────────────────────────
