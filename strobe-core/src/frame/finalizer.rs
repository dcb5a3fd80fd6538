//! Frame finalization.
//!
//! Once every packet of a frame is present, the finalizer re-checks the
//! receipt record, validates the image framing and promotes the payloads
//! into the stable buffer the renderer reads from.
//!
//! Payloads sit in the scratch buffer in arrival order. The receipt
//! record remembers each packet's span, so the stable buffer always
//! receives them in index order.

use tracing::{debug, warn};

use crate::buffer::FixedBuffer;
use crate::error::CoreError;
use crate::frame::assembler::Assembly;
use crate::frame::state::ReceiptRecord;
use crate::metrics::FrameMetrics;
use crate::packet::{EOI_MARKER, SOI_MARKER};

/// How far back from the end of a frame the end-of-image marker may sit.
pub const EOI_SEARCH_WINDOW: usize = 20;

// ── FinalizeOutcome ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The stable buffer now holds `len` bytes of frame `frame_id`.
    Ready { frame_id: u32, len: usize },
    /// A packet index was never received.
    Incomplete { missing: u16 },
    /// The image markers are missing or misplaced.
    Corrupt,
}

impl FinalizeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, FinalizeOutcome::Ready { .. })
    }
}

// ── StableFrame ──────────────────────────────────────────────────

/// The last successfully finalized frame.
#[derive(Debug)]
pub struct StableFrame {
    buffer: FixedBuffer,
    len: usize,
    frame_id: u32,
}

impl StableFrame {
    pub fn allocate(capacity: usize) -> Result<Self, CoreError> {
        Ok(Self {
            buffer: FixedBuffer::allocate("stable frame buffer", capacity)?,
            len: 0,
            frame_id: 0,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.head(self.len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }
}

// ── Finalize ─────────────────────────────────────────────────────

/// Validate the pending frame in `assembly` and, if sound, copy it into
/// `stable`. On failure `stable` is left untouched.
pub fn finalize(
    assembly: &mut Assembly,
    stable: &mut StableFrame,
    metrics: &FrameMetrics,
) -> FinalizeOutcome {
    let state = assembly.state;
    let view = OrderedFrame {
        scratch: assembly.scratch.head(state.total_size),
        receipts: &assembly.receipts,
        total: state.total_packets,
    };

    let outcome = match verify(&view, state.total_size) {
        Ok(()) => {
            view.read(0, &mut stable.buffer.as_mut_slice()[..state.total_size]);
            stable.len = state.total_size;
            stable.frame_id = state.frame_id;
            FinalizeOutcome::Ready {
                frame_id: state.frame_id,
                len: state.total_size,
            }
        }
        Err(failure) => failure,
    };

    match outcome {
        FinalizeOutcome::Ready { frame_id, len } => {
            assembly.state.valid = true;
            metrics.record_completed();
            debug!(frame_id, packets = state.total_packets, bytes = len, "frame assembled");
        }
        FinalizeOutcome::Incomplete { missing } => {
            metrics.record_corrupt();
            warn!(frame_id = state.frame_id, missing, "frame missing packet at finalize");
        }
        FinalizeOutcome::Corrupt => {
            metrics.record_corrupt();
            warn!(frame_id = state.frame_id, bytes = state.total_size, "invalid image framing");
        }
    }

    outcome
}

fn verify(view: &OrderedFrame<'_>, size: usize) -> Result<(), FinalizeOutcome> {
    if view.total == 0 {
        return Err(FinalizeOutcome::Incomplete { missing: 0 });
    }
    if let Some(missing) = view.receipts.first_missing(view.total) {
        return Err(FinalizeOutcome::Incomplete { missing });
    }
    if size < SOI_MARKER.len() {
        return Err(FinalizeOutcome::Corrupt);
    }

    let mut head = [0u8; 2];
    view.read(0, &mut head);

    let window = size.min(EOI_SEARCH_WINDOW);
    let mut tail = [0u8; EOI_SEARCH_WINDOW];
    view.read(size - window, &mut tail[..window]);

    if has_start_marker(&head) && has_end_marker(&tail[..window]) {
        Ok(())
    } else {
        Err(FinalizeOutcome::Corrupt)
    }
}

/// Whether a contiguous frame carries valid image framing: start marker
/// at offset 0 and an end marker within the last [`EOI_SEARCH_WINDOW`]
/// bytes.
pub fn is_well_formed(frame: &[u8]) -> bool {
    let window = frame.len().min(EOI_SEARCH_WINDOW);
    has_start_marker(frame) && has_end_marker(&frame[frame.len() - window..])
}

fn has_start_marker(head: &[u8]) -> bool {
    head.starts_with(&SOI_MARKER)
}

fn has_end_marker(tail: &[u8]) -> bool {
    tail.windows(EOI_MARKER.len()).any(|w| w == EOI_MARKER)
}

// ── OrderedFrame ─────────────────────────────────────────────────

/// Index-ordered view over payloads stored in arrival order.
struct OrderedFrame<'a> {
    scratch: &'a [u8],
    receipts: &'a ReceiptRecord,
    total: u16,
}

impl OrderedFrame<'_> {
    /// Copy logical bytes `start..start + out.len()` into `out`.
    fn read(&self, start: usize, out: &mut [u8]) {
        let end = start + out.len();
        let mut pos = 0usize;

        for index in 0..self.total {
            let Some(span) = self.receipts.span(index) else {
                continue;
            };
            let seg_start = pos;
            let seg_end = pos + span.len;
            pos = seg_end;

            if seg_end <= start {
                continue;
            }
            if seg_start >= end {
                break;
            }

            let from = start.max(seg_start);
            let to = end.min(seg_end);
            let src = span.offset + (from - seg_start)..span.offset + (to - seg_start);
            out[from - start..to - start].copy_from_slice(&self.scratch[src]);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
