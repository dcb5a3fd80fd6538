//! Frame reassembly.
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | `state`     | In-flight frame state and the packet receipt record   |
//! | `assembler` | Packet ingestion, frame-state lock, timeout reaper    |
//! | `finalizer` | Integrity checks and promotion to the stable buffer   |

pub mod assembler;
pub mod finalizer;
pub mod state;

pub use assembler::{Assembly, FrameAssembler, IngestOutcome, Progress};
pub use finalizer::{EOI_SEARCH_WINDOW, FinalizeOutcome, StableFrame, is_well_formed};
pub use state::{FrameAssemblyState, FramePhase, ReceiptRecord, Span};
