//! # strobe-core
//!
//! Frame reassembly and adaptive render pacing for lossy datagram video.
//!
//! This crate contains:
//! - **Wire format**: `PacketHeader`, `Packet`, `packetize`
//! - **Frame**: `FrameAssembler` (ingestion + timeout reaper) and the
//!   finalizer that promotes validated frames to the stable buffer
//! - **Render**: `AdaptivePacer`, `RenderScheduler`, the `PixelSink` /
//!   `Panel` seams and the off-screen `Canvas`
//! - **Engine**: `FrameEngine`, the single owner of every buffer and lock
//! - **Source**: `PacketSource` and the `IngestLoop` that drains it
//! - **Sync**: `TimedLock` (bounded-wait mutex) and lock-free `FrameSignals`
//! - **Metrics**: `FrameMetrics` counters and `MemoryProbe`
//! - **Error**: `CoreError` and per-packet `Rejection`, `thiserror`-based

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod memory;
pub mod metrics;
pub mod packet;
pub mod render;
pub mod source;
pub mod sync;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::{CanvasConfig, EngineConfig};
pub use engine::{EngineReport, FrameEngine, required_memory};
pub use error::{CoreError, Rejection};
pub use frame::{
    FinalizeOutcome, FrameAssembler, FrameAssemblyState, FramePhase, IngestOutcome, Progress,
    StableFrame, is_well_formed,
};
pub use memory::{FixedMemory, MemoryProbe, SystemMemory, UnknownMemory};
pub use metrics::{FrameMetrics, MetricsSnapshot};
pub use packet::{EOI_MARKER, HEADER_SIZE, Packet, PacketHeader, SOI_MARKER, packetize};
pub use render::{
    AdaptivePacer, Canvas, Panel, PanelSink, PixelSink, RenderScheduler, Renderer, TickOutcome,
};
pub use source::{CycleStats, IngestLoop, PacketSource};
pub use sync::{FrameSignals, TimedLock};
