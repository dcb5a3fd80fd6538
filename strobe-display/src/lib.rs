//! # strobe-display: frame receiver
//!
//! Receives a lossy UDP stream of frame packets, reassembles complete
//! frames with `strobe-core` and renders them at an adaptive rate.
//!
//! ## Contexts
//!
//! - **Ingestion**: UDP reads plus the timeout reaper, on its own thread.
//! - **Render**: the pacing scheduler, on its own thread.
//! - **Monitor**: periodic statistics, as a tokio task.

pub mod config;
pub mod renderer;
pub mod service;
pub mod source;
