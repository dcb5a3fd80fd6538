//! Rendering side of the engine.
//!
//! | Module      | Purpose                                                 |
//! |-------------|---------------------------------------------------------|
//! | `pacing`    | Self-tuning render interval                             |
//! | `canvas`    | Pixel sink trait, off-screen canvas, direct panel sink  |
//! | `scheduler` | Finalize-then-render tick driven by the pacer           |

pub mod canvas;
pub mod pacing;
pub mod scheduler;

pub use canvas::{Canvas, Panel, PanelSink, PixelSink, Strip};
pub use pacing::{AdaptivePacer, PACING_STEP, PacingDecision};
pub use scheduler::{RenderScheduler, RenderStage, Renderer, TickOutcome};
