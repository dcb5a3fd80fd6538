//! Engine configuration.
//!
//! Everything here is fixed at startup: buffer capacities are derived
//! from it once and never change while the engine runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Sizing and timing for a [`FrameEngine`](crate::FrameEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the scratch and stable frame buffers in bytes.
    pub max_frame_size: usize,
    /// Number of packet indices the receipt record can track.
    pub max_packets: u16,
    /// An assembly older than this is aborted by the reaper.
    pub frame_timeout_ms: u64,
    /// Target rendered frames per second.
    pub target_fps: u32,
    /// Fastest allowed render interval (the floor).
    pub fast_render_interval_ms: u64,
    /// Slowest allowed render interval (the ceiling, and the start value).
    pub slow_render_interval_ms: u64,
    /// Base period of the render scheduler tick.
    pub render_tick_ms: u64,
    /// Renders between two pacing recomputations.
    pub pacing_window: u32,
    /// Free memory below this counts as a memory error.
    pub min_free_memory: u64,
    /// Minimum time between two free-memory samples on the render tick.
    pub memory_sample_ms: u64,
    /// Pixel canvas settings.
    pub canvas: CanvasConfig,
}

/// Pixel canvas (RGB565) and strip transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Allocate the canvas when memory allows.
    pub enabled: bool,
    /// Display width in pixels.
    pub width: u16,
    /// Display height in pixels.
    pub height: u16,
    /// Strip height used for bulk transfer at normal rates.
    pub strip_height: u16,
    /// Strip height used when the target rate is above 45 fps.
    pub fast_strip_height: u16,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 35_000,
            max_packets: 500,
            frame_timeout_ms: 150,
            target_fps: 60,
            fast_render_interval_ms: 8,
            slow_render_interval_ms: 16,
            render_tick_ms: 8,
            pacing_window: 30,
            min_free_memory: 15_000,
            memory_sample_ms: 250,
            canvas: CanvasConfig::default(),
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 480,
            height: 320,
            strip_height: 20,
            fast_strip_height: 10,
        }
    }
}

// ── Derived values ───────────────────────────────────────────────

impl EngineConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_frame_size < 2 {
            return Err(CoreError::InvalidConfig(
                "max_frame_size must hold at least the image markers".into(),
            ));
        }
        if u32::try_from(self.max_frame_size).is_err() {
            return Err(CoreError::InvalidConfig(format!(
                "max_frame_size {} exceeds the 32-bit payload range",
                self.max_frame_size
            )));
        }
        if self.max_packets == 0 {
            return Err(CoreError::InvalidConfig("max_packets must be non-zero".into()));
        }
        if self.target_fps == 0 {
            return Err(CoreError::InvalidConfig("target_fps must be non-zero".into()));
        }
        if self.fast_render_interval_ms > self.slow_render_interval_ms {
            return Err(CoreError::InvalidConfig(format!(
                "fast render interval {}ms is slower than the slow interval {}ms",
                self.fast_render_interval_ms, self.slow_render_interval_ms
            )));
        }
        if self.render_tick_ms == 0 {
            return Err(CoreError::InvalidConfig("render_tick_ms must be non-zero".into()));
        }
        if self.canvas.enabled && (self.canvas.width == 0 || self.canvas.height == 0) {
            return Err(CoreError::InvalidConfig("canvas dimensions must be non-zero".into()));
        }
        if self.canvas.strip_height == 0 || self.canvas.fast_strip_height == 0 {
            return Err(CoreError::InvalidConfig("strip heights must be non-zero".into()));
        }
        Ok(())
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn fast_render_interval(&self) -> Duration {
        Duration::from_millis(self.fast_render_interval_ms)
    }

    pub fn slow_render_interval(&self) -> Duration {
        Duration::from_millis(self.slow_render_interval_ms)
    }

    pub fn render_tick(&self) -> Duration {
        Duration::from_millis(self.render_tick_ms)
    }

    pub fn memory_sample_period(&self) -> Duration {
        Duration::from_millis(self.memory_sample_ms)
    }

    /// Strip height for bulk canvas transfer at the configured rate.
    pub fn transfer_strip_height(&self) -> u16 {
        if self.target_fps > 45 {
            self.canvas.fast_strip_height
        } else {
            self.canvas.strip_height
        }
    }

    /// Bytes needed by the canvas (16-bit pixels).
    pub fn canvas_bytes(&self) -> u64 {
        self.canvas.width as u64 * self.canvas.height as u64 * 2
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.frame_timeout(), Duration::from_millis(150));
        assert_eq!(cfg.canvas_bytes(), 480 * 320 * 2);
    }

    #[test]
    fn inverted_interval_bounds_rejected() {
        let cfg = EngineConfig {
            fast_render_interval_ms: 20,
            slow_render_interval_ms: 10,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn zero_packets_rejected() {
        let cfg = EngineConfig {
            max_packets: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn strip_height_follows_rate() {
        let mut cfg = EngineConfig::default();
        assert_eq!(cfg.transfer_strip_height(), 10);
        cfg.target_fps = 30;
        assert_eq!(cfg.transfer_strip_height(), 20);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: EngineConfig = toml::from_str("max_frame_size = 64000\n[canvas]\nwidth = 320\n").unwrap();
        assert_eq!(cfg.max_frame_size, 64_000);
        assert_eq!(cfg.max_packets, 500);
        assert_eq!(cfg.canvas.width, 320);
        assert_eq!(cfg.canvas.height, 320);
    }
}
