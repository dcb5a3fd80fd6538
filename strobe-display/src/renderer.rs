//! Renderer and panel used by the receiver binary.
//!
//! Image decoding and the physical panel live outside this workspace.
//! The receiver ships a [`SnapshotRenderer`] that keeps the latest frame
//! on disk for inspection and paints a small activity bar, and a
//! [`CountingPanel`] that accounts for pushed pixels.

use std::path::PathBuf;

use tracing::warn;

use strobe_core::{Panel, PixelSink, is_well_formed};

/// Height of the activity bar in pixels.
const BAR_HEIGHT: u16 = 4;

/// Width of the activity bar in pixels.
const BAR_WIDTH: u16 = 64;

/// Stores the newest frame to `snapshot` (if set) and paints a bar whose
/// colour follows the frame size.
#[derive(Debug)]
pub struct SnapshotRenderer {
    snapshot: Option<PathBuf>,
    bar: Vec<u16>,
    rendered: u64,
}

impl SnapshotRenderer {
    pub fn new(snapshot: Option<PathBuf>) -> Self {
        Self {
            snapshot,
            bar: vec![0; BAR_WIDTH as usize * BAR_HEIGHT as usize],
            rendered: 0,
        }
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl strobe_core::Renderer for SnapshotRenderer {
    fn render(&mut self, frame: &[u8], sink: &mut dyn PixelSink) -> bool {
        if !is_well_formed(frame) {
            return false;
        }

        if let Some(path) = &self.snapshot {
            if let Err(e) = std::fs::write(path, frame) {
                warn!("snapshot write to {} failed: {e}", path.display());
            }
        }

        self.bar.fill(size_colour(frame.len()));
        self.rendered += 1;
        sink.write(0, 0, BAR_WIDTH, BAR_HEIGHT, &self.bar)
    }
}

/// RGB565 colour from green (small) to red (large frames).
fn size_colour(len: usize) -> u16 {
    let level = (len / 1024).min(31) as u16;
    (level << 11) | ((31 - level) << 6)
}

/// Stand-in panel: counts what it is given.
#[derive(Debug, Default)]
pub struct CountingPanel {
    pub pushes: u64,
    pub pixels: u64,
}

impl Panel for CountingPanel {
    fn push_pixels(&mut self, _x: u16, _y: u16, w: u16, h: u16, _pixels: &[u16]) {
        self.pushes += 1;
        self.pixels += w as u64 * h as u64;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use strobe_core::{Canvas, Renderer};

    #[test]
    fn refuses_frames_without_markers() {
        let mut r = SnapshotRenderer::new(None);
        let mut canvas = Canvas::allocate(80, 10).unwrap();
        assert!(!r.render(&[0, 1, 2, 3], &mut canvas));
        assert_eq!(r.rendered(), 0);
    }

    #[test]
    fn paints_bar_and_writes_snapshot() {
        let path = std::env::temp_dir().join(format!("strobe-snapshot-{}.jpg", std::process::id()));
        let mut r = SnapshotRenderer::new(Some(path.clone()));
        let mut canvas = Canvas::allocate(80, 10).unwrap();
        let frame = [0xFF, 0xD8, 7, 7, 0xFF, 0xD9];

        assert!(r.render(&frame, &mut canvas));
        assert_eq!(std::fs::read(&path).unwrap(), frame);
        assert_eq!(canvas.pixels()[0], size_colour(frame.len()));
        assert_eq!(canvas.pixels()[BAR_WIDTH as usize], 0);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn colour_saturates() {
        assert_eq!(size_colour(0), 31 << 6);
        assert_eq!(size_colour(1 << 30), 31 << 11);
    }
}
