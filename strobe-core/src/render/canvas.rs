//! Pixel canvas and the pixel-sink capability handed to renderers.
//!
//! A renderer never sees the display directly. It decodes into whatever
//! [`PixelSink`] the scheduler passes it: either the off-screen
//! [`Canvas`] (later pushed to the panel in horizontal strips) or a
//! [`PanelSink`] that forwards blocks straight to the panel.

use crate::error::CoreError;

// ── Traits ───────────────────────────────────────────────────────

/// Destination for decoded pixel blocks (RGB565, row-major, `w * h`).
pub trait PixelSink {
    /// Write a `w`×`h` block at (`x`, `y`). Blocks are clipped to the
    /// destination; a block starting outside it is refused.
    fn write(&mut self, x: u16, y: u16, w: u16, h: u16, pixels: &[u16]) -> bool;
}

/// The physical display (or whatever stands in for it).
pub trait Panel: Send {
    /// Push a `w`×`h` block of pixels at (`x`, `y`).
    fn push_pixels(&mut self, x: u16, y: u16, w: u16, h: u16, pixels: &[u16]);
}

/// Clip a block to `width`×`height`. `None` if it starts outside.
fn clip(x: u16, y: u16, w: u16, h: u16, width: u16, height: u16) -> Option<(u16, u16)> {
    if x >= width || y >= height {
        return None;
    }
    Some((w.min(width - x), h.min(height - y)))
}

// ── Canvas ───────────────────────────────────────────────────────

/// Off-screen RGB565 frame, allocated once.
#[derive(Debug)]
pub struct Canvas {
    width: u16,
    height: u16,
    pixels: Vec<u16>,
}

/// One horizontal band of the canvas.
#[derive(Debug, Clone, Copy)]
pub struct Strip<'a> {
    pub y: u16,
    pub height: u16,
    pub pixels: &'a [u16],
}

impl Canvas {
    pub fn allocate(width: u16, height: u16) -> Result<Self, CoreError> {
        let count = width as usize * height as usize;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(count)
            .map_err(|_| CoreError::Allocation {
                what: "pixel canvas",
                bytes: count * 2,
            })?;
        pixels.resize(count, 0);
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Split the canvas into bands of `strip_height` rows (the last one
    /// may be shorter).
    pub fn strips(&self, strip_height: u16) -> impl Iterator<Item = Strip<'_>> {
        let step = strip_height.max(1);
        let width = self.width as usize;
        (0..self.height).step_by(step as usize).map(move |y| {
            let height = step.min(self.height - y);
            let start = y as usize * width;
            Strip {
                y,
                height,
                pixels: &self.pixels[start..start + height as usize * width],
            }
        })
    }
}

impl PixelSink for Canvas {
    fn write(&mut self, x: u16, y: u16, w: u16, h: u16, pixels: &[u16]) -> bool {
        let src_stride = w as usize;
        if pixels.len() < src_stride * h as usize {
            return false;
        }
        let Some((cw, ch)) = clip(x, y, w, h, self.width, self.height) else {
            return false;
        };

        let width = self.width as usize;
        for row in 0..ch as usize {
            let dst = (y as usize + row) * width + x as usize;
            let src = row * src_stride;
            self.pixels[dst..dst + cw as usize].copy_from_slice(&pixels[src..src + cw as usize]);
        }
        true
    }
}

// ── PanelSink ────────────────────────────────────────────────────

/// Forwards decoded blocks straight to a [`Panel`], clipped to its size.
/// Used when no canvas could be allocated.
pub struct PanelSink<'a, P: Panel + ?Sized> {
    panel: &'a mut P,
    width: u16,
    height: u16,
}

impl<'a, P: Panel + ?Sized> PanelSink<'a, P> {
    pub fn new(panel: &'a mut P, width: u16, height: u16) -> Self {
        Self {
            panel,
            width,
            height,
        }
    }
}

impl<P: Panel + ?Sized> PixelSink for PanelSink<'_, P> {
    fn write(&mut self, x: u16, y: u16, w: u16, h: u16, pixels: &[u16]) -> bool {
        let src_stride = w as usize;
        if pixels.len() < src_stride * h as usize {
            return false;
        }
        let Some((cw, ch)) = clip(x, y, w, h, self.width, self.height) else {
            return false;
        };

        if cw == w {
            self.panel
                .push_pixels(x, y, cw, ch, &pixels[..src_stride * ch as usize]);
        } else {
            // Clipped on the right: rows are no longer contiguous.
            for row in 0..ch {
                let src = row as usize * src_stride;
                self.panel
                    .push_pixels(x, y + row, cw, 1, &pixels[src..src + cw as usize]);
            }
        }
        true
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPanel {
        blocks: Vec<(u16, u16, u16, u16, Vec<u16>)>,
    }

    impl Panel for RecordingPanel {
        fn push_pixels(&mut self, x: u16, y: u16, w: u16, h: u16, pixels: &[u16]) {
            self.blocks.push((x, y, w, h, pixels.to_vec()));
        }
    }

    #[test]
    fn block_lands_at_offset() {
        let mut c = Canvas::allocate(4, 3).unwrap();
        assert!(c.write(1, 1, 2, 2, &[1, 2, 3, 4]));
        assert_eq!(c.pixels(), &[0, 0, 0, 0, 0, 1, 2, 0, 0, 3, 4, 0]);
    }

    #[test]
    fn block_is_clipped_at_edges() {
        let mut c = Canvas::allocate(4, 2).unwrap();
        // 3x3 block at (2,1): only a 2x1 corner fits.
        assert!(c.write(2, 1, 3, 3, &[1, 2, 3, 4, 5, 6, 7, 8, 9]));
        assert_eq!(c.pixels(), &[0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn block_outside_is_refused() {
        let mut c = Canvas::allocate(4, 2).unwrap();
        assert!(!c.write(4, 0, 1, 1, &[9]));
        assert!(!c.write(0, 2, 1, 1, &[9]));
        assert!(!c.write(0, 0, 2, 2, &[9]));
        assert!(c.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn strips_cover_every_row() {
        let c = Canvas::allocate(3, 7).unwrap();
        let strips: Vec<_> = c.strips(3).map(|s| (s.y, s.height, s.pixels.len())).collect();
        assert_eq!(strips, vec![(0, 3, 9), (3, 3, 9), (6, 1, 3)]);
    }

    #[test]
    fn panel_sink_splits_clipped_rows() {
        let mut panel = RecordingPanel::default();
        let mut sink = PanelSink::new(&mut panel, 3, 10);
        assert!(sink.write(1, 0, 3, 2, &[1, 2, 3, 4, 5, 6]));
        assert_eq!(
            panel.blocks,
            vec![(1, 0, 2, 1, vec![1, 2]), (1, 1, 2, 1, vec![4, 5])]
        );
    }

    #[test]
    fn panel_sink_passes_unclipped_block() {
        let mut panel = RecordingPanel::default();
        let mut sink = PanelSink::new(&mut panel, 8, 8);
        assert!(sink.write(0, 0, 2, 2, &[1, 2, 3, 4]));
        assert_eq!(panel.blocks, vec![(0, 0, 2, 2, vec![1, 2, 3, 4])]);
    }
}
