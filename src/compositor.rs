//! # Canvas Compositor
//!
//! Assembles the per-module tiles into one [`Frame`] matching the target
//! panel's exact resolution and color depth. Placement is mechanical: a
//! tile smaller than its region is anchored top-left with background fill
//! for the remainder, a larger tile is cropped — never scaled, since
//! scaling would distort rendered text.
//!
//! Color reduction to the panel palette happens here, once per composed
//! pixel, with the deterministic nearest-color mapping from
//! [`crate::canvas::ColorDepth`].

use crate::canvas::{Canvas, Rgb};
use crate::config::PanelProfile;
use crate::geometry::Region;

/// The full-panel bitmap handed to the display driver.
///
/// Pixels are already quantized to the panel palette, so two frames
/// composed from identical tiles are bit-identical — the property the
/// driver's Skip decision relies on.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major quantized pixels.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[y as usize * self.width as usize + x as usize])
        } else {
            None
        }
    }

    /// Fraction of pixels that differ from `other`, in `0.0..=1.0`.
    /// Mismatched dimensions count as fully changed.
    pub fn changed_ratio(&self, other: &Frame) -> f32 {
        if self.width != other.width || self.height != other.height {
            return 1.0;
        }
        let total = self.pixels.len();
        if total == 0 {
            return 0.0;
        }
        let changed = self
            .pixels
            .iter()
            .zip(&other.pixels)
            .filter(|(a, b)| a != b)
            .count();
        changed as f32 / total as f32
    }
}

/// Compose tiles into a frame sized exactly to the panel profile.
///
/// Uncovered area (no region, or region larger than its tile) takes the
/// quantized background fill. Config validation guarantees regions do not
/// overlap and fit the panel; placement still clamps defensively at the
/// panel edge.
pub fn compose(profile: &PanelProfile, tiles: &[(Region, &Canvas)]) -> Frame {
    let background = profile.depth.quantize(Rgb::WHITE);
    let mut pixels = vec![background; profile.width as usize * profile.height as usize];

    for (region, canvas) in tiles {
        let copy_width = region.width.min(canvas.width());
        let copy_height = region.height.min(canvas.height());
        for dy in 0..copy_height {
            let py = region.y + dy;
            if py >= profile.height {
                break;
            }
            for dx in 0..copy_width {
                let px = region.x + dx;
                if px >= profile.width {
                    break;
                }
                // get_pixel cannot miss here, dx/dy are clamped above
                if let Some(color) = canvas.get_pixel(dx, dy) {
                    pixels[py as usize * profile.width as usize + px as usize] =
                        profile.depth.quantize(color);
                }
            }
        }
    }

    Frame {
        width: profile.width,
        height: profile.height,
        pixels,
    }
}
