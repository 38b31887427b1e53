//! # Region Geometry
//!
//! Rectangle math for the dashboard layout. Every enabled module is assigned
//! exactly one [`Region`] of the panel; the configuration loader uses the
//! operations here to reject overlapping regions and regions that spill past
//! the panel bounds, and the compositor uses them to clamp tile placement.

use serde::{Deserialize, Serialize};

/// A rectangular area of the panel, in pixels, top-left origin.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Region {
    /// X coordinate (column) of the top-left corner.
    pub x: u32,
    /// Y coordinate (row) of the top-left corner.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Region {
    /// Create a new region.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Full-panel region for a given resolution.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn area(&self) -> u64 {
        (self.width as u64) * (self.height as u64)
    }

    /// True when the region covers no pixels.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Check whether a pixel coordinate falls inside the region.
    #[inline]
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Check whether this region shares any pixel with another.
    #[inline]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Check whether this region lies entirely within a panel of the given
    /// resolution.
    #[inline]
    pub const fn fits_within(&self, panel_width: u32, panel_height: u32) -> bool {
        self.right() <= panel_width && self.bottom() <= panel_height
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Region({}, {} {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}
