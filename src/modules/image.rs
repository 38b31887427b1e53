//! # Image Module
//!
//! Renders a bitmap feed into its region: photo frames, externally
//! generated charts, anything a pipeline can deliver as raw RGB rows. The
//! feed arrives as JSON through the [`DataSource`] boundary; palette
//! reduction happens later in the compositor, like every other tile.
//!
//! Orientation lives here via the `rotation` param, since a wall-mounted
//! panel is often rotated relative to its source imagery. Sizing follows
//! the engine-wide rule: a bitmap larger than the region is clipped, never
//! scaled.

use crate::canvas::{Canvas, Rgb};
use crate::config::ModuleConfig;
use crate::module::{DataSource, FetchError, Module, ModuleError, RenderContext, Tile};
use serde::Deserialize;
use std::sync::Arc;

/// Raw bitmap payload: row-major RGB triples.
#[derive(Debug, Deserialize)]
struct RawBitmap {
    width: u32,
    height: u32,
    /// Exactly `width * height` entries.
    pixels: Vec<[u8; 3]>,
}

/// Clockwise rotation applied before placement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Rotation {
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    fn from_degrees(raw: &str) -> Option<Self> {
        match raw {
            "0" => Some(Self::None),
            "90" => Some(Self::Quarter),
            "180" => Some(Self::Half),
            "270" => Some(Self::ThreeQuarter),
            _ => None,
        }
    }
}

pub struct ImageModule {
    source: Arc<dyn DataSource>,
    rotation: Rotation,
}

impl ImageModule {
    /// Build from configuration. Recognized params: `rotation` (clockwise
    /// degrees, one of 0/90/180/270, default 0).
    pub fn new(
        config: &ModuleConfig,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, ModuleError> {
        let rotation = match config.param("rotation") {
            Some(raw) => Rotation::from_degrees(raw)
                .ok_or_else(|| ModuleError::BadConfig(format!("invalid rotation '{raw}'")))?,
            None => Rotation::None,
        };
        Ok(Self { source, rotation })
    }

    fn draw(&self, canvas: &mut Canvas, bitmap: &RawBitmap) {
        for y in 0..bitmap.height {
            for x in 0..bitmap.width {
                let [r, g, b] =
                    bitmap.pixels[y as usize * bitmap.width as usize + x as usize];
                let (dx, dy) = match self.rotation {
                    Rotation::None => (x, y),
                    Rotation::Quarter => (bitmap.height - 1 - y, x),
                    Rotation::Half => (bitmap.width - 1 - x, bitmap.height - 1 - y),
                    Rotation::ThreeQuarter => (y, bitmap.width - 1 - x),
                };
                // set_pixel clips whatever falls outside the region
                canvas.set_pixel(dx, dy, Rgb::new(r, g, b));
            }
        }
    }
}

impl Module for ImageModule {
    fn kind(&self) -> &'static str {
        "image"
    }

    fn render(&self, ctx: &RenderContext) -> Result<Tile, ModuleError> {
        let payload = self.source.fetch(&ctx.config.params)?;
        let bitmap: RawBitmap = serde_json::from_value(payload)
            .map_err(|e| ModuleError::Fetch(FetchError::Malformed(e.to_string())))?;
        if bitmap.pixels.len() != bitmap.width as usize * bitmap.height as usize {
            return Err(ModuleError::Fetch(FetchError::Malformed(format!(
                "pixel count {} does not match {}x{}",
                bitmap.pixels.len(),
                bitmap.width,
                bitmap.height
            ))));
        }

        let mut canvas = Canvas::new(ctx.region.width, ctx.region.height);
        self.draw(&mut canvas, &bitmap);
        Ok(Tile::new(canvas, ctx.now))
    }
}
