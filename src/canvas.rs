//! # Canvas and Color Handling
//!
//! Modules draw their tiles onto an RGB [`Canvas`] using the
//! `embedded-graphics` primitives (text, lines, rectangles). The compositor
//! later reduces the rich RGB content down to whatever palette the physical
//! panel actually supports.
//!
//! Color reduction is a deterministic nearest-color mapping rather than
//! dithering: repeated renders of the same content must produce bit-identical
//! frames, otherwise the refresh-delta logic in the driver would see phantom
//! changes every cycle.

use embedded_graphics::{pixelcolor::Rgb888, prelude::*, Pixel};
use serde::{Deserialize, Serialize};

/// A 24-bit RGB color.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const RED: Self = Self::new(255, 0, 0);

    /// Create a new color.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance to another color.
    #[inline]
    fn distance_sq(&self, other: &Self) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl From<Rgb888> for Rgb {
    fn from(c: Rgb888) -> Self {
        Self::new(c.r(), c.g(), c.b())
    }
}

impl From<Rgb> for Rgb888 {
    fn from(c: Rgb) -> Self {
        Self::new(c.r, c.g, c.b)
    }
}

/// Color capability of a physical panel.
///
/// E-paper panels come in 1-bit black/white, black/white plus one accent
/// color (usually red or yellow), and multi-color palette variants.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorDepth {
    /// 1-bit black and white.
    Mono,
    /// Black, white, and one accent color.
    TriColor,
    /// Arbitrary fixed palette.
    Palette(Vec<Rgb>),
}

const MONO_PALETTE: [Rgb; 2] = [Rgb::BLACK, Rgb::WHITE];
const TRI_PALETTE: [Rgb; 3] = [Rgb::BLACK, Rgb::WHITE, Rgb::RED];

impl ColorDepth {
    /// The set of colors the panel can physically show.
    pub fn palette(&self) -> &[Rgb] {
        match self {
            Self::Mono => &MONO_PALETTE,
            Self::TriColor => &TRI_PALETTE,
            Self::Palette(colors) => colors,
        }
    }

    /// Map an arbitrary RGB color onto the nearest palette entry.
    ///
    /// Ties resolve to the lowest palette index, so the mapping is stable
    /// across cycles. An empty custom palette (rejected at config
    /// validation) passes the color through unchanged.
    pub fn quantize(&self, color: Rgb) -> Rgb {
        let palette = self.palette();
        let Some(&first) = palette.first() else {
            return color;
        };
        let mut best = first;
        let mut best_dist = color.distance_sq(&best);
        for candidate in &palette[1..] {
            let dist = color.distance_sq(candidate);
            if dist < best_dist {
                best = *candidate;
                best_dist = dist;
            }
        }
        best
    }
}

/// An RGB pixel buffer that modules render into.
///
/// Implements [`DrawTarget`] so module code can use the full
/// `embedded-graphics` toolkit. Out-of-bounds draws are clipped silently,
/// matching the `MockDisplay`/hardware-buffer behavior modules already
/// assume.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl Canvas {
    /// Create a canvas filled with the given background color.
    pub fn filled(width: u32, height: u32, background: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![background; width as usize * height as usize],
        }
    }

    /// Create a white canvas (the e-paper resting state).
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgb::WHITE)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw row-major pixel access.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Set one pixel; out-of-bounds coordinates are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        if x < self.width && y < self.height {
            self.pixels[y as usize * self.width as usize + x as usize] = color;
        }
    }

    /// Read one pixel; `None` outside the canvas.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[y as usize * self.width as usize + x as usize])
        } else {
            None
        }
    }

    /// Fill the whole canvas with one color.
    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::{
        mono_font::{ascii::FONT_6X10, MonoTextStyle},
        text::Text,
    };

    #[test]
    fn test_quantize_mono() {
        let depth = ColorDepth::Mono;
        assert_eq!(depth.quantize(Rgb::new(10, 10, 10)), Rgb::BLACK);
        assert_eq!(depth.quantize(Rgb::new(240, 240, 240)), Rgb::WHITE);
        // Mid-gray resolves deterministically to the first palette entry
        let mid = depth.quantize(Rgb::new(127, 127, 127));
        assert_eq!(mid, depth.quantize(Rgb::new(127, 127, 127)));
    }

    #[test]
    fn test_quantize_tricolor_accent() {
        let depth = ColorDepth::TriColor;
        assert_eq!(depth.quantize(Rgb::new(200, 30, 30)), Rgb::RED);
        assert_eq!(depth.quantize(Rgb::new(30, 200, 30)), Rgb::BLACK);
    }

    #[test]
    fn test_quantize_empty_palette_passes_through() {
        let depth = ColorDepth::Palette(Vec::new());
        let color = Rgb::new(12, 34, 56);
        assert_eq!(depth.quantize(color), color);
    }

    #[test]
    fn test_quantize_custom_palette() {
        let depth = ColorDepth::Palette(vec![
            Rgb::BLACK,
            Rgb::WHITE,
            Rgb::new(255, 255, 0),
            Rgb::new(0, 0, 255),
        ]);
        assert_eq!(depth.quantize(Rgb::new(230, 230, 10)), Rgb::new(255, 255, 0));
        assert_eq!(depth.quantize(Rgb::new(20, 20, 200)), Rgb::new(0, 0, 255));
    }

    #[test]
    fn test_canvas_bounds_clipping() {
        let mut canvas = Canvas::new(10, 10);
        canvas.set_pixel(100, 100, Rgb::BLACK); // must not panic
        assert_eq!(canvas.get_pixel(100, 100), None);
        assert_eq!(canvas.get_pixel(5, 5), Some(Rgb::WHITE));
    }

    #[test]
    fn test_canvas_is_a_draw_target() {
        let mut canvas = Canvas::new(60, 20);
        let style = MonoTextStyle::new(&FONT_6X10, Rgb888::new(0, 0, 0));
        Text::new("hi", Point::new(2, 10), style)
            .draw(&mut canvas)
            .unwrap();

        let dark = canvas.pixels().iter().filter(|p| **p == Rgb::BLACK).count();
        assert!(dark > 0, "text drawing should set pixels");
    }

    #[test]
    fn test_negative_coordinates_clipped() {
        let mut canvas = Canvas::new(8, 8);
        let style = MonoTextStyle::new(&FONT_6X10, Rgb888::new(0, 0, 0));
        // Baseline above the canvas; draw must clip, not panic
        Text::new("x", Point::new(-3, -3), style)
            .draw(&mut canvas)
            .unwrap();
    }
}
