//! # Module Contract
//!
//! Every dashboard module (calendar, weather, ...) implements the same
//! narrow capability: given its configuration, its assigned region, and the
//! cycle clock, produce a rendered [`Tile`] or fail with a [`ModuleError`].
//!
//! Modules reach their external data source only through the [`DataSource`]
//! boundary; the engine never embeds source-specific HTTP or auth logic.
//! A module must degrade gracefully when non-essential data is missing
//! (render a partial tile) and fail only when it cannot produce any
//! meaningful tile at all.

use crate::canvas::{Canvas, Rgb};
use crate::config::ModuleConfig;
use crate::geometry::Region;
use chrono::{DateTime, Utc};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::Text,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the external data source boundary.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (timeout, DNS, connection refused).
    #[error("network: {0}")]
    Network(String),

    /// The source responded but the payload could not be understood.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The source is not configured or deliberately offline.
    #[error("source unavailable")]
    Unavailable,
}

/// A module-cycle failure, recoverable and scoped to one render attempt.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// The module's configuration cannot produce a meaningful tile.
    #[error("bad module configuration: {0}")]
    BadConfig(String),

    /// An essential data fetch failed.
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    /// Rendering itself failed.
    #[error("render: {0}")]
    Render(String),

    /// The scheduler-side timeout elapsed before the render finished.
    #[error("render timed out")]
    Timeout,
}

/// Narrow contract to an external data source. The collaborator behind it
/// owns all HTTP/auth/caching concerns.
pub trait DataSource: Send + Sync {
    /// Fetch the raw payload for one module refresh.
    fn fetch(&self, params: &HashMap<String, String>) -> Result<serde_json::Value, FetchError>;
}

/// The rendered output of one module invocation.
#[derive(Clone, Debug)]
pub struct Tile {
    /// Pixel content, at most the region's size (the compositor pads).
    pub canvas: Canvas,
    /// When the render completed.
    pub produced_at: DateTime<Utc>,
}

impl Tile {
    pub fn new(canvas: Canvas, produced_at: DateTime<Utc>) -> Self {
        Self {
            canvas,
            produced_at,
        }
    }
}

/// Everything a module may consult during one render.
pub struct RenderContext {
    pub config: ModuleConfig,
    /// The region this instance draws into (same as `config.region`).
    pub region: Region,
    /// The cycle clock; modules must use this instead of the system clock
    /// so renders stay deterministic and testable.
    pub now: DateTime<Utc>,
}

/// The polymorphic module capability.
///
/// Implementations must not block indefinitely (the scheduler enforces a
/// timeout around `render`) and must not mutate global state.
pub trait Module: Send + Sync {
    /// The kind tag this module registers under.
    fn kind(&self) -> &'static str;

    /// Produce a tile for one refresh cycle.
    fn render(&self, ctx: &RenderContext) -> Result<Tile, ModuleError>;
}

/// Constructor signature stored in the registry.
pub type ModuleConstructor =
    Box<dyn Fn(&ModuleConfig) -> Result<Arc<dyn Module>, ModuleError> + Send + Sync>;

/// Registry mapping kind tags to module constructors.
///
/// Selected at configuration-load time; the orchestrator holds the built
/// instances, not the registry.
#[derive(Default)]
pub struct ModuleRegistry {
    constructors: HashMap<String, ModuleConstructor>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a kind tag, replacing any previous one.
    pub fn register(
        &mut self,
        kind: &str,
        constructor: impl Fn(&ModuleConfig) -> Result<Arc<dyn Module>, ModuleError>
            + Send
            + Sync
            + 'static,
    ) {
        self.constructors
            .insert(kind.to_string(), Box::new(constructor));
    }

    /// Build a module instance for one config entry.
    pub fn build(&self, config: &ModuleConfig) -> Result<Arc<dyn Module>, ModuleError> {
        match self.constructors.get(&config.kind) {
            Some(ctor) => ctor(config),
            None => Err(ModuleError::BadConfig(format!(
                "unknown module kind '{}'",
                config.kind
            ))),
        }
    }

    /// Kind tags currently registered.
    pub fn kinds(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

/// Render the persistent "unavailable" placeholder shown for degraded
/// modules: a bordered region with a centered message, so a broken source
/// is obvious instead of silently showing outdated information.
pub fn placeholder_tile(region: Region, message: &str, now: DateTime<Utc>) -> Tile {
    let mut canvas = Canvas::new(region.width, region.height);
    let border = PrimitiveStyle::with_stroke(Rgb888::new(0, 0, 0), 1);
    let _ = Rectangle::new(
        Point::zero(),
        Size::new(region.width, region.height),
    )
    .into_styled(border)
    .draw(&mut canvas);

    let style = MonoTextStyle::new(&FONT_10X20, Rgb888::new(0, 0, 0));
    let text_width = message.len() as i32 * 10;
    let x = ((region.width as i32 - text_width) / 2).max(2);
    let y = (region.height as i32 / 2).max(14);
    let _ = Text::new(message, Point::new(x, y), style).draw(&mut canvas);

    Tile::new(canvas, now)
}

/// Draw one left-aligned agenda-style text row, truncated to the canvas
/// width. Shared by the built-in modules.
pub(crate) fn draw_text_row(canvas: &mut Canvas, x: i32, baseline: i32, text: &str, color: Rgb) {
    let style = MonoTextStyle::new(&FONT_6X10, Rgb888::from(color));
    let max_chars = ((canvas.width() as i32 - x).max(0) / 6) as usize;
    let clipped: String = text.chars().take(max_chars).collect();
    let _ = Text::new(&clipped, Point::new(x, baseline), style).draw(canvas);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Rgb;

    struct NullModule;

    impl Module for NullModule {
        fn kind(&self) -> &'static str {
            "null"
        }

        fn render(&self, ctx: &RenderContext) -> Result<Tile, ModuleError> {
            Ok(Tile::new(
                Canvas::new(ctx.region.width, ctx.region.height),
                ctx.now,
            ))
        }
    }

    fn test_config(kind: &str) -> ModuleConfig {
        ModuleConfig {
            kind: kind.to_string(),
            region: Region::new(0, 0, 100, 50),
            refresh_seconds: 60,
            params: HashMap::new(),
            locale: "en".to_string(),
            timezone: chrono_tz::UTC,
        }
    }

    #[test]
    fn test_registry_builds_known_kind() {
        let mut registry = ModuleRegistry::new();
        registry.register("null", |_| Ok(Arc::new(NullModule)));

        let module = registry.build(&test_config("null")).unwrap();
        assert_eq!(module.kind(), "null");
    }

    #[test]
    fn test_registry_rejects_unknown_kind() {
        let registry = ModuleRegistry::new();
        assert!(matches!(
            registry.build(&test_config("bogus")),
            Err(ModuleError::BadConfig(_))
        ));
    }

    #[test]
    fn test_placeholder_tile_matches_region() {
        let region = Region::new(0, 300, 800, 180);
        let tile = placeholder_tile(region, "unavailable", Utc::now());
        assert_eq!(tile.canvas.width(), 800);
        assert_eq!(tile.canvas.height(), 180);
        // Border and text leave non-white pixels
        assert!(tile.canvas.pixels().iter().any(|p| *p == Rgb::BLACK));
    }

    #[test]
    fn test_text_row_truncates_to_canvas() {
        let mut canvas = Canvas::new(30, 12);
        // 5 chars fit at 6px each; a long string must clip, not panic
        draw_text_row(&mut canvas, 0, 9, "this is far too long", Rgb::BLACK);
        assert!(canvas.pixels().iter().any(|p| *p == Rgb::BLACK));
    }
}
