//! # Weather Module
//!
//! Current conditions plus a short forecast strip. Demonstrates the
//! graceful-degradation half of the module contract: the current-conditions
//! block is essential (no tile without it), while the forecast columns are
//! optional — a feed without them still renders a partial tile with a
//! "forecast unavailable" note instead of failing the cycle.

use crate::canvas::{Canvas, Rgb};
use crate::module::{draw_text_row, DataSource, Module, ModuleError, RenderContext, Tile};
use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::Text,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temp_c: f32,
    condition: String,
    #[serde(default)]
    humidity: Option<u8>,
    #[serde(default)]
    wind_kmh: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ForecastDay {
    day: String,
    high_c: f32,
    low_c: f32,
    condition: String,
}

#[derive(Debug, Deserialize)]
struct WeatherFeed {
    current: CurrentConditions,
    #[serde(default)]
    forecast: Vec<ForecastDay>,
}

/// How many forecast columns the layout shows at most.
const FORECAST_COLUMNS: usize = 4;

pub struct WeatherModule {
    source: Arc<dyn DataSource>,
}

impl WeatherModule {
    pub fn new(
        _config: &crate::config::ModuleConfig,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, ModuleError> {
        Ok(Self { source })
    }

    /// Current conditions fill the left third; forecast columns share the
    /// rest.
    fn draw(&self, canvas: &mut Canvas, feed: &WeatherFeed) {
        let width = canvas.width();
        let current_width = width / 3;

        // Big temperature readout
        let big = MonoTextStyle::new(&FONT_10X20, Rgb888::new(0, 0, 0));
        let temp = format!("{:.0}C", feed.current.temp_c);
        let _ = Text::new(&temp, Point::new(6, 24), big).draw(canvas);
        draw_text_row(canvas, 6, 42, &feed.current.condition, Rgb::BLACK);

        let mut detail_y = 56;
        if let Some(humidity) = feed.current.humidity {
            draw_text_row(canvas, 6, detail_y, &format!("humidity {humidity}%"), Rgb::BLACK);
            detail_y += 12;
        }
        if let Some(wind) = feed.current.wind_kmh {
            draw_text_row(canvas, 6, detail_y, &format!("wind {wind:.0} km/h"), Rgb::BLACK);
        }

        // Divider between current conditions and the forecast area
        let divider = PrimitiveStyle::with_stroke(Rgb888::new(0, 0, 0), 1);
        let _ = Line::new(
            Point::new(current_width as i32, 4),
            Point::new(current_width as i32, canvas.height() as i32 - 4),
        )
        .into_styled(divider)
        .draw(canvas);

        if feed.forecast.is_empty() {
            // Partial tile: essential data shown, optional data flagged
            draw_text_row(
                canvas,
                current_width as i32 + 8,
                24,
                "forecast unavailable",
                Rgb::BLACK,
            );
            return;
        }

        let columns = feed.forecast.len().min(FORECAST_COLUMNS);
        let col_width = (width - current_width) / columns as u32;
        for (i, day) in feed.forecast.iter().take(columns).enumerate() {
            let x = (current_width + col_width * i as u32) as i32 + 8;
            draw_text_row(canvas, x, 18, &day.day, Rgb::BLACK);
            draw_text_row(
                canvas,
                x,
                34,
                &format!("{:.0}/{:.0}C", day.high_c, day.low_c),
                Rgb::BLACK,
            );
            draw_text_row(canvas, x, 50, &day.condition, Rgb::BLACK);
        }
    }
}

impl Module for WeatherModule {
    fn kind(&self) -> &'static str {
        "weather"
    }

    fn render(&self, ctx: &RenderContext) -> Result<Tile, ModuleError> {
        let payload = self.source.fetch(&ctx.config.params)?;
        let feed: WeatherFeed = serde_json::from_value(payload)
            .map_err(|e| ModuleError::Fetch(crate::module::FetchError::Malformed(e.to_string())))?;

        let mut canvas = Canvas::new(ctx.region.width, ctx.region.height);
        self.draw(&mut canvas, &feed);
        Ok(Tile::new(canvas, ctx.now))
    }
}
