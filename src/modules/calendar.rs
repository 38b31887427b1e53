//! # Calendar / Agenda Module
//!
//! The algorithmically demanding module: it pulls raw events from its
//! source, converts each into a [`RecurrenceRule`] plus base event, expands
//! them through the recurrence engine over a look-ahead window anchored at
//! "now", and lays the resulting occurrences out as agenda rows.
//!
//! Per-event parse or expansion failures are not fatal to the cycle: the
//! offending event simply contributes no occurrences this refresh, and a
//! warning is logged. Only a failed event fetch (the essential data) fails
//! the render.

use crate::canvas::{Canvas, Rgb};
use crate::module::{draw_text_row, DataSource, Module, ModuleError, RenderContext, Tile};
use crate::recurrence::{
    expand, EventOccurrence, Frequency, OccurrenceOverride, RecurrenceRule, Window,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

/// Pixel height of one agenda row (6x10 font plus leading).
const ROW_HEIGHT: u32 = 14;
/// Top margin before the first row.
const TOP_MARGIN: u32 = 6;
/// Left margin of the timestamp column.
const LEFT_MARGIN: i32 = 4;

/// Raw recurrence description as delivered by the source feed.
#[derive(Debug, Deserialize)]
struct RawRule {
    frequency: Frequency,
    #[serde(default = "default_interval")]
    interval: u32,
    #[serde(default)]
    count: Option<u32>,
    #[serde(default)]
    until: Option<NaiveDate>,
    #[serde(default)]
    by_weekday: Vec<String>,
    #[serde(default)]
    exceptions: Vec<NaiveDate>,
    #[serde(default)]
    overrides: Vec<RawOverride>,
}

fn default_interval() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RawOverride {
    date: NaiveDate,
    start: NaiveDateTime,
    end: NaiveDateTime,
    #[serde(default)]
    title: Option<String>,
}

/// One raw event entry from the source feed. Times are wall clock in the
/// module's configured timezone.
#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    title: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    #[serde(default)]
    rrule: Option<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawFeed {
    events: Vec<RawEvent>,
}

/// Agenda module instance.
pub struct CalendarModule {
    source: Arc<dyn DataSource>,
    /// How far past "now" occurrences are expanded.
    lookahead: Duration,
}

impl CalendarModule {
    /// Build from configuration. Recognized params: `lookahead_days`
    /// (default 7, must parse as a positive integer).
    pub fn new(
        config: &crate::config::ModuleConfig,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, ModuleError> {
        let lookahead_days: i64 = match config.param("lookahead_days") {
            Some(raw) => raw
                .parse()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| {
                    ModuleError::BadConfig(format!("invalid lookahead_days '{raw}'"))
                })?,
            None => 7,
        };
        Ok(Self {
            source,
            lookahead: Duration::days(lookahead_days),
        })
    }

    /// Expand every feed event over the query window and return the merged,
    /// start-ordered occurrence list.
    fn collect_occurrences(
        &self,
        feed: &RawFeed,
        ctx: &RenderContext,
    ) -> Vec<EventOccurrence> {
        let window = Window::new(ctx.now, ctx.now + self.lookahead);
        let tz = ctx.config.timezone;

        let mut occurrences = Vec::new();
        for event in &feed.events {
            let rule = match &event.rrule {
                Some(raw) => match build_rule(raw, tz) {
                    Ok(rule) => rule,
                    Err(err) => {
                        tracing::warn!(event = %event.id, %err, "skipping event with bad rule");
                        continue;
                    }
                },
                None => RecurrenceRule::once(tz),
            };

            match expand(&rule, &event.id, &event.title, event.start, event.end, window) {
                Ok(iter) => occurrences.extend(iter),
                Err(err) => {
                    // Recoverable: this event contributes nothing this cycle
                    tracing::warn!(event = %event.id, %err, "recurrence expansion failed");
                }
            }
        }
        occurrences.sort_by_key(|occ| occ.start);
        occurrences
    }

    /// Lay out as many occurrences as fit the region height; if the list is
    /// longer, the last row becomes a "+N more" indicator instead of
    /// overflowing.
    fn draw_agenda(&self, canvas: &mut Canvas, occurrences: &[EventOccurrence]) {
        let usable = canvas.height().saturating_sub(TOP_MARGIN);
        let max_rows = (usable / ROW_HEIGHT) as usize;
        if max_rows == 0 {
            return;
        }

        if occurrences.is_empty() {
            draw_text_row(
                canvas,
                LEFT_MARGIN,
                (TOP_MARGIN + ROW_HEIGHT - 4) as i32,
                "No upcoming events",
                Rgb::BLACK,
            );
            return;
        }

        let (visible, truncated) = if occurrences.len() > max_rows {
            (max_rows.saturating_sub(1), true)
        } else {
            (occurrences.len(), false)
        };

        for (row, occ) in occurrences[..visible].iter().enumerate() {
            let baseline = (TOP_MARGIN + ROW_HEIGHT * (row as u32 + 1) - 4) as i32;
            let marker = if occ.is_override { "*" } else { " " };
            let line = format!("{}{} {}", marker, occ.format_range(), occ.title);
            draw_text_row(canvas, LEFT_MARGIN, baseline, &line, Rgb::BLACK);
        }

        if truncated {
            let baseline = (TOP_MARGIN + ROW_HEIGHT * (visible as u32 + 1) - 4) as i32;
            let more = occurrences.len() - visible;
            draw_text_row(
                canvas,
                LEFT_MARGIN,
                baseline,
                &format!("+{more} more"),
                Rgb::BLACK,
            );
        }
    }
}

/// Convert a raw feed rule into an engine rule.
fn build_rule(raw: &RawRule, tz: chrono_tz::Tz) -> Result<RecurrenceRule, ModuleError> {
    let mut by_weekday = Vec::with_capacity(raw.by_weekday.len());
    for name in &raw.by_weekday {
        let day = Weekday::from_str(name)
            .map_err(|_| ModuleError::Render(format!("unknown weekday '{name}'")))?;
        by_weekday.push(day);
    }
    Ok(RecurrenceRule {
        frequency: raw.frequency,
        interval: raw.interval,
        count: raw.count,
        until: raw.until,
        by_weekday,
        exceptions: raw.exceptions.clone(),
        overrides: raw
            .overrides
            .iter()
            .map(|o| OccurrenceOverride {
                date: o.date,
                start: o.start,
                end: o.end,
                title: o.title.clone(),
            })
            .collect(),
        timezone: tz,
    })
}

impl Module for CalendarModule {
    fn kind(&self) -> &'static str {
        "calendar"
    }

    fn render(&self, ctx: &RenderContext) -> Result<Tile, ModuleError> {
        // The event feed is essential: without it there is no meaningful tile
        let payload = self.source.fetch(&ctx.config.params)?;
        let feed: RawFeed = serde_json::from_value(payload)
            .map_err(|e| ModuleError::Fetch(crate::module::FetchError::Malformed(e.to_string())))?;

        let occurrences = self.collect_occurrences(&feed, ctx);
        tracing::debug!(
            events = feed.events.len(),
            occurrences = occurrences.len(),
            "calendar expansion complete"
        );

        let mut canvas = Canvas::new(ctx.region.width, ctx.region.height);
        self.draw_agenda(&mut canvas, &occurrences);
        Ok(Tile::new(canvas, ctx.now))
    }
}
