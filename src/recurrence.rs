//! # Recurring-Event Expansion Engine
//!
//! Expands a [`RecurrenceRule`] plus a base event into the concrete
//! [`EventOccurrence`] values that fall inside a bounded query window. The
//! expansion is lazy (an iterator), deterministic, and side-effect free, so
//! the calendar module can simply re-run it every refresh cycle.
//!
//! ## Timezone handling
//!
//! Candidate instants are advanced in the rule's *wall-clock* local time and
//! converted to zoned instants exactly once, when an occurrence is yielded.
//! A weekly 09:00 meeting therefore stays at 09:00 across daylight-saving
//! transitions instead of drifting by the offset change. Exception dates are
//! matched by local calendar date in the rule's declared zone, never in UTC.
//!
//! ## Bounds
//!
//! The candidate stream stops at the rule's own bound (`count` or `until`)
//! or at the window end, whichever comes first. An exception date consumes
//! `count` like any other candidate, so the number of yielded occurrences
//! never exceeds `count`.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from occurrence expansion.
///
/// Both are recoverable and scoped to one expansion call: the calendar
/// module falls back to an empty occurrence set for the offending event.
#[derive(Error, Debug)]
pub enum RecurrenceError {
    /// The rule cannot be expanded as written.
    #[error("invalid recurrence rule: {0}")]
    InvalidRule(String),

    /// Neither the rule nor the query window is bounded; expansion would
    /// never terminate.
    #[error("unbounded window: rule has no count/until bound and the window has no end")]
    UnboundedWindow,
}

/// How often a rule repeats.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A per-date replacement for one generated occurrence.
///
/// When the source calendar moves or renames a single instance of a
/// recurring event, the feed carries an override keyed by the original
/// occurrence date. The override's explicit start/end/title replace the
/// computed ones; the generated occurrence is suppressed, never duplicated.
#[derive(Clone, Debug, PartialEq)]
pub struct OccurrenceOverride {
    /// Local date (in the rule's zone) of the generated occurrence this
    /// entry replaces.
    pub date: NaiveDate,
    /// Replacement wall-clock start in the rule's zone.
    pub start: NaiveDateTime,
    /// Replacement wall-clock end in the rule's zone.
    pub end: NaiveDateTime,
    /// Replacement title, if the override renames the event.
    pub title: Option<String>,
}

/// A source event's recurrence definition. Immutable once loaded.
#[derive(Clone, Debug)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Every `interval` units of `frequency`; must be at least 1.
    pub interval: u32,
    /// Stop after this many candidates, if set.
    pub count: Option<u32>,
    /// Last local date (inclusive) a candidate may start on, if set.
    pub until: Option<NaiveDate>,
    /// For weekly rules: which weekdays repeat. Empty means the base
    /// start's weekday.
    pub by_weekday: Vec<Weekday>,
    /// Local dates whose occurrences are dropped.
    pub exceptions: Vec<NaiveDate>,
    /// Per-date replacements, keyed by original occurrence date.
    pub overrides: Vec<OccurrenceOverride>,
    /// The zone all local dates and times above are expressed in.
    pub timezone: Tz,
}

impl RecurrenceRule {
    /// A rule that fires exactly once, for non-recurring events.
    pub fn once(timezone: Tz) -> Self {
        Self {
            frequency: Frequency::Daily,
            interval: 1,
            count: Some(1),
            until: None,
            by_weekday: Vec::new(),
            exceptions: Vec::new(),
            overrides: Vec::new(),
            timezone,
        }
    }

    fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    fn override_for(&self, date: NaiveDate) -> Option<&OccurrenceOverride> {
        self.overrides.iter().find(|o| o.date == date)
    }
}

/// The bounded time span occurrences are generated for.
///
/// `end` is exclusive. An open end is only legal when the rule itself is
/// bounded.
#[derive(Clone, Copy, Debug)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

/// One concrete instance of a (possibly recurring) event.
#[derive(Clone, Debug, PartialEq)]
pub struct EventOccurrence {
    /// Identifier of the originating rule/event.
    pub rule_id: String,
    pub title: String,
    /// Zone-normalized start; clipped to the window start when the
    /// occurrence began before the window.
    pub start: DateTime<Tz>,
    /// Zone-normalized end. Multi-day events stay one spanning occurrence.
    pub end: DateTime<Tz>,
    /// True when an override replaced the generated instance.
    pub is_override: bool,
    /// True when `start` was clipped to the window start.
    pub clipped: bool,
}

impl EventOccurrence {
    /// Compact agenda line timestamp, e.g. `"Aug 27 14:00-15:30"` or
    /// `"Aug 27 22:00 - Aug 29 06:00"` for spanning events.
    pub fn format_range(&self) -> String {
        if self.start.date_naive() == self.end.date_naive() {
            format!(
                "{} {}-{}",
                self.start.format("%b %d"),
                self.start.format("%H:%M"),
                self.end.format("%H:%M")
            )
        } else {
            format!(
                "{} - {}",
                self.start.format("%b %d %H:%M"),
                self.end.format("%b %d %H:%M")
            )
        }
    }
}

/// Expand a rule into the occurrences overlapping `window`.
///
/// `base_start`/`base_end` are the source event's first instance as wall
/// clock in the rule's zone. The returned iterator is finite for any legal
/// input and yields occurrences in candidate-date order; an override that
/// moves an instance far from its original slot can land out of strict
/// start order, so callers needing sorted output sort after collecting.
pub fn expand<'a>(
    rule: &'a RecurrenceRule,
    rule_id: &str,
    title: &str,
    base_start: NaiveDateTime,
    base_end: NaiveDateTime,
    window: Window,
) -> Result<OccurrenceIter<'a>, RecurrenceError> {
    if rule.interval == 0 {
        return Err(RecurrenceError::InvalidRule(
            "interval must be positive".into(),
        ));
    }
    if base_end < base_start {
        return Err(RecurrenceError::InvalidRule(
            "base end precedes base start".into(),
        ));
    }
    if window.end.is_none() && !rule.is_bounded() {
        return Err(RecurrenceError::UnboundedWindow);
    }

    // Weekly rules expand per-weekday within each repeating week. The
    // offsets are relative to the Monday of the base start's week.
    let mut weekday_offsets: Vec<i64> = if rule.frequency == Frequency::Weekly {
        let days = if rule.by_weekday.is_empty() {
            vec![base_start.weekday()]
        } else {
            rule.by_weekday.clone()
        };
        days.iter()
            .map(|d| d.num_days_from_monday() as i64)
            .collect()
    } else {
        vec![0]
    };
    weekday_offsets.sort_unstable();
    weekday_offsets.dedup();

    Ok(OccurrenceIter {
        rule,
        rule_id: rule_id.to_owned(),
        title: title.to_owned(),
        base_start,
        duration: base_end - base_start,
        window,
        weekday_offsets,
        period: 0,
        weekday_pos: 0,
        candidates_used: 0,
        done: false,
    })
}

/// Lazy occurrence stream produced by [`expand`].
#[derive(Debug)]
pub struct OccurrenceIter<'a> {
    rule: &'a RecurrenceRule,
    rule_id: String,
    title: String,
    base_start: NaiveDateTime,
    duration: Duration,
    window: Window,
    /// For weekly rules, day offsets from the week's Monday; `[0]` otherwise.
    weekday_offsets: Vec<i64>,
    /// How many interval periods have been advanced.
    period: u32,
    /// Index into `weekday_offsets` within the current period.
    weekday_pos: usize,
    /// Candidates consumed against the rule's `count` bound.
    candidates_used: u32,
    done: bool,
}

impl OccurrenceIter<'_> {
    /// Produce the next candidate wall-clock start, advancing the cursor.
    /// `None` once the frequency arithmetic runs off the calendar.
    fn advance_candidate(&mut self) -> Option<NaiveDateTime> {
        loop {
            let candidate = match self.rule.frequency {
                Frequency::Daily => Some(
                    self.base_start
                        + Duration::days(self.period as i64 * self.rule.interval as i64),
                ),
                Frequency::Weekly => {
                    let week_monday = self.base_start.date()
                        - Duration::days(self.base_start.weekday().num_days_from_monday() as i64)
                        + Duration::weeks(self.period as i64 * self.rule.interval as i64);
                    let offset = self.weekday_offsets[self.weekday_pos];
                    Some((week_monday + Duration::days(offset)).and_time(self.base_start.time()))
                }
                Frequency::Monthly => {
                    let months =
                        self.base_start.month0() as i64 + self.period as i64 * self.rule.interval as i64;
                    let year = self.base_start.year() as i64 + months.div_euclid(12);
                    let month = months.rem_euclid(12) as u32 + 1;
                    // Day-of-month that does not exist (e.g. the 31st in
                    // February) skips the month entirely.
                    NaiveDate::from_ymd_opt(year as i32, month, self.base_start.day())
                        .map(|d| d.and_time(self.base_start.time()))
                }
                Frequency::Yearly => {
                    let year =
                        self.base_start.year() + (self.period * self.rule.interval) as i32;
                    // Feb 29 anchors skip non-leap years.
                    NaiveDate::from_ymd_opt(year, self.base_start.month(), self.base_start.day())
                        .map(|d| d.and_time(self.base_start.time()))
                }
            };

            // Step the cursor
            if self.weekday_pos + 1 < self.weekday_offsets.len() {
                self.weekday_pos += 1;
            } else {
                self.weekday_pos = 0;
                self.period = self.period.checked_add(1)?;
            }

            match candidate {
                // Weekly candidates earlier in the base week than the base
                // start itself are not part of the series.
                Some(c) if c < self.base_start => continue,
                Some(c) => return Some(c),
                // Nonexistent calendar day: skip, try the next period.
                None => continue,
            }
        }
    }

    /// Resolve a wall-clock time in the rule's zone to an instant.
    ///
    /// Ambiguous times (fall-back hour) take the earlier offset; times in
    /// the spring-forward gap resolve just past the transition.
    fn resolve_local(&self, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
        let tz = self.rule.timezone;
        for shift_minutes in [0i64, 30, 60, 90, 120] {
            match tz.from_local_datetime(&(naive + Duration::minutes(shift_minutes))) {
                LocalResult::Single(dt) => return Some(dt),
                LocalResult::Ambiguous(earlier, _) => return Some(earlier),
                LocalResult::None => continue,
            }
        }
        None
    }
}

impl Iterator for OccurrenceIter<'_> {
    type Item = EventOccurrence;

    fn next(&mut self) -> Option<EventOccurrence> {
        if self.done {
            return None;
        }
        loop {
            if let Some(count) = self.rule.count {
                if self.candidates_used >= count {
                    self.done = true;
                    return None;
                }
            }

            let candidate = match self.advance_candidate() {
                Some(c) => c,
                None => {
                    self.done = true;
                    return None;
                }
            };

            if let Some(until) = self.rule.until {
                if candidate.date() > until {
                    self.done = true;
                    return None;
                }
            }
            self.candidates_used += 1;

            // Exception dates drop the candidate but still consume count.
            if self.rule.exceptions.contains(&candidate.date()) {
                continue;
            }

            let (start_naive, end_naive, title, is_override) =
                match self.rule.override_for(candidate.date()) {
                    Some(ov) => (
                        ov.start,
                        ov.end,
                        ov.title.clone().unwrap_or_else(|| self.title.clone()),
                        true,
                    ),
                    None => (
                        candidate,
                        candidate + self.duration,
                        self.title.clone(),
                        false,
                    ),
                };

            let Some(start) = self.resolve_local(start_naive) else {
                continue;
            };
            let Some(end) = self.resolve_local(end_naive) else {
                continue;
            };

            // Candidates are monotonic, so once a generated start passes the
            // window end the stream is exhausted. An override may sit past
            // the end without exhausting the series.
            if let Some(window_end) = self.window.end {
                if start.with_timezone(&Utc) >= window_end {
                    if is_override {
                        continue;
                    }
                    self.done = true;
                    return None;
                }
            }

            // Entirely before the window
            if end.with_timezone(&Utc) <= self.window.start {
                continue;
            }

            // Spanning the window start: clip the displayed start so every
            // yielded start lies inside the window.
            let (start, clipped) = if start.with_timezone(&Utc) < self.window.start {
                (
                    self.window.start.with_timezone(&self.rule.timezone),
                    true,
                )
            } else {
                (start, false)
            };

            return Some(EventOccurrence {
                rule_id: self.rule_id.clone(),
                title,
                start,
                end,
                is_override,
                clipped,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Tz;

    fn tz() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn daily_rule() -> RecurrenceRule {
        RecurrenceRule {
            frequency: Frequency::Daily,
            interval: 1,
            count: None,
            until: None,
            by_weekday: Vec::new(),
            exceptions: Vec::new(),
            overrides: Vec::new(),
            timezone: tz(),
        }
    }

    fn collect(
        rule: &RecurrenceRule,
        base_start: NaiveDateTime,
        base_end: NaiveDateTime,
        window: Window,
    ) -> Vec<EventOccurrence> {
        expand(rule, "evt", "Event", base_start, base_end, window)
            .unwrap()
            .collect()
    }

    #[test]
    fn daily_count_bound_respected() {
        let mut rule = daily_rule();
        rule.count = Some(5);
        let occs = collect(
            &rule,
            naive(2025, 3, 1, 9, 0),
            naive(2025, 3, 1, 10, 0),
            Window::new(utc(2025, 2, 1, 0), utc(2025, 6, 1, 0)),
        );
        assert_eq!(occs.len(), 5);
        assert_eq!(occs[0].start.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(occs[4].start.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 5).unwrap());
    }

    #[test]
    fn all_starts_lie_within_window() {
        let rule = daily_rule();
        let window = Window::new(utc(2025, 3, 10, 0), utc(2025, 3, 15, 0));
        let occs = collect(
            &rule,
            naive(2025, 3, 1, 9, 0),
            naive(2025, 3, 1, 10, 0),
            window,
        );
        assert!(!occs.is_empty());
        for occ in &occs {
            let start = occ.start.with_timezone(&Utc);
            assert!(start >= window.start && start < window.end.unwrap());
        }
    }

    #[test]
    fn monthly_day_31_skips_short_months() {
        let mut rule = daily_rule();
        rule.frequency = Frequency::Monthly;
        let occs = collect(
            &rule,
            naive(2025, 1, 31, 12, 0),
            naive(2025, 1, 31, 13, 0),
            Window::new(utc(2025, 1, 1, 0), utc(2025, 6, 15, 0)),
        );
        let dates: Vec<NaiveDate> = occs.iter().map(|o| o.start.date_naive()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
            ],
            "Feb and Apr must be skipped, not clamped"
        );
    }

    #[test]
    fn weekly_multiple_weekdays() {
        let mut rule = daily_rule();
        rule.frequency = Frequency::Weekly;
        rule.by_weekday = vec![Weekday::Mon, Weekday::Wed];
        // Base start on a Wednesday: the Monday of the base week is not
        // part of the series.
        let occs = collect(
            &rule,
            naive(2025, 3, 5, 9, 0), // Wed
            naive(2025, 3, 5, 10, 0),
            Window::new(utc(2025, 3, 1, 0), utc(2025, 3, 14, 0)),
        );
        let dates: Vec<NaiveDate> = occs.iter().map(|o| o.start.date_naive()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),  // Wed
                NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), // Mon
                NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(), // Wed
            ]
        );
    }

    #[test]
    fn exception_dates_are_dropped() {
        let mut rule = daily_rule();
        rule.count = Some(4);
        rule.exceptions = vec![NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()];
        let occs = collect(
            &rule,
            naive(2025, 3, 1, 9, 0),
            naive(2025, 3, 1, 10, 0),
            Window::new(utc(2025, 2, 1, 0), utc(2025, 6, 1, 0)),
        );
        // The excluded day consumed count: 4 candidates, 3 yielded
        assert_eq!(occs.len(), 3);
        assert!(occs
            .iter()
            .all(|o| o.start.date_naive() != NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()));
    }

    #[test]
    fn override_replaces_never_duplicates() {
        use chrono::Timelike;
        let mut rule = daily_rule();
        rule.count = Some(3);
        rule.overrides = vec![OccurrenceOverride {
            date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            start: naive(2025, 3, 2, 14, 0),
            end: naive(2025, 3, 2, 15, 0),
            title: Some("Moved".into()),
        }];
        let occs = collect(
            &rule,
            naive(2025, 3, 1, 9, 0),
            naive(2025, 3, 1, 10, 0),
            Window::new(utc(2025, 2, 1, 0), utc(2025, 6, 1, 0)),
        );
        assert_eq!(occs.len(), 3, "override must not add an extra occurrence");
        let moved: Vec<_> = occs.iter().filter(|o| o.is_override).collect();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].title, "Moved");
        assert_eq!(moved[0].start.hour(), 14);
        // The generated 09:00 instance on that date is suppressed
        assert!(!occs
            .iter()
            .any(|o| o.start.date_naive() == NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
                && o.start.hour() == 9));
    }

    #[test]
    fn dst_transition_keeps_wall_clock_time() {
        use chrono::Timelike;
        // US DST spring-forward: 2025-03-09 in America/New_York
        let rule = daily_rule();
        let occs = collect(
            &rule,
            naive(2025, 3, 7, 9, 0),
            naive(2025, 3, 7, 10, 0),
            Window::new(utc(2025, 3, 7, 0), utc(2025, 3, 12, 0)),
        );
        assert!(occs.len() >= 4);
        for occ in &occs {
            assert_eq!(
                occ.start.hour(),
                9,
                "wall-clock start must not shift across the DST boundary ({})",
                occ.start
            );
        }
    }

    #[test]
    fn spring_forward_gap_resolves_past_transition() {
        use chrono::Timelike;
        // 02:30 does not exist on 2025-03-09 in America/New_York
        let rule = daily_rule();
        let occs = collect(
            &rule,
            naive(2025, 3, 8, 2, 30),
            naive(2025, 3, 8, 3, 0),
            Window::new(utc(2025, 3, 8, 0), utc(2025, 3, 10, 12)),
        );
        // Mar 8 (EST), Mar 9 (gapped), Mar 10 02:30 EDT = 06:30 UTC
        assert_eq!(occs.len(), 3);
        // The gapped instance lands just past the transition instead of
        // disappearing or going backwards
        assert_eq!(occs[1].start.hour(), 3);
        assert!(occs.windows(2).all(|w| w[1].start > w[0].start));
    }

    #[test]
    fn multi_day_event_spans_single_occurrence() {
        let mut rule = daily_rule();
        rule.count = Some(1);
        let occs = collect(
            &rule,
            naive(2025, 3, 1, 22, 0),
            naive(2025, 3, 3, 6, 0),
            Window::new(utc(2025, 2, 1, 0), utc(2025, 4, 1, 0)),
        );
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(occs[0].end.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    }

    #[test]
    fn event_spanning_window_start_is_clipped() {
        let mut rule = daily_rule();
        rule.count = Some(1);
        let window = Window::new(utc(2025, 3, 2, 12), utc(2025, 3, 10, 0));
        // Starts Mar 1, ends Mar 4 (all before/through the window start)
        let occs = collect(
            &rule,
            naive(2025, 3, 1, 8, 0),
            naive(2025, 3, 4, 8, 0),
            window,
        );
        assert_eq!(occs.len(), 1);
        assert!(occs[0].clipped);
        assert_eq!(occs[0].start.with_timezone(&Utc), window.start);
        assert_eq!(occs[0].end.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut rule = daily_rule();
        rule.interval = 0;
        let err = expand(
            &rule,
            "evt",
            "Event",
            naive(2025, 3, 1, 9, 0),
            naive(2025, 3, 1, 10, 0),
            Window::new(utc(2025, 3, 1, 0), utc(2025, 4, 1, 0)),
        )
        .unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidRule(_)));
    }

    #[test]
    fn unbounded_rule_and_window_rejected() {
        let rule = daily_rule();
        let err = expand(
            &rule,
            "evt",
            "Event",
            naive(2025, 3, 1, 9, 0),
            naive(2025, 3, 1, 10, 0),
            Window {
                start: utc(2025, 3, 1, 0),
                end: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, RecurrenceError::UnboundedWindow));
    }

    #[test]
    fn open_window_legal_for_bounded_rule() {
        let mut rule = daily_rule();
        rule.count = Some(3);
        let occs: Vec<_> = expand(
            &rule,
            "evt",
            "Event",
            naive(2025, 3, 1, 9, 0),
            naive(2025, 3, 1, 10, 0),
            Window {
                start: utc(2025, 1, 1, 0),
                end: None,
            },
        )
        .unwrap()
        .collect();
        assert_eq!(occs.len(), 3);
    }

    #[test]
    fn until_bound_stops_expansion() {
        let mut rule = daily_rule();
        rule.until = NaiveDate::from_ymd_opt(2025, 3, 3);
        let occs = collect(
            &rule,
            naive(2025, 3, 1, 9, 0),
            naive(2025, 3, 1, 10, 0),
            Window::new(utc(2025, 2, 1, 0), utc(2025, 6, 1, 0)),
        );
        assert_eq!(occs.len(), 3); // Mar 1, 2, 3 inclusive
    }

    #[test]
    fn expansion_is_deterministic() {
        let mut rule = daily_rule();
        rule.frequency = Frequency::Weekly;
        rule.interval = 2;
        rule.by_weekday = vec![Weekday::Tue, Weekday::Thu];
        let window = Window::new(utc(2025, 3, 1, 0), utc(2025, 5, 1, 0));
        let a = collect(&rule, naive(2025, 3, 4, 9, 0), naive(2025, 3, 4, 10, 0), window);
        let b = collect(&rule, naive(2025, 3, 4, 9, 0), naive(2025, 3, 4, 10, 0), window);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn format_range_single_and_multi_day() {
        let rule = RecurrenceRule::once(tz());
        let occs = collect(
            &rule,
            naive(2025, 8, 27, 14, 0),
            naive(2025, 8, 27, 15, 30),
            Window::new(utc(2025, 8, 1, 0), utc(2025, 9, 1, 0)),
        );
        assert_eq!(occs[0].format_range(), "Aug 27 14:00-15:30");

        let spanning = collect(
            &rule,
            naive(2025, 8, 27, 22, 0),
            naive(2025, 8, 29, 6, 0),
            Window::new(utc(2025, 8, 1, 0), utc(2025, 9, 1, 0)),
        );
        assert_eq!(spanning[0].format_range(), "Aug 27 22:00 - Aug 29 06:00");
    }
}
