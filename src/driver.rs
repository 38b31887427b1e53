//! # Display Driver Refresh Policy
//!
//! E-paper panels wear out: they tolerate a limited number of refreshes,
//! and frequent full wipes are visually disruptive. This layer sits between
//! the compositor and the panel transport and decides, per composed frame,
//! whether to skip, partially refresh, or fully refresh — and whether the
//! refresh must wait for the panel's minimum inter-refresh interval.
//!
//! The electrical/bus delivery itself lives behind [`PanelTransport`]; the
//! engine only hands over a finished frame plus a refresh mode.

use crate::compositor::Frame;
use crate::config::{DriverConfig, PanelProfile};
use std::time::Instant;
use thiserror::Error;

/// Failure reported by the panel transport collaborator.
///
/// Never fatal to the engine: the frame is re-queued and retried on the
/// next cycle.
#[derive(Error, Debug)]
pub enum DriverTransportError {
    #[error("panel transport: {0}")]
    Transport(String),
}

/// How the panel applies an update.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefreshMode {
    /// Full wipe: slow, flashes, clears ghosting.
    Full,
    /// Windowed update: fast, but accumulates residual images.
    Partial,
}

/// The policy verdict for one composed frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefreshDecision {
    /// Frames are pixel-identical; nothing to do.
    Skip,
    Partial,
    Full,
}

/// Outcome of handing a frame to the driver.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubmitOutcome {
    Refreshed(RefreshMode),
    /// Identical to what the panel already shows.
    Skipped,
    /// The minimum inter-refresh interval has not elapsed; the frame is
    /// queued and will be flushed by [`DisplayDriver::poll_deferred`].
    Deferred,
}

/// The external collaborator that moves bits to the physical panel.
pub trait PanelTransport: Send {
    fn push(&mut self, frame: &Frame, mode: RefreshMode) -> Result<(), DriverTransportError>;
}

/// Refresh-policy layer in front of a [`PanelTransport`].
///
/// Single-writer: the engine owns exactly one driver and never refreshes
/// concurrently.
pub struct DisplayDriver<T: PanelTransport> {
    transport: T,
    profile: PanelProfile,
    policy: DriverConfig,
    previous: Option<Frame>,
    /// Refreshes since the last full wipe, for the ghosting counter.
    refreshes_since_full: u32,
    last_refresh_at: Option<Instant>,
    /// Frame waiting out the minimum inter-refresh interval. Replaced, not
    /// appended: only the freshest deferred frame matters.
    queued: Option<Frame>,
    /// Lifetime refresh count against the panel wear budget.
    total_refreshes: u64,
    force_full: bool,
}

impl<T: PanelTransport> DisplayDriver<T> {
    pub fn new(transport: T, profile: PanelProfile, policy: DriverConfig) -> Self {
        Self {
            transport,
            profile,
            policy,
            previous: None,
            refreshes_since_full: 0,
            last_refresh_at: None,
            queued: None,
            total_refreshes: 0,
            force_full: false,
        }
    }

    /// Decide how the panel should apply `next`, without side effects.
    pub fn decide(&self, next: &Frame) -> RefreshDecision {
        if self.force_full {
            return RefreshDecision::Full;
        }
        let Some(previous) = &self.previous else {
            // Unknown panel contents: only a full wipe is safe
            return RefreshDecision::Full;
        };
        let ratio = previous.changed_ratio(next);
        if ratio == 0.0 {
            return RefreshDecision::Skip;
        }
        // Periodic full wipe regardless of change size, to clear ghosting
        if self.refreshes_since_full + 1 >= self.policy.full_refresh_every {
            return RefreshDecision::Full;
        }
        if self.profile.supports_partial && ratio < self.policy.partial_threshold {
            RefreshDecision::Partial
        } else {
            RefreshDecision::Full
        }
    }

    /// Hand a composed frame to the driver.
    ///
    /// A frame arriving before the minimum inter-refresh interval has
    /// elapsed is queued and deferred, never dropped.
    pub fn submit(
        &mut self,
        frame: Frame,
        now: Instant,
    ) -> Result<SubmitOutcome, DriverTransportError> {
        if self.decide(&frame) == RefreshDecision::Skip {
            return Ok(SubmitOutcome::Skipped);
        }
        if !self.interval_elapsed(now) {
            tracing::debug!("refresh deferred by minimum inter-refresh interval");
            self.queued = Some(frame);
            return Ok(SubmitOutcome::Deferred);
        }
        self.refresh(frame, now).map(SubmitOutcome::Refreshed)
    }

    /// Flush a deferred frame once the interval allows it.
    pub fn poll_deferred(
        &mut self,
        now: Instant,
    ) -> Result<Option<SubmitOutcome>, DriverTransportError> {
        if !self.interval_elapsed(now) {
            return Ok(None);
        }
        match self.queued.take() {
            Some(frame) => self.submit(frame, now).map(Some),
            None => Ok(None),
        }
    }

    /// Request that the next refresh is a full wipe, regardless of delta.
    /// Exposed to the settings UI / CLI layer.
    pub fn force_full_refresh(&mut self) {
        self.force_full = true;
    }

    /// Lifetime refreshes pushed to the panel.
    pub fn total_refreshes(&self) -> u64 {
        self.total_refreshes
    }

    /// Whether a frame is waiting out the refresh interval.
    pub fn has_deferred(&self) -> bool {
        self.queued.is_some()
    }

    fn interval_elapsed(&self, now: Instant) -> bool {
        match self.last_refresh_at {
            Some(last) => now.duration_since(last) >= self.profile.min_refresh_interval(),
            None => true,
        }
    }

    fn refresh(&mut self, frame: Frame, now: Instant) -> Result<RefreshMode, DriverTransportError> {
        let mode = match self.decide(&frame) {
            RefreshDecision::Partial => RefreshMode::Partial,
            // Skip was filtered by the caller; treat defensively as full
            _ => RefreshMode::Full,
        };
        if let Err(err) = self.transport.push(&frame, mode) {
            tracing::warn!(%err, "panel transport failed; frame re-queued");
            self.queued = Some(frame);
            return Err(err);
        }
        match mode {
            RefreshMode::Full => self.refreshes_since_full = 0,
            RefreshMode::Partial => self.refreshes_since_full += 1,
        }
        self.previous = Some(frame);
        self.last_refresh_at = Some(now);
        self.total_refreshes += 1;
        self.force_full = false;
        tracing::info!(?mode, total = self.total_refreshes, "panel refreshed");
        Ok(mode)
    }
}

/// Development transport: renders each frame as coarse ASCII art on stdout
/// instead of driving hardware.
pub struct AsciiPreview {
    /// Character-grid width of the preview.
    pub columns: u32,
}

impl Default for AsciiPreview {
    fn default() -> Self {
        Self { columns: 100 }
    }
}

impl PanelTransport for AsciiPreview {
    fn push(&mut self, frame: &Frame, mode: RefreshMode) -> Result<(), DriverTransportError> {
        let columns = self.columns.min(frame.width()).max(1);
        let scale = (frame.width() / columns).max(1);
        // Characters are roughly twice as tall as wide
        let row_step = scale * 2;

        println!("-- {:?} refresh {}x{} --", mode, frame.width(), frame.height());
        let mut y = 0;
        while y < frame.height() {
            let mut line = String::with_capacity(columns as usize);
            let mut x = 0;
            while x < frame.width() {
                let ch = match frame.get_pixel(x, y) {
                    Some(px) if px == crate::canvas::Rgb::BLACK => '#',
                    Some(px) if px != crate::canvas::Rgb::WHITE => '*',
                    _ => ' ',
                };
                line.push(ch);
                x += scale;
            }
            println!("{line}");
            y += row_step;
        }
        Ok(())
    }
}
