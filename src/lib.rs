//! # Inkdash Core Library
//!
//! Engine for a modular e-paper dashboard: independent content modules
//! (calendar agenda, weather, ...) each render a tile for their assigned
//! panel region on their own refresh cadence, a compositor assembles the
//! tiles into full-panel frames, and a refresh-policy layer decides how and
//! when each frame reaches the physical display.
//!
//! ## Design Philosophy
//!
//! ### Failure Isolation
//! One broken data source must not take down the dashboard. Each module
//! runs in its own scheduler slot with a render timeout, capped exponential
//! retry backoff, and a degradation latch: a region falls back to an
//! explicit placeholder rather than silently showing outdated data.
//!
//! ### Panel Lifetime
//! E-paper tolerates a limited number of refreshes and ghosts under
//! frequent partial updates. The driver layer skips identical frames,
//! prefers partial refreshes for small deltas, forces a periodic full wipe,
//! and enforces the panel's minimum inter-refresh interval.
//!
//! ### Determinism
//! Rendering is pure: modules draw against an injected cycle clock, color
//! reduction is a fixed nearest-palette mapping, and composing the same
//! tiles twice yields bit-identical frames. The whole pipeline is testable
//! without hardware or a wall clock.
//!
//! ## Core Types
//!
//! - [`module::Module`]: the per-region content contract
//! - [`scheduler::Orchestrator`]: per-slot cadence, timeout and degradation
//! - [`compositor::Frame`]: the quantized full-panel bitmap
//! - [`driver::DisplayDriver`]: refresh decisions in front of the panel
//! - [`recurrence`]: RFC-5545-flavored recurring event expansion

pub mod canvas;
pub mod compositor;
pub mod config;
pub mod driver;
pub mod geometry;
pub mod module;
pub mod modules;
pub mod recurrence;
pub mod scheduler;

pub use canvas::{Canvas, ColorDepth, Rgb};
pub use compositor::{compose, Frame};
pub use config::DashboardConfig;
pub use driver::{DisplayDriver, PanelTransport, RefreshDecision, RefreshMode};
pub use geometry::Region;
pub use module::{DataSource, Module, ModuleRegistry, Tile};
pub use scheduler::Orchestrator;
