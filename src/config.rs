//! # Configuration Management
//!
//! Loads the dashboard configuration from a TOML file: the target panel
//! profile, driver refresh policy, scheduler tuning, and one entry per
//! enabled module with its assigned region.
//!
//! Validation happens here, before the scheduler ever starts. An invalid
//! layout (overlapping regions, regions past the panel bounds) is the one
//! unrecoverable error in the engine, so it is rejected up front instead of
//! surfacing mid-cycle.

use crate::canvas::ColorDepth;
use crate::geometry::Region;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML or is missing fields.
    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two module regions share pixels.
    #[error("regions of modules '{first}' and '{second}' overlap")]
    OverlappingRegions { first: String, second: String },

    /// A module region extends past the panel bounds.
    #[error("region of module '{kind}' ({region:?}) exceeds panel bounds {width}x{height}")]
    RegionOutOfBounds {
        kind: String,
        region: Region,
        width: u32,
        height: u32,
    },

    /// A module region covers no pixels.
    #[error("region of module '{kind}' is empty")]
    EmptyRegion { kind: String },

    /// No modules are enabled.
    #[error("configuration enables no modules")]
    NoModules,

    /// A custom panel palette carries no colors.
    #[error("panel '{name}' declares an empty color palette")]
    EmptyPalette { name: String },

    /// Panel resolution exceeds what the compositor supports.
    #[error("panel resolution {width}x{height} exceeds the per-axis pixel limit")]
    PanelTooLarge { width: u32, height: u32 },
}

/// Upper bound per panel axis. Real e-paper tops out around 1,872 pixels;
/// the cap keeps pixel-buffer sizes comfortably inside address space.
pub const MAX_PANEL_DIMENSION: u32 = 16_384;

/// Static descriptor of a physical display. Loaded once, read-only after.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PanelProfile {
    /// Panel model identifier, e.g. "epd7in5_v2".
    pub name: String,
    /// Horizontal resolution in pixels.
    pub width: u32,
    /// Vertical resolution in pixels.
    pub height: u32,
    /// Color capability of the panel.
    pub depth: ColorDepth,
    /// Minimum seconds between refreshes, derived from the panel's maximum
    /// safe refresh frequency. Protects panel lifetime.
    #[serde(default = "default_min_refresh_secs")]
    pub min_refresh_secs: u64,
    /// Whether the controller supports partial (windowed) updates.
    #[serde(default)]
    pub supports_partial: bool,
}

fn default_min_refresh_secs() -> u64 {
    60
}

impl PanelProfile {
    /// Minimum allowed gap between two refreshes.
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_secs)
    }
}

/// Immutable configuration for one module instance.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModuleConfig {
    /// Module kind tag, resolved through the registry ("calendar",
    /// "weather", ...).
    pub kind: String,
    /// The panel rectangle this instance renders into.
    pub region: Region,
    /// Seconds between refresh attempts for this instance.
    pub refresh_seconds: u64,
    /// Source-specific parameters, passed through to the module.
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// Locale tag for date formatting.
    #[serde(default = "default_locale")]
    pub locale: String,
    /// IANA timezone all module-local times are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_timezone() -> Tz {
    chrono_tz::UTC
}

impl ModuleConfig {
    /// Refresh cadence as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds)
    }

    /// Look up a string parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Scheduler tuning knobs.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Consecutive failures before a module is marked degraded and its
    /// region falls back to a placeholder instead of stale data.
    pub max_consecutive_failures: u32,
    /// Hard timeout for a single module render attempt, in seconds.
    pub render_timeout_seconds: u64,
    /// Upper bound for the exponential retry backoff, in seconds.
    pub max_backoff_seconds: u64,
    /// Orchestrator tick granularity, in seconds.
    pub tick_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            render_timeout_seconds: 30,
            max_backoff_seconds: 900,
            tick_seconds: 5,
        }
    }
}

/// Display driver refresh policy knobs.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Changed-pixel ratio below which a partial refresh is used (when the
    /// panel supports it).
    pub partial_threshold: f32,
    /// Force a full wipe every N refreshes to clear residual ghosting.
    pub full_refresh_every: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            partial_threshold: 0.15,
            full_refresh_every: 12,
        }
    }
}

/// Complete dashboard configuration: one panel, many modules.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DashboardConfig {
    pub panel: PanelProfile,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(rename = "module", default)]
    pub modules: Vec<ModuleConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        // 7.5" 800x480 panel, calendar on top, weather strip below
        DashboardConfig {
            panel: PanelProfile {
                name: "epd7in5_v2".to_string(),
                width: 800,
                height: 480,
                depth: ColorDepth::Mono,
                min_refresh_secs: 60,
                supports_partial: true,
            },
            scheduler: SchedulerConfig::default(),
            driver: DriverConfig::default(),
            modules: vec![
                ModuleConfig {
                    kind: "calendar".to_string(),
                    region: Region::new(0, 0, 800, 300),
                    refresh_seconds: 600,
                    params: HashMap::new(),
                    locale: default_locale(),
                    timezone: default_timezone(),
                },
                ModuleConfig {
                    kind: "weather".to_string(),
                    region: Region::new(0, 300, 800, 180),
                    refresh_seconds: 900,
                    params: HashMap::new(),
                    locale: default_locale(),
                    timezone: default_timezone(),
                },
            ],
        }
    }
}

impl DashboardConfig {
    /// Load and validate configuration from the given TOML file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        let config: DashboardConfig = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!(
            panel = %config.panel.name,
            modules = config.modules.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Reject layouts the compositor cannot honor: every enabled module has
    /// exactly one non-empty region, no two regions overlap, and every
    /// region lies within the panel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modules.is_empty() {
            return Err(ConfigError::NoModules);
        }
        if self.panel.width > MAX_PANEL_DIMENSION || self.panel.height > MAX_PANEL_DIMENSION {
            return Err(ConfigError::PanelTooLarge {
                width: self.panel.width,
                height: self.panel.height,
            });
        }
        if let ColorDepth::Palette(palette) = &self.panel.depth {
            if palette.is_empty() {
                return Err(ConfigError::EmptyPalette {
                    name: self.panel.name.clone(),
                });
            }
        }
        for module in &self.modules {
            if module.region.is_empty() {
                return Err(ConfigError::EmptyRegion {
                    kind: module.kind.clone(),
                });
            }
            if !module.region.fits_within(self.panel.width, self.panel.height) {
                return Err(ConfigError::RegionOutOfBounds {
                    kind: module.kind.clone(),
                    region: module.region,
                    width: self.panel.width,
                    height: self.panel.height,
                });
            }
        }
        for (i, a) in self.modules.iter().enumerate() {
            for b in &self.modules[i + 1..] {
                if a.region.overlaps(&b.region) {
                    return Err(ConfigError::OverlappingRegions {
                        first: a.kind.clone(),
                        second: b.kind.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Serialize the current configuration back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
