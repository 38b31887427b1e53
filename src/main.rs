//! # Inkdash Application Entry Point
//!
//! Wires the engine together: loads and validates the configuration, builds
//! the module registry with the built-in modules, then drives the tick loop
//! of dispatch -> drain -> compose -> refresh. Frames go to the ASCII
//! preview transport; a hardware transport plugs in behind the same
//! panel transport boundary.
//!
//! Runtime control on Unix: SIGHUP reloads the configuration file, SIGUSR1
//! forces a full refresh of every module and the panel.


use anyhow::anyhow;
use chrono::Utc;
use inkdash_lib::canvas::Canvas;
use inkdash_lib::compositor::compose;
use inkdash_lib::config::DashboardConfig;
use inkdash_lib::driver::{AsciiPreview, DisplayDriver};
use inkdash_lib::geometry::Region;
use inkdash_lib::module::{DataSource, FetchError, ModuleRegistry};
use inkdash_lib::modules::{CalendarModule, ImageModule, WeatherModule};
use inkdash_lib::scheduler::Orchestrator;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// File-backed data source: each module entry names its feed file via the
/// `source_file` parameter. The HTTP-backed source slots in behind the same
/// [`DataSource`] boundary.
struct JsonFileSource;

impl DataSource for JsonFileSource {
    fn fetch(&self, params: &HashMap<String, String>) -> Result<serde_json::Value, FetchError> {
        let path = params.get("source_file").ok_or(FetchError::Unavailable)?;
        let contents =
            fs::read_to_string(path).map_err(|e| FetchError::Network(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

/// Registry with the built-in module kinds.
fn built_in_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register("calendar", |config| {
        let module = CalendarModule::new(config, Arc::new(JsonFileSource))?;
        Ok(Arc::new(module))
    });
    registry.register("weather", |config| {
        let module = WeatherModule::new(config, Arc::new(JsonFileSource))?;
        Ok(Arc::new(module))
    });
    registry.register("image", |config| {
        let module = ImageModule::new(config, Arc::new(JsonFileSource))?;
        Ok(Arc::new(module))
    });
    registry
}

fn print_usage() {
    eprintln!("Usage: inkdash [--config <path>] [--once]");
    eprintln!();
    eprintln!("  --config <path>  dashboard TOML configuration file");
    eprintln!("  --once           render one cycle to stdout and exit");
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let mut config_path: Option<PathBuf> = None;
    let mut once = false;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!("--config requires a path"))?;
                config_path = Some(PathBuf::from(path));
            }
            "--once" => once = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                print_usage();
                return Err(anyhow!("unknown argument '{other}'"));
            }
        }
    }

    let config = match &config_path {
        Some(path) => DashboardConfig::load_from_path(path)?,
        None => {
            tracing::info!("no config file given, using built-in default layout");
            DashboardConfig::default()
        }
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, config_path, once))
}

fn build_engine(
    config: &DashboardConfig,
    registry: &ModuleRegistry,
) -> anyhow::Result<(Orchestrator, DisplayDriver<AsciiPreview>)> {
    let orchestrator = Orchestrator::new(config, registry)?;
    let driver = DisplayDriver::new(
        AsciiPreview::default(),
        config.panel.clone(),
        config.driver.clone(),
    );
    Ok((orchestrator, driver))
}

/// One engine cycle: apply finished renders, dispatch due slots, compose
/// the current region contents and hand the frame to the driver.
fn cycle(
    config: &DashboardConfig,
    orchestrator: &mut Orchestrator,
    driver: &mut DisplayDriver<AsciiPreview>,
) {
    let now = Instant::now();
    let now_utc = Utc::now();

    orchestrator.drain_outcomes(now);
    orchestrator.dispatch_due(now, now_utc);

    if let Err(err) = driver.poll_deferred(now) {
        tracing::warn!(%err, "deferred panel refresh failed");
    }

    let tiles = orchestrator.tiles(now_utc);
    let refs: Vec<(Region, &Canvas)> = tiles.iter().map(|(r, t)| (*r, &t.canvas)).collect();
    let frame = compose(&config.panel, &refs);
    if let Err(err) = driver.submit(frame, now) {
        tracing::warn!(%err, "panel refresh failed, frame queued for retry");
    }
}

async fn run(
    mut config: DashboardConfig,
    config_path: Option<PathBuf>,
    once: bool,
) -> anyhow::Result<()> {
    let registry = built_in_registry();
    let (mut orchestrator, mut driver) = build_engine(&config, &registry)?;

    if once {
        // Development mode: one complete cycle, then exit
        let now_utc = Utc::now();
        orchestrator.dispatch_due(Instant::now(), now_utc);
        while !orchestrator.idle() {
            tokio::time::sleep(Duration::from_millis(100)).await;
            orchestrator.drain_outcomes(Instant::now());
        }
        let tiles = orchestrator.tiles(now_utc);
        let refs: Vec<(Region, &Canvas)> = tiles.iter().map(|(r, t)| (*r, &t.canvas)).collect();
        let frame = compose(&config.panel, &refs);
        driver.submit(frame, Instant::now())?;
        return Ok(());
    }

    #[cfg(unix)]
    let (mut reload, mut force_full) = {
        use tokio::signal::unix::{signal, SignalKind};
        (
            signal(SignalKind::hangup())?,
            signal(SignalKind::user_defined1())?,
        )
    };

    let mut ticker = tokio::time::interval(orchestrator.tick());
    loop {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = reload.recv() => {
                    match &config_path {
                        Some(path) => match DashboardConfig::load_from_path(path) {
                            Ok(new_config) => {
                                config = new_config;
                                (orchestrator, driver) = build_engine(&config, &registry)?;
                                driver.force_full_refresh();
                                ticker = tokio::time::interval(orchestrator.tick());
                                tracing::info!("configuration reloaded");
                            }
                            // Keep running on the previous configuration
                            Err(err) => tracing::error!(%err, "configuration reload failed"),
                        },
                        None => tracing::warn!("no config file to reload"),
                    }
                    continue;
                }
                _ = force_full.recv() => {
                    orchestrator.refresh_all();
                    driver.force_full_refresh();
                    tracing::info!("full refresh forced");
                    continue;
                }
            }
        }
        #[cfg(not(unix))]
        ticker.tick().await;

        cycle(&config, &mut orchestrator, &mut driver);
    }
}
