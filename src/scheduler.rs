//! # Module Orchestrator
//!
//! Owns one slot per configured module instance and drives their refresh
//! cadences independently: a slow weather fetch never blocks the calendar.
//! Render attempts run on blocking worker threads with a hard timeout;
//! outcomes come back over a channel tagged with a per-slot generation so a
//! late result from a superseded attempt is discarded instead of clobbering
//! newer content.
//!
//! Failure handling is per-slot. Transient failures keep the last good tile
//! on screen (marked stale); once a slot crosses the consecutive-failure
//! limit it is latched degraded and its region shows a placeholder rather
//! than outdated data. Retries continue with capped exponential backoff,
//! and a single success fully restores the slot.
//!
//! The state transitions are synchronous and clock-injected, so tests drive
//! them directly without a runtime.

use crate::config::{DashboardConfig, ModuleConfig, SchedulerConfig};
use crate::geometry::Region;
use crate::module::{
    placeholder_tile, Module, ModuleError, ModuleRegistry, RenderContext, Tile,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// What a module's region should show this cycle.
#[derive(Clone, Debug)]
pub enum RegionContent {
    /// Fresh tile from the most recent successful render.
    Live(Tile),
    /// Last good tile, kept while the slot is failing but not yet degraded.
    Stale { tile: Tile, age: Duration },
    /// No usable tile: never rendered, or latched degraded.
    Placeholder,
}

/// Result of one render attempt, sent back over the outcome channel.
#[derive(Debug)]
pub struct RenderOutcome {
    pub slot: usize,
    /// Generation of the attempt; stale generations are discarded.
    pub generation: u64,
    pub result: Result<Tile, ModuleError>,
}

struct Slot {
    config: ModuleConfig,
    module: Arc<dyn Module>,
    running: bool,
    /// Bumped on every dispatched attempt. Outcomes carrying an older
    /// generation lost a race (timeout already charged, or the slot was
    /// re-dispatched) and must not apply.
    generation: u64,
    last_tile: Option<Tile>,
    consecutive_failures: u32,
    degraded: bool,
    next_due: Option<Instant>,
}

impl Slot {
    fn new(config: ModuleConfig, module: Arc<dyn Module>) -> Self {
        Self {
            config,
            module,
            running: false,
            generation: 0,
            last_tile: None,
            consecutive_failures: 0,
            degraded: false,
            next_due: None,
        }
    }
}

/// Drives all module slots through their refresh cycles.
pub struct Orchestrator {
    slots: Vec<Slot>,
    policy: SchedulerConfig,
    outcome_tx: mpsc::UnboundedSender<RenderOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<RenderOutcome>,
}

impl Orchestrator {
    /// Build one slot per configured module via the registry.
    pub fn new(config: &DashboardConfig, registry: &ModuleRegistry) -> Result<Self, ModuleError> {
        let mut slots = Vec::with_capacity(config.modules.len());
        for module_config in &config.modules {
            let module = registry.build(module_config)?;
            slots.push(Slot::new(module_config.clone(), module));
        }
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Ok(Self {
            slots,
            policy: config.scheduler.clone(),
            outcome_tx,
            outcome_rx,
        })
    }

    /// Orchestrator tick granularity.
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.policy.tick_seconds)
    }

    /// Indices of idle slots whose refresh (or retry) time has arrived.
    pub fn due(&self, now: Instant) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                !slot.running && slot.next_due.map_or(true, |due| due <= now)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Mark a slot as running and return the generation of the new attempt.
    pub fn begin(&mut self, slot: usize) -> u64 {
        let slot = &mut self.slots[slot];
        slot.running = true;
        slot.generation += 1;
        slot.generation
    }

    /// Apply one render outcome to its slot.
    ///
    /// Outcomes from superseded generations are dropped: the timeout or
    /// failure was already charged when the attempt was abandoned.
    pub fn complete(&mut self, outcome: RenderOutcome, now: Instant) {
        // Copied out so the failure arm below can compute the retry delay
        // while `slot` mutably borrows `self.slots`
        let policy = self.policy.clone();
        let slot = &mut self.slots[outcome.slot];
        if outcome.generation != slot.generation {
            tracing::debug!(
                kind = %slot.config.kind,
                generation = outcome.generation,
                "discarding outcome from superseded render attempt"
            );
            return;
        }
        slot.running = false;
        match outcome.result {
            Ok(tile) => {
                if slot.degraded {
                    tracing::info!(kind = %slot.config.kind, "module recovered");
                }
                slot.last_tile = Some(tile);
                slot.consecutive_failures = 0;
                slot.degraded = false;
                slot.next_due = Some(now + slot.config.refresh_interval());
            }
            Err(err) => {
                slot.consecutive_failures += 1;
                if !slot.degraded && slot.consecutive_failures >= policy.max_consecutive_failures {
                    slot.degraded = true;
                    tracing::warn!(
                        kind = %slot.config.kind,
                        failures = slot.consecutive_failures,
                        "module degraded, region falls back to placeholder"
                    );
                } else {
                    tracing::warn!(kind = %slot.config.kind, %err, "module render failed");
                }
                slot.next_due = Some(now + retry_backoff(&policy, slot.consecutive_failures));
            }
        }
    }

    /// What each slot's region should show, in configuration order.
    pub fn contents(&self, now: DateTime<Utc>) -> Vec<(Region, RegionContent)> {
        self.slots
            .iter()
            .map(|slot| {
                let content = if slot.degraded {
                    RegionContent::Placeholder
                } else {
                    match &slot.last_tile {
                        None => RegionContent::Placeholder,
                        Some(tile) if slot.consecutive_failures > 0 => RegionContent::Stale {
                            tile: tile.clone(),
                            age: (now - tile.produced_at)
                                .to_std()
                                .unwrap_or(Duration::ZERO),
                        },
                        Some(tile) => RegionContent::Live(tile.clone()),
                    }
                };
                (slot.config.region, content)
            })
            .collect()
    }

    /// Materialize region contents as tiles for the compositor, rendering
    /// placeholders for slots with nothing usable.
    pub fn tiles(&self, now: DateTime<Utc>) -> Vec<(Region, Tile)> {
        self.contents(now)
            .into_iter()
            .enumerate()
            .map(|(i, (region, content))| {
                let tile = match content {
                    RegionContent::Live(tile) => tile,
                    RegionContent::Stale { tile, age } => {
                        tracing::debug!(
                            kind = %self.slots[i].config.kind,
                            age_secs = age.as_secs(),
                            "showing stale tile"
                        );
                        tile
                    }
                    RegionContent::Placeholder => {
                        let message = format!("{} unavailable", self.slots[i].config.kind);
                        placeholder_tile(region, &message, now)
                    }
                };
                (region, tile)
            })
            .collect()
    }

    /// Dispatch a render attempt for every due slot onto the blocking pool.
    /// Must run inside a tokio runtime.
    pub fn dispatch_due(&mut self, now: Instant, now_utc: DateTime<Utc>) {
        let timeout = Duration::from_secs(self.policy.render_timeout_seconds);
        for index in self.due(now) {
            let generation = self.begin(index);
            let slot = &self.slots[index];
            let module = Arc::clone(&slot.module);
            let config = slot.config.clone();
            let tx = self.outcome_tx.clone();
            tracing::debug!(kind = %config.kind, generation, "dispatching render");
            tokio::spawn(async move {
                let ctx = RenderContext {
                    region: config.region,
                    config,
                    now: now_utc,
                };
                let render = tokio::task::spawn_blocking(move || module.render(&ctx));
                let result = match tokio::time::timeout(timeout, render).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => {
                        Err(ModuleError::Render(format!("render task failed: {join_err}")))
                    }
                    Err(_) => Err(ModuleError::Timeout),
                };
                // The receiver outlives all attempts; a send failure only
                // means the engine is shutting down
                let _ = tx.send(RenderOutcome {
                    slot: index,
                    generation,
                    result,
                });
            });
        }
    }

    /// Apply every outcome that has arrived since the last tick.
    pub fn drain_outcomes(&mut self, now: Instant) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.complete(outcome, now);
        }
    }

    /// True when no render attempt is in flight.
    pub fn idle(&self) -> bool {
        self.slots.iter().all(|slot| !slot.running)
    }

    /// Mark every slot due immediately, forcing a refresh on the next tick.
    pub fn refresh_all(&mut self) {
        for slot in &mut self.slots {
            if !slot.running {
                slot.next_due = None;
            }
        }
    }
}

/// Capped exponential retry backoff: tick * 2^failures, at most the
/// configured maximum.
fn retry_backoff(policy: &SchedulerConfig, failures: u32) -> Duration {
    let factor = 1u64 << failures.min(16);
    let secs = policy
        .tick_seconds
        .saturating_mul(factor)
        .min(policy.max_backoff_seconds);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::config::DriverConfig;
    use crate::config::PanelProfile;
    use crate::canvas::ColorDepth;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Module whose failure behavior tests flip at will.
    struct FlakyModule {
        failing: Arc<AtomicBool>,
    }

    impl Module for FlakyModule {
        fn kind(&self) -> &'static str {
            "flaky"
        }

        fn render(&self, ctx: &RenderContext) -> Result<Tile, ModuleError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(ModuleError::Render("boom".to_string()))
            } else {
                Ok(Tile::new(
                    Canvas::new(ctx.region.width, ctx.region.height),
                    ctx.now,
                ))
            }
        }
    }

    fn test_dashboard(max_failures: u32) -> DashboardConfig {
        DashboardConfig {
            panel: PanelProfile {
                name: "test".to_string(),
                width: 200,
                height: 100,
                depth: ColorDepth::Mono,
                min_refresh_secs: 0,
                supports_partial: true,
            },
            scheduler: SchedulerConfig {
                max_consecutive_failures: max_failures,
                render_timeout_seconds: 5,
                max_backoff_seconds: 60,
                tick_seconds: 5,
            },
            driver: DriverConfig::default(),
            modules: vec![ModuleConfig {
                kind: "flaky".to_string(),
                region: Region::new(0, 0, 200, 100),
                refresh_seconds: 300,
                params: HashMap::new(),
                locale: "en".to_string(),
                timezone: chrono_tz::UTC,
            }],
        }
    }

    fn orchestrator(max_failures: u32, failing: Arc<AtomicBool>) -> Orchestrator {
        let mut registry = ModuleRegistry::new();
        registry.register("flaky", move |_| {
            Ok(Arc::new(FlakyModule {
                failing: Arc::clone(&failing),
            }))
        });
        Orchestrator::new(&test_dashboard(max_failures), &registry).unwrap()
    }

    /// Drive one full attempt synchronously against the slot's own module.
    fn attempt(orch: &mut Orchestrator, slot: usize, now: Instant) {
        let generation = orch.begin(slot);
        let ctx = RenderContext {
            config: orch.slots[slot].config.clone(),
            region: orch.slots[slot].config.region,
            now: Utc::now(),
        };
        let result = orch.slots[slot].module.render(&ctx);
        orch.complete(
            RenderOutcome {
                slot,
                generation,
                result,
            },
            now,
        );
    }

    #[test]
    fn test_fresh_slot_is_due_immediately() {
        let orch = orchestrator(3, Arc::new(AtomicBool::new(false)));
        assert_eq!(orch.due(Instant::now()), vec![0]);
    }

    #[test]
    fn test_success_schedules_next_refresh() {
        let mut orch = orchestrator(3, Arc::new(AtomicBool::new(false)));
        let t0 = Instant::now();
        attempt(&mut orch, 0, t0);
        // Not due again until the refresh interval elapses
        assert!(orch.due(t0 + Duration::from_secs(10)).is_empty());
        assert_eq!(orch.due(t0 + Duration::from_secs(301)), vec![0]);
    }

    #[test]
    fn test_running_slot_is_not_redispatched() {
        let mut orch = orchestrator(3, Arc::new(AtomicBool::new(false)));
        orch.begin(0);
        assert!(orch.due(Instant::now()).is_empty());
    }

    #[test]
    fn test_failure_keeps_last_good_tile_as_stale() {
        let failing = Arc::new(AtomicBool::new(false));
        let mut orch = orchestrator(3, Arc::clone(&failing));
        let t0 = Instant::now();
        attempt(&mut orch, 0, t0);

        failing.store(true, Ordering::SeqCst);
        attempt(&mut orch, 0, t0);

        let contents = orch.contents(Utc::now());
        assert!(matches!(contents[0].1, RegionContent::Stale { .. }));
    }

    #[test]
    fn test_degrades_after_max_failures_and_shows_placeholder() {
        let failing = Arc::new(AtomicBool::new(false));
        let mut orch = orchestrator(2, Arc::clone(&failing));
        let t0 = Instant::now();
        // One good render first, so stale data exists to withhold
        attempt(&mut orch, 0, t0);

        failing.store(true, Ordering::SeqCst);
        attempt(&mut orch, 0, t0);
        attempt(&mut orch, 0, t0);

        // Degraded: placeholder, never the stale tile
        let contents = orch.contents(Utc::now());
        assert!(matches!(contents[0].1, RegionContent::Placeholder));
        let tiles = orch.tiles(Utc::now());
        assert_eq!(tiles[0].0, Region::new(0, 0, 200, 100));
    }

    #[test]
    fn test_recovery_clears_degradation() {
        let failing = Arc::new(AtomicBool::new(true));
        let mut orch = orchestrator(1, Arc::clone(&failing));
        let t0 = Instant::now();
        attempt(&mut orch, 0, t0);
        assert!(matches!(
            orch.contents(Utc::now())[0].1,
            RegionContent::Placeholder
        ));

        failing.store(false, Ordering::SeqCst);
        attempt(&mut orch, 0, t0);
        assert!(matches!(
            orch.contents(Utc::now())[0].1,
            RegionContent::Live(_)
        ));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let failing = Arc::new(AtomicBool::new(true));
        let mut orch = orchestrator(100, Arc::clone(&failing));
        let t0 = Instant::now();

        // tick=5s: failures 1..=3 back off 10s, 20s, 40s
        attempt(&mut orch, 0, t0);
        assert!(orch.due(t0 + Duration::from_secs(9)).is_empty());
        assert_eq!(orch.due(t0 + Duration::from_secs(11)), vec![0]);

        attempt(&mut orch, 0, t0);
        assert!(orch.due(t0 + Duration::from_secs(19)).is_empty());
        assert_eq!(orch.due(t0 + Duration::from_secs(21)), vec![0]);

        // Many more failures: capped at max_backoff_seconds = 60
        for _ in 0..10 {
            attempt(&mut orch, 0, t0);
        }
        assert_eq!(orch.due(t0 + Duration::from_secs(61)), vec![0]);
    }

    #[test]
    fn test_superseded_outcome_is_discarded() {
        let failing = Arc::new(AtomicBool::new(false));
        let mut orch = orchestrator(3, failing);
        let t0 = Instant::now();

        let old_generation = orch.begin(0);
        // The attempt is abandoned and a new one dispatched
        let new_generation = orch.begin(0);
        assert!(new_generation > old_generation);

        // The late result from the old attempt must not apply
        orch.complete(
            RenderOutcome {
                slot: 0,
                generation: old_generation,
                result: Ok(Tile::new(Canvas::new(200, 100), Utc::now())),
            },
            t0,
        );
        assert!(matches!(
            orch.contents(Utc::now())[0].1,
            RegionContent::Placeholder
        ));

        // The current generation's result does apply
        orch.complete(
            RenderOutcome {
                slot: 0,
                generation: new_generation,
                result: Ok(Tile::new(Canvas::new(200, 100), Utc::now())),
            },
            t0,
        );
        assert!(matches!(
            orch.contents(Utc::now())[0].1,
            RegionContent::Live(_)
        ));
    }

    #[test]
    fn test_refresh_all_marks_slots_due() {
        let mut orch = orchestrator(3, Arc::new(AtomicBool::new(false)));
        let t0 = Instant::now();
        attempt(&mut orch, 0, t0);
        assert!(orch.due(t0 + Duration::from_secs(1)).is_empty());

        orch.refresh_all();
        assert_eq!(orch.due(t0 + Duration::from_secs(1)), vec![0]);
    }

    /// Module that sleeps well past the configured render timeout.
    struct SlowModule;

    impl Module for SlowModule {
        fn kind(&self) -> &'static str {
            "slow"
        }

        fn render(&self, ctx: &RenderContext) -> Result<Tile, ModuleError> {
            std::thread::sleep(Duration::from_secs(2));
            Ok(Tile::new(
                Canvas::new(ctx.region.width, ctx.region.height),
                ctx.now,
            ))
        }
    }

    #[tokio::test]
    async fn test_render_timeout_fails_slot_and_late_result_is_discarded() {
        let mut config = test_dashboard(3);
        config.scheduler.render_timeout_seconds = 1;
        config.modules[0].kind = "slow".to_string();
        let mut registry = ModuleRegistry::new();
        registry.register("slow", |_| Ok(Arc::new(SlowModule)));
        let mut orch = Orchestrator::new(&config, &registry).unwrap();

        let t0 = Instant::now();
        orch.dispatch_due(t0, Utc::now());
        let outcome = tokio::time::timeout(Duration::from_secs(5), orch.outcome_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome.result, Err(ModuleError::Timeout)));

        let timed_out_generation = outcome.generation;
        orch.complete(outcome, t0);
        assert!(matches!(
            orch.contents(Utc::now())[0].1,
            RegionContent::Placeholder
        ));

        // A fresh attempt supersedes the abandoned one; the abandoned
        // generation's eventual success must not apply
        let current = orch.begin(0);
        assert!(current > timed_out_generation);
        orch.complete(
            RenderOutcome {
                slot: 0,
                generation: timed_out_generation,
                result: Ok(Tile::new(Canvas::new(200, 100), Utc::now())),
            },
            t0,
        );
        assert!(matches!(
            orch.contents(Utc::now())[0].1,
            RegionContent::Placeholder
        ));
    }

    #[tokio::test]
    async fn test_dispatch_and_drain_round_trip() {
        let mut orch = orchestrator(3, Arc::new(AtomicBool::new(false)));
        let t0 = Instant::now();
        orch.dispatch_due(t0, Utc::now());

        // Wait for the spawned attempt to report back
        let outcome = tokio::time::timeout(Duration::from_secs(5), orch.outcome_rx.recv())
            .await
            .unwrap()
            .unwrap();
        orch.complete(outcome, t0);
        assert!(matches!(
            orch.contents(Utc::now())[0].1,
            RegionContent::Live(_)
        ));
    }
}
