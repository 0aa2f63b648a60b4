use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::{
    coverage::{Coverage, CoverageAggregator},
    effects::EffectQueue,
    rng::{RngManager, SystemRng},
    snapshot::SnapshotWriter,
    systems::{FireSystem, HealingSystem, SpreadSystem},
    weather::WeatherSignals,
    world::{StateChange, World, WorldSnapshot},
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Spread, then fire, then healing.
    pub fn with_default_systems(self) -> Self {
        self.with_system(SpreadSystem::new())
            .with_system(FireSystem::new())
            .with_system(HealingSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            aggregator: CoverageAggregator::new(),
            settings: self.settings,
        }
    }
}

/// What one tick did to the world.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    /// Tick number after the tick completed.
    pub tick: u64,
    pub intents: usize,
    pub changes: Vec<StateChange>,
    /// Fresh coverage, present only when it was recomputed this tick.
    pub coverage: Option<Coverage>,
    pub snapshot: Option<PathBuf>,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    aggregator: CoverageAggregator,
    settings: EngineSettings,
}

impl Engine {
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|system| system.name()).collect()
    }

    /// Most recent coverage measured by this engine.
    pub fn coverage(&self) -> Option<Coverage> {
        self.aggregator.latest()
    }

    /// Runs one tick: couple the signals, let every system queue its
    /// intents, apply them in source order, settle depleted tiles, then
    /// measure coverage and advance the clock.
    pub fn tick(&mut self, world: &mut World, signals: &WeatherSignals) -> Result<TickReport> {
        world.couple(signals);

        let mut effects = EffectQueue::new();
        let ctx = SystemContext {
            tick: world.tick(),
            dt_seconds: world.dt_seconds(),
            signals,
            scenario_name: &self.settings.scenario_name,
        };
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            system
                .run(&ctx, world, &mut rng_stream, &mut effects)
                .with_context(|| format!("system '{}' failed at tick {}", system.name(), ctx.tick))?;
        }

        let intents = effects.len();
        let mut changes = world.apply_effects(effects.drain_ordered());
        changes.extend(world.settle_vitals());
        let coverage = self.aggregator.observe(world, !changes.is_empty());

        world.advance_time();
        let snapshot = self
            .snapshot_writer
            .maybe_write(world, &self.settings.scenario_name)?;

        debug!(
            tick = world.tick(),
            intents,
            changes = changes.len(),
            "tick complete"
        );

        Ok(TickReport {
            tick: world.tick(),
            intents,
            changes,
            coverage,
            snapshot,
        })
    }

    /// Runs `ticks` ticks under constant signals and returns the latest
    /// coverage, or `None` when no tick ran.
    pub fn run(
        &mut self,
        world: &mut World,
        ticks: u64,
        signals: &WeatherSignals,
    ) -> Result<Option<Coverage>> {
        self.run_with_hook(world, ticks, signals, |_| {})
    }

    pub fn run_with_hook<F>(
        &mut self,
        world: &mut World,
        ticks: u64,
        signals: &WeatherSignals,
        mut hook: F,
    ) -> Result<Option<Coverage>>
    where
        F: FnMut(WorldSnapshot),
    {
        for _ in 0..ticks {
            self.tick(world, signals)?;
            hook(world.snapshot(&self.settings.scenario_name));
        }
        Ok(self.aggregator.latest())
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub dt_seconds: f32,
    pub signals: &'a WeatherSignals,
    pub scenario_name: &'a str,
}

/// A per-tick pass over the world. Systems mutate the tiles they own and
/// queue cross-tile writes as effects.
pub trait System: Send {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
        effects: &mut EffectQueue,
    ) -> Result<()>;
}
