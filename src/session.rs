//! Drives one level: scripted weather in, engine ticks, outcome out.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    coverage::Outcome,
    engine::{Engine, EngineBuilder, EngineSettings, TickReport},
    scenario::{Scenario, WeatherCue},
    tile::TileId,
    weather::WeatherController,
    world::World,
};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
}

impl SessionOptions {
    pub fn for_scenario(scenario: &Scenario) -> Self {
        Self {
            snapshot_interval_ticks: scenario.snapshot_interval_ticks,
            snapshot_dir: PathBuf::from("snapshots"),
        }
    }

    pub fn without_snapshots() -> Self {
        Self {
            snapshot_interval_ticks: 0,
            snapshot_dir: PathBuf::from("snapshots"),
        }
    }
}

pub struct Session {
    scenario: Scenario,
    options: SessionOptions,
    world: World,
    engine: Engine,
    weather: WeatherController,
    cursor: Option<TileId>,
    next_cue: usize,
    outcome: Option<Outcome>,
}

impl Session {
    pub fn new(scenario: Scenario, options: SessionOptions) -> Result<Self> {
        let world = build_world(&scenario)?;
        let engine = build_engine(&scenario, &options);
        let weather = WeatherController::new(&scenario.config.weather);
        Ok(Self {
            scenario,
            options,
            world,
            engine,
            weather,
            cursor: None,
            next_cue: 0,
            outcome: None,
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn weather(&self) -> &WeatherController {
        &self.weather
    }

    pub fn cursor(&self) -> Option<TileId> {
        self.cursor
    }

    /// Points the cursor at a cell. Cells without a tile clear it.
    pub fn set_cursor(&mut self, cell: Option<(i32, i32)>) {
        self.cursor = cell.and_then(|cell| self.world.tile_at_cell(cell));
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Applies due weather cues and runs a single tick. The first decided
    /// outcome is kept; later ticks never overturn it.
    pub fn step(&mut self) -> Result<TickReport> {
        self.apply_due_cues();
        let signals = self
            .weather
            .advance(&self.world, self.cursor, self.world.dt_seconds());
        let report = self.engine.tick(&mut self.world, &signals)?;

        if self.outcome.is_none() {
            if let Some(coverage) = report.coverage {
                self.outcome = self.scenario.config.rules.judge(&coverage);
                if let Some(outcome) = self.outcome {
                    info!(
                        scenario = %self.scenario.name,
                        tick = report.tick,
                        ?outcome,
                        grass = coverage.grass_fraction,
                        corruption = coverage.corruption_fraction,
                        "level decided"
                    );
                }
            }
        }
        Ok(report)
    }

    /// Runs up to `ticks` ticks, stopping early once the level is decided.
    pub fn run(&mut self, ticks: u64) -> Result<Option<Outcome>> {
        self.run_with_hook(ticks, |_, _| {})
    }

    pub fn run_with_hook<F>(&mut self, ticks: u64, mut hook: F) -> Result<Option<Outcome>>
    where
        F: FnMut(&TickReport, &Session),
    {
        for _ in 0..ticks {
            if self.outcome.is_some() {
                break;
            }
            let report = self.step()?;
            hook(&report, self);
        }
        Ok(self.outcome)
    }

    /// Rebuilds the level from its scenario, including weather and script.
    pub fn restart(&mut self) -> Result<()> {
        self.world = build_world(&self.scenario)?;
        self.engine = build_engine(&self.scenario, &self.options);
        self.weather = WeatherController::new(&self.scenario.config.weather);
        self.cursor = None;
        self.next_cue = 0;
        self.outcome = None;
        info!(scenario = %self.scenario.name, "level restarted");
        Ok(())
    }

    fn apply_due_cues(&mut self) {
        let tick = self.world.tick();
        while let Some(cue) = self.scenario.weather.get(self.next_cue) {
            if cue.at_tick > tick {
                break;
            }
            let cue = cue.clone();
            self.apply_cue(&cue);
            self.next_cue += 1;
        }
    }

    fn apply_cue(&mut self, cue: &WeatherCue) {
        if cue.clear_cursor {
            self.cursor = None;
        }
        if let Some(cell) = cue.cursor {
            self.set_cursor(Some(cell));
            if self.cursor.is_none() {
                warn!(tick = cue.at_tick, ?cell, "cursor cue points at an empty cell");
            }
        }
        if let Some(rain) = cue.rain {
            self.weather.enable_rain(rain);
        }
        if cue.add_lightning > 0.0 {
            self.weather.add_lightning(cue.add_lightning);
        }
        if cue.lightning && !self.weather.strike() {
            warn!(tick = cue.at_tick, "lightning cue without a full charge");
        }
    }
}

fn build_world(scenario: &Scenario) -> Result<World> {
    scenario
        .build_world()
        .with_context(|| format!("Failed to build world for scenario '{}'", scenario.name))
}

fn build_engine(scenario: &Scenario, options: &SessionOptions) -> Engine {
    EngineBuilder::new(EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_ticks: options.snapshot_interval_ticks,
        snapshot_dir: options.snapshot_dir.clone(),
    })
    .with_default_systems()
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scenario::Layout, tile::TileState};

    fn scenario(rows: &[&str], weather: Vec<WeatherCue>) -> Scenario {
        Scenario {
            name: "session-test".to_string(),
            description: None,
            seed: 5,
            ticks: None,
            snapshot_interval_ticks: 0,
            layout: Layout::from_rows(rows),
            config: Default::default(),
            weather,
        }
    }

    #[test]
    fn cues_steer_cursor_and_lightning() {
        let cues = vec![
            WeatherCue {
                at_tick: 0,
                cursor: Some((1, 0)),
                ..WeatherCue::default()
            },
            WeatherCue {
                at_tick: 2,
                lightning: true,
                ..WeatherCue::default()
            },
        ];
        let mut session =
            Session::new(scenario(&["gFC"], cues), SessionOptions::without_snapshots())
                .expect("session");
        let charges = session.weather().lightning_charges();
        session.step().expect("tick 0");
        assert_eq!(session.cursor(), Some(TileId::from_index(1)));
        session.step().expect("tick 1");
        session.step().expect("tick 2");
        assert_eq!(session.weather().lightning_charges(), charges - 1.0);
        let forest = session.world().tile(TileId::from_index(1)).expect("tile");
        assert!(forest.health() < forest.max_health() || forest.state() == TileState::Neutral);
    }

    #[test]
    fn level_without_corruption_is_won_on_the_first_tick() {
        let mut session = Session::new(
            scenario(&["g.."], Vec::new()),
            SessionOptions::without_snapshots(),
        )
        .expect("session");
        let outcome = session.run(100).expect("runs");
        assert_eq!(outcome, Some(Outcome::Victory));
        assert_eq!(session.world().tick(), 1);
    }

    #[test]
    fn level_without_green_is_lost() {
        let mut session = Session::new(
            scenario(&["C.."], Vec::new()),
            SessionOptions::without_snapshots(),
        )
        .expect("session");
        assert_eq!(session.run(10).expect("runs"), Some(Outcome::Defeat));
    }

    #[test]
    fn restart_rebuilds_the_level() {
        let cues = vec![WeatherCue {
            at_tick: 0,
            cursor: Some((0, 0)),
            rain: Some(true),
            ..WeatherCue::default()
        }];
        let mut session = Session::new(
            scenario(&["C..g"], cues),
            SessionOptions::without_snapshots(),
        )
        .expect("session");
        session.run(5).expect("runs");
        session.restart().expect("restarts");
        assert_eq!(session.world().tick(), 0);
        assert_eq!(session.cursor(), None);
        assert_eq!(session.outcome(), None);
        assert!(!session.weather().is_raining());
        assert_eq!(session.world().count(TileState::Corruption), 1);
        session.step().expect("tick after restart");
        assert_eq!(session.cursor(), Some(TileId::from_index(0)));
    }
}
