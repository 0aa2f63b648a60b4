use std::path::PathBuf;

use tempfile::tempdir;
use verdant::{
    config::SimConfig,
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
    session::{Session, SessionOptions},
    tile::{TileId, TileState},
    weather::WeatherSignals,
    world::{ChangeCause, StateChange, World},
};

fn scenario_loader() -> ScenarioLoader {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
}

fn build_engine(seed: u64) -> EngineBuilder {
    let settings = EngineSettings {
        scenario_name: "engine_tests".into(),
        seed,
        snapshot_interval_ticks: 0,
        snapshot_dir: PathBuf::from("snapshots_engine_tests"),
    };
    EngineBuilder::new(settings).with_default_systems()
}

fn pair(config: SimConfig, a: TileState, b: TileState) -> World {
    World::builder(config)
        .tile(a)
        .tile(b)
        .with_adjacency(vec![vec![TileId::from_index(1)], vec![TileId::from_index(0)]])
        .build()
        .expect("world builds")
}

#[test]
fn scenario_files_load() {
    let loader = scenario_loader();
    for file in ["scenarios/meadow.yaml", "scenarios/standoff.yaml"] {
        let scenario = loader.load(file).expect("scenario should load");
        let world = scenario.build_world().expect("world builds");
        assert!(!world.is_empty(), "{file} has tiles");
    }
}

#[test]
fn missing_scenario_reports_the_path() {
    let err = scenario_loader()
        .load("scenarios/does_not_exist.yaml")
        .expect_err("missing file fails");
    assert!(format!("{err:#}").contains("does_not_exist.yaml"));
}

#[test]
fn engine_runs_hook_each_tick() {
    let scenario = scenario_loader()
        .load("scenarios/standoff.yaml")
        .expect("scenario should load");
    let mut world = scenario.build_world().expect("world builds");
    let mut engine = build_engine(scenario.seed).build();

    let mut ticks = Vec::new();
    engine
        .run_with_hook(&mut world, 6, &WeatherSignals::calm(), |snapshot| {
            ticks.push(snapshot.tick)
        })
        .expect("run succeeds");

    assert_eq!(ticks.len(), 6);
    assert_eq!(ticks.first().copied(), Some(1));
    assert_eq!(ticks.last().copied(), Some(6));
    assert_eq!(engine.system_names(), vec!["spread", "fire", "healing"]);
}

#[test]
fn zero_ticks_change_nothing() {
    let scenario = scenario_loader()
        .load("scenarios/meadow.yaml")
        .expect("scenario should load");
    let mut world = scenario.build_world().expect("world builds");
    let before = serde_json::to_string(&world.snapshot("meadow")).expect("json");

    let mut engine = build_engine(scenario.seed).build();
    let coverage = engine
        .run(&mut world, 0, &WeatherSignals::calm())
        .expect("run succeeds");

    assert_eq!(coverage, None);
    assert_eq!(world.tick(), 0);
    let after = serde_json::to_string(&world.snapshot("meadow")).expect("json");
    assert_eq!(before, after);
}

#[test]
fn same_seed_same_run() {
    let scenario = scenario_loader()
        .load("scenarios/meadow.yaml")
        .expect("scenario should load");

    let play = |seed: u64| {
        let mut scenario = scenario.clone();
        scenario.seed = seed;
        let mut session =
            Session::new(scenario, SessionOptions::without_snapshots()).expect("session");
        session.run(400).expect("runs");
        serde_json::to_string(&session.world().snapshot("meadow")).expect("json")
    };

    assert_eq!(play(11), play(11));
    assert_eq!(play(12), play(12));
}

#[test]
fn snapshots_land_on_the_interval() {
    let scenario = scenario_loader()
        .load("scenarios/meadow.yaml")
        .expect("scenario should load");
    let temp = tempdir().expect("tempdir");
    let options = SessionOptions {
        snapshot_interval_ticks: 10,
        snapshot_dir: temp.path().to_path_buf(),
    };
    let mut session = Session::new(scenario, options).expect("session");

    let mut written = Vec::new();
    session
        .run_with_hook(30, |report, _| {
            if let Some(path) = &report.snapshot {
                written.push(path.clone());
            }
        })
        .expect("runs");

    let dir = temp.path().join("meadow");
    assert_eq!(
        written,
        vec![
            dir.join("tick_000010.json"),
            dir.join("tick_000020.json"),
            dir.join("tick_000030.json"),
        ]
    );
    assert!(written.iter().all(|path| path.exists()));
}

#[test]
fn grass_at_threshold_claims_its_neutral_neighbor_in_one_tick() {
    let mut config = SimConfig::default();
    config.grass.spread_chance = 1.0;
    config.grass.spread_cooldown = 0.0;
    let threshold = config.grass.spread_saturation_threshold;
    let mut world = pair(config, TileState::Grass, TileState::Neutral);
    let grass = TileId::from_index(0);
    let neutral = TileId::from_index(1);
    world.set_water_saturation(grass, threshold);

    let signals = WeatherSignals::calm().select(grass).with_rain();
    let report = build_engine(3)
        .build()
        .tick(&mut world, &signals)
        .expect("tick");

    assert_eq!(world.tile(neutral).expect("tile").state(), TileState::Grass);
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].tile, neutral);
}

#[test]
fn lightning_kills_a_weak_forest_in_the_same_tick() {
    let mut config = SimConfig::default();
    config.weather.lightning_damage = 5;
    config.weather.lightning_fire_chance = 1.0;
    config.forest.spread_chance = 0.0;
    let mut world = pair(config, TileState::Forest, TileState::Forest);
    let forest = TileId::from_index(0);
    world.set_health(forest, 1);
    world.set_corruption_spread_chance(forest, 0.4);

    let signals = WeatherSignals::calm().select(forest).with_lightning();
    let report = build_engine(4)
        .build()
        .tick(&mut world, &signals)
        .expect("tick");

    let tile = world.tile(forest).expect("tile");
    assert_eq!(tile.state(), TileState::Neutral);
    assert_eq!(tile.fire_spread_chance(), 0.0);
    assert_eq!(tile.corruption_spread_chance(), 0.0);
    assert_eq!(tile.water_saturation(), 0.0);
    assert_eq!(tile.health(), tile.max_health());
    assert!(report
        .changes
        .iter()
        .any(|change| change.tile == forest && change.to == TileState::Neutral));
}

/// Grass wet enough to mature this tick, next to a tile of `other`.
fn ripe_grass(mut config: SimConfig, other: TileState, grass_first: bool) -> (World, TileId) {
    config.grass.forest_chance = 1.0;
    config.grass.spread_chance = 0.0;
    let (mut world, grass) = if grass_first {
        (pair(config, TileState::Grass, other), TileId::from_index(0))
    } else {
        (pair(config, other, TileState::Grass), TileId::from_index(1))
    };
    world.set_water_saturation(grass, 9.0);
    (world, grass)
}

fn depleted(world: &World, grass: TileId, changes: &[StateChange]) -> bool {
    world.tile(grass).map(|tile| tile.state()) == Some(TileState::Neutral)
        && changes
            .iter()
            .any(|change| change.tile == grass && change.cause == ChangeCause::Depleted)
}

#[test]
fn lightning_stops_grass_from_maturing() {
    let mut config = SimConfig::default();
    config.weather.lightning_fire_chance = 0.0;

    config.weather.lightning_damage = 5;
    let (mut world, grass) = ripe_grass(config.clone(), TileState::Neutral, true);
    let signals = WeatherSignals::calm().select(grass).with_lightning();
    let report = build_engine(21).build().tick(&mut world, &signals).expect("tick");
    assert!(depleted(&world, grass, &report.changes));

    config.weather.lightning_damage = 1;
    let (mut world, grass) = ripe_grass(config, TileState::Neutral, true);
    let signals = WeatherSignals::calm().select(grass).with_lightning();
    let report = build_engine(21).build().tick(&mut world, &signals).expect("tick");
    let tile = world.tile(grass).expect("tile");
    assert_eq!(tile.state(), TileState::Grass);
    assert_eq!(tile.health(), tile.max_health() - 1);
    assert_eq!(tile.water_saturation(), 0.0);
    assert!(report.changes.is_empty());
}

#[test]
fn burning_grass_does_not_mature() {
    let mut config = SimConfig::default();

    config.fire.tick_damage = 10;
    let (mut world, grass) = ripe_grass(config.clone(), TileState::Neutral, true);
    world.set_fire_spread_chance(grass, 0.5);
    let report = build_engine(22)
        .build()
        .tick(&mut world, &WeatherSignals::calm())
        .expect("tick");
    assert!(depleted(&world, grass, &report.changes));

    config.fire.tick_damage = 1;
    let (mut world, grass) = ripe_grass(config, TileState::Neutral, true);
    world.set_fire_spread_chance(grass, 0.5);
    let report = build_engine(22)
        .build()
        .tick(&mut world, &WeatherSignals::calm())
        .expect("tick");
    assert_eq!(world.tile(grass).expect("tile").state(), TileState::Grass);
    assert!(report.changes.iter().all(|change| change.tile != grass));
}

#[test]
fn corruption_damage_stops_grass_from_maturing() {
    let mut config = SimConfig::default();

    config.corruption.damage = 50;
    let (mut world, grass) = ripe_grass(config.clone(), TileState::Corruption, false);
    world.set_corruption_spread_chance(TileId::from_index(0), 1.0);
    let report = build_engine(23)
        .build()
        .tick(&mut world, &WeatherSignals::calm())
        .expect("tick");
    assert!(depleted(&world, grass, &report.changes));

    // Same attack with the grass holding the lower id.
    config.corruption.damage = 1;
    let (mut world, grass) = ripe_grass(config, TileState::Corruption, true);
    world.set_corruption_spread_chance(TileId::from_index(1), 1.0);
    let report = build_engine(23)
        .build()
        .tick(&mut world, &WeatherSignals::calm())
        .expect("tick");
    let tile = world.tile(grass).expect("tile");
    assert_eq!(tile.state(), TileState::Grass);
    assert_eq!(tile.health(), tile.max_health() - 1);
    assert!(report.changes.is_empty());
}

#[test]
fn an_extinguished_fire_never_ignites_anything() {
    let mut config = SimConfig::default();
    config.forest.spread_chance = 0.0;
    config.fire.chance_reduction_rate = 0.0;
    config.fire.spread_cooldown = 0.0;
    config.fire.tick_damage = 0;
    config.weather.fire_suppress_rate = 1.0;
    let mut world = pair(config, TileState::Forest, TileState::Forest);
    let burning = TileId::from_index(0);
    let other = TileId::from_index(1);
    world.set_fire_spread_chance(burning, 0.05);

    let mut engine = build_engine(5).build();
    let wet = WeatherSignals::calm().select(burning).with_rain();
    engine.tick(&mut world, &wet).expect("tick");
    assert_eq!(world.tile(burning).expect("tile").fire_spread_chance(), 0.0);
    world.set_fire_spread_chance(other, 0.0);

    for _ in 0..200 {
        let report = engine.tick(&mut world, &WeatherSignals::calm()).expect("tick");
        assert_eq!(report.intents, 0);
    }
    assert!(world.tiles().iter().all(|tile| !tile.is_burning()));
}
