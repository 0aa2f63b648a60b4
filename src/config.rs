//! Simulation tuning loaded once per level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tile::TileState;

fn default_tick_seconds() -> f32 {
    0.1
}

fn default_max_health() -> BTreeMap<TileState, i32> {
    BTreeMap::from([
        (TileState::Corruption, 10),
        (TileState::Neutral, 1),
        (TileState::Grass, 5),
        (TileState::Forest, 10),
        (TileState::Water, 1),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: f32,
    #[serde(default = "default_max_health")]
    pub max_health: BTreeMap<TileState, i32>,
    #[serde(default)]
    pub forest: ForestConfig,
    #[serde(default)]
    pub grass: GrassConfig,
    #[serde(default)]
    pub corruption: CorruptionConfig,
    #[serde(default)]
    pub fire: FireConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub neighbors: NeighborConfig,
    #[serde(default)]
    pub rules: OutcomeRules,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            max_health: default_max_health(),
            forest: ForestConfig::default(),
            grass: GrassConfig::default(),
            corruption: CorruptionConfig::default(),
            fire: FireConfig::default(),
            weather: WeatherConfig::default(),
            neighbors: NeighborConfig::default(),
            rules: OutcomeRules::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub spread_chance: f32,
    pub spread_cooldown: f32,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            spread_chance: 0.25,
            spread_cooldown: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassConfig {
    pub max_water_saturation: f32,
    pub desaturation_rate: f32,
    pub spread_saturation_threshold: f32,
    pub spread_chance: f32,
    pub spread_cooldown: f32,
    pub forest_saturation_threshold: f32,
    pub forest_chance: f32,
    pub forest_cooldown: f32,
}

impl Default for GrassConfig {
    fn default() -> Self {
        Self {
            max_water_saturation: 10.0,
            desaturation_rate: 0.5,
            spread_saturation_threshold: 3.0,
            spread_chance: 0.5,
            spread_cooldown: 3.0,
            forest_saturation_threshold: 8.0,
            forest_chance: 0.3,
            forest_cooldown: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorruptionConfig {
    /// Added to a corrupted tile's spread chance after every failed roll.
    pub chance_rate: f32,
    pub spread_cooldown: f32,
    pub damage: i32,
}

impl Default for CorruptionConfig {
    fn default() -> Self {
        Self {
            chance_rate: 0.05,
            spread_cooldown: 2.0,
            damage: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FireConfig {
    pub spread_cooldown: f32,
    /// Per-second decay of a burning tile's spread chance.
    pub chance_reduction_rate: f32,
    pub chance_addition: f32,
    pub chance_start: f32,
    pub tick_cooldown: f32,
    pub tick_damage: i32,
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            spread_cooldown: 1.5,
            chance_reduction_rate: 0.05,
            chance_addition: 0.1,
            chance_start: 0.3,
            tick_cooldown: 1.0,
            tick_damage: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Saturation gained per second by a selected grass tile under rain.
    pub saturation_rate: f32,
    pub heal_amount: i32,
    pub healing_cooldown: f32,
    /// Extra per-second fire decay on a selected tile under rain.
    pub fire_suppress_rate: f32,
    pub lightning_damage: i32,
    pub lightning_fire_chance: f32,
    pub water_capacity: f32,
    pub water_use_rate: f32,
    pub water_refill_rate: f32,
    pub lightning_capacity: f32,
    /// Lightning charges available when a level starts.
    pub lightning_charges: f32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            saturation_rate: 2.0,
            heal_amount: 1,
            healing_cooldown: 1.0,
            fire_suppress_rate: 0.2,
            lightning_damage: 3,
            lightning_fire_chance: 0.5,
            water_capacity: 50.0,
            water_use_rate: 1.0,
            water_refill_rate: 5.0,
            lightning_capacity: 5.0,
            lightning_charges: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborConfig {
    /// Maximum ray length when searching for a neighbor.
    pub radius: f32,
    /// Radius of each cell's circular hit area.
    pub collider_radius: f32,
    pub directions_deg: Vec<f32>,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            collider_radius: 4.0,
            directions_deg: vec![0.0, 60.0, 120.0, 180.0, 240.0, 300.0],
        }
    }
}

/// Thresholds the game-state side compares coverage against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeRules {
    pub player_threshold: f32,
    pub enemy_threshold: f32,
}

impl Default for OutcomeRules {
    fn default() -> Self {
        Self {
            player_threshold: 0.5,
            enemy_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no max health configured for reachable state '{0}'")]
    MissingMaxHealth(TileState),
    #[error("max health for '{state}' must be positive, got {value}")]
    NonPositiveMaxHealth { state: TileState, value: i32 },
    #[error("{field} must be a probability in [0, 1], got {value}")]
    Probability { field: &'static str, value: f32 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{field} ({value}) exceeds max water saturation ({max})")]
    AboveSaturation {
        field: &'static str,
        value: f32,
        max: f32,
    },
    #[error("neighbor search needs at least one direction")]
    NoDirections,
    #[error("layout glyph '{0}' is not defined in the legend")]
    UnknownGlyph(String),
    #[error("legend key '{0}' must be exactly one character")]
    BadGlyph(String),
}

impl SimConfig {
    pub fn max_health(&self, state: TileState) -> Option<i32> {
        self.max_health.get(&state).copied()
    }

    /// States a level can reach regardless of its layout.
    pub fn reachable_states() -> [TileState; 4] {
        [
            TileState::Corruption,
            TileState::Neutral,
            TileState::Grass,
            TileState::Forest,
        ]
    }

    /// Rejects a configuration the engine must not start with. `in_play`
    /// lists the states the level layout places on the map.
    pub fn validate(&self, in_play: &[TileState]) -> Result<(), ConfigError> {
        for state in Self::reachable_states().iter().chain(in_play) {
            match self.max_health(*state) {
                None => return Err(ConfigError::MissingMaxHealth(*state)),
                Some(value) if value <= 0 => {
                    return Err(ConfigError::NonPositiveMaxHealth {
                        state: *state,
                        value,
                    })
                }
                Some(_) => {}
            }
        }

        positive("tick_seconds", self.tick_seconds)?;
        positive("grass.max_water_saturation", self.grass.max_water_saturation)?;
        positive("neighbors.radius", self.neighbors.radius)?;
        positive("neighbors.collider_radius", self.neighbors.collider_radius)?;

        for (field, value) in [
            ("forest.spread_chance", self.forest.spread_chance),
            ("grass.spread_chance", self.grass.spread_chance),
            ("grass.forest_chance", self.grass.forest_chance),
            ("corruption.chance_rate", self.corruption.chance_rate),
            ("fire.chance_start", self.fire.chance_start),
            ("fire.chance_addition", self.fire.chance_addition),
            ("weather.lightning_fire_chance", self.weather.lightning_fire_chance),
        ] {
            probability(field, value)?;
        }

        for (field, value) in [
            ("forest.spread_cooldown", self.forest.spread_cooldown),
            ("grass.spread_cooldown", self.grass.spread_cooldown),
            ("grass.forest_cooldown", self.grass.forest_cooldown),
            ("grass.desaturation_rate", self.grass.desaturation_rate),
            ("corruption.spread_cooldown", self.corruption.spread_cooldown),
            ("corruption.damage", self.corruption.damage as f32),
            ("fire.spread_cooldown", self.fire.spread_cooldown),
            ("fire.chance_reduction_rate", self.fire.chance_reduction_rate),
            ("fire.tick_cooldown", self.fire.tick_cooldown),
            ("fire.tick_damage", self.fire.tick_damage as f32),
            ("weather.saturation_rate", self.weather.saturation_rate),
            ("weather.heal_amount", self.weather.heal_amount as f32),
            ("weather.healing_cooldown", self.weather.healing_cooldown),
            ("weather.fire_suppress_rate", self.weather.fire_suppress_rate),
            ("weather.lightning_damage", self.weather.lightning_damage as f32),
            ("weather.water_capacity", self.weather.water_capacity),
            ("weather.water_use_rate", self.weather.water_use_rate),
            ("weather.water_refill_rate", self.weather.water_refill_rate),
            ("weather.lightning_capacity", self.weather.lightning_capacity),
            ("weather.lightning_charges", self.weather.lightning_charges),
        ] {
            non_negative(field, value)?;
        }

        let max = self.grass.max_water_saturation;
        for (field, value) in [
            (
                "grass.spread_saturation_threshold",
                self.grass.spread_saturation_threshold,
            ),
            (
                "grass.forest_saturation_threshold",
                self.grass.forest_saturation_threshold,
            ),
        ] {
            non_negative(field, value)?;
            if value > max {
                return Err(ConfigError::AboveSaturation { field, value, max });
            }
        }

        if self.neighbors.directions_deg.is_empty() {
            return Err(ConfigError::NoDirections);
        }

        for (field, value) in [
            ("rules.player_threshold", self.rules.player_threshold),
            ("rules.enemy_threshold", self.rules.enemy_threshold),
        ] {
            probability(field, value)?;
            positive(field, value)?;
        }

        Ok(())
    }
}

fn probability(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}
