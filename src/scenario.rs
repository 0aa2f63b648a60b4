use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::{ConfigError, SimConfig},
    tile::{Position, TileState},
    world::{World, WorldBuilder, WorldError},
};

fn default_snapshot_interval_ticks() -> u64 {
    50
}

fn default_cell_spacing() -> f32 {
    8.0
}

fn default_legend() -> BTreeMap<String, LegendEntry> {
    BTreeMap::from([
        ("C".to_string(), LegendEntry::new(TileState::Corruption)),
        (".".to_string(), LegendEntry::new(TileState::Neutral)),
        ("g".to_string(), LegendEntry::new(TileState::Grass)),
        ("F".to_string(), LegendEntry::new(TileState::Forest)),
        (
            "~".to_string(),
            LegendEntry {
                state: TileState::Water,
                water_source: true,
            },
        ),
    ])
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    pub layout: Layout,
    #[serde(default)]
    pub config: SimConfig,
    #[serde(default)]
    pub weather: Vec<WeatherCue>,
}

impl Scenario {
    pub fn build_world(&self) -> Result<World, WorldError> {
        self.layout.build_world(self.config.clone())
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegendEntry {
    pub state: TileState,
    #[serde(default)]
    pub water_source: bool,
}

impl LegendEntry {
    pub fn new(state: TileState) -> Self {
        Self {
            state,
            water_source: false,
        }
    }
}

/// A level map drawn as rows of glyphs on an odd-row-offset hex grid.
/// Spaces leave a cell empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default = "default_cell_spacing")]
    pub cell_spacing: f32,
    #[serde(default = "default_legend")]
    pub legend: BTreeMap<String, LegendEntry>,
    pub rows: Vec<String>,
}

impl Layout {
    pub fn from_rows(rows: &[&str]) -> Self {
        Self {
            cell_spacing: default_cell_spacing(),
            legend: default_legend(),
            rows: rows.iter().map(|row| row.to_string()).collect(),
        }
    }

    /// Center of a cell. Odd rows shift right by half a cell so every
    /// interior cell has six neighbors at `cell_spacing`.
    pub fn position(&self, column: i32, row: i32) -> Position {
        let shift = if row & 1 == 1 { 0.5 } else { 0.0 };
        Position::new(
            self.cell_spacing * (column as f32 + shift),
            self.cell_spacing * row as f32 * 3f32.sqrt() / 2.0,
        )
    }

    /// Places one tile per glyph in row-major order; tile ids follow
    /// that order.
    pub fn build_world(&self, config: SimConfig) -> Result<World, WorldError> {
        let mut legend = BTreeMap::new();
        for (key, entry) in &self.legend {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(glyph), None) if glyph != ' ' => {
                    legend.insert(glyph, entry);
                }
                _ => return Err(ConfigError::BadGlyph(key.clone()).into()),
            }
        }

        let mut builder = WorldBuilder::new(config);
        for (row, line) in self.rows.iter().enumerate() {
            let row = row as i32;
            for (column, glyph) in line.chars().enumerate() {
                if glyph == ' ' {
                    continue;
                }
                let entry = legend
                    .get(&glyph)
                    .ok_or_else(|| ConfigError::UnknownGlyph(glyph.to_string()))?;
                let column = column as i32;
                builder.add_tile(
                    (column, row),
                    self.position(column, row),
                    entry.state,
                    entry.water_source,
                );
            }
        }
        builder.build()
    }
}

/// One scripted weather input, applied before the tick it names runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherCue {
    pub at_tick: u64,
    /// Cell `[column, row]` under the cursor from now on.
    #[serde(default)]
    pub cursor: Option<(i32, i32)>,
    #[serde(default)]
    pub clear_cursor: bool,
    #[serde(default)]
    pub rain: Option<bool>,
    #[serde(default)]
    pub lightning: bool,
    #[serde(default)]
    pub add_lightning: f32,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let mut scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        scenario.weather.sort_by_key(|cue| cue.at_tick);
        info!(
            scenario = %scenario.name,
            rows = scenario.layout.rows.len(),
            cues = scenario.weather.len(),
            "scenario loaded"
        );
        Ok(scenario)
    }
}
