use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    config::{ConfigError, SimConfig},
    coverage::Coverage,
    effects::Effect,
    neighbors::{Collider, GraphError, NeighborGraph},
    tile::{Position, Tile, TileId, TileState},
    weather::WeatherSignals,
};

#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("cell {0:?} holds more than one tile")]
    DuplicateCell((i32, i32)),
    #[error("{0} tiles exceed the id space")]
    TooManyTiles(usize),
}

fn check_capacity(count: usize) -> Result<(), WorldError> {
    if u32::try_from(count).is_err() {
        return Err(WorldError::TooManyTiles(count));
    }
    Ok(())
}

/// Why a tile left its previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeCause {
    /// A neighbor's spread roll claimed this tile.
    Spread { source: TileId },
    /// The tile grew on its own, e.g. grass maturing into forest.
    Growth,
    /// Health ran out.
    Depleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub tile: TileId,
    pub from: TileState,
    pub to: TileState,
    pub cause: ChangeCause,
}

struct PendingTile {
    cell: (i32, i32),
    position: Position,
    state: TileState,
    water_source: bool,
}

/// First phase of world construction: tiles are collected here, and
/// neighbors are resolved in [`WorldBuilder::build`] once all of them exist.
pub struct WorldBuilder {
    config: SimConfig,
    pending: Vec<PendingTile>,
    adjacency: Option<Vec<Vec<TileId>>>,
}

impl WorldBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            adjacency: None,
        }
    }

    pub fn add_tile(
        &mut self,
        cell: (i32, i32),
        position: Position,
        state: TileState,
        water_source: bool,
    ) {
        self.pending.push(PendingTile {
            cell,
            position,
            state,
            water_source,
        });
    }

    /// Appends a tile to a single row. Each tile's collider touches the
    /// previous one, so without explicit adjacency the row resolves into a
    /// chain.
    pub fn tile(mut self, state: TileState) -> Self {
        let column = self.pending.len() as i32;
        let spacing = 2.0 * self.config.neighbors.collider_radius;
        let position = Position::new(column as f32 * spacing, 0.0);
        self.add_tile((column, 0), position, state, false);
        self
    }

    /// Uses explicit adjacency instead of ray casting.
    pub fn with_adjacency(mut self, adjacency: Vec<Vec<TileId>>) -> Self {
        self.adjacency = Some(adjacency);
        self
    }

    pub fn build(self) -> Result<World, WorldError> {
        check_capacity(self.pending.len())?;
        let in_play: Vec<TileState> = self
            .pending
            .iter()
            .map(|pending| pending.state)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.config.validate(&in_play)?;

        let mut cells = HashMap::with_capacity(self.pending.len());
        let mut tiles = Vec::with_capacity(self.pending.len());
        for (index, pending) in self.pending.iter().enumerate() {
            let id = TileId::from_index(index);
            if cells.insert(pending.cell, id).is_some() {
                return Err(WorldError::DuplicateCell(pending.cell));
            }
            let max_health = self
                .config
                .max_health(pending.state)
                .ok_or(ConfigError::MissingMaxHealth(pending.state))?;
            let mut tile = Tile::new(id, pending.cell, pending.position, pending.state, max_health);
            tile.is_water_source = pending.water_source;
            tile.natural_water_source = pending.water_source;
            tiles.push(tile);
        }

        let graph = match self.adjacency {
            Some(adjacency) => NeighborGraph::from_adjacency(adjacency, tiles.len())?,
            None => {
                let colliders: Vec<Collider> = tiles
                    .iter()
                    .map(|tile| Collider {
                        position: tile.position(),
                        terrain: tile.state().is_terrain(),
                    })
                    .collect();
                NeighborGraph::resolve(&colliders, &self.config.neighbors)
            }
        };
        debug!(
            tiles = tiles.len(),
            edges = graph.edge_count(),
            "neighbor graph resolved"
        );

        Ok(World {
            tick: 0,
            elapsed_seconds: 0.0,
            config: self.config,
            tiles,
            graph,
            cells,
        })
    }
}

/// The tile arena of one level plus its fixed topology.
pub struct World {
    tick: u64,
    elapsed_seconds: f64,
    config: SimConfig,
    tiles: Vec<Tile>,
    graph: NeighborGraph,
    cells: HashMap<(i32, i32), TileId>,
}

impl World {
    pub fn builder(config: SimConfig) -> WorldBuilder {
        WorldBuilder::new(config)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn dt_seconds(&self) -> f32 {
        self.config.tick_seconds
    }

    pub fn advance_time(&mut self) {
        self.tick += 1;
        self.elapsed_seconds += self.config.tick_seconds as f64;
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.index())
    }

    pub fn tile_at_cell(&self, cell: (i32, i32)) -> Option<TileId> {
        self.cells.get(&cell).copied()
    }

    pub fn neighbors(&self, id: TileId) -> &[TileId] {
        self.graph.neighbors(id)
    }

    pub fn graph(&self) -> &NeighborGraph {
        &self.graph
    }

    pub fn states(&self) -> Vec<TileState> {
        self.tiles.iter().map(Tile::state).collect()
    }

    pub fn count(&self, state: TileState) -> usize {
        self.tiles.iter().filter(|tile| tile.state() == state).count()
    }

    /// Tiles the level layout marks as water sources.
    pub fn water_source_ids(&self) -> BTreeSet<TileId> {
        self.tiles
            .iter()
            .filter(|tile| tile.is_natural_water_source())
            .map(Tile::id)
            .collect()
    }

    pub fn coverage(&self) -> Coverage {
        Coverage::measure(self.tiles.iter().map(Tile::state))
    }

    /// Split borrow used by systems: read-only config and topology alongside
    /// the mutable arena.
    pub(crate) fn parts_mut(&mut self) -> (&SimConfig, &NeighborGraph, &mut [Tile]) {
        (&self.config, &self.graph, &mut self.tiles)
    }

    /// Sets a tile's health, clamped into `[0, max_health]`.
    pub fn set_health(&mut self, id: TileId, value: i32) {
        if let Some(tile) = self.tiles.get_mut(id.index()) {
            tile.set_health(value);
        }
    }

    /// Sets a tile's saturation, clamped into `[0, max_water_saturation]`.
    pub fn set_water_saturation(&mut self, id: TileId, value: f32) {
        let max = self.config.grass.max_water_saturation;
        if let Some(tile) = self.tiles.get_mut(id.index()) {
            tile.set_water_saturation(value, max);
        }
    }

    /// Sets a tile's fire spread chance, clamped into `[0, 1]`.
    pub fn set_fire_spread_chance(&mut self, id: TileId, value: f32) {
        if let Some(tile) = self.tiles.get_mut(id.index()) {
            tile.set_fire_spread_chance(value);
        }
    }

    pub fn set_corruption_spread_chance(&mut self, id: TileId, value: f32) {
        if let Some(tile) = self.tiles.get_mut(id.index()) {
            tile.set_corruption_spread_chance(value);
        }
    }

    /// Starts a tick: copies the cursor and water-source signals onto the
    /// tiles and clears last tick's damage marks. Sources named by the
    /// signals add to the ones the layout placed.
    pub fn couple(&mut self, signals: &WeatherSignals) {
        for tile in &mut self.tiles {
            tile.selected = signals.is_selected(tile.id());
            tile.is_water_source =
                tile.natural_water_source || signals.water_sources.contains(&tile.id());
            tile.damaged_this_tick = false;
        }
    }

    /// Applies effects and returns the resulting state changes. Damage and
    /// ignition land first, then conversions, each group in the given order.
    /// A conversion is dropped when its target is no longer in `from`, when
    /// the target is a living tile whose health ran out, or when it is a
    /// tile's own growth and the tile was damaged this tick.
    pub fn apply_effects(&mut self, effects: Vec<Effect>) -> Vec<StateChange> {
        let (conversions, hits): (Vec<Effect>, Vec<Effect>) = effects
            .into_iter()
            .partition(|effect| matches!(effect, Effect::Convert { .. }));
        for effect in hits {
            self.apply_hit(effect);
        }

        let mut changes = Vec::new();
        for effect in conversions {
            let Effect::Convert {
                source,
                target,
                from,
                to,
                seed_cooldown,
            } = effect
            else {
                continue;
            };
            let Some(tile) = self.tile(target) else {
                continue;
            };
            let current = tile.state();
            if current != from {
                trace!(%source, %target, %from, %to, %current, "conversion dropped");
                continue;
            }
            if current.is_living() && tile.health() <= 0 {
                trace!(%source, %target, %to, "conversion of depleted tile dropped");
                continue;
            }
            let cause = if source == target {
                if tile.damaged_this_tick {
                    trace!(%target, %to, "growth interrupted by damage");
                    continue;
                }
                ChangeCause::Growth
            } else {
                ChangeCause::Spread { source }
            };
            changes.push(self.transition(target, to, cause));
            if let Some(seconds) = seed_cooldown {
                self.tiles[target.index()].cooldowns.spread = seconds;
            }
        }
        changes
    }

    fn apply_hit(&mut self, effect: Effect) {
        match effect {
            Effect::Damage {
                source,
                target,
                amount,
                seed_cooldown,
            } => {
                let Some(tile) = self.tiles.get_mut(target.index()) else {
                    return;
                };
                if !tile.state().is_living() {
                    trace!(%source, %target, "damage to non-living tile dropped");
                    return;
                }
                tile.take_damage(amount);
                if let Some(seconds) = seed_cooldown {
                    tile.cooldowns.spread = seconds;
                }
            }
            Effect::Ignite { source, target } => {
                let fire = &self.config.fire;
                let (start, addition, cooldown) =
                    (fire.chance_start, fire.chance_addition, fire.spread_cooldown);
                let Some(tile) = self.tiles.get_mut(target.index()) else {
                    return;
                };
                if !tile.state().is_living() {
                    trace!(%source, %target, "ignition of non-living tile dropped");
                    return;
                }
                tile.ignite(start, addition);
                tile.cooldowns.fire_spread = cooldown;
            }
            Effect::Convert { .. } => {}
        }
    }

    /// Sends every living tile whose health ran out back to neutral.
    pub fn settle_vitals(&mut self) -> Vec<StateChange> {
        let depleted: Vec<TileId> = self
            .tiles
            .iter()
            .filter(|tile| tile.state().is_living() && tile.health() <= 0)
            .map(Tile::id)
            .collect();
        depleted
            .into_iter()
            .map(|id| self.transition(id, TileState::Neutral, ChangeCause::Depleted))
            .collect()
    }

    fn transition(&mut self, id: TileId, to: TileState, cause: ChangeCause) -> StateChange {
        // Validation guarantees every reachable state has an entry.
        let max_health = self.config.max_health(to).unwrap_or(1);
        let tile = &mut self.tiles[id.index()];
        let from = tile.state();
        tile.reset_into(to, max_health);
        debug!(tile = %id, %from, %to, ?cause, "tile changed state");
        StateChange {
            tile: id,
            from,
            to,
            cause,
        }
    }

    pub fn snapshot(&self, scenario: &str) -> WorldSnapshot {
        WorldSnapshot {
            scenario: scenario.to_string(),
            tick: self.tick,
            elapsed_seconds: self.elapsed_seconds,
            coverage: self.coverage(),
            tiles: self
                .tiles
                .iter()
                .map(|tile| TileSnapshot {
                    id: tile.id().raw(),
                    cell: tile.cell(),
                    state: tile.state(),
                    health: tile.health(),
                    fire_spread_chance: tile.fire_spread_chance(),
                    water_saturation: tile.water_saturation(),
                    corruption_spread_chance: tile.corruption_spread_chance(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TileSnapshot {
    pub id: u32,
    pub cell: (i32, i32),
    pub state: TileState,
    pub health: i32,
    pub fire_spread_chance: f32,
    pub water_saturation: f32,
    pub corruption_spread_chance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub scenario: String,
    pub tick: u64,
    pub elapsed_seconds: f64,
    pub coverage: Coverage,
    pub tiles: Vec<TileSnapshot>,
}
