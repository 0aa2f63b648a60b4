use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId(u32);

impl TileId {
    /// Arena indices must fit in `u32`. [`crate::world::WorldBuilder::build`]
    /// rejects larger arenas before any id is minted.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Territorial state of a tile. Behavior per variant lives in
/// [`crate::behavior`], so adding a variant means adding a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileState {
    Corruption,
    Neutral,
    Grass,
    Forest,
    Water,
}

impl TileState {
    pub const COUNT: usize = 5;

    pub const ALL: [TileState; Self::COUNT] = [
        TileState::Corruption,
        TileState::Neutral,
        TileState::Grass,
        TileState::Forest,
        TileState::Water,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            TileState::Corruption => "corruption",
            TileState::Neutral => "neutral",
            TileState::Grass => "grass",
            TileState::Forest => "forest",
            TileState::Water => "water",
        }
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// World-space position on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, other: Position) -> Position {
        Position::new(other.x - self.x, other.y - self.y)
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }
}

/// Countdowns in seconds. Each one only ever decreases until its action
/// fires, at which point the owning routine resets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cooldowns {
    pub spread: f32,
    pub fire_spread: f32,
    pub fire_tick: f32,
    pub healing: f32,
    pub growth: f32,
}

/// Counts `timer` down by `dt`. Returns true when the timer had already
/// elapsed, meaning the gated action may run this tick.
pub(crate) fn elapsed(timer: &mut f32, dt: f32) -> bool {
    if *timer > 0.0 {
        *timer = (*timer - dt).max(0.0);
        false
    } else {
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tile {
    id: TileId,
    cell: (i32, i32),
    position: Position,
    state: TileState,
    health: i32,
    max_health: i32,
    pub(crate) cooldowns: Cooldowns,
    corruption_spread_chance: f32,
    fire_spread_chance: f32,
    water_saturation: f32,
    pub(crate) selected: bool,
    pub(crate) is_water_source: bool,
    /// Placed by the level layout; survives signal coupling.
    pub(crate) natural_water_source: bool,
    /// Set by any damage since the tick began.
    pub(crate) damaged_this_tick: bool,
}

impl Tile {
    pub(crate) fn new(
        id: TileId,
        cell: (i32, i32),
        position: Position,
        state: TileState,
        max_health: i32,
    ) -> Self {
        Self {
            id,
            cell,
            position,
            state,
            health: max_health,
            max_health,
            cooldowns: Cooldowns::default(),
            corruption_spread_chance: 0.0,
            fire_spread_chance: 0.0,
            water_saturation: 0.0,
            selected: false,
            is_water_source: false,
            natural_water_source: false,
            damaged_this_tick: false,
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn cell(&self) -> (i32, i32) {
        self.cell
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }

    pub fn corruption_spread_chance(&self) -> f32 {
        self.corruption_spread_chance
    }

    pub fn fire_spread_chance(&self) -> f32 {
        self.fire_spread_chance
    }

    pub fn water_saturation(&self) -> f32 {
        self.water_saturation
    }

    pub fn is_burning(&self) -> bool {
        self.fire_spread_chance > 0.0
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_water_source(&self) -> bool {
        self.is_water_source
    }

    pub fn is_natural_water_source(&self) -> bool {
        self.natural_water_source
    }

    pub(crate) fn set_health(&mut self, value: i32) {
        self.health = value.clamp(0, self.max_health);
    }

    pub(crate) fn set_water_saturation(&mut self, value: f32, max: f32) {
        self.water_saturation = value.clamp(0.0, max);
    }

    pub(crate) fn set_corruption_spread_chance(&mut self, value: f32) {
        self.corruption_spread_chance = value.clamp(0.0, 1.0);
    }

    pub(crate) fn set_fire_spread_chance(&mut self, value: f32) {
        self.fire_spread_chance = value.clamp(0.0, 1.0);
    }

    /// Damage interrupts creeping progress: saturation and corruption charge
    /// both drop back to zero. Fire keeps burning.
    pub(crate) fn take_damage(&mut self, amount: i32) {
        self.set_health(self.health.saturating_sub(amount));
        self.corruption_spread_chance = 0.0;
        self.water_saturation = 0.0;
        self.damaged_this_tick = true;
    }

    pub(crate) fn heal(&mut self, amount: i32) {
        self.set_health(self.health.saturating_add(amount));
    }

    /// Sets a fresh fire at `start`, or feeds an existing one by `addition`.
    pub(crate) fn ignite(&mut self, start: f32, addition: f32) {
        if self.is_burning() {
            self.set_fire_spread_chance(self.fire_spread_chance + addition);
        } else {
            self.set_fire_spread_chance(start);
        }
    }

    /// Enters `state` from scratch: full health for the new state, every
    /// countdown and accumulator back at zero.
    pub(crate) fn reset_into(&mut self, state: TileState, max_health: i32) {
        self.state = state;
        self.max_health = max_health.max(0);
        self.health = self.max_health;
        self.cooldowns = Cooldowns::default();
        self.corruption_spread_chance = 0.0;
        self.fire_spread_chance = 0.0;
        self.water_saturation = 0.0;
    }
}
