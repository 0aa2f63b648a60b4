//! Per-state behavior table.
//!
//! Systems never match on [`TileState`] directly; they look up the row for a
//! tile's state and act on what it declares.

use crate::{
    systems::spread::{self, SpreadRule},
    tile::TileState,
};

/// Which bucket a state contributes to when coverage is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageClass {
    Green,
    Corrupt,
    Barren,
    /// Not part of the playable territory at all.
    Excluded,
}

pub struct StateBehavior {
    /// Territorial routine run once per tick, if any.
    pub spread: Option<SpreadRule>,
    /// Takes lightning, fire and corruption damage; dies back to neutral.
    pub living: bool,
    /// Recovers health under rain while selected.
    pub heals: bool,
    /// Participates in the neighbor graph. Non-terrain cells still block rays.
    pub terrain: bool,
    pub coverage: CoverageClass,
}

static BEHAVIORS: [StateBehavior; TileState::COUNT] = [
    // Corruption
    StateBehavior {
        spread: Some(spread::corruption as SpreadRule),
        living: true,
        heals: false,
        terrain: true,
        coverage: CoverageClass::Corrupt,
    },
    // Neutral
    StateBehavior {
        spread: None,
        living: false,
        heals: false,
        terrain: true,
        coverage: CoverageClass::Barren,
    },
    // Grass
    StateBehavior {
        spread: Some(spread::grass as SpreadRule),
        living: true,
        heals: true,
        terrain: true,
        coverage: CoverageClass::Green,
    },
    // Forest
    StateBehavior {
        spread: Some(spread::forest as SpreadRule),
        living: true,
        heals: true,
        terrain: true,
        coverage: CoverageClass::Green,
    },
    // Water
    StateBehavior {
        spread: None,
        living: false,
        heals: false,
        terrain: false,
        coverage: CoverageClass::Excluded,
    },
];

impl TileState {
    pub fn behavior(self) -> &'static StateBehavior {
        &BEHAVIORS[self.index()]
    }

    pub fn is_living(self) -> bool {
        self.behavior().living
    }

    pub fn is_terrain(self) -> bool {
        self.behavior().terrain
    }
}
