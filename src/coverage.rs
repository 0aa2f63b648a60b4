//! Territory coverage derived from global tile-state counts.

use serde::Serialize;

use crate::{behavior::CoverageClass, config::OutcomeRules, tile::TileState, world::World};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Coverage {
    pub territory: usize,
    pub green: usize,
    pub corrupt: usize,
    pub barren: usize,
    pub grass_fraction: f32,
    pub corruption_fraction: f32,
    pub neutral_fraction: f32,
}

impl Coverage {
    /// Counts states by coverage class. Excluded states (water) are not part
    /// of the denominator. An empty territory reports all fractions as zero.
    pub fn measure(states: impl IntoIterator<Item = TileState>) -> Self {
        let mut coverage = Coverage::default();
        for state in states {
            match state.behavior().coverage {
                CoverageClass::Green => coverage.green += 1,
                CoverageClass::Corrupt => coverage.corrupt += 1,
                CoverageClass::Barren => coverage.barren += 1,
                CoverageClass::Excluded => continue,
            }
            coverage.territory += 1;
        }
        if coverage.territory > 0 {
            let total = coverage.territory as f32;
            coverage.grass_fraction = coverage.green as f32 / total;
            coverage.corruption_fraction = coverage.corrupt as f32 / total;
            coverage.neutral_fraction = coverage.barren as f32 / total;
        }
        coverage
    }
}

/// Keeps the most recent coverage and recomputes it only after a batch of
/// state changes.
#[derive(Debug, Default)]
pub struct CoverageAggregator {
    latest: Option<Coverage>,
    recomputations: u64,
}

impl CoverageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Coverage> {
        self.latest
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Returns fresh coverage when `changed` is set or nothing has been
    /// measured yet, otherwise `None`.
    pub fn observe(&mut self, world: &World, changed: bool) -> Option<Coverage> {
        if !changed && self.latest.is_some() {
            return None;
        }
        let coverage = world.coverage();
        self.latest = Some(coverage);
        self.recomputations += 1;
        Some(coverage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Victory,
    Defeat,
}

impl OutcomeRules {
    /// The game-state side of the coverage report: victory once enough
    /// territory is green or corruption is gone, defeat once corruption
    /// dominates or nothing green remains.
    pub fn judge(&self, coverage: &Coverage) -> Option<Outcome> {
        if coverage.territory == 0 {
            return None;
        }
        if coverage.grass_fraction >= self.player_threshold || coverage.corrupt == 0 {
            Some(Outcome::Victory)
        } else if coverage.corruption_fraction >= self.enemy_threshold || coverage.green == 0 {
            Some(Outcome::Defeat)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    use TileState::*;

    #[test]
    fn fractions_sum_to_one_and_ignore_water() {
        let coverage = Coverage::measure([Grass, Forest, Corruption, Neutral, Neutral, Water]);
        assert_eq!(coverage.territory, 5);
        assert!((coverage.grass_fraction - 0.4).abs() < 1e-6);
        assert!((coverage.corruption_fraction - 0.2).abs() < 1e-6);
        let total =
            coverage.grass_fraction + coverage.corruption_fraction + coverage.neutral_fraction;
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_territory_is_all_zero() {
        let coverage = Coverage::measure([Water, Water]);
        assert_eq!(coverage, Coverage::default());
        assert_eq!(OutcomeRules::default().judge(&coverage), None);
    }

    #[test]
    fn aggregator_recomputes_only_on_change() {
        let world = World::builder(SimConfig::default())
            .tile(Grass)
            .tile(Corruption)
            .with_adjacency(vec![vec![], vec![]])
            .build()
            .expect("world builds");
        let mut aggregator = CoverageAggregator::new();
        assert!(aggregator.observe(&world, false).is_some());
        assert!(aggregator.observe(&world, false).is_none());
        assert!(aggregator.observe(&world, true).is_some());
        assert_eq!(aggregator.recomputations(), 2);
        assert_eq!(aggregator.latest().map(|c| c.corrupt), Some(1));
    }

    #[test]
    fn judging_follows_thresholds() {
        let rules = OutcomeRules {
            player_threshold: 0.6,
            enemy_threshold: 0.5,
        };
        let victory = Coverage::measure([Grass, Forest, Grass, Corruption]);
        assert_eq!(rules.judge(&victory), Some(Outcome::Victory));

        let cleansed = Coverage::measure([Grass, Neutral, Neutral]);
        assert_eq!(rules.judge(&cleansed), Some(Outcome::Victory));

        let overrun = Coverage::measure([Corruption, Corruption, Grass, Neutral]);
        assert_eq!(rules.judge(&overrun), Some(Outcome::Defeat));

        let barren = Coverage::measure([Corruption, Neutral, Neutral, Neutral]);
        assert_eq!(rules.judge(&barren), Some(Outcome::Defeat));

        let contested = Coverage::measure([Grass, Corruption, Neutral, Neutral]);
        assert_eq!(rules.judge(&contested), None);
    }
}
