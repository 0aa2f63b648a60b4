use serde::Serialize;

use crate::tile::{TileId, TileState};

/// An intended mutation of some tile, produced during a tick and applied by
/// the world once every tile has been updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// Changes `target` from `from` to `to`. Dropped if the target is no
    /// longer in `from` when the effect is applied.
    Convert {
        source: TileId,
        target: TileId,
        from: TileState,
        to: TileState,
        /// Spread countdown to give the target after it converts.
        seed_cooldown: Option<f32>,
    },
    /// Lowers the target's health. Only living tiles take damage.
    Damage {
        source: TileId,
        target: TileId,
        amount: i32,
        seed_cooldown: Option<f32>,
    },
    /// Starts or feeds a fire on the target.
    Ignite { source: TileId, target: TileId },
}

impl Effect {
    pub fn source(&self) -> TileId {
        match self {
            Effect::Convert { source, .. }
            | Effect::Damage { source, .. }
            | Effect::Ignite { source, .. } => *source,
        }
    }

    pub fn target(&self) -> TileId {
        match self {
            Effect::Convert { target, .. }
            | Effect::Damage { target, .. }
            | Effect::Ignite { target, .. } => *target,
        }
    }
}

#[derive(Debug, Default)]
pub struct EffectQueue {
    effects: Vec<Effect>,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    /// Empties the queue in application order: ascending source id, keeping
    /// the order in which each source emitted its effects.
    pub fn drain_ordered(&mut self) -> Vec<Effect> {
        let mut effects = std::mem::take(&mut self.effects);
        effects.sort_by_key(Effect::source);
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: usize) -> TileId {
        TileId::from_index(raw)
    }

    #[test]
    fn drain_orders_by_source_and_keeps_emission_order() {
        let mut queue = EffectQueue::new();
        queue.push(Effect::Ignite {
            source: id(4),
            target: id(1),
        });
        queue.push(Effect::Damage {
            source: id(2),
            target: id(3),
            amount: 1,
            seed_cooldown: None,
        });
        queue.push(Effect::Ignite {
            source: id(2),
            target: id(5),
        });
        queue.push(Effect::Ignite {
            source: id(0),
            target: id(2),
        });

        let drained = queue.drain_ordered();
        assert!(queue.is_empty());
        let order: Vec<(usize, usize)> = drained
            .iter()
            .map(|e| (e.source().index(), e.target().index()))
            .collect();
        assert_eq!(order, vec![(0, 2), (2, 3), (2, 5), (4, 1)]);
    }
}
