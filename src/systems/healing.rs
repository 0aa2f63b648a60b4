use anyhow::Result;

use crate::{
    effects::EffectQueue,
    engine::{System, SystemContext},
    rng::SystemRng,
    tile::elapsed,
    world::World,
};

/// Rain restores health on the selected tile, one dose per cooldown.
pub struct HealingSystem;

impl HealingSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HealingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for HealingSystem {
    fn name(&self) -> &str {
        "healing"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        _rng: &mut SystemRng<'_>,
        _effects: &mut EffectQueue,
    ) -> Result<()> {
        let (config, _, tiles) = world.parts_mut();
        let weather = &config.weather;
        let raining = ctx.signals.raining();
        for tile in tiles.iter_mut() {
            if !tile.state().behavior().heals {
                continue;
            }
            if !elapsed(&mut tile.cooldowns.healing, ctx.dt_seconds) {
                continue;
            }
            // A tile that has run out of health this tick stays dead.
            if raining && tile.is_selected() && tile.health() > 0 {
                tile.heal(weather.heal_amount);
                tile.cooldowns.healing = weather.healing_cooldown;
            }
        }
        Ok(())
    }
}
