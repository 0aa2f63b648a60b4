use anyhow::Result;
use rand::RngCore;

use crate::{
    config::SimConfig,
    effects::{Effect, EffectQueue},
    engine::{System, SystemContext},
    neighbors::pick,
    rng::SystemRng,
    systems::spread::roll,
    tile::{elapsed, Tile, TileId},
    weather::WeatherSignals,
    world::World,
};

/// Lightning, burn damage, fire decay and ignition of neighbors. Runs on
/// every living tile regardless of its territorial state.
pub struct FireSystem;

impl FireSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FireSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for FireSystem {
    fn name(&self) -> &str {
        "fire"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
        effects: &mut EffectQueue,
    ) -> Result<()> {
        let (config, graph, tiles) = world.parts_mut();
        for tile in tiles.iter_mut() {
            if !tile.state().is_living() {
                continue;
            }
            let neighbors = graph.neighbors(tile.id());
            burn(
                tile,
                neighbors,
                config,
                ctx.signals,
                ctx.dt_seconds,
                &mut *rng,
                effects,
            );
        }
        Ok(())
    }
}

pub(crate) fn burn(
    tile: &mut Tile,
    neighbors: &[TileId],
    config: &SimConfig,
    signals: &WeatherSignals,
    dt: f32,
    rng: &mut dyn RngCore,
    effects: &mut EffectQueue,
) {
    let fire = &config.fire;
    let weather = &config.weather;

    if tile.is_selected() && signals.is_lightning_active {
        if roll(rng, weather.lightning_fire_chance) {
            tile.ignite(fire.chance_start, fire.chance_addition);
        }
        tile.take_damage(weather.lightning_damage);
    }

    if !tile.is_burning() {
        return;
    }

    if elapsed(&mut tile.cooldowns.fire_tick, dt) {
        tile.take_damage(fire.tick_damage);
        tile.cooldowns.fire_tick = fire.tick_cooldown;
    }

    if elapsed(&mut tile.cooldowns.fire_spread, dt) {
        tile.cooldowns.fire_spread = fire.spread_cooldown;
        if roll(rng, tile.fire_spread_chance()) {
            let source = tile.id();
            if let Some(target) = pick(neighbors, rng, |_| true) {
                effects.push(Effect::Ignite { source, target });
            }
        }
    }

    let mut decay = fire.chance_reduction_rate * dt;
    if tile.is_selected() && signals.raining() {
        decay += weather.fire_suppress_rate * dt;
    }
    tile.set_fire_spread_chance(tile.fire_spread_chance() - decay);
}
