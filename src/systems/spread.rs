use anyhow::Result;
use rand::{Rng, RngCore};

use crate::{
    config::SimConfig,
    effects::{Effect, EffectQueue},
    engine::{System, SystemContext},
    neighbors::pick,
    rng::SystemRng,
    tile::{elapsed, Tile, TileId, TileState},
    weather::WeatherSignals,
    world::World,
};

/// Everything one tile's territorial routine may look at or touch. The tile
/// itself is mutable; other tiles are reached only through `effects`.
pub struct TileUpdate<'a> {
    pub tile: &'a mut Tile,
    pub neighbors: &'a [TileId],
    /// States of every tile as of the start of the tick, indexed by id.
    pub states: &'a [TileState],
    pub config: &'a SimConfig,
    pub signals: &'a WeatherSignals,
    pub dt: f32,
    pub rng: &'a mut dyn RngCore,
    pub effects: &'a mut EffectQueue,
}

impl TileUpdate<'_> {
    fn state_of(&self, id: TileId) -> Option<TileState> {
        self.states.get(id.index()).copied()
    }

    fn wet(&self) -> bool {
        self.tile.is_selected() && self.signals.raining()
    }
}

pub type SpreadRule = fn(&mut TileUpdate<'_>);

/// A zero chance never succeeds, whatever the draw.
pub(crate) fn roll(rng: &mut dyn RngCore, chance: f32) -> bool {
    chance > 0.0 && rng.gen::<f32>() < chance
}

/// Claims one random neutral neighbor for grass.
fn seed_grass(update: &mut TileUpdate<'_>) {
    let source = update.tile.id();
    let states = update.states;
    let seed_cooldown = update.config.grass.spread_cooldown;
    let target = pick(update.neighbors, &mut *update.rng, |id| {
        states.get(id.index()) == Some(&TileState::Neutral)
    });
    if let Some(target) = target {
        update.effects.push(Effect::Convert {
            source,
            target,
            from: TileState::Neutral,
            to: TileState::Grass,
            seed_cooldown: Some(seed_cooldown),
        });
    }
}

pub fn forest(update: &mut TileUpdate<'_>) {
    if !elapsed(&mut update.tile.cooldowns.spread, update.dt) {
        return;
    }
    update.tile.cooldowns.spread = update.config.forest.spread_cooldown;
    if roll(update.rng, update.config.forest.spread_chance) {
        seed_grass(update);
    }
}

pub fn grass(update: &mut TileUpdate<'_>) {
    let config = update.config;
    let grass = &config.grass;
    let saturation = if update.wet() {
        update.tile.water_saturation() + config.weather.saturation_rate * update.dt
    } else {
        update.tile.water_saturation() - grass.desaturation_rate * update.dt
    };
    update
        .tile
        .set_water_saturation(saturation, grass.max_water_saturation);
    let saturation = update.tile.water_saturation();

    if update.tile.cooldowns.spread > 0.0 {
        elapsed(&mut update.tile.cooldowns.spread, update.dt);
    } else if saturation >= grass.spread_saturation_threshold {
        update.tile.cooldowns.spread = grass.spread_cooldown;
        if roll(update.rng, grass.spread_chance) {
            seed_grass(update);
        }
    }

    if update.tile.cooldowns.growth > 0.0 {
        elapsed(&mut update.tile.cooldowns.growth, update.dt);
    } else if saturation >= grass.forest_saturation_threshold {
        update.tile.cooldowns.growth = grass.forest_cooldown;
        if roll(update.rng, grass.forest_chance) {
            let id = update.tile.id();
            update.effects.push(Effect::Convert {
                source: id,
                target: id,
                from: TileState::Grass,
                to: TileState::Forest,
                seed_cooldown: None,
            });
        }
    }
}

pub fn corruption(update: &mut TileUpdate<'_>) {
    if !elapsed(&mut update.tile.cooldowns.spread, update.dt) {
        return;
    }
    let settings = update.config;
    let config = &settings.corruption;
    update.tile.cooldowns.spread = config.spread_cooldown;

    let chance = update.tile.corruption_spread_chance();
    if !roll(update.rng, chance) {
        update
            .tile
            .set_corruption_spread_chance(chance + config.chance_rate);
        return;
    }

    // The attacker's charge is spent; the target keeps its own progress
    // unless the damage below resets it.
    update.tile.set_corruption_spread_chance(0.0);
    let source = update.tile.id();
    let states = update.states;
    let target = pick(update.neighbors, &mut *update.rng, |id| {
        states
            .get(id.index())
            .is_some_and(|state| *state != TileState::Corruption && state.is_terrain())
    });
    let Some(target) = target else {
        return;
    };
    let effect = match update.state_of(target) {
        Some(TileState::Neutral) => Effect::Convert {
            source,
            target,
            from: TileState::Neutral,
            to: TileState::Corruption,
            seed_cooldown: Some(config.spread_cooldown),
        },
        _ => Effect::Damage {
            source,
            target,
            amount: config.damage,
            seed_cooldown: Some(config.spread_cooldown),
        },
    };
    update.effects.push(effect);
}

/// Runs each tile's territorial routine from the behavior table.
pub struct SpreadSystem;

impl SpreadSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for SpreadSystem {
    fn name(&self) -> &str {
        "spread"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
        effects: &mut EffectQueue,
    ) -> Result<()> {
        let states = world.states();
        let (config, graph, tiles) = world.parts_mut();
        for tile in tiles.iter_mut() {
            let Some(rule) = tile.state().behavior().spread else {
                continue;
            };
            let neighbors = graph.neighbors(tile.id());
            let mut update = TileUpdate {
                tile,
                neighbors,
                states: &states,
                config,
                signals: ctx.signals,
                dt: ctx.dt_seconds,
                rng: &mut *rng,
                effects: &mut *effects,
            };
            rule(&mut update);
        }
        Ok(())
    }
}
