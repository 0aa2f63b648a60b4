//! Weather inputs consumed by the engine each tick, and the controller that
//! produces them from player intent and the rain/lightning reserves.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::{config::WeatherConfig, tile::TileId, world::World};

/// Read-only signals for one tick. The engine never mutates these.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherSignals {
    pub selected_tile: Option<TileId>,
    pub is_raining: bool,
    pub can_rain: bool,
    pub is_lightning_active: bool,
    pub water_sources: BTreeSet<TileId>,
}

impl WeatherSignals {
    /// No cursor, no rain, no lightning.
    pub fn calm() -> Self {
        Self::default()
    }

    pub fn select(mut self, tile: TileId) -> Self {
        self.selected_tile = Some(tile);
        self
    }

    pub fn with_rain(mut self) -> Self {
        self.is_raining = true;
        self.can_rain = true;
        self
    }

    pub fn with_lightning(mut self) -> Self {
        self.is_lightning_active = true;
        self
    }

    /// Rain only reaches the ground while there is water to spend.
    pub fn raining(&self) -> bool {
        self.is_raining && self.can_rain
    }

    pub fn is_selected(&self, tile: TileId) -> bool {
        self.selected_tile == Some(tile)
    }
}

/// Rain reservoir and lightning charges steered by the player.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherController {
    water: f32,
    water_capacity: f32,
    water_use_rate: f32,
    water_refill_rate: f32,
    lightning: f32,
    lightning_capacity: f32,
    rain_requested: bool,
    raining: bool,
    strike_pending: bool,
}

impl WeatherController {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            water: config.water_capacity,
            water_capacity: config.water_capacity,
            water_use_rate: config.water_use_rate,
            water_refill_rate: config.water_refill_rate,
            lightning: config.lightning_charges.min(config.lightning_capacity),
            lightning_capacity: config.lightning_capacity,
            rain_requested: false,
            raining: false,
            strike_pending: false,
        }
    }

    pub fn water(&self) -> f32 {
        self.water
    }

    pub fn lightning_charges(&self) -> f32 {
        self.lightning
    }

    pub fn can_rain(&self) -> bool {
        self.water > 0.0
    }

    pub fn is_raining(&self) -> bool {
        self.raining
    }

    pub fn enable_rain(&mut self, enable: bool) {
        self.rain_requested = enable;
        self.raining = enable && self.can_rain();
    }

    /// Banks extra lightning, e.g. from a collected pickup.
    pub fn add_lightning(&mut self, amount: f32) {
        self.lightning = (self.lightning + amount.max(0.0)).min(self.lightning_capacity);
    }

    /// Queues a strike for the next tick if a full charge is available.
    pub fn strike(&mut self) -> bool {
        if self.strike_pending || self.lightning < 1.0 {
            return false;
        }
        self.lightning -= 1.0;
        self.strike_pending = true;
        true
    }

    /// Spends and refills water for one tick of `dt` seconds, then returns
    /// the signals the engine should see this tick.
    pub fn advance(&mut self, world: &World, selected: Option<TileId>, dt: f32) -> WeatherSignals {
        if self.raining && !self.can_rain() {
            self.raining = false;
        } else if self.rain_requested && !self.raining && self.can_rain() {
            self.raining = true;
        }

        if self.raining {
            self.water = (self.water - self.water_use_rate * dt).clamp(0.0, self.water_capacity);
        }

        let over_source = selected
            .and_then(|id| world.tile(id))
            .map(|tile| tile.is_water_source())
            .unwrap_or(false);
        if over_source {
            self.water = (self.water + self.water_refill_rate * dt).clamp(0.0, self.water_capacity);
        }

        let lightning = std::mem::take(&mut self.strike_pending);
        if lightning {
            debug!(?selected, "lightning strike");
        }

        WeatherSignals {
            selected_tile: selected,
            is_raining: self.raining,
            can_rain: self.can_rain(),
            is_lightning_active: lightning,
            water_sources: world.water_source_ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SimConfig, scenario::Layout};

    fn world() -> World {
        Layout::from_rows(&["~g."])
            .build_world(SimConfig::default())
            .expect("layout builds")
    }

    fn config() -> WeatherConfig {
        WeatherConfig {
            water_capacity: 1.0,
            water_use_rate: 1.0,
            water_refill_rate: 2.0,
            lightning_capacity: 2.0,
            lightning_charges: 1.0,
            ..WeatherConfig::default()
        }
    }

    #[test]
    fn rain_drains_the_reservoir_and_stops_when_empty() {
        let world = world();
        let grass = TileId::from_index(1);
        let mut weather = WeatherController::new(&config());
        weather.enable_rain(true);
        let mut last = WeatherSignals::calm();
        for _ in 0..11 {
            last = weather.advance(&world, Some(grass), 0.1);
        }
        assert_eq!(weather.water(), 0.0);
        assert!(!last.can_rain);
        let next = weather.advance(&world, Some(grass), 0.1);
        assert!(!next.raining());
        assert!(!weather.is_raining());
    }

    #[test]
    fn hovering_a_water_source_refills() {
        let world = world();
        let water = TileId::from_index(0);
        assert!(world.tile(water).expect("tile").is_water_source());
        let mut weather = WeatherController::new(&config());
        weather.enable_rain(true);
        for _ in 0..20 {
            weather.advance(&world, Some(TileId::from_index(1)), 0.1);
        }
        assert_eq!(weather.water(), 0.0);
        let signals = weather.advance(&world, Some(water), 0.1);
        assert!(weather.water() > 0.0);
        assert!(signals.can_rain);
        assert_eq!(signals.water_sources.len(), 1);
    }

    #[test]
    fn lightning_is_active_for_exactly_one_tick() {
        let world = world();
        let mut weather = WeatherController::new(&config());
        assert!(weather.strike());
        assert!(!weather.strike(), "a strike is already queued");
        assert!(weather.advance(&world, None, 0.1).is_lightning_active);
        assert!(!weather.advance(&world, None, 0.1).is_lightning_active);
        assert!(!weather.strike(), "no charges left");
        weather.add_lightning(5.0);
        assert_eq!(weather.lightning_charges(), 2.0);
        assert!(weather.strike());
    }

    #[test]
    fn signal_builders() {
        let signals = WeatherSignals::calm()
            .select(TileId::from_index(2))
            .with_rain()
            .with_lightning();
        assert!(signals.raining());
        assert!(signals.is_selected(TileId::from_index(2)));
        assert!(!signals.is_selected(TileId::from_index(1)));

        let dry = WeatherSignals {
            is_raining: true,
            can_rain: false,
            ..WeatherSignals::calm()
        };
        assert!(!dry.raining());
    }
}
