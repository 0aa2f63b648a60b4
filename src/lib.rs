pub mod behavior;
pub mod config;
pub mod coverage;
pub mod effects;
pub mod engine;
pub mod neighbors;
pub mod rng;
pub mod scenario;
pub mod session;
pub mod snapshot;
pub mod systems;
pub mod tile;
pub mod weather;
pub mod web;
pub mod world;

pub use config::SimConfig;
pub use coverage::{Coverage, Outcome};
pub use engine::{Engine, EngineBuilder, EngineSettings, TickReport};
pub use scenario::{Scenario, ScenarioLoader};
pub use session::{Session, SessionOptions};
pub use tile::{TileId, TileState};
pub use weather::{WeatherController, WeatherSignals};
pub use world::World;
