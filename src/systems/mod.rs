mod fire;
mod healing;
pub mod spread;

pub use fire::FireSystem;
pub use healing::HealingSystem;
pub use spread::SpreadSystem;
