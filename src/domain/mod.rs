// Domain layer: core simulation types and rules.

pub mod grid;
pub mod state;
pub mod systems;
pub mod tuning;
pub mod world;

pub use grid::{Bounds, Cell, Direction};
pub use state::{
    ActiveEffect, ActiveEffects, Bomb, Bullet, EffectDetail, EffectKind, EliminationRecord, Food,
    FoodTier, Phase, Player, Powerup, PowerupKind, RemainingFood, Role, Spectator,
};
pub use tuning::GameTuning;
pub use world::World;
