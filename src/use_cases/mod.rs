// Use cases layer: the game aggregate, its rules and the actor that drives it.

pub mod effects;
pub mod engine;
pub mod game;
pub mod lobby;
pub mod tick;
pub mod types;

pub use engine::Game;
pub use game::{GameHandle, GameSettings};
pub use types::{ClientCommand, GameEvent, GameMessage, ServerEvent, ServerState, WorldSnapshot};
