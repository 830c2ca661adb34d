// Gameplay tuning grouped by concern.

pub mod board;
pub mod combat;
pub mod powerup;

pub use board::BoardTuning;
pub use combat::CombatTuning;
pub use powerup::PowerupTuning;

#[derive(Debug, Clone, Copy, Default)]
pub struct GameTuning {
    pub board: BoardTuning,
    pub combat: CombatTuning,
    pub powerup: PowerupTuning,
}
