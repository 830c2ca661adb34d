//! Gameplay tuning for the board, the roster and the tick cadence.
//!
//! Keep this separate from runtime/server configuration (channel sizes, ports, etc.).

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BoardTuning {
    /// Cells per side of the square grid.
    pub grid_count: i32,

    /// Rendering size of one cell in pixels (sent to clients, unused by the simulation).
    pub cell_size: u32,

    /// Fixed simulation period.
    pub tick_period: Duration,

    /// Maximum number of concurrent players (host included).
    pub max_players: usize,

    /// Food items placed on every reset.
    pub initial_food: usize,

    /// Remaining-food items dropped from an eliminated body.
    pub elimination_food: usize,

    /// Delay between game over and the automatic return to the lobby.
    pub game_over_delay: Duration,

    /// Random samples tried before falling back to a scan of free cells.
    pub food_spawn_attempts: usize,
}

impl Default for BoardTuning {
    fn default() -> Self {
        Self {
            grid_count: 25,
            cell_size: 20,
            tick_period: Duration::from_millis(150),
            max_players: 4,
            initial_food: 3,
            elimination_food: 5,
            game_over_delay: Duration::from_secs(5),
            food_spawn_attempts: 1000,
        }
    }
}
