//! Gameplay tuning for powerup spawning and effect parameters.

use crate::domain::state::PowerupKind;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PowerupTuning {
    /// Probability of a spawn attempt succeeding on a given tick.
    pub spawn_chance: f64,

    /// Maximum powerups on the board at once.
    pub max_active: usize,

    /// Random cells tried per spawn before giving up for this tick.
    pub spawn_attempts: usize,

    pub freeze_duration: Duration,
    pub speed_duration: Duration,
    pub shield_duration: Duration,
    pub magnet_duration: Duration,

    /// Magnet pull reaches food strictly closer than this many cells.
    pub magnet_radius: i32,

    /// Per-tick chance that a food item in range shifts toward the magnet.
    pub magnet_pull_chance: f64,

    pub bomb_fuse: Duration,

    /// Cells from the bomb center (Euclidean) that the blast reaches.
    pub bomb_blast_radius: f64,

    /// Period between bomb countdown broadcasts.
    pub bomb_countdown_step: Duration,
}

impl PowerupTuning {
    /// Effect duration for timed kinds; bombs report their fuse instead.
    pub fn duration_of(&self, kind: PowerupKind) -> Duration {
        match kind {
            PowerupKind::Freeze => self.freeze_duration,
            PowerupKind::Speed => self.speed_duration,
            PowerupKind::Shield => self.shield_duration,
            PowerupKind::Magnet => self.magnet_duration,
            PowerupKind::Bomb => self.bomb_fuse,
        }
    }
}

impl Default for PowerupTuning {
    fn default() -> Self {
        Self {
            spawn_chance: 0.005,
            max_active: 3,
            spawn_attempts: 50,
            freeze_duration: Duration::from_secs(3),
            speed_duration: Duration::from_secs(5),
            shield_duration: Duration::from_secs(5),
            magnet_duration: Duration::from_secs(10),
            magnet_radius: 5,
            magnet_pull_chance: 0.3,
            bomb_fuse: Duration::from_secs(3),
            bomb_blast_radius: 3.0,
            bomb_countdown_step: Duration::from_secs(1),
        }
    }
}
