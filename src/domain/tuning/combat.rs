//! Gameplay tuning for bullets and the score bonuses of every kill path.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct CombatTuning {
    /// Bullets in a full magazine.
    pub max_bullets: u32,

    /// Period of the automatic magazine refill.
    pub refill_interval: Duration,

    /// Cells a bullet travels per tick.
    pub bullet_speed: u32,

    /// Score for a bullet hitting an opponent's head.
    pub head_shot_bonus: u32,

    /// Score for a bullet hitting an opponent's body.
    pub body_shot_bonus: u32,

    /// Score for picking up any powerup.
    pub powerup_bonus: u32,

    /// Score for a bomb blast reaching an opponent's head.
    pub bomb_kill_bonus: u32,

    /// Score for a bomb blast cutting an opponent's body.
    pub bomb_body_bonus: u32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            max_bullets: 3,
            refill_interval: Duration::from_secs(60),
            bullet_speed: 2,
            head_shot_bonus: 10,
            body_shot_bonus: 5,
            powerup_bonus: 2,
            bomb_kill_bonus: 10,
            bomb_body_bonus: 3,
        }
    }
}
