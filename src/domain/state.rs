// Domain-level simulation entities: snakes, spectators, pickups, bombs and effects.

use crate::domain::grid::{Cell, Direction};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Running,
    Paused,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Player,
    Spectator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bullet {
    pub pos: Cell,
    pub direction: Direction,
    pub owner_id: u64,
}

/// One timed effect installed by a powerup pickup.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEffect {
    // Unique per activation; expiry only clears the slot when the token still matches.
    pub token: u64,
    pub started_at: u64,
    pub duration: Duration,
    pub detail: EffectDetail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectDetail {
    Plain,
    FrozenBy { activator_id: u64 },
    Magnet { radius: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Frozen,
    SpeedBoost,
    Shield,
    Magnet,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveEffects {
    pub frozen: Option<ActiveEffect>,
    pub speed_boost: Option<ActiveEffect>,
    pub shield: Option<ActiveEffect>,
    pub magnet: Option<ActiveEffect>,
}

impl ActiveEffects {
    pub fn slot(&self, kind: EffectKind) -> &Option<ActiveEffect> {
        match kind {
            EffectKind::Frozen => &self.frozen,
            EffectKind::SpeedBoost => &self.speed_boost,
            EffectKind::Shield => &self.shield,
            EffectKind::Magnet => &self.magnet,
        }
    }

    pub fn slot_mut(&mut self, kind: EffectKind) -> &mut Option<ActiveEffect> {
        match kind {
            EffectKind::Frozen => &mut self.frozen,
            EffectKind::SpeedBoost => &mut self.speed_boost,
            EffectKind::Shield => &mut self.shield,
            EffectKind::Magnet => &mut self.magnet,
        }
    }

    /// Clears `kind` only if it still holds the activation `token`.
    pub fn expire(&mut self, kind: EffectKind, token: u64) -> bool {
        let slot = self.slot_mut(kind);
        if slot.as_ref().is_some_and(|effect| effect.token == token) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn is_shielded(&self) -> bool {
        self.shield.is_some()
    }

    pub fn magnet_radius(&self) -> Option<i32> {
        match self.magnet.as_ref().map(|effect| effect.detail) {
            Some(EffectDetail::Magnet { radius }) => Some(radius),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u64,
    pub name: String,
    pub color: String,
    pub tail_color: String,
    // Head first; empty only before the first spawn.
    pub body: VecDeque<Cell>,
    pub direction: Direction,
    pub next_direction: Direction,
    pub score: u32,
    pub bullets: u32,
    pub active_bullets: Vec<Bullet>,
    pub effects: ActiveEffects,
    pub alive: bool,
}

impl Player {
    pub fn head(&self) -> Option<Cell> {
        self.body.front().copied()
    }

    pub fn occupies(&self, cell: Cell) -> bool {
        self.body.contains(&cell)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spectator {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodTier {
    Regular,
    Special,
    Rare,
}

impl FoodTier {
    pub fn value(self) -> u32 {
        match self {
            FoodTier::Regular => 1,
            FoodTier::Special => 2,
            FoodTier::Rare => 3,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            FoodTier::Regular => "#2ecc71",
            FoodTier::Special => "#f1c40f",
            FoodTier::Rare => "#9b59b6",
        }
    }

    /// Picks a tier from a uniform sample in `[0, 1)`: 70% / 20% / 10%.
    pub fn from_roll(roll: f64) -> Self {
        if roll < 0.7 {
            FoodTier::Regular
        } else if roll < 0.9 {
            FoodTier::Special
        } else {
            FoodTier::Rare
        }
    }
}

/// Cosmetic pulse animation that bounces between 0 and `peak`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub phase: f64,
    pub delta: f64,
}

impl Pulse {
    const STEP: f64 = 0.05;

    pub fn new() -> Self {
        Self {
            phase: 0.0,
            delta: Self::STEP,
        }
    }

    pub fn advance(&mut self, period: f64, peak: f64) {
        self.phase = (self.phase + self.delta) % period;
        if self.phase > peak {
            self.delta = -Self::STEP;
        }
        if self.phase < 0.0 {
            self.delta = Self::STEP;
        }
    }
}

impl Default for Pulse {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Food {
    pub pos: Cell,
    pub tier: FoodTier,
    pub pulse: Pulse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemainingFood {
    pub pos: Cell,
    pub value: u32,
    pub color: String,
    pub player_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerupKind {
    Freeze,
    Speed,
    Shield,
    Magnet,
    Bomb,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 5] = [
        PowerupKind::Freeze,
        PowerupKind::Speed,
        PowerupKind::Shield,
        PowerupKind::Magnet,
        PowerupKind::Bomb,
    ];

    pub fn id(self) -> &'static str {
        match self {
            PowerupKind::Freeze => "freeze",
            PowerupKind::Speed => "speed",
            PowerupKind::Shield => "shield",
            PowerupKind::Magnet => "magnet",
            PowerupKind::Bomb => "bomb",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PowerupKind::Freeze => "Freeze",
            PowerupKind::Speed => "Speed Boost",
            PowerupKind::Shield => "Shield",
            PowerupKind::Magnet => "Magnet",
            PowerupKind::Bomb => "Bomb",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            PowerupKind::Freeze => "#3498db",
            PowerupKind::Speed => "#f1c40f",
            PowerupKind::Shield => "#7f8c8d",
            PowerupKind::Magnet => "#e74c3c",
            PowerupKind::Bomb => "#2c3e50",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            PowerupKind::Freeze => "❄️",
            PowerupKind::Speed => "⚡",
            PowerupKind::Shield => "🛡️",
            PowerupKind::Magnet => "🧲",
            PowerupKind::Bomb => "💣",
        }
    }

    pub fn rarity(self) -> f64 {
        match self {
            PowerupKind::Freeze => 0.25,
            PowerupKind::Speed => 0.20,
            PowerupKind::Shield => 0.15,
            PowerupKind::Magnet => 0.20,
            PowerupKind::Bomb => 0.20,
        }
    }

    /// Walks the cumulative rarity table with a uniform sample in `[0, 1)`.
    pub fn from_roll(roll: f64) -> Self {
        let mut cumulative = 0.0;
        for kind in Self::ALL {
            cumulative += kind.rarity();
            if roll <= cumulative {
                return kind;
            }
        }
        PowerupKind::Freeze
    }

    /// The player effect slot a timed kind installs; bombs have none.
    pub fn effect_kind(self) -> Option<EffectKind> {
        match self {
            PowerupKind::Freeze => Some(EffectKind::Frozen),
            PowerupKind::Speed => Some(EffectKind::SpeedBoost),
            PowerupKind::Shield => Some(EffectKind::Shield),
            PowerupKind::Magnet => Some(EffectKind::Magnet),
            PowerupKind::Bomb => None,
        }
    }
}

impl EffectKind {
    pub fn powerup(self) -> PowerupKind {
        match self {
            EffectKind::Frozen => PowerupKind::Freeze,
            EffectKind::SpeedBoost => PowerupKind::Speed,
            EffectKind::Shield => PowerupKind::Shield,
            EffectKind::Magnet => PowerupKind::Magnet,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Powerup {
    pub pos: Cell,
    pub kind: PowerupKind,
    pub spawned_at: u64,
    pub pulse: Pulse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bomb {
    pub id: u64,
    pub pos: Cell,
    pub owner_id: u64,
    pub planted_at: u64,
    pub fuse: Duration,
    pub blast_radius: f64,
    pub countdown: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationRecord {
    pub reason: String,
    pub timestamp: u64,
    pub score: u32,
}
