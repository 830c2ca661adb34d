// Use-case level inputs/outputs for the game actor.

use crate::domain::{
    Bomb, Cell, Direction, EffectKind, EliminationRecord, Food, Phase, Player, Powerup, PowerupKind,
    RemainingFood, Role, Spectator,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Everything the actor reacts to: connection lifecycle, client intents and timer fires.
#[derive(Debug)]
pub enum GameEvent {
    Connect {
        conn_id: u64,
        direct_tx: mpsc::Sender<GameMessage>,
    },
    Disconnect {
        conn_id: u64,
    },
    Command {
        conn_id: u64,
        command: ClientCommand,
    },
    Timer(ScheduledTimer),
}

/// Validated client intent, already decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Direction(Direction),
    Shoot,
    SetName(String),
    SetColor(String),
    SetRole(Role),
    StartGame,
    PauseGame,
    ResumeGame,
    Chat {
        message: String,
        sender: Option<String>,
    },
}

impl ClientCommand {
    /// Commands an eliminated player may still issue.
    pub fn allowed_when_eliminated(&self) -> bool {
        matches!(
            self,
            ClientCommand::SetName(_)
                | ClientCommand::SetColor(_)
                | ClientCommand::SetRole(_)
                | ClientCommand::Chat { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    EffectExpired {
        player_id: u64,
        kind: EffectKind,
        token: u64,
    },
    FreezeExpired {
        token: u64,
    },
    BombCountdown {
        bomb_id: u64,
    },
    BombDetonate {
        bomb_id: u64,
    },
    ResetToLobby,
}

/// A timer tagged with the game generation it was scheduled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub generation: u64,
    pub timer: Timer,
}

/// Side effects requested by the game aggregate, executed by the actor loop.
#[derive(Debug, Clone)]
pub enum Directive {
    Broadcast(GameMessage),
    Direct { conn_id: u64, message: GameMessage },
    Schedule { delay: Duration, timer: ScheduledTimer },
    StartTicking,
    StopTicking,
}

#[derive(Debug, Clone)]
pub struct GameMessage {
    pub event: ServerEvent,
    // Absent for small replies that carry no world state.
    pub snapshot: Option<WorldSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BombHitReport {
    pub player_id: u64,
    pub is_head: bool,
}

/// Catalog entry sent on init so clients can render every powerup kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerupInfo {
    pub kind: PowerupKind,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalScore {
    pub player_id: u64,
    pub name: String,
    pub score: u32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Init {
        player_id: u64,
        role: Role,
        catalog: Vec<PowerupInfo>,
    },
    UpdateLobby,
    StartGame,
    GamePaused {
        message: String,
    },
    GameResumed,
    Update {
        just_eliminated: Vec<u64>,
    },
    UpdateBullets,
    PlayerEliminated {
        eliminated_id: u64,
        name: String,
        reason: String,
    },
    PowerupSpawned,
    PowerupActivated {
        kind: PowerupKind,
        activator_id: u64,
        message: String,
    },
    PowerupExpired {
        kind: PowerupKind,
        player_id: Option<u64>,
        message: String,
    },
    BombPlanted {
        bomb: Bomb,
        message: String,
    },
    BombCountdown {
        bomb_id: u64,
        countdown: u32,
    },
    BombExploded {
        pos: Cell,
        radius: f64,
        players_hit: Vec<BombHitReport>,
        just_eliminated: Vec<u64>,
        message: String,
    },
    ColorUpdated {
        player_id: u64,
        color: String,
    },
    RoleUpdate {
        role: Role,
    },
    GameOver {
        message: String,
        winner_id: Option<u64>,
        final_scores: Vec<FinalScore>,
    },
    ChatMessage {
        sender: String,
        message: String,
    },
    Error {
        message: String,
    },
}

/// Full copy of the authoritative state attached to every broadcast.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    pub phase: Phase,
    pub host_id: Option<u64>,
    pub players: Vec<Player>,
    pub spectators: Vec<Spectator>,
    pub foods: Vec<Food>,
    pub remaining_food: Vec<RemainingFood>,
    pub powerups: Vec<Powerup>,
    pub bombs: Vec<Bomb>,
    pub eliminated: BTreeMap<u64, EliminationRecord>,
}

/// Coarse server status published for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerState {
    pub phase: Phase,
    pub player_count: usize,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            phase: Phase::Lobby,
            player_count: 0,
        }
    }
}
