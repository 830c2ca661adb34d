// Wire protocol DTOs and conversions for the public WebSocket messages.

use crate::domain::{
    ActiveEffect, ActiveEffects, Bomb, Bullet, Cell, EffectDetail, EliminationRecord, Food, Phase,
    Player, Powerup, RemainingFood, Role, Spectator,
};
use crate::use_cases::types::{
    BombHitReport, ClientCommand, FinalScore, GameMessage, PowerupInfo, ServerEvent,
    WorldSnapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Messages the server sends to connected clients: `{"type": ..., <event fields>, <state>}`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    #[serde(flatten)]
    pub event: EventDto,
    // Full world state, flattened next to the event fields when present.
    #[serde(flatten)]
    pub state: Option<SnapshotDto>,
}

impl From<GameMessage> for ServerMessage {
    fn from(message: GameMessage) -> Self {
        Self {
            event: message.event.into(),
            state: message.snapshot.map(SnapshotDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventDto {
    Init {
        player_id: String,
        role: RoleDto,
        powerup_types: Vec<PowerupTypeDto>,
    },
    UpdateLobby,
    StartGame,
    GamePaused {
        message: String,
    },
    GameResumed,
    Update {
        just_eliminated: Vec<String>,
    },
    UpdateBullets,
    PlayerEliminated {
        eliminated_id: String,
        eliminated_name: String,
        reason: String,
    },
    PowerupSpawned,
    PowerupActivated {
        powerup_id: &'static str,
        activator_id: String,
        message: String,
    },
    PowerupExpired {
        powerup_id: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        player_id: Option<String>,
        message: String,
    },
    BombPlanted {
        bomb: BombDto,
        message: String,
    },
    BombCountdown {
        bomb_id: u64,
        countdown: u32,
    },
    BombExploded {
        x: i32,
        y: i32,
        radius: f64,
        players_hit: Vec<BombHitDto>,
        just_eliminated: Vec<String>,
        message: String,
    },
    ColorUpdated {
        player_id: String,
        color: String,
    },
    RoleUpdate {
        role: RoleDto,
    },
    GameOver {
        message: String,
        winner_id: Option<String>,
        final_scores: BTreeMap<String, FinalScoreDto>,
    },
    ChatMessage {
        sender: String,
        message: String,
    },
    Error {
        message: String,
    },
}

fn ids(list: Vec<u64>) -> Vec<String> {
    list.into_iter().map(|id| id.to_string()).collect()
}

impl From<ServerEvent> for EventDto {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::Init {
                player_id,
                role,
                catalog,
            } => EventDto::Init {
                player_id: player_id.to_string(),
                role: role.into(),
                powerup_types: catalog.into_iter().map(PowerupTypeDto::from).collect(),
            },
            ServerEvent::UpdateLobby => EventDto::UpdateLobby,
            ServerEvent::StartGame => EventDto::StartGame,
            ServerEvent::GamePaused { message } => EventDto::GamePaused { message },
            ServerEvent::GameResumed => EventDto::GameResumed,
            ServerEvent::Update { just_eliminated } => EventDto::Update {
                just_eliminated: ids(just_eliminated),
            },
            ServerEvent::UpdateBullets => EventDto::UpdateBullets,
            ServerEvent::PlayerEliminated {
                eliminated_id,
                name,
                reason,
            } => EventDto::PlayerEliminated {
                eliminated_id: eliminated_id.to_string(),
                eliminated_name: name,
                reason,
            },
            ServerEvent::PowerupSpawned => EventDto::PowerupSpawned,
            ServerEvent::PowerupActivated {
                kind,
                activator_id,
                message,
            } => EventDto::PowerupActivated {
                powerup_id: kind.id(),
                activator_id: activator_id.to_string(),
                message,
            },
            ServerEvent::PowerupExpired {
                kind,
                player_id,
                message,
            } => EventDto::PowerupExpired {
                powerup_id: kind.id(),
                player_id: player_id.map(|id| id.to_string()),
                message,
            },
            ServerEvent::BombPlanted { bomb, message } => EventDto::BombPlanted {
                bomb: BombDto::from(&bomb),
                message,
            },
            ServerEvent::BombCountdown { bomb_id, countdown } => {
                EventDto::BombCountdown { bomb_id, countdown }
            }
            ServerEvent::BombExploded {
                pos,
                radius,
                players_hit,
                just_eliminated,
                message,
            } => EventDto::BombExploded {
                x: pos.x,
                y: pos.y,
                radius,
                players_hit: players_hit.into_iter().map(BombHitDto::from).collect(),
                just_eliminated: ids(just_eliminated),
                message,
            },
            ServerEvent::ColorUpdated { player_id, color } => EventDto::ColorUpdated {
                player_id: player_id.to_string(),
                color,
            },
            ServerEvent::RoleUpdate { role } => EventDto::RoleUpdate { role: role.into() },
            ServerEvent::GameOver {
                message,
                winner_id,
                final_scores,
            } => EventDto::GameOver {
                message,
                winner_id: winner_id.map(|id| id.to_string()),
                final_scores: final_scores
                    .into_iter()
                    .map(|score| (score.player_id.to_string(), FinalScoreDto::from(score)))
                    .collect(),
            },
            ServerEvent::ChatMessage { sender, message } => {
                EventDto::ChatMessage { sender, message }
            }
            ServerEvent::Error { message } => EventDto::Error { message },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoleDto {
    #[serde(rename = "Server Host")]
    Host,
    Player,
    Spectator,
}

impl From<Role> for RoleDto {
    fn from(role: Role) -> Self {
        match role {
            Role::Host => RoleDto::Host,
            Role::Player => RoleDto::Player,
            Role::Spectator => RoleDto::Spectator,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerupTypeDto {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub symbol: &'static str,
    // Milliseconds; for bombs this is the fuse.
    pub duration: u64,
    pub rarity: f64,
}

impl From<PowerupInfo> for PowerupTypeDto {
    fn from(info: PowerupInfo) -> Self {
        Self {
            id: info.kind.id(),
            name: info.kind.name(),
            color: info.kind.color(),
            symbol: info.kind.symbol(),
            duration: info.duration.as_millis() as u64,
            rarity: info.kind.rarity(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BombHitDto {
    pub id: String,
    pub is_head: bool,
}

impl From<BombHitReport> for BombHitDto {
    fn from(hit: BombHitReport) -> Self {
        Self {
            id: hit.player_id.to_string(),
            is_head: hit.is_head,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalScoreDto {
    pub name: String,
    pub score: u32,
    pub color: String,
}

impl From<FinalScore> for FinalScoreDto {
    fn from(score: FinalScore) -> Self {
        Self {
            name: score.name,
            score: score.score,
            color: score.color,
        }
    }
}

/// World state attached to most outbound messages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub players: BTreeMap<String, PlayerDto>,
    pub spectators: BTreeMap<String, SpectatorDto>,
    pub foods: Vec<FoodDto>,
    pub remaining_food: Vec<RemainingFoodDto>,
    pub powerups: Vec<PowerupDto>,
    pub active_bombs: Vec<BombDto>,
    pub eliminated_players: BTreeMap<String, EliminationDto>,
    pub game_running: bool,
    pub host_id: Option<String>,
}

impl From<WorldSnapshot> for SnapshotDto {
    fn from(snapshot: WorldSnapshot) -> Self {
        Self {
            players: snapshot
                .players
                .iter()
                .map(|p| (p.id.to_string(), PlayerDto::from(p)))
                .collect(),
            spectators: snapshot
                .spectators
                .iter()
                .map(|s| (s.id.to_string(), SpectatorDto::from(s)))
                .collect(),
            foods: snapshot.foods.iter().map(FoodDto::from).collect(),
            remaining_food: snapshot
                .remaining_food
                .iter()
                .map(RemainingFoodDto::from)
                .collect(),
            powerups: snapshot.powerups.iter().map(PowerupDto::from).collect(),
            active_bombs: snapshot.bombs.iter().map(BombDto::from).collect(),
            eliminated_players: snapshot
                .eliminated
                .iter()
                .map(|(id, record)| (id.to_string(), EliminationDto::from(record)))
                .collect(),
            game_running: snapshot.phase == Phase::Running,
            host_id: snapshot.host_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CellDto {
    pub x: i32,
    pub y: i32,
}

impl From<Cell> for CellDto {
    fn from(cell: Cell) -> Self {
        Self {
            x: cell.x,
            y: cell.y,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    pub player_id: String,
    pub name: String,
    pub body: Vec<CellDto>,
    pub color: String,
    pub tail_color: String,
    pub head_color: String,
    pub direction: &'static str,
    pub next_direction: &'static str,
    pub score: u32,
    pub bullets: u32,
    pub active_bullets: Vec<BulletDto>,
    pub active_effects: EffectsDto,
}

impl From<&Player> for PlayerDto {
    fn from(player: &Player) -> Self {
        Self {
            player_id: player.id.to_string(),
            name: player.name.clone(),
            body: player.body.iter().copied().map(CellDto::from).collect(),
            color: player.color.clone(),
            tail_color: player.tail_color.clone(),
            head_color: player.color.clone(),
            direction: player.direction.as_str(),
            next_direction: player.next_direction.as_str(),
            score: player.score,
            bullets: player.bullets,
            active_bullets: player.active_bullets.iter().map(BulletDto::from).collect(),
            active_effects: EffectsDto::from(&player.effects),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletDto {
    pub x: i32,
    pub y: i32,
    pub direction: &'static str,
    pub owner_id: String,
}

impl From<&Bullet> for BulletDto {
    fn from(bullet: &Bullet) -> Self {
        Self {
            x: bullet.pos.x,
            y: bullet.pos.y,
            direction: bullet.direction.as_str(),
            owner_id: bullet.owner_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen: Option<EffectDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_boost: Option<EffectDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shield: Option<EffectDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnet: Option<EffectDto>,
}

impl From<&ActiveEffects> for EffectsDto {
    fn from(effects: &ActiveEffects) -> Self {
        Self {
            frozen: effects.frozen.as_ref().map(EffectDto::from),
            speed_boost: effects.speed_boost.as_ref().map(EffectDto::from),
            shield: effects.shield.as_ref().map(EffectDto::from),
            magnet: effects.magnet.as_ref().map(EffectDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectDto {
    pub start_time: u64,
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<i32>,
}

impl From<&ActiveEffect> for EffectDto {
    fn from(effect: &ActiveEffect) -> Self {
        let (activator_id, radius) = match effect.detail {
            EffectDetail::Plain => (None, None),
            EffectDetail::FrozenBy { activator_id } => (Some(activator_id.to_string()), None),
            EffectDetail::Magnet { radius } => (None, Some(radius)),
        };
        Self {
            start_time: effect.started_at,
            duration: effect.duration.as_millis() as u64,
            activator_id,
            radius,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorDto {
    pub player_id: String,
    pub name: String,
}

impl From<&Spectator> for SpectatorDto {
    fn from(spectator: &Spectator) -> Self {
        Self {
            player_id: spectator.id.to_string(),
            name: spectator.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FoodTypeDto {
    pub color: &'static str,
    pub value: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodDto {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: FoodTypeDto,
    pub pulse: f64,
    pub pulse_delta: f64,
}

impl From<&Food> for FoodDto {
    fn from(food: &Food) -> Self {
        Self {
            x: food.pos.x,
            y: food.pos.y,
            kind: FoodTypeDto {
                color: food.tier.color(),
                value: food.tier.value(),
            },
            pulse: food.pulse.phase,
            pulse_delta: food.pulse.delta,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemainingFoodDto {
    pub x: i32,
    pub y: i32,
    pub value: u32,
    pub color: String,
    pub player_id: String,
}

impl From<&RemainingFood> for RemainingFoodDto {
    fn from(food: &RemainingFood) -> Self {
        Self {
            x: food.pos.x,
            y: food.pos.y,
            value: food.value,
            color: food.color.clone(),
            player_id: food.player_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerupKindDto {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub symbol: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerupDto {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: PowerupKindDto,
    pub pulse: f64,
    pub pulse_delta: f64,
    pub spawn_time: u64,
}

impl From<&Powerup> for PowerupDto {
    fn from(powerup: &Powerup) -> Self {
        Self {
            x: powerup.pos.x,
            y: powerup.pos.y,
            kind: PowerupKindDto {
                id: powerup.kind.id(),
                name: powerup.kind.name(),
                color: powerup.kind.color(),
                symbol: powerup.kind.symbol(),
            },
            pulse: powerup.pulse.phase,
            pulse_delta: powerup.pulse.delta,
            spawn_time: powerup.spawned_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BombDto {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub owner_id: String,
    pub plant_time: u64,
    pub fuse_duration: u64,
    pub blast_radius: f64,
    pub countdown: u32,
}

impl From<&Bomb> for BombDto {
    fn from(bomb: &Bomb) -> Self {
        Self {
            id: bomb.id,
            x: bomb.pos.x,
            y: bomb.pos.y,
            owner_id: bomb.owner_id.to_string(),
            plant_time: bomb.planted_at,
            fuse_duration: bomb.fuse.as_millis() as u64,
            blast_radius: bomb.blast_radius,
            countdown: bomb.countdown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EliminationDto {
    pub reason: String,
    pub timestamp: u64,
    pub score: u32,
}

impl From<&EliminationRecord> for EliminationDto {
    fn from(record: &EliminationRecord) -> Self {
        Self {
            reason: record.reason.clone(),
            timestamp: record.timestamp,
            score: record.score,
        }
    }
}

/// Messages clients send over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Direction {
        direction: String,
    },
    Shoot,
    SetName {
        name: String,
    },
    SetColor {
        color: String,
    },
    SetRole {
        role: String,
    },
    StartGame,
    PauseGame,
    ResumeGame,
    ChatMessage {
        message: String,
        #[serde(default)]
        sender: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed client message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown direction `{0}`")]
    UnknownDirection(String),
    #[error("unknown role `{0}`")]
    UnknownRole(String),
}

impl TryFrom<ClientMessage> for ClientCommand {
    type Error = ProtocolError;

    fn try_from(message: ClientMessage) -> Result<Self, Self::Error> {
        let command = match message {
            ClientMessage::Direction { direction } => ClientCommand::Direction(
                crate::domain::Direction::parse(&direction)
                    .ok_or(ProtocolError::UnknownDirection(direction))?,
            ),
            ClientMessage::Shoot => ClientCommand::Shoot,
            ClientMessage::SetName { name } => ClientCommand::SetName(name),
            ClientMessage::SetColor { color } => ClientCommand::SetColor(color),
            ClientMessage::SetRole { role } => ClientCommand::SetRole(parse_role(&role)?),
            ClientMessage::StartGame => ClientCommand::StartGame,
            ClientMessage::PauseGame => ClientCommand::PauseGame,
            ClientMessage::ResumeGame => ClientCommand::ResumeGame,
            ClientMessage::ChatMessage { message, sender } => {
                ClientCommand::Chat { message, sender }
            }
        };
        Ok(command)
    }
}

// Asking for host rights is treated as asking to play.
fn parse_role(role: &str) -> Result<Role, ProtocolError> {
    match role.trim().to_ascii_lowercase().as_str() {
        "player" | "server host" | "host" => Ok(Role::Player),
        "spectator" => Ok(Role::Spectator),
        _ => Err(ProtocolError::UnknownRole(role.to_string())),
    }
}

/// Decodes one text frame into a validated command.
pub fn decode(text: &str) -> Result<ClientCommand, ProtocolError> {
    let message: ClientMessage = serde_json::from_str(text)?;
    ClientCommand::try_from(message)
}
