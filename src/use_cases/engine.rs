// The authoritative game aggregate: session registry, world contents and lifecycle phase.
//
// `Game` is plain synchronous state. It never touches channels directly; every side effect
// (broadcast, direct reply, timer, tick control) is queued as a `Directive` and executed by
// the actor in `game.rs`.

use crate::domain::grid::{Bounds, Cell, Direction};
use crate::domain::state::{
    EliminationRecord, Phase, Player, PowerupKind, RemainingFood, Role, Spectator,
};
use crate::domain::tuning::GameTuning;
use crate::domain::world::World;
use crate::use_cases::types::{
    Directive, FinalScore, GameMessage, PowerupInfo, ScheduledTimer, ServerEvent, ServerState,
    Timer, WorldSnapshot,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const SPAWN_MARGIN: i32 = 5;
pub(crate) const TAIL_LIGHTEN_PERCENT: u32 = 20;

pub struct Game {
    pub(crate) tuning: GameTuning,
    pub(crate) rng: StdRng,
    pub(crate) world: World,
    // Registry order is join order; it drives tick order and spawn corners.
    pub(crate) players: Vec<Player>,
    pub(crate) spectators: Vec<Spectator>,
    pub(crate) eliminated: BTreeMap<u64, EliminationRecord>,
    pub(crate) phase: Phase,
    pub(crate) host_id: Option<u64>,
    // Bumped on every full reset; timers from older generations are dropped.
    pub(crate) generation: u64,
    next_token: u64,
    next_bomb_id: u64,
    outbox: Vec<Directive>,
}

impl Game {
    pub fn new(tuning: GameTuning) -> Self {
        Self::with_rng(tuning, StdRng::from_os_rng())
    }

    pub fn with_rng(tuning: GameTuning, rng: StdRng) -> Self {
        let mut game = Self {
            tuning,
            rng,
            world: World::new(Bounds::new(tuning.board.grid_count)),
            players: Vec::new(),
            spectators: Vec::new(),
            eliminated: BTreeMap::new(),
            phase: Phase::Lobby,
            host_id: None,
            generation: 0,
            next_token: 1,
            next_bomb_id: 1,
            outbox: Vec::new(),
        };
        game.spawn_initial_food();
        game
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host_id(&self) -> Option<u64> {
        self.host_id
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn tuning(&self) -> &GameTuning {
        &self.tuning
    }

    pub fn server_state(&self) -> ServerState {
        ServerState {
            phase: self.phase,
            player_count: self.players.len(),
        }
    }

    /// Takes every directive queued since the last call.
    pub fn drain_outbox(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.outbox)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            phase: self.phase,
            host_id: self.host_id,
            players: self.players.clone(),
            spectators: self.spectators.clone(),
            foods: self.world.foods.clone(),
            remaining_food: self.world.remaining_food.clone(),
            powerups: self.world.powerups.clone(),
            bombs: self.world.bombs.clone(),
            eliminated: self.eliminated.clone(),
        }
    }

    pub fn powerup_catalog(&self) -> Vec<PowerupInfo> {
        PowerupKind::ALL
            .iter()
            .map(|&kind| PowerupInfo {
                kind,
                duration: self.tuning.powerup.duration_of(kind),
            })
            .collect()
    }

    pub(crate) fn broadcast(&mut self, event: ServerEvent) {
        let snapshot = Some(self.snapshot());
        self.outbox
            .push(Directive::Broadcast(GameMessage { event, snapshot }));
    }

    // Broadcast without world state attached (chat).
    pub(crate) fn broadcast_bare(&mut self, event: ServerEvent) {
        self.outbox.push(Directive::Broadcast(GameMessage {
            event,
            snapshot: None,
        }));
    }

    pub(crate) fn send_direct(&mut self, conn_id: u64, event: ServerEvent, with_snapshot: bool) {
        let snapshot = with_snapshot.then(|| self.snapshot());
        self.outbox.push(Directive::Direct {
            conn_id,
            message: GameMessage { event, snapshot },
        });
    }

    pub(crate) fn schedule(&mut self, delay: Duration, timer: Timer) {
        self.outbox.push(Directive::Schedule {
            delay,
            timer: ScheduledTimer {
                generation: self.generation,
                timer,
            },
        });
    }

    pub(crate) fn start_ticking(&mut self) {
        self.outbox.push(Directive::StartTicking);
    }

    pub(crate) fn stop_ticking(&mut self) {
        self.outbox.push(Directive::StopTicking);
    }

    pub(crate) fn next_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    pub(crate) fn next_bomb_id(&mut self) -> u64 {
        let id = self.next_bomb_id;
        self.next_bomb_id += 1;
        id
    }

    pub(crate) fn player_index(&self, id: u64) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub(crate) fn player(&self, id: u64) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub(crate) fn player_mut(&mut self, id: u64) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub(crate) fn role_of(&self, id: u64) -> Role {
        if self.host_id == Some(id) {
            Role::Host
        } else if self.player(id).is_some() {
            Role::Player
        } else {
            Role::Spectator
        }
    }

    pub(crate) fn living_bodies(&self) -> HashSet<Cell> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .flat_map(|p| p.body.iter().copied())
            .collect()
    }

    pub(crate) fn spawn_food(&mut self) -> bool {
        let bodies = self.living_bodies();
        let spawned = self
            .world
            .spawn_food(&mut self.rng, &bodies, &self.tuning.board);
        if !spawned {
            debug!("no free cell for food; spawn skipped");
        }
        spawned
    }

    fn spawn_initial_food(&mut self) {
        for _ in 0..self.tuning.board.initial_food {
            self.spawn_food();
        }
    }

    pub(crate) fn new_player(&mut self, id: u64, name: String) -> Player {
        let color = random_color(&mut self.rng);
        Player {
            id,
            name,
            tail_color: lighten_color(&color, TAIL_LIGHTEN_PERCENT),
            color,
            body: VecDeque::new(),
            direction: Direction::Right,
            next_direction: Direction::Right,
            score: 0,
            bullets: self.tuning.combat.max_bullets,
            active_bullets: Vec::new(),
            effects: Default::default(),
            alive: true,
        }
    }

    /// Places `players[idx]` on the corner keyed by `join_index`.
    pub(crate) fn spawn_at(&mut self, idx: usize, join_index: usize) {
        let (body, direction) = corner_spawn(self.tuning.board.grid_count, join_index);
        if let Some(player) = self.players.get_mut(idx) {
            player.body = body;
            player.direction = direction;
            player.next_direction = direction;
        }
    }

    /// The corner keyed by `join_index`, or the next one clear of living bodies.
    pub(crate) fn free_corner(&self, join_index: usize) -> Option<(VecDeque<Cell>, Direction)> {
        let bodies = self.living_bodies();
        (0..4)
            .map(|offset| corner_spawn(self.tuning.board.grid_count, join_index + offset))
            .find(|(body, _)| body.iter().all(|cell| !bodies.contains(cell)))
    }

    /// Hands host rights to the first registered player, or resets when nobody is left.
    pub(crate) fn elect_host(&mut self) {
        match self.players.first() {
            Some(player) => {
                self.host_id = Some(player.id);
                info!(host_id = player.id, name = %player.name, "new host assigned");
            }
            None => {
                self.host_id = None;
                info!("no players left to be host");
                self.reset();
            }
        }
    }

    /// Eliminates a living player and checks for game end.
    ///
    /// Returns true when this elimination ended the game. Outside Running/Paused, or for an
    /// unknown or already eliminated player, nothing happens.
    pub(crate) fn eliminate(&mut self, player_id: u64, reason: &str) -> bool {
        if !matches!(self.phase, Phase::Running | Phase::Paused) {
            return false;
        }
        if self.eliminated.contains_key(&player_id) {
            return false;
        }
        let elimination_food = self.tuning.board.elimination_food;
        let Some(player) = self.player_mut(player_id) else {
            return false;
        };

        player.alive = false;
        player.effects = Default::default();
        player.active_bullets.clear();
        let name = player.name.clone();
        let score = player.score;
        let remains = drop_remains(player, elimination_food);

        info!(player_id, %name, reason, "player eliminated");
        self.world.remaining_food.extend(remains);
        self.eliminated.insert(
            player_id,
            EliminationRecord {
                reason: reason.to_string(),
                timestamp: now_millis(),
                score,
            },
        );
        self.broadcast(ServerEvent::PlayerEliminated {
            eliminated_id: player_id,
            name,
            reason: reason.to_string(),
        });

        let survivors: Vec<(u64, String)> = self
            .players
            .iter()
            .filter(|p| !self.eliminated.contains_key(&p.id))
            .map(|p| (p.id, p.name.clone()))
            .collect();
        match survivors.as_slice() {
            [(winner_id, winner_name)] => {
                self.game_over(format!("{winner_name} wins by elimination!"), Some(*winner_id));
                true
            }
            [] => {
                self.game_over("No players left! Game over.".to_string(), None);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn game_over(&mut self, message: String, winner_id: Option<u64>) {
        self.phase = Phase::GameOver;
        self.stop_ticking();

        let final_scores = self
            .players
            .iter()
            .map(|p| FinalScore {
                player_id: p.id,
                name: p.name.clone(),
                score: p.score,
                color: p.color.clone(),
            })
            .collect();
        info!(?winner_id, %message, "game over");
        self.broadcast(ServerEvent::GameOver {
            message,
            winner_id,
            final_scores,
        });
        self.schedule(self.tuning.board.game_over_delay, Timer::ResetToLobby);
    }

    /// Full reset back to the lobby: fresh world, respawned players, zeroed scores.
    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.phase = Phase::Lobby;
        self.eliminated.clear();
        self.world.clear();
        self.stop_ticking();

        let max_bullets = self.tuning.combat.max_bullets;
        for idx in 0..self.players.len() {
            self.spawn_at(idx, idx + 1);
            let player = &mut self.players[idx];
            player.score = 0;
            player.bullets = max_bullets;
            player.active_bullets.clear();
            player.effects = Default::default();
            player.alive = true;
        }
        self.spawn_initial_food();
        debug!(generation = self.generation, "game reset");
    }
}

/// Evenly spaced body segments turned into remaining-food.
fn drop_remains(player: &Player, max_items: usize) -> Vec<RemainingFood> {
    let len = player.body.len();
    let count = len.min(max_items);
    if count == 0 {
        return Vec::new();
    }
    let step = len / count;
    (0..count)
        .filter_map(|i| player.body.get(i * step))
        .map(|segment| RemainingFood {
            pos: *segment,
            value: 1,
            color: player.color.clone(),
            player_id: player.id,
        })
        .collect()
}

/// Three-segment corner spawn keyed by `join_index % 4`.
pub(crate) fn corner_spawn(grid_count: i32, join_index: usize) -> (VecDeque<Cell>, Direction) {
    let near = SPAWN_MARGIN;
    let far = grid_count - SPAWN_MARGIN;
    let (cells, direction) = match join_index % 4 {
        1 => ([(near, near), (near - 1, near), (near - 2, near)], Direction::Right),
        2 => ([(far, near), (far, near - 1), (far, near - 2)], Direction::Down),
        3 => ([(far, far), (far + 1, far), (far + 2, far)], Direction::Left),
        _ => ([(near, far), (near, far + 1), (near, far + 2)], Direction::Up),
    };
    (
        cells.into_iter().map(|(x, y)| Cell::new(x, y)).collect(),
        direction,
    )
}

/// Moves each RGB channel of `#rrggbb` `percent`% of the way towards white.
pub fn lighten_color(hex: &str, percent: u32) -> String {
    let digits = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
    };
    let (Some(r), Some(g), Some(b)) = (channel(0..2), channel(2..4), channel(4..6)) else {
        return "#ffffff".to_string();
    };
    let lift = |c: u8| {
        let c = u32::from(c);
        (c + (255 - c) * percent.min(100) / 100).min(255)
    };
    format!("#{:02x}{:02x}{:02x}", lift(r), lift(g), lift(b))
}

pub(crate) fn random_color<R: Rng>(rng: &mut R) -> String {
    format!("#{:06x}", rng.random_range(0..=0xFF_FFFFu32))
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
