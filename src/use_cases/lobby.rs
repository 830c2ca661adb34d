// Session registry and lifecycle commands: connect/disconnect, roles, host controls, chat.

use crate::domain::grid::Direction;
use crate::domain::state::{Bullet, Phase, Role, Spectator};
use crate::use_cases::engine::{Game, TAIL_LIGHTEN_PERCENT, lighten_color, truncate_chars};
use crate::use_cases::types::{ClientCommand, ServerEvent};
use tracing::{debug, info};

const MAX_NAME_CHARS: usize = 20;
const MAX_COLOR_CHARS: usize = 32;
const MAX_CHAT_CHARS: usize = 100;

fn default_name(prefix: &str, id: u64) -> String {
    format!("{prefix} {:04}", id % 10_000)
}

impl Game {
    /// Registers a new connection and returns the role it was given.
    pub fn connect(&mut self, conn_id: u64) -> Role {
        let mut role = if self.host_id.is_none() {
            Role::Host
        } else if self.players.len() < self.tuning.board.max_players
            && self.phase != Phase::Running
        {
            Role::Player
        } else {
            Role::Spectator
        };

        if role != Role::Spectator
            && !self.seat_player(conn_id, default_name("Player", conn_id))
        {
            role = Role::Spectator;
        }
        match role {
            Role::Host => self.host_id = Some(conn_id),
            Role::Player => {}
            Role::Spectator => self.spectators.push(Spectator {
                id: conn_id,
                name: default_name("Spectator", conn_id),
            }),
        }

        info!(conn_id, ?role, "client joined");
        let catalog = self.powerup_catalog();
        self.send_direct(
            conn_id,
            ServerEvent::Init {
                player_id: conn_id,
                role,
                catalog,
            },
            true,
        );
        self.broadcast(ServerEvent::UpdateLobby);
        role
    }

    /// Adds a roster entry for `conn_id`. Returns false when no corner is clear.
    fn seat_player(&mut self, conn_id: u64, name: String) -> bool {
        let mut player = self.new_player(conn_id, name);
        if self.eliminated.contains_key(&conn_id) {
            // Already out this round; sits without a body until the next reset.
            player.alive = false;
        } else {
            let Some((body, direction)) = self.free_corner(self.players.len() + 1) else {
                debug!(conn_id, "every corner is occupied; seat refused");
                return false;
            };
            player.body = body;
            player.direction = direction;
            player.next_direction = direction;
        }
        self.players.push(player);
        true
    }

    pub fn disconnect(&mut self, conn_id: u64) {
        if self.host_id == Some(conn_id) {
            self.players.retain(|p| p.id != conn_id);
            self.elect_host();
            if self.phase == Phase::Running {
                self.pause();
            }
        } else if self.player(conn_id).is_some() {
            if self.phase == Phase::Running {
                self.eliminate(conn_id, "disconnected");
            }
            self.players.retain(|p| p.id != conn_id);
        } else {
            self.spectators.retain(|s| s.id != conn_id);
        }

        info!(conn_id, "client left");
        self.broadcast(ServerEvent::UpdateLobby);
    }

    pub fn handle_command(&mut self, conn_id: u64, command: ClientCommand) {
        if self.eliminated.contains_key(&conn_id) && !command.allowed_when_eliminated() {
            debug!(conn_id, ?command, "command from eliminated player ignored");
            return;
        }

        match command {
            ClientCommand::Direction(direction) => self.set_direction(conn_id, direction),
            ClientCommand::Shoot => self.shoot(conn_id),
            ClientCommand::SetName(name) => self.set_name(conn_id, &name),
            ClientCommand::SetColor(color) => self.set_color(conn_id, &color),
            ClientCommand::SetRole(role) => self.set_role(conn_id, role),
            ClientCommand::StartGame => self.start_game(conn_id),
            ClientCommand::PauseGame => {
                if self.host_id == Some(conn_id) {
                    self.pause();
                }
            }
            ClientCommand::ResumeGame => self.resume_game(conn_id),
            ClientCommand::Chat { message, sender } => self.chat(conn_id, &message, sender),
        }
    }

    fn set_direction(&mut self, conn_id: u64, direction: Direction) {
        let Some(player) = self.player_mut(conn_id) else {
            return;
        };
        if player.effects.is_frozen() || direction.is_reverse_of(player.direction) {
            return;
        }
        player.next_direction = direction;
    }

    fn shoot(&mut self, conn_id: u64) {
        if self.phase != Phase::Running {
            return;
        }
        let Some(player) = self.player_mut(conn_id) else {
            return;
        };
        if !player.alive || player.bullets == 0 || player.effects.is_frozen() {
            return;
        }
        let Some(head) = player.head() else {
            return;
        };
        player.bullets -= 1;
        player.active_bullets.push(Bullet {
            pos: head,
            direction: player.direction,
            owner_id: conn_id,
        });
    }

    fn set_name(&mut self, conn_id: u64, name: &str) {
        let name = truncate_chars(name.trim(), MAX_NAME_CHARS);
        if name.is_empty() {
            return;
        }
        if let Some(player) = self.player_mut(conn_id) {
            player.name = name;
        } else if let Some(spectator) = self.spectators.iter_mut().find(|s| s.id == conn_id) {
            spectator.name = name;
        } else {
            return;
        }
        self.broadcast(ServerEvent::UpdateLobby);
    }

    fn set_color(&mut self, conn_id: u64, color: &str) {
        let color = color.trim();
        if color.is_empty() || color.chars().count() > MAX_COLOR_CHARS {
            return;
        }
        let Some(player) = self.player_mut(conn_id) else {
            return;
        };
        player.color = color.to_string();
        player.tail_color = lighten_color(color, TAIL_LIGHTEN_PERCENT);
        self.broadcast(ServerEvent::ColorUpdated {
            player_id: conn_id,
            color: color.to_string(),
        });
    }

    fn set_role(&mut self, conn_id: u64, requested: Role) {
        if self.phase == Phase::Running {
            self.send_direct(
                conn_id,
                ServerEvent::Error {
                    message: "Cannot change roles during an active game".to_string(),
                },
                false,
            );
            return;
        }

        match requested {
            Role::Player | Role::Host => {
                let has_slot = self.players.len() < self.tuning.board.max_players;
                let spectator_idx = self.spectators.iter().position(|s| s.id == conn_id);
                if let (true, Some(idx)) = (has_slot, spectator_idx) {
                    let name = self.spectators[idx].name.clone();
                    if self.seat_player(conn_id, name) {
                        self.spectators.remove(idx);
                        if self.host_id.is_none() {
                            self.host_id = Some(conn_id);
                        }
                    }
                }
            }
            Role::Spectator => {
                if let Some(idx) = self.player_index(conn_id) {
                    let player = self.players.remove(idx);
                    if self.host_id == Some(conn_id) {
                        self.elect_host();
                    }
                    self.spectators.push(Spectator {
                        id: conn_id,
                        name: player.name,
                    });
                }
            }
        }

        let role = self.role_of(conn_id);
        info!(conn_id, ?role, "role updated");
        self.broadcast(ServerEvent::UpdateLobby);
        self.send_direct(conn_id, ServerEvent::RoleUpdate { role }, false);
    }

    fn start_game(&mut self, conn_id: u64) {
        if self.host_id != Some(conn_id) || self.players.is_empty() {
            return;
        }
        if self.phase == Phase::Running {
            return;
        }

        self.reset();
        self.phase = Phase::Running;
        self.start_ticking();
        info!(players = self.players.len(), "game started");
        self.broadcast(ServerEvent::StartGame);
    }

    /// Stops the tick without touching the world. Only valid while Running.
    pub(crate) fn pause(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        self.phase = Phase::Paused;
        self.stop_ticking();
        info!("game paused");
        self.broadcast(ServerEvent::GamePaused {
            message: "Game paused. Waiting for players to reconnect...".to_string(),
        });
    }

    fn resume_game(&mut self, conn_id: u64) {
        if self.host_id != Some(conn_id) || self.phase != Phase::Paused {
            return;
        }
        self.phase = Phase::Running;
        self.start_ticking();
        info!("game resumed");
        self.broadcast(ServerEvent::GameResumed);
    }

    fn chat(&mut self, conn_id: u64, message: &str, sender: Option<String>) {
        if message.is_empty() {
            return;
        }
        let message = truncate_chars(message, MAX_CHAT_CHARS);
        let sender = sender
            .map(|s| truncate_chars(s.trim(), MAX_NAME_CHARS))
            .filter(|s| !s.is_empty())
            .or_else(|| self.player(conn_id).map(|p| p.name.clone()))
            .or_else(|| {
                self.spectators
                    .iter()
                    .find(|s| s.id == conn_id)
                    .map(|s| s.name.clone())
            })
            .unwrap_or_else(|| "Unknown".to_string());
        self.broadcast_bare(ServerEvent::ChatMessage { sender, message });
    }

    /// Periodic refill: every living player gets a full magazine while a game runs.
    pub fn refill_bullets(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        let max_bullets = self.tuning.combat.max_bullets;
        for player in self.players.iter_mut().filter(|p| p.alive) {
            player.bullets = max_bullets;
        }
        debug!("bullets refilled");
        self.broadcast(ServerEvent::UpdateBullets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GameTuning;
    use crate::domain::grid::Cell;
    use crate::use_cases::types::{Directive, Timer};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn game() -> Game {
        Game::with_rng(GameTuning::default(), StdRng::seed_from_u64(11))
    }

    fn events(game: &mut Game) -> Vec<ServerEvent> {
        game.drain_outbox()
            .into_iter()
            .filter_map(|d| match d {
                Directive::Broadcast(msg) => Some(msg.event),
                Directive::Direct { message, .. } => Some(message.event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn when_first_client_connects_then_it_becomes_host_with_corner_spawn() {
        let mut game = game();
        assert_eq!(game.connect(1001), Role::Host);
        assert_eq!(game.host_id(), Some(1001));

        let player = &game.players()[0];
        assert_eq!(player.name, "Player 1001");
        assert_eq!(player.head(), Some(Cell::new(5, 5)));
        assert_eq!(player.direction, Direction::Right);

        let sent = events(&mut game);
        assert!(matches!(sent[0], ServerEvent::Init { player_id: 1001, role: Role::Host, .. }));
        assert_eq!(sent[1], ServerEvent::UpdateLobby);
    }

    #[test]
    fn when_roster_is_full_then_new_clients_spectate() {
        let mut game = game();
        for id in 1..=4 {
            game.connect(id);
        }
        assert_eq!(game.connect(25), Role::Spectator);
        assert_eq!(game.players().len(), 4);
        assert_eq!(game.spectators[0].name, "Spectator 0025");
    }

    #[test]
    fn when_game_is_running_then_new_clients_spectate() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        assert_eq!(game.connect(3), Role::Spectator);
    }

    #[test]
    fn when_non_host_starts_game_then_nothing_happens() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.drain_outbox();
        game.handle_command(2, ClientCommand::StartGame);
        assert_eq!(game.phase(), Phase::Lobby);
        assert!(game.drain_outbox().is_empty());
    }

    #[test]
    fn when_host_starts_game_then_ticking_starts_and_players_respawn() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.drain_outbox();
        game.handle_command(1, ClientCommand::StartGame);

        assert_eq!(game.phase(), Phase::Running);
        assert_eq!(game.players()[1].head(), Some(Cell::new(20, 5)));
        let directives = game.drain_outbox();
        assert!(directives.iter().any(|d| matches!(d, Directive::StartTicking)));
        assert!(directives.iter().any(|d| matches!(
            d,
            Directive::Broadcast(msg) if msg.event == ServerEvent::StartGame
        )));
    }

    #[test]
    fn when_resuming_while_running_then_it_is_a_no_op() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        game.drain_outbox();

        game.handle_command(1, ClientCommand::ResumeGame);
        assert_eq!(game.phase(), Phase::Running);
        assert!(game.drain_outbox().is_empty());
    }

    #[test]
    fn when_paused_then_resume_restarts_ticking() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        game.handle_command(1, ClientCommand::PauseGame);
        assert_eq!(game.phase(), Phase::Paused);
        game.drain_outbox();

        game.handle_command(1, ClientCommand::ResumeGame);
        assert_eq!(game.phase(), Phase::Running);
        let directives = game.drain_outbox();
        assert!(directives.iter().any(|d| matches!(d, Directive::StartTicking)));
    }

    #[test]
    fn when_role_change_requested_mid_game_then_error_is_sent_directly() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        game.drain_outbox();

        game.handle_command(2, ClientCommand::SetRole(Role::Spectator));
        let directives = game.drain_outbox();
        assert_eq!(directives.len(), 1);
        assert!(matches!(
            &directives[0],
            Directive::Direct { conn_id: 2, message } if matches!(message.event, ServerEvent::Error { .. })
        ));
        assert_eq!(game.players().len(), 2);
    }

    #[test]
    fn when_host_switches_to_spectator_then_next_player_becomes_host() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::SetName("  Alice  ".to_string()));
        game.handle_command(1, ClientCommand::SetRole(Role::Spectator));

        assert_eq!(game.host_id(), Some(2));
        assert_eq!(game.spectators[0].name, "Alice");
        let sent = events(&mut game);
        assert!(sent.contains(&ServerEvent::RoleUpdate {
            role: Role::Spectator
        }));
    }

    #[test]
    fn when_spectator_becomes_player_without_host_then_it_takes_host() {
        let mut game = game();
        game.connect(1);
        game.handle_command(1, ClientCommand::SetRole(Role::Spectator));
        assert_eq!(game.host_id(), None);

        game.handle_command(1, ClientCommand::SetRole(Role::Player));
        assert_eq!(game.host_id(), Some(1));
        assert_eq!(game.players().len(), 1);
    }

    #[test]
    fn when_host_disconnects_mid_game_then_host_moves_and_game_pauses() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.connect(3);
        game.handle_command(1, ClientCommand::StartGame);

        game.disconnect(1);
        assert_eq!(game.host_id(), Some(2));
        assert_eq!(game.phase(), Phase::Paused);
    }

    #[test]
    fn when_last_player_leaves_then_host_clears_and_game_resets() {
        let mut game = game();
        game.connect(1);
        let generation = game.generation;
        game.disconnect(1);
        assert_eq!(game.host_id(), None);
        assert!(game.players().is_empty());
        assert_eq!(game.generation, generation + 1);
        assert_eq!(game.world.foods.len(), 3);
    }

    #[test]
    fn when_non_host_disconnects_mid_game_then_it_is_eliminated_before_removal() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.connect(3);
        game.handle_command(1, ClientCommand::StartGame);
        game.drain_outbox();

        game.disconnect(3);
        assert_eq!(game.players().len(), 2);
        assert_eq!(game.eliminated[&3].reason, "disconnected");
        assert_eq!(game.phase(), Phase::Running);
        let sent = events(&mut game);
        assert!(sent.iter().any(|e| matches!(
            e,
            ServerEvent::PlayerEliminated { eliminated_id: 3, .. }
        )));
    }

    #[test]
    fn when_second_to_last_player_disconnects_then_game_ends_with_winner() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        game.drain_outbox();

        game.disconnect(2);
        assert_eq!(game.phase(), Phase::GameOver);
        let directives = game.drain_outbox();
        assert!(directives.iter().any(|d| matches!(
            d,
            Directive::Schedule { timer, .. } if timer.timer == Timer::ResetToLobby
        )));
    }

    #[test]
    fn when_reverse_direction_is_requested_then_it_is_ignored() {
        let mut game = game();
        game.connect(1);
        game.handle_command(1, ClientCommand::Direction(Direction::Left));
        assert_eq!(game.players()[0].next_direction, Direction::Right);
        game.handle_command(1, ClientCommand::Direction(Direction::Up));
        assert_eq!(game.players()[0].next_direction, Direction::Up);
    }

    #[test]
    fn when_shooting_outside_a_running_game_then_no_bullet_is_fired() {
        let mut game = game();
        game.connect(1);
        game.handle_command(1, ClientCommand::Shoot);
        assert_eq!(game.players()[0].bullets, 3);
        assert!(game.players()[0].active_bullets.is_empty());
    }

    #[test]
    fn when_shooting_with_empty_magazine_then_nothing_happens() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        for _ in 0..5 {
            game.handle_command(1, ClientCommand::Shoot);
        }
        assert_eq!(game.players()[0].bullets, 0);
        assert_eq!(game.players()[0].active_bullets.len(), 3);
    }

    #[test]
    fn when_color_is_set_then_tail_is_lightened_and_broadcast() {
        let mut game = game();
        game.connect(1);
        game.drain_outbox();
        game.handle_command(1, ClientCommand::SetColor("#000000".to_string()));
        assert_eq!(game.players()[0].tail_color, "#333333");
        let sent = events(&mut game);
        assert_eq!(
            sent,
            vec![ServerEvent::ColorUpdated {
                player_id: 1,
                color: "#000000".to_string()
            }]
        );
    }

    #[test]
    fn when_chatting_then_message_is_truncated_and_sender_defaults_to_name() {
        let mut game = game();
        game.connect(1);
        game.drain_outbox();
        let long = "x".repeat(150);
        game.handle_command(
            1,
            ClientCommand::Chat {
                message: long,
                sender: None,
            },
        );
        let sent = events(&mut game);
        match &sent[0] {
            ServerEvent::ChatMessage { sender, message } => {
                assert_eq!(sender, "Player 0001");
                assert_eq!(message.chars().count(), 100);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn when_refilling_during_a_game_then_living_players_get_full_magazines() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        game.handle_command(1, ClientCommand::Shoot);
        game.handle_command(2, ClientCommand::Shoot);
        game.refill_bullets();
        assert!(game.players().iter().all(|p| p.bullets == 3));
    }

    #[test]
    fn when_eliminated_player_rejoins_during_pause_then_it_stays_out_of_play() {
        let mut game = game();
        for id in 1..=3 {
            game.connect(id);
        }
        game.handle_command(1, ClientCommand::StartGame);
        game.eliminate(3, "hit the wall");
        game.handle_command(1, ClientCommand::PauseGame);
        game.handle_command(3, ClientCommand::SetRole(Role::Spectator));
        game.handle_command(3, ClientCommand::SetRole(Role::Player));

        let rejoined = game.player(3).expect("back on the roster");
        assert!(!rejoined.alive);
        assert!(rejoined.body.is_empty());
        assert!(game.eliminated.contains_key(&3));

        game.handle_command(1, ClientCommand::ResumeGame);
        game.tick();
        let rejoined = game.player(3).expect("still on the roster");
        assert!(!rejoined.alive);
        assert!(rejoined.body.is_empty());
        assert_eq!(game.phase(), Phase::Running);
    }

    #[test]
    fn when_joining_a_paused_game_then_spawn_avoids_living_bodies() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        game.handle_command(1, ClientCommand::PauseGame);
        // Player 1 has wandered onto the third corner.
        game.players[0].body = [(20, 20), (21, 20), (22, 20)]
            .into_iter()
            .map(|(x, y)| Cell::new(x, y))
            .collect();

        assert_eq!(game.connect(3), Role::Player);
        let joined = game.player(3).expect("joined");
        assert_eq!(joined.head(), Some(Cell::new(5, 20)));
        assert_eq!(joined.direction, Direction::Up);
    }

    #[test]
    fn when_every_corner_is_occupied_then_newcomer_spectates() {
        let mut game = game();
        game.connect(1);
        game.connect(2);
        game.handle_command(1, ClientCommand::StartGame);
        game.handle_command(1, ClientCommand::PauseGame);
        game.players[0].body = [Cell::new(20, 20), Cell::new(5, 20)].into_iter().collect();
        game.players[1].body = [Cell::new(20, 5), Cell::new(5, 5)].into_iter().collect();

        assert_eq!(game.connect(3), Role::Spectator);
        assert_eq!(game.players().len(), 2);
        assert_eq!(game.spectators[0].id, 3);
    }
}
