// Timed powerup effects and bombs, driven by generation-tagged timers.

use crate::domain::state::{ActiveEffect, Bomb, EffectDetail, EffectKind, Phase, PowerupKind};
use crate::domain::systems::bomb::blast_hits;
use crate::use_cases::engine::{Game, now_millis};
use crate::use_cases::types::{BombHitReport, ScheduledTimer, ServerEvent, Timer};
use tracing::{debug, info};

impl Game {
    /// Installs the effect of a picked-up powerup for `players[idx]`.
    pub(crate) fn activate_powerup(&mut self, idx: usize, kind: PowerupKind) {
        let Some(activator) = self.players.get(idx) else {
            return;
        };
        let activator_id = activator.id;
        let name = activator.name.clone();
        info!(player_id = activator_id, powerup = kind.id(), "powerup activated");

        let Some(effect_kind) = kind.effect_kind() else {
            self.plant_bomb(idx);
            return;
        };

        let token = self.next_token();
        let duration = self.tuning.powerup.duration_of(kind);
        let started_at = now_millis();

        if effect_kind == EffectKind::Frozen {
            let effect = ActiveEffect {
                token,
                started_at,
                duration,
                detail: EffectDetail::FrozenBy { activator_id },
            };
            for player in self
                .players
                .iter_mut()
                .filter(|p| p.id != activator_id && p.alive)
            {
                player.effects.frozen = Some(effect.clone());
            }
            self.broadcast(ServerEvent::PowerupActivated {
                kind,
                activator_id,
                message: format!("{name} froze all opponents!"),
            });
            self.schedule(duration, Timer::FreezeExpired { token });
            return;
        }

        let detail = match effect_kind {
            EffectKind::Magnet => EffectDetail::Magnet {
                radius: self.tuning.powerup.magnet_radius,
            },
            _ => EffectDetail::Plain,
        };
        *self.players[idx].effects.slot_mut(effect_kind) = Some(ActiveEffect {
            token,
            started_at,
            duration,
            detail,
        });

        let message = match effect_kind {
            EffectKind::SpeedBoost => format!("{name} got a speed boost!"),
            EffectKind::Shield => format!("{name} activated a shield!"),
            _ => format!("{name} activated a food magnet!"),
        };
        self.broadcast(ServerEvent::PowerupActivated {
            kind,
            activator_id,
            message,
        });
        self.schedule(
            duration,
            Timer::EffectExpired {
                player_id: activator_id,
                kind: effect_kind,
                token,
            },
        );
    }

    fn plant_bomb(&mut self, idx: usize) {
        let Some(player) = self.players.get(idx) else {
            return;
        };
        let Some(pos) = player.head() else {
            return;
        };
        let owner_id = player.id;
        let name = player.name.clone();
        let tuning = self.tuning.powerup;
        let step_ms = tuning.bomb_countdown_step.as_millis().max(1);
        let countdown = (tuning.bomb_fuse.as_millis() / step_ms) as u32;

        let bomb = Bomb {
            id: self.next_bomb_id(),
            pos,
            owner_id,
            planted_at: now_millis(),
            fuse: tuning.bomb_fuse,
            blast_radius: tuning.bomb_blast_radius,
            countdown,
        };
        let bomb_id = bomb.id;
        self.world.bombs.push(bomb.clone());
        self.broadcast(ServerEvent::BombPlanted {
            bomb,
            message: format!("{name} planted a bomb!"),
        });
        self.schedule(tuning.bomb_countdown_step, Timer::BombCountdown { bomb_id });
        self.schedule(tuning.bomb_fuse, Timer::BombDetonate { bomb_id });
    }

    /// Runs a fired timer unless it belongs to an earlier game generation.
    pub fn handle_timer(&mut self, scheduled: ScheduledTimer) {
        if scheduled.generation != self.generation {
            debug!(timer = ?scheduled.timer, "stale timer ignored");
            return;
        }
        match scheduled.timer {
            Timer::EffectExpired {
                player_id,
                kind,
                token,
            } => self.expire_effect(player_id, kind, token),
            Timer::FreezeExpired { token } => self.expire_freeze(token),
            Timer::BombCountdown { bomb_id } => self.bomb_countdown(bomb_id),
            Timer::BombDetonate { bomb_id } => self.detonate_bomb(bomb_id),
            Timer::ResetToLobby => {
                if self.phase == Phase::GameOver {
                    self.reset();
                    self.broadcast(ServerEvent::UpdateLobby);
                }
            }
        }
    }

    fn expire_effect(&mut self, player_id: u64, kind: EffectKind, token: u64) {
        let Some(player) = self.player_mut(player_id) else {
            return;
        };
        if !player.effects.expire(kind, token) {
            return;
        }
        let name = player.name.clone();
        let message = match kind {
            EffectKind::SpeedBoost => format!("{name}'s speed boost ended!"),
            EffectKind::Shield => format!("{name}'s shield expired!"),
            EffectKind::Magnet => format!("{name}'s magnet deactivated!"),
            EffectKind::Frozen => "Players unfrozen!".to_string(),
        };
        self.broadcast(ServerEvent::PowerupExpired {
            kind: kind.powerup(),
            player_id: Some(player_id),
            message,
        });
    }

    fn expire_freeze(&mut self, token: u64) {
        let mut thawed = 0;
        for player in &mut self.players {
            if player.effects.expire(EffectKind::Frozen, token) {
                thawed += 1;
            }
        }
        if thawed == 0 {
            return;
        }
        self.broadcast(ServerEvent::PowerupExpired {
            kind: PowerupKind::Freeze,
            player_id: None,
            message: "Players unfrozen!".to_string(),
        });
    }

    fn bomb_countdown(&mut self, bomb_id: u64) {
        let Some(bomb) = self.world.bombs.iter_mut().find(|b| b.id == bomb_id) else {
            return;
        };
        bomb.countdown = bomb.countdown.saturating_sub(1);
        let countdown = bomb.countdown;
        self.broadcast(ServerEvent::BombCountdown { bomb_id, countdown });
        if countdown > 0 {
            self.schedule(
                self.tuning.powerup.bomb_countdown_step,
                Timer::BombCountdown { bomb_id },
            );
        }
    }

    fn detonate_bomb(&mut self, bomb_id: u64) {
        let Some(pos) = self.world.bombs.iter().position(|b| b.id == bomb_id) else {
            return;
        };
        let bomb = self.world.bombs.remove(pos);
        if !matches!(self.phase, Phase::Running | Phase::Paused) {
            debug!(bomb_id, "bomb fizzled outside of a game");
            return;
        }

        let hits = blast_hits(&bomb, &self.players);
        let owner_name = self
            .player(bomb.owner_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Someone".to_string());
        let combat = self.tuning.combat;
        let mut just_eliminated = Vec::new();

        for hit in hits.iter().filter(|h| h.is_head()) {
            if hit.player_id != bomb.owner_id {
                if let Some(owner) = self.player_mut(bomb.owner_id) {
                    owner.score += combat.bomb_kill_bonus;
                }
            }
            let reason = format!("was blown up by {owner_name}'s bomb");
            if self.eliminate(hit.player_id, &reason) {
                return;
            }
            just_eliminated.push(hit.player_id);
        }

        for hit in hits.iter().filter(|h| !h.is_head()) {
            if just_eliminated.contains(&hit.player_id) {
                continue;
            }
            let Some(target) = self.player_mut(hit.player_id) else {
                continue;
            };
            target.body.truncate(hit.segment);
            let remaining = target.body.len();
            if hit.player_id != bomb.owner_id {
                if let Some(owner) = self.player_mut(bomb.owner_id) {
                    owner.score += combat.bomb_body_bonus;
                }
            }
            if remaining <= 1 {
                let reason = format!("was reduced to nothing by {owner_name}'s bomb");
                if self.eliminate(hit.player_id, &reason) {
                    return;
                }
                just_eliminated.push(hit.player_id);
            }
        }

        info!(bomb_id, hits = hits.len(), "bomb exploded");
        self.broadcast(ServerEvent::BombExploded {
            pos: bomb.pos,
            radius: bomb.blast_radius,
            players_hit: hits
                .iter()
                .map(|h| BombHitReport {
                    player_id: h.player_id,
                    is_head: h.is_head(),
                })
                .collect(),
            just_eliminated,
            message: "Bomb exploded!".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::{Cell, Direction};
    use crate::domain::tuning::GameTuning;
    use crate::use_cases::types::{ClientCommand, Directive};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn running_game(players: u64) -> Game {
        let mut tuning = GameTuning::default();
        tuning.powerup.spawn_chance = 0.0;
        let mut game = Game::with_rng(tuning, StdRng::seed_from_u64(21));
        for id in 1..=players {
            game.connect(id);
        }
        game.handle_command(1, ClientCommand::StartGame);
        game.drain_outbox();
        game
    }

    fn scheduled(game: &mut Game) -> Vec<ScheduledTimer> {
        game.drain_outbox()
            .into_iter()
            .filter_map(|d| match d {
                Directive::Schedule { timer, .. } => Some(timer),
                _ => None,
            })
            .collect()
    }

    fn broadcasts(game: &mut Game) -> Vec<ServerEvent> {
        game.drain_outbox()
            .into_iter()
            .filter_map(|d| match d {
                Directive::Broadcast(msg) => Some(msg.event),
                _ => None,
            })
            .collect()
    }

    fn set_body(game: &mut Game, id: u64, cells: &[(i32, i32)]) {
        let idx = game.player_index(id).expect("player");
        game.players[idx].body = cells.iter().map(|(x, y)| Cell::new(*x, *y)).collect();
    }

    fn plant_test_bomb(game: &mut Game, owner_id: u64, x: i32, y: i32) -> ScheduledTimer {
        let tuning = game.tuning.powerup;
        game.world.bombs.push(Bomb {
            id: 77,
            pos: Cell::new(x, y),
            owner_id,
            planted_at: 0,
            fuse: tuning.bomb_fuse,
            blast_radius: tuning.bomb_blast_radius,
            countdown: 3,
        });
        ScheduledTimer {
            generation: game.generation,
            timer: Timer::BombDetonate { bomb_id: 77 },
        }
    }

    #[test]
    fn when_shield_timer_fires_then_shield_is_removed_and_announced() {
        let mut game = running_game(2);
        game.activate_powerup(0, PowerupKind::Shield);
        assert!(game.players[0].effects.is_shielded());
        let timers = scheduled(&mut game);
        assert_eq!(timers.len(), 1);

        game.handle_timer(timers[0]);
        assert!(!game.players[0].effects.is_shielded());
        let sent = broadcasts(&mut game);
        assert!(sent.contains(&ServerEvent::PowerupExpired {
            kind: PowerupKind::Shield,
            player_id: Some(1),
            message: "Player 0001's shield expired!".to_string(),
        }));
    }

    #[test]
    fn when_effect_was_reactivated_then_old_expiry_is_a_no_op() {
        let mut game = running_game(2);
        game.activate_powerup(0, PowerupKind::Speed);
        let first = scheduled(&mut game)[0];
        game.activate_powerup(0, PowerupKind::Speed);
        let second = scheduled(&mut game)[0];

        game.handle_timer(first);
        assert!(game.players[0].effects.speed_boost.is_some());
        assert!(broadcasts(&mut game).is_empty());

        game.handle_timer(second);
        assert!(game.players[0].effects.speed_boost.is_none());
    }

    #[test]
    fn when_expiring_an_already_removed_effect_then_nothing_happens() {
        let mut game = running_game(2);
        game.activate_powerup(0, PowerupKind::Magnet);
        assert_eq!(game.players[0].effects.magnet_radius(), Some(5));
        let timer = scheduled(&mut game)[0];

        game.handle_timer(timer);
        game.drain_outbox();
        game.handle_timer(timer);
        assert!(game.drain_outbox().is_empty());
    }

    #[test]
    fn when_freeze_is_picked_up_then_opponents_freeze_until_expiry() {
        let mut game = running_game(3);
        game.activate_powerup(0, PowerupKind::Freeze);
        assert!(!game.players[0].effects.is_frozen());
        assert!(game.players[1].effects.is_frozen());
        assert!(game.players[2].effects.is_frozen());
        let timer = scheduled(&mut game)[0];

        game.handle_command(2, ClientCommand::Direction(Direction::Left));
        assert_eq!(game.players[1].next_direction, Direction::Down);
        let before = game.players[1].body.clone();
        game.tick();
        assert_eq!(game.players[1].body, before);
        game.drain_outbox();

        game.handle_timer(timer);
        assert!(game.players.iter().all(|p| !p.effects.is_frozen()));
        assert!(broadcasts(&mut game).iter().any(|e| matches!(
            e,
            ServerEvent::PowerupExpired { kind: PowerupKind::Freeze, player_id: None, .. }
        )));
    }

    #[test]
    fn when_bomb_is_picked_up_then_it_is_planted_with_countdown_timers() {
        let mut game = running_game(2);
        game.activate_powerup(0, PowerupKind::Bomb);
        assert_eq!(game.world.bombs.len(), 1);
        let bomb = game.world.bombs[0].clone();
        assert_eq!(bomb.pos, Cell::new(5, 5));
        assert_eq!(bomb.countdown, 3);
        let timers = scheduled(&mut game);
        assert_eq!(timers.len(), 2);

        let countdown = timers
            .into_iter()
            .find(|t| matches!(t.timer, Timer::BombCountdown { .. }))
            .expect("countdown timer");
        game.handle_timer(countdown);
        assert_eq!(game.world.bombs[0].countdown, 2);
        let directives = game.drain_outbox();
        assert!(directives.iter().any(|d| matches!(
            d,
            Directive::Broadcast(msg) if msg.event == ServerEvent::BombCountdown { bomb_id: bomb.id, countdown: 2 }
        )));
        assert!(directives.iter().any(|d| matches!(d, Directive::Schedule { .. })));
    }

    #[test]
    fn when_bomb_blast_reaches_body_then_target_is_truncated_and_owner_scores() {
        let mut game = running_game(3);
        set_body(&mut game, 2, &[(15, 10), (14, 10), (13, 10), (12, 10)]);
        let timer = plant_test_bomb(&mut game, 1, 10, 10);

        game.handle_timer(timer);
        let target = &game.players[1];
        assert_eq!(
            Vec::from(target.body.clone()),
            vec![Cell::new(15, 10), Cell::new(14, 10)]
        );
        assert!(target.alive);
        assert_eq!(game.players[0].score, 3);
        assert!(game.world.bombs.is_empty());
    }

    #[test]
    fn when_bomb_leaves_one_segment_then_target_is_eliminated() {
        let mut game = running_game(3);
        set_body(&mut game, 2, &[(14, 10), (13, 10), (12, 10)]);
        let timer = plant_test_bomb(&mut game, 1, 10, 10);

        game.handle_timer(timer);
        assert_eq!(
            game.eliminated[&2].reason,
            "was reduced to nothing by Player 0001's bomb"
        );
        assert_eq!(game.players[0].score, 3);
        let sent = broadcasts(&mut game);
        assert!(sent.iter().any(|e| matches!(
            e,
            ServerEvent::BombExploded { just_eliminated, .. } if just_eliminated == &vec![2]
        )));
    }

    #[test]
    fn when_bomb_blast_reaches_head_then_owner_gets_kill_bonus() {
        let mut game = running_game(3);
        set_body(&mut game, 2, &[(12, 10), (13, 10), (14, 10)]);
        let timer = plant_test_bomb(&mut game, 1, 10, 10);

        game.handle_timer(timer);
        assert_eq!(game.eliminated[&2].reason, "was blown up by Player 0001's bomb");
        assert_eq!(game.players[0].score, 10);
    }

    #[test]
    fn when_target_is_shielded_then_bomb_leaves_it_untouched() {
        let mut game = running_game(3);
        set_body(&mut game, 2, &[(12, 10), (13, 10), (14, 10)]);
        game.activate_powerup(1, PowerupKind::Shield);
        game.drain_outbox();
        let timer = plant_test_bomb(&mut game, 1, 10, 10);

        game.handle_timer(timer);
        assert!(game.players[1].alive);
        assert_eq!(game.players[1].body.len(), 3);
    }

    #[test]
    fn when_owner_is_caught_in_own_blast_then_no_bonus_is_awarded() {
        let mut game = running_game(3);
        set_body(&mut game, 1, &[(10, 11), (10, 12), (10, 13)]);
        let timer = plant_test_bomb(&mut game, 1, 10, 10);

        game.handle_timer(timer);
        assert_eq!(game.eliminated[&1].reason, "was blown up by Player 0001's bomb");
        assert_eq!(game.eliminated[&1].score, 0);
    }

    #[test]
    fn when_bomb_detonates_after_game_over_then_it_deals_no_damage() {
        let mut game = running_game(2);
        set_body(&mut game, 2, &[(12, 10), (13, 10), (14, 10)]);
        let timer = plant_test_bomb(&mut game, 1, 10, 10);
        game.game_over("test".to_string(), None);

        game.handle_timer(timer);
        assert!(game.players[1].alive);
        assert!(game.world.bombs.is_empty());
    }

    #[test]
    fn when_game_over_delay_elapses_then_lobby_is_restored_with_zeroed_scores() {
        let mut game = running_game(2);
        game.players[0].score = 12;
        game.players[1].score = 4;
        assert!(game.eliminate(2, "hit the wall"));
        assert_eq!(game.phase(), Phase::GameOver);
        let reset = scheduled(&mut game)
            .into_iter()
            .find(|t| t.timer == Timer::ResetToLobby)
            .expect("reset timer");

        game.handle_timer(reset);
        assert_eq!(game.phase(), Phase::Lobby);
        assert!(game.players.iter().all(|p| p.score == 0 && p.alive));
        assert!(game.eliminated.is_empty());
        assert_eq!(game.world.foods.len(), 3);
        assert!(broadcasts(&mut game).contains(&ServerEvent::UpdateLobby));
    }

    #[test]
    fn when_timer_is_from_an_earlier_generation_then_it_is_ignored() {
        let mut game = running_game(2);
        assert!(game.eliminate(2, "hit the wall"));
        let reset = scheduled(&mut game)
            .into_iter()
            .find(|t| t.timer == Timer::ResetToLobby)
            .expect("reset timer");

        // Host restarts before the delayed reset fires.
        game.handle_command(1, ClientCommand::StartGame);
        assert_eq!(game.phase(), Phase::Running);
        game.drain_outbox();

        game.handle_timer(reset);
        assert_eq!(game.phase(), Phase::Running);
        assert!(game.drain_outbox().is_empty());
    }
}
