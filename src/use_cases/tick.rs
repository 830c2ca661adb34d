// One fixed-period simulation step: movement, collisions, consumption, bullets.

use crate::domain::grid::Cell;
use crate::domain::state::{Bullet, Phase};
use crate::domain::systems::magnet::{self, MagnetConfig};
use crate::domain::systems::movement::{self, Collision};
use crate::domain::systems::projectiles;
use crate::use_cases::engine::{Game, now_millis};
use crate::use_cases::types::ServerEvent;
use rand::seq::IndexedRandom;
use tracing::debug;

/// Whether tick processing may continue after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickFlow {
    Continue,
    GameEnded,
}

// Board food is replaced after eating; remaining-food is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meal {
    Nothing,
    BoardFood,
    Remains,
}

enum BulletFate {
    Flying,
    Spent,
    GameEnded,
}

impl Game {
    /// Advances the world by one tick. Ignored unless the game is Running.
    pub fn tick(&mut self) {
        if self.phase != Phase::Running {
            return;
        }

        let mut just_eliminated = Vec::new();
        self.try_spawn_powerup();

        for idx in 0..self.players.len() {
            if self.advance_player(idx, &mut just_eliminated) == TickFlow::GameEnded {
                return;
            }
        }
        if self.resolve_bullets(&mut just_eliminated) == TickFlow::GameEnded {
            return;
        }

        self.world.advance_pulses();
        self.broadcast(ServerEvent::Update { just_eliminated });
    }

    fn try_spawn_powerup(&mut self) {
        let bodies = self.living_bodies();
        let spawned = self.world.try_spawn_powerup(
            &mut self.rng,
            &bodies,
            &self.tuning.powerup,
            now_millis(),
        );
        if let Some(kind) = spawned {
            debug!(kind = kind.id(), "powerup spawned");
            self.broadcast(ServerEvent::PowerupSpawned);
        }
    }

    fn eliminate_in_tick(&mut self, id: u64, reason: &str, just: &mut Vec<u64>) -> TickFlow {
        if self.eliminate(id, reason) {
            TickFlow::GameEnded
        } else {
            just.push(id);
            TickFlow::Continue
        }
    }

    fn advance_player(&mut self, idx: usize, just_eliminated: &mut Vec<u64>) -> TickFlow {
        let player = &self.players[idx];
        if !player.alive || player.effects.is_frozen() || player.body.is_empty() {
            return TickFlow::Continue;
        }
        let id = player.id;
        let sub_steps = if player.effects.speed_boost.is_some() { 2 } else { 1 };
        let bounds = self.world.bounds;

        for step in 0..sub_steps {
            if step == 0 {
                let player = &mut self.players[idx];
                player.direction = player.next_direction;
            }
            let Some(head) = self.players[idx].head() else {
                return TickFlow::Continue;
            };
            let mut candidate = head.step(self.players[idx].direction);

            if let Some(collision) =
                movement::detect_collision(&self.players, idx, candidate, bounds)
            {
                // A shield turns any lethal move into a halt for the rest of the tick.
                if self.players[idx].effects.is_shielded() {
                    return TickFlow::Continue;
                }
                if collision != Collision::Opponent {
                    return self.eliminate_in_tick(id, collision.reason(), just_eliminated);
                }

                let options = movement::reroute_options(&self.players, idx, bounds);
                let Some(&direction) = options.choose(&mut self.rng) else {
                    return self.eliminate_in_tick(id, collision.reason(), just_eliminated);
                };
                let player = &mut self.players[idx];
                player.direction = direction;
                player.next_direction = direction;
                candidate = head.step(direction);
            }

            // Pickups resolve against the pre-move body, so a bomb lands on the old head.
            let meal = self.consume_food_at(idx, candidate);
            self.consume_powerup_at(idx, candidate);

            let player = &mut self.players[idx];
            player.body.push_front(candidate);
            if meal == Meal::Nothing {
                player.body.pop_back();
            }
            if meal == Meal::BoardFood {
                self.spawn_food();
            }
        }

        self.apply_magnet(idx);
        TickFlow::Continue
    }

    fn consume_food_at(&mut self, idx: usize, cell: Cell) -> Meal {
        if let Some(pos) = self.world.foods.iter().rposition(|f| f.pos == cell) {
            let food = self.world.foods.remove(pos);
            self.players[idx].score += food.tier.value();
            return Meal::BoardFood;
        }
        if let Some(pos) = self.world.remaining_food.iter().rposition(|f| f.pos == cell) {
            let food = self.world.remaining_food.remove(pos);
            self.players[idx].score += food.value;
            return Meal::Remains;
        }
        Meal::Nothing
    }

    fn consume_powerup_at(&mut self, idx: usize, cell: Cell) {
        let Some(pos) = self.world.powerups.iter().rposition(|p| p.pos == cell) else {
            return;
        };
        let powerup = self.world.powerups.remove(pos);
        self.players[idx].score += self.tuning.combat.powerup_bonus;
        self.activate_powerup(idx, powerup.kind);
    }

    fn apply_magnet(&mut self, idx: usize) {
        let player = &self.players[idx];
        let (Some(radius), Some(head)) = (player.effects.magnet_radius(), player.head()) else {
            return;
        };
        let cfg = MagnetConfig {
            radius,
            pull_chance: self.tuning.powerup.magnet_pull_chance,
            bounds: self.world.bounds,
        };
        let items = self
            .world
            .foods
            .iter_mut()
            .map(|f| &mut f.pos)
            .chain(self.world.remaining_food.iter_mut().map(|f| &mut f.pos));
        magnet::pull_toward(head, items, cfg, &mut self.rng);
    }

    fn resolve_bullets(&mut self, just_eliminated: &mut Vec<u64>) -> TickFlow {
        for shooter_idx in 0..self.players.len() {
            if !self.players[shooter_idx].alive {
                continue;
            }
            let bullets = std::mem::take(&mut self.players[shooter_idx].active_bullets);
            let mut in_flight = Vec::with_capacity(bullets.len());
            let mut ended = false;

            for mut bullet in bullets {
                if ended {
                    in_flight.push(bullet);
                    continue;
                }
                match self.advance_bullet(shooter_idx, &mut bullet, just_eliminated) {
                    BulletFate::Flying => in_flight.push(bullet),
                    BulletFate::Spent => {}
                    BulletFate::GameEnded => ended = true,
                }
            }

            self.players[shooter_idx].active_bullets = in_flight;
            if ended {
                return TickFlow::GameEnded;
            }
        }
        TickFlow::Continue
    }

    fn advance_bullet(
        &mut self,
        shooter_idx: usize,
        bullet: &mut Bullet,
        just_eliminated: &mut Vec<u64>,
    ) -> BulletFate {
        let combat = self.tuning.combat;
        for _ in 0..combat.bullet_speed {
            bullet.pos = bullet.pos.step(bullet.direction);
            if !self.world.bounds.contains(bullet.pos) {
                return BulletFate::Spent;
            }
            let Some(hit) = projectiles::find_hit(&self.players, bullet.owner_id, bullet.pos)
            else {
                continue;
            };

            let target = &self.players[hit.target];
            if target.effects.is_shielded() {
                return BulletFate::Spent;
            }
            let target_id = target.id;
            let shooter_name = self.players[shooter_idx].name.clone();

            let reason = if hit.is_head() {
                self.players[shooter_idx].score += combat.head_shot_bonus;
                format!("was shot in the head by {shooter_name}")
            } else {
                self.players[shooter_idx].score += combat.body_shot_bonus;
                let target = &mut self.players[hit.target];
                target.body.truncate(hit.segment);
                if target.body.len() > 1 {
                    return BulletFate::Spent;
                }
                format!("was reduced to nothing by {shooter_name}")
            };

            return match self.eliminate_in_tick(target_id, &reason, just_eliminated) {
                TickFlow::GameEnded => BulletFate::GameEnded,
                TickFlow::Continue => BulletFate::Spent,
            };
        }
        BulletFate::Flying
    }
}
