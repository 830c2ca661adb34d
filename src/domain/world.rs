// Board contents (food, remaining-food, powerups, bombs) and spawn placement rules.

use crate::domain::grid::{Bounds, Cell};
use crate::domain::state::{Bomb, Food, FoodTier, Powerup, PowerupKind, RemainingFood, Pulse};
use crate::domain::tuning::{BoardTuning, PowerupTuning};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;

const FOOD_PULSE_PERIOD: f64 = 0.3;
const FOOD_PULSE_PEAK: f64 = 0.15;
const POWERUP_PULSE_PERIOD: f64 = 0.5;
const POWERUP_PULSE_PEAK: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct World {
    pub bounds: Bounds,
    pub foods: Vec<Food>,
    pub remaining_food: Vec<RemainingFood>,
    pub powerups: Vec<Powerup>,
    pub bombs: Vec<Bomb>,
}

impl World {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            foods: Vec::new(),
            remaining_food: Vec::new(),
            powerups: Vec::new(),
            bombs: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.foods.clear();
        self.remaining_food.clear();
        self.powerups.clear();
        self.bombs.clear();
    }

    /// True when a pickup, remaining-food or bomb already sits on `cell`.
    pub fn has_item_at(&self, cell: Cell) -> bool {
        self.foods.iter().any(|f| f.pos == cell)
            || self.remaining_food.iter().any(|f| f.pos == cell)
            || self.powerups.iter().any(|p| p.pos == cell)
            || self.bombs.iter().any(|b| b.pos == cell)
    }

    fn is_free(&self, cell: Cell, bodies: &HashSet<Cell>) -> bool {
        !bodies.contains(&cell) && !self.has_item_at(cell)
    }

    /// Places one food item on a free cell. `bodies` holds every living snake cell.
    ///
    /// Returns false when the board has no free cell left.
    pub fn spawn_food<R: Rng>(
        &mut self,
        rng: &mut R,
        bodies: &HashSet<Cell>,
        tuning: &BoardTuning,
    ) -> bool {
        let Some(pos) = self.sample_free_cell(rng, bodies, tuning.food_spawn_attempts) else {
            return false;
        };
        let tier = FoodTier::from_roll(rng.random::<f64>());
        self.foods.push(Food {
            pos,
            tier,
            pulse: Pulse::new(),
        });
        true
    }

    // Rejection sampling first; a dense board falls back to picking among the free cells.
    fn sample_free_cell<R: Rng>(
        &self,
        rng: &mut R,
        bodies: &HashSet<Cell>,
        attempts: usize,
    ) -> Option<Cell> {
        for _ in 0..attempts {
            let cell = self.random_cell(rng);
            if self.is_free(cell, bodies) {
                return Some(cell);
            }
        }

        let free: Vec<Cell> = self
            .bounds
            .cells()
            .filter(|cell| self.is_free(*cell, bodies))
            .collect();
        free.choose(rng).copied()
    }

    /// One powerup spawn attempt for the current tick.
    ///
    /// Skips silently when the board is at capacity, the roll fails, or no free cell is
    /// found within the attempt budget.
    pub fn try_spawn_powerup<R: Rng>(
        &mut self,
        rng: &mut R,
        bodies: &HashSet<Cell>,
        tuning: &PowerupTuning,
        now: u64,
    ) -> Option<PowerupKind> {
        if self.powerups.len() >= tuning.max_active {
            return None;
        }
        if rng.random::<f64>() > tuning.spawn_chance {
            return None;
        }

        let pos = (0..tuning.spawn_attempts)
            .map(|_| self.random_cell(rng))
            .find(|cell| self.is_free(*cell, bodies))?;

        let kind = PowerupKind::from_roll(rng.random::<f64>());
        self.powerups.push(Powerup {
            pos,
            kind,
            spawned_at: now,
            pulse: Pulse::new(),
        });
        Some(kind)
    }

    pub fn advance_pulses(&mut self) {
        for food in &mut self.foods {
            food.pulse.advance(FOOD_PULSE_PERIOD, FOOD_PULSE_PEAK);
        }
        for powerup in &mut self.powerups {
            powerup.pulse.advance(POWERUP_PULSE_PERIOD, POWERUP_PULSE_PEAK);
        }
    }

    fn random_cell<R: Rng>(&self, rng: &mut R) -> Cell {
        Cell::new(
            rng.random_range(0..self.bounds.size),
            rng.random_range(0..self.bounds.size),
        )
    }
}
