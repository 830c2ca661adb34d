use crate::domain::grid::{Bounds, Cell};
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct MagnetConfig {
    pub radius: i32,
    pub pull_chance: f64,
    pub bounds: Bounds,
}

/// Nudges every item strictly inside the radius one cell toward `head`, per axis.
pub fn pull_toward<'a, R: Rng>(
    head: Cell,
    items: impl Iterator<Item = &'a mut Cell>,
    cfg: MagnetConfig,
    rng: &mut R,
) {
    for pos in items {
        let distance = pos.distance_to(head);
        if distance == 0.0 || distance >= f64::from(cfg.radius) {
            continue;
        }
        if !rng.random_bool(cfg.pull_chance.clamp(0.0, 1.0)) {
            continue;
        }

        let moved_x = Cell::new(pos.x + (head.x - pos.x).signum(), pos.y);
        if cfg.bounds.contains(moved_x) {
            pos.x = moved_x.x;
        }
        let moved_y = Cell::new(pos.x, pos.y + (head.y - pos.y).signum());
        if cfg.bounds.contains(moved_y) {
            pos.y = moved_y.y;
        }
    }
}
