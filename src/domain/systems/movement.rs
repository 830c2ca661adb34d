use crate::domain::grid::{Bounds, Cell, Direction};
use crate::domain::state::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    Wall,
    SelfHit,
    Opponent,
}

impl Collision {
    pub fn reason(self) -> &'static str {
        match self {
            Collision::Wall => "hit the wall",
            Collision::SelfHit => "hit itself",
            Collision::Opponent => "got trapped",
        }
    }
}

/// Classifies moving `players[mover]` onto `candidate`, in wall / self / opponent order.
pub fn detect_collision(
    players: &[Player],
    mover: usize,
    candidate: Cell,
    bounds: Bounds,
) -> Option<Collision> {
    if !bounds.contains(candidate) {
        return Some(Collision::Wall);
    }

    let me = &players[mover];
    if me.body.iter().skip(1).any(|segment| *segment == candidate) {
        return Some(Collision::SelfHit);
    }

    let hits_opponent = players
        .iter()
        .enumerate()
        .any(|(idx, other)| idx != mover && other.alive && other.occupies(candidate));
    if hits_opponent {
        return Some(Collision::Opponent);
    }

    None
}

/// Non-reversing directions whose next cell is in bounds and clear of every living body.
pub fn reroute_options(players: &[Player], mover: usize, bounds: Bounds) -> Vec<Direction> {
    let me = &players[mover];
    let Some(head) = me.head() else {
        return Vec::new();
    };

    Direction::ALL
        .into_iter()
        .filter(|dir| !dir.is_reverse_of(me.direction))
        .filter(|dir| {
            let cell = head.step(*dir);
            bounds.contains(cell) && !players.iter().any(|p| p.alive && p.occupies(cell))
        })
        .collect()
}
