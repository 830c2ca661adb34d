use crate::domain::grid::Cell;
use crate::domain::state::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulletHit {
    pub target: usize,
    pub segment: usize,
}

impl BulletHit {
    pub fn is_head(&self) -> bool {
        self.segment == 0
    }
}

/// First living non-owner segment on `pos`, scanning players in registry order.
pub fn find_hit(players: &[Player], owner_id: u64, pos: Cell) -> Option<BulletHit> {
    players
        .iter()
        .enumerate()
        .filter(|(_, target)| target.id != owner_id && target.alive)
        .find_map(|(target, player)| {
            player
                .body
                .iter()
                .position(|segment| *segment == pos)
                .map(|segment| BulletHit { target, segment })
        })
}
