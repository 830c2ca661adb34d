use crate::domain::state::{Bomb, Player};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlastHit {
    pub player_id: u64,
    pub segment: usize,
}

impl BlastHit {
    pub fn is_head(&self) -> bool {
        self.segment == 0
    }
}

/// For every living, unshielded player: the first segment (head to tail) inside the blast.
pub fn blast_hits(bomb: &Bomb, players: &[Player]) -> Vec<BlastHit> {
    players
        .iter()
        .filter(|p| p.alive && !p.effects.is_shielded())
        .filter_map(|p| {
            p.body
                .iter()
                .position(|segment| segment.distance_to(bomb.pos) <= bomb.blast_radius)
                .map(|segment| BlastHit {
                    player_id: p.id,
                    segment,
                })
        })
        .collect()
}
