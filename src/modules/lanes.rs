use std::collections::HashMap;

use crate::modules::geometry::Position;
use crate::modules::world::AgentId;

/// Same-tick claims on destination tiles. The first agent to reserve a tile
/// in a tick keeps it; the table is dropped with its tick context.
#[derive(Debug, Default)]
pub struct LaneReservations {
    claims: HashMap<Position, AgentId>,
    collisions: u32,
}

impl LaneReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `tile` is free or already held by `agent`. A refusal leaves
    /// the table untouched apart from the collision count.
    pub fn reserve(&mut self, agent: AgentId, tile: Position) -> bool {
        match self.claims.get(&tile) {
            Some(holder) if *holder != agent => {
                self.collisions = self.collisions.saturating_add(1);
                false
            }
            Some(_) => true,
            None => {
                self.claims.insert(tile, agent);
                true
            }
        }
    }

    /// True when `reserve` would succeed, without claiming anything.
    pub fn is_open(&self, agent: AgentId, tile: Position) -> bool {
        self.claims.get(&tile).is_none_or(|holder| *holder == agent)
    }

    /// Give back a claim whose move was never issued.
    pub fn release(&mut self, agent: AgentId, tile: Position) {
        if self.claims.get(&tile) == Some(&agent) {
            self.claims.remove(&tile);
        }
    }

    pub fn holder(&self, tile: Position) -> Option<AgentId> {
        self.claims.get(&tile).copied()
    }

    pub fn collisions(&self) -> u32 {
        self.collisions
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::geometry::AreaId;

    #[test]
    fn first_caller_wins_the_tile() {
        let tile = Position::new(AreaId(0), 10, 10);
        let mut lanes = LaneReservations::new();

        assert!(lanes.reserve(1, tile));
        assert!(!lanes.reserve(2, tile));
        assert_eq!(lanes.holder(tile), Some(1));
        assert_eq!(lanes.collisions(), 1);
        assert_eq!(lanes.len(), 1);
    }

    #[test]
    fn same_agent_may_reserve_twice() {
        let tile = Position::new(AreaId(0), 10, 10);
        let mut lanes = LaneReservations::new();

        assert!(lanes.reserve(1, tile));
        assert!(lanes.reserve(1, tile));
        assert_eq!(lanes.collisions(), 0);
    }

    #[test]
    fn release_only_drops_own_claim() {
        let tile = Position::new(AreaId(0), 10, 10);
        let mut lanes = LaneReservations::new();
        assert!(lanes.reserve(1, tile));

        lanes.release(2, tile);
        assert_eq!(lanes.holder(tile), Some(1));
        assert!(!lanes.is_open(2, tile));
        assert!(lanes.is_open(1, tile));

        lanes.release(1, tile);
        assert!(lanes.is_empty());
        assert!(lanes.is_open(2, tile));
        assert_eq!(lanes.collisions(), 0);
    }

    #[test]
    fn fresh_table_accepts_any_agent() {
        let tile = Position::new(AreaId(0), 10, 10);
        let mut lanes = LaneReservations::new();
        assert!(lanes.reserve(1, tile));

        let mut next_tick = LaneReservations::new();
        assert!(next_tick.is_empty());
        assert!(next_tick.reserve(2, tile));
    }
}
