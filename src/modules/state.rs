use std::fmt;

use serde::{Deserialize, Serialize};

use crate::modules::geometry::Position;
use crate::modules::store::PathKey;
use crate::modules::world::{AgentId, MoveError};

/// A walk along a fixed list of steps.
///
/// `index` points at the next tile to enter. It only advances once the agent
/// is seen standing on `intended`, the tile it last committed to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCursor {
    pub steps: Vec<Position>,
    pub index: usize,
    pub intended: Option<Position>,
    /// Ticks the agent has spent away from `intended` since committing.
    pub intended_age: u32,
    /// Consecutive ticks the next step has been blocked.
    pub blocked: u32,
}

impl PathCursor {
    pub fn new(steps: Vec<Position>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn next_step(&self) -> Option<Position> {
        self.steps.get(self.index).copied()
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.steps.len()
    }

    pub fn remaining(&self) -> usize {
        self.steps.len().saturating_sub(self.index)
    }

    /// Advance past the committed tile if the agent now stands on it.
    pub fn confirm_arrival(&mut self, here: Position) -> bool {
        if self.intended == Some(here) && !self.is_exhausted() {
            self.index += 1;
            self.intended = None;
            return true;
        }
        false
    }

    /// Skip entries equal to the current tile.
    pub fn skip_self_steps(&mut self, here: Position) {
        while self.next_step() == Some(here) {
            self.index += 1;
        }
    }

    /// Age an unfulfilled commitment. Returns the new age, or `None` when
    /// there is nothing outstanding.
    pub fn age_commitment(&mut self, here: Position) -> Option<u32> {
        match self.intended {
            Some(tile) if tile != here => {
                self.intended_age = self.intended_age.saturating_add(1);
                Some(self.intended_age)
            }
            _ => {
                self.intended_age = 0;
                None
            }
        }
    }

    pub fn commit(&mut self, tile: Position) {
        self.intended = Some(tile);
    }

    pub fn replace(&mut self, steps: Vec<Position>) {
        *self = Self::new(steps);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassPath {
    pub cursor: PathCursor,
    pub expires: u64,
    pub created: u64,
}

impl BypassPath {
    pub fn new(steps: Vec<Position>, tick: u64, ttl: u64) -> Self {
        Self {
            cursor: PathCursor::new(steps),
            expires: tick.saturating_add(ttl),
            created: tick,
        }
    }

    pub fn is_live(&self, tick: u64) -> bool {
        self.expires > tick && !self.cursor.is_exhausted()
    }
}

/// Why an agent failed to change tiles this tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StuckReason {
    BlockedTile,
    GhostBlock,
    NoAdvanceOnCursor,
    MoveRejected(String),
}

impl StuckReason {
    pub fn rejected(err: &MoveError) -> Self {
        StuckReason::MoveRejected(err.label().to_string())
    }
}

impl fmt::Display for StuckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StuckReason::BlockedTile => f.write_str("blockedTile"),
            StuckReason::GhostBlock => f.write_str("ghostBlock"),
            StuckReason::NoAdvanceOnCursor => f.write_str("noAdvanceOnCursor"),
            StuckReason::MoveRejected(code) => write!(f, "moveRejected({code})"),
        }
    }
}

/// Per-agent navigation state, persisted between ticks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPathState {
    /// Key of the cached base path; `None` forces a rebuild.
    pub cache_key: Option<PathKey>,
    pub goal: Option<Position>,
    pub range: u32,
    pub base: PathCursor,
    pub created_tick: u64,
    pub stuck: u32,
    pub last_position: Option<Position>,
    pub bypass: Option<BypassPath>,
    pub last_stuck_reason: Option<StuckReason>,
    pub last_blockers: Vec<AgentId>,
    pub last_early_repath: Option<u64>,
    pub last_low_budget_recover: Option<u64>,
    /// Goal whose direct short hop was refused. The agent stays on its
    /// path for that goal instead of retrying the hop.
    #[serde(default)]
    pub direct_refused: Option<Position>,
}

impl AgentPathState {
    pub fn storage_key(agent: AgentId) -> String {
        agent.to_string()
    }

    pub fn targets(&self, goal: Position, range: u32) -> bool {
        self.goal == Some(goal) && self.range == range
    }

    /// Drop everything tied to the previous goal.
    pub fn reset_for(&mut self, key: PathKey, steps: Vec<Position>, tick: u64) {
        let direct_refused = self.direct_refused.filter(|goal| *goal == key.goal);
        *self = Self {
            cache_key: Some(key),
            goal: Some(key.goal),
            range: key.range,
            base: PathCursor::new(steps),
            created_tick: tick,
            direct_refused,
            ..Self::default()
        };
    }

    pub fn replace_base(&mut self, key: PathKey, steps: Vec<Position>, tick: u64) {
        self.cache_key = Some(key);
        self.base.replace(steps);
        self.created_tick = tick;
    }

    pub fn on_bypass(&self) -> bool {
        self.bypass.is_some()
    }

    /// The cursor currently being followed.
    pub fn active(&self) -> &PathCursor {
        match &self.bypass {
            Some(bypass) => &bypass.cursor,
            None => &self.base,
        }
    }

    pub fn active_mut(&mut self) -> &mut PathCursor {
        match &mut self.bypass {
            Some(bypass) => &mut bypass.cursor,
            None => &mut self.base,
        }
    }

    pub fn cooled_down(last: Option<u64>, tick: u64, cooldown: u64) -> bool {
        last.is_none_or(|t| tick.saturating_sub(t) >= cooldown)
    }
}
