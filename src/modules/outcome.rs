use std::fmt;

use serde::Serialize;

use crate::modules::error::PathFault;
use crate::modules::geometry::{Direction, Position};
use crate::modules::world::{AgentId, MoveError};

/// Per-call options for `resolve_step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOptions {
    /// Arrival range around the goal.
    pub range: u32,
    /// Overrides the store's default TTL for newly cached base paths.
    pub ttl: Option<u64>,
    /// Report the current segment for hosts that draw it.
    pub visualize: bool,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            range: 1,
            ttl: None,
            visualize: false,
        }
    }
}

impl StepOptions {
    pub fn with_range(range: u32) -> Self {
        Self {
            range,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MoveOutcome {
    /// Already within range of the goal; nothing was searched or moved.
    Arrived,
    Moved { direction: Direction, to: Position },
    Swapped { with: AgentId, direction: Direction },
    Sidestepped { direction: Direction },
    /// Uncached best-effort move toward the goal.
    Fallback { direction: Direction },
    /// A new base path was installed; the agent moves next tick.
    Repathed,
    Tired,
    /// Nothing could be issued this tick.
    Stalled,
    /// The world no longer reports this agent.
    Unavailable,
}

impl MoveOutcome {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            MoveOutcome::Moved { direction, .. }
            | MoveOutcome::Swapped { direction, .. }
            | MoveOutcome::Sidestepped { direction }
            | MoveOutcome::Fallback { direction } => Some(*direction),
            _ => None,
        }
    }

    pub fn issued_move(&self) -> bool {
        self.direction().is_some()
    }

    pub fn label(&self) -> &'static str {
        match self {
            MoveOutcome::Arrived => "arrived",
            MoveOutcome::Moved { .. } => "moved",
            MoveOutcome::Swapped { .. } => "swapped",
            MoveOutcome::Sidestepped { .. } => "sidestepped",
            MoveOutcome::Fallback { .. } => "fallback",
            MoveOutcome::Repathed => "repathed",
            MoveOutcome::Tired => "tired",
            MoveOutcome::Stalled => "stalled",
            MoveOutcome::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction() {
            Some(direction) => write!(f, "{} {}", self.label(), direction),
            None => f.write_str(self.label()),
        }
    }
}

/// Remedies taken while resolving one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Escalation {
    FastPath,
    SpawnRingScatter,
    MicroSidestep,
    Swap,
    FastBypass,
    ThresholdBypass,
    EarlyScatter,
    GhostDiversion,
    GhostReset,
    EarlyRepath,
    StuckBypass,
    LowBudgetPath,
    LowBudgetSidestep,
    Rejoin,
}

/// Dominant reason behind this tick's movement, or lack of it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum StepCause {
    #[default]
    None,
    Fatigue,
    ReservationConflict,
    StructureObstacle,
    AgentOccupancy,
    GhostBlock,
}

impl StepCause {
    pub const fn label(self) -> &'static str {
        match self {
            StepCause::None => "none",
            StepCause::Fatigue => "fatigue",
            StepCause::ReservationConflict => "reservationConflict",
            StepCause::StructureObstacle => "structureObstacle",
            StepCause::AgentOccupancy => "agentOccupancy",
            StepCause::GhostBlock => "ghostBlock",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub outcome: MoveOutcome,
    pub faults: Vec<PathFault>,
    pub escalations: Vec<Escalation>,
    pub cause: StepCause,
    /// Rejection from the host, when a move was refused.
    #[serde(skip)]
    pub rejected: Option<MoveError>,
    /// Agent tile and the tile it is heading for, when visualisation is on.
    pub segment: Option<(Position, Position)>,
}

impl StepReport {
    pub fn new(outcome: MoveOutcome) -> Self {
        Self {
            outcome,
            faults: Vec::new(),
            escalations: Vec::new(),
            cause: StepCause::None,
            rejected: None,
            segment: None,
        }
    }

    pub fn has_fault(&self, fault: PathFault) -> bool {
        self.faults.contains(&fault)
    }

    pub fn escalated(&self, escalation: Escalation) -> bool {
        self.escalations.contains(&escalation)
    }
}
