use std::collections::HashSet;
use std::rc::Rc;

use crate::modules::config::CostTable;
use crate::modules::cost::{CostModel, CostModelCache};
use crate::modules::geometry::{AreaId, Position};
use crate::modules::lanes::LaneReservations;
use crate::modules::world::{AgentId, WorldHost};

/// Remaining compute for the tick, as reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComputeBudget {
    pub bucket: u32,
}

impl ComputeBudget {
    pub fn allows(&self, threshold: u32) -> bool {
        self.bucket >= threshold
    }
}

/// Escalation remedies that may run at most once per agent per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Remedy {
    SpawnRingScatter,
    MicroSidestep,
    Swap,
    Bypass,
    EarlyScatter,
    GhostDiversion,
    StuckRecovery,
}

/// State that lives for exactly one tick: lane claims, cost models and the
/// remedies each agent has already spent.
#[derive(Debug)]
pub struct TickContext {
    tick: u64,
    budget: ComputeBudget,
    lanes: LaneReservations,
    cost_models: CostModelCache,
    spent: HashSet<(AgentId, Remedy)>,
}

impl TickContext {
    pub fn new(tick: u64, bucket: u32) -> Self {
        Self {
            tick,
            budget: ComputeBudget { bucket },
            lanes: LaneReservations::new(),
            cost_models: CostModelCache::default(),
            spent: HashSet::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn budget(&self) -> ComputeBudget {
        self.budget
    }

    pub fn lanes(&self) -> &LaneReservations {
        &self.lanes
    }

    pub fn reserve(&mut self, agent: AgentId, tile: Position) -> bool {
        self.lanes.reserve(agent, tile)
    }

    pub fn release(&mut self, agent: AgentId, tile: Position) {
        self.lanes.release(agent, tile);
    }

    pub fn cost_model(
        &mut self,
        world: &dyn WorldHost,
        area: AreaId,
        costs: &CostTable,
    ) -> Rc<CostModel> {
        self.cost_models.get_or_build(world, area, costs)
    }

    pub fn cost_model_builds(&self) -> u32 {
        self.cost_models.builds()
    }

    /// Marks `remedy` as used by `agent`; false if it already ran this tick.
    pub fn try_claim(&mut self, agent: AgentId, remedy: Remedy) -> bool {
        self.spent.insert((agent, remedy))
    }
}
