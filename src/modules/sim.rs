use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::modules::astar::AStarSearch;
use crate::modules::config::NavConfig;
use crate::modules::error::Result;
use crate::modules::geometry::{AREA_SIZE, AreaId, Position};
use crate::modules::grid::GridWorld;
use crate::modules::navigator::Navigator;
use crate::modules::outcome::{MoveOutcome, StepOptions, StepReport};
use crate::modules::state::AgentPathState;
use crate::modules::stats::PathingStats;
use crate::modules::storage::{MemoryStorage, store_dir};
use crate::modules::store::PathCacheEntry;
use crate::modules::world::{AgentId, Structure, StructureKind, Terrain, WorldHost, is_free_tile};

pub const SIM_AREA: AreaId = AreaId(0);

/// Parameters of a generated run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub seed: u64,
    pub agents: usize,
    pub ticks: u64,
    /// Compute bucket reported to the engine every tick.
    pub bucket: u32,
    pub walls: usize,
    pub swamps: usize,
    /// Lay a road cross through the spawn.
    pub roads: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            seed: 7,
            agents: 8,
            ticks: 200,
            bucket: 10_000,
            walls: 120,
            swamps: 80,
            roads: true,
        }
    }
}

/// What happened in one simulated tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    pub moved: usize,
    pub arrivals: usize,
    pub stalled: usize,
    pub faults: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scenario: Scenario,
    pub ticks: u64,
    pub arrivals: u64,
    pub moves: u64,
    pub stalled: u64,
    pub search_calls: u64,
    pub cached_paths: usize,
    pub outcomes: BTreeMap<String, u64>,
    pub stats: PathingStats,
}

/// A grid world, a navigator and a set of agents wandering between random
/// goals.
pub struct Simulation {
    scenario: Scenario,
    world: GridWorld,
    navigator: Navigator,
    search: AStarSearch,
    goals: BTreeMap<AgentId, Position>,
    rng: StdRng,
    arrivals: u64,
    moves: u64,
    stalled: u64,
    outcomes: BTreeMap<String, u64>,
}

impl Simulation {
    pub fn new(scenario: Scenario, config: NavConfig) -> Result<Self> {
        config.validate()?;
        let navigator = Navigator::with_seed(config, scenario.seed);
        Ok(Self::assemble(scenario, navigator))
    }

    /// Start from previously persisted stores. State of agents the generated
    /// world does not contain is dropped.
    pub fn with_stores(
        scenario: Scenario,
        config: NavConfig,
        paths: MemoryStorage<PathCacheEntry>,
        agents: MemoryStorage<AgentPathState>,
    ) -> Result<Self> {
        let navigator = Navigator::with_parts(config, paths, agents, scenario.seed)?;
        let mut sim = Self::assemble(scenario, navigator);
        sim.navigator.sweep_departed(&sim.world);
        Ok(sim)
    }

    fn assemble(scenario: Scenario, navigator: Navigator) -> Self {
        let mut rng = StdRng::seed_from_u64(scenario.seed);
        let world = build_world(&scenario, &mut rng);

        let mut sim = Self {
            scenario,
            world,
            navigator,
            search: AStarSearch::new(),
            goals: BTreeMap::new(),
            rng,
            arrivals: 0,
            moves: 0,
            stalled: 0,
            outcomes: BTreeMap::new(),
        };
        let agents: Vec<AgentId> = sim.world.agent_ids().collect();
        for agent in agents {
            sim.assign_goal(agent);
        }
        sim
    }

    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }

    pub fn goal_of(&self, agent: AgentId) -> Option<Position> {
        self.goals.get(&agent).copied()
    }

    fn assign_goal(&mut self, agent: AgentId) {
        if let Some(goal) = random_open_tile(&self.world, &mut self.rng, agent) {
            debug!(target: "waypath::sim", agent, goal = %goal, "new goal");
            self.goals.insert(agent, goal);
        }
    }

    /// Resolve one step per agent, then let the world apply the moves.
    pub fn step(&mut self) -> TickSummary {
        let tick = self.world.tick() + 1;
        let mut ctx = self.navigator.begin_tick(tick, self.scenario.bucket);
        let options = StepOptions::default();
        let mut summary = TickSummary {
            tick,
            ..TickSummary::default()
        };

        let agents: Vec<(AgentId, Position)> = self.goals.iter().map(|(a, g)| (*a, *g)).collect();
        let mut arrived = Vec::new();
        for (agent, goal) in agents {
            let report =
                self.navigator
                    .resolve_step(&mut ctx, &mut self.world, &mut self.search, agent, goal, &options);
            summary.faults += report.faults.len();
            self.tally(&report);
            match report.outcome {
                MoveOutcome::Arrived => arrived.push(agent),
                MoveOutcome::Stalled | MoveOutcome::Tired => summary.stalled += 1,
                _ => {}
            }
        }

        let result = self.world.end_tick();
        summary.moved = result.moved;
        summary.arrivals = arrived.len();
        self.moves += result.moved as u64;
        self.stalled += summary.stalled as u64;
        self.arrivals += arrived.len() as u64;
        for agent in arrived {
            self.assign_goal(agent);
        }
        summary
    }

    fn tally(&mut self, report: &StepReport) {
        *self
            .outcomes
            .entry(report.outcome.label().to_string())
            .or_default() += 1;
    }

    pub fn run(&mut self) -> RunSummary {
        let started_at = Utc::now();
        info!(
            target: "waypath::sim",
            seed = self.scenario.seed,
            agents = self.goals.len(),
            ticks = self.scenario.ticks,
            "simulation started"
        );
        for _ in 0..self.scenario.ticks {
            let tick = self.step();
            debug!(
                target: "waypath::sim",
                tick = tick.tick,
                moved = tick.moved,
                arrivals = tick.arrivals,
                stalled = tick.stalled,
                faults = tick.faults,
                "tick"
            );
        }
        let summary = self.summary(started_at);
        info!(
            target: "waypath::sim",
            arrivals = summary.arrivals,
            moves = summary.moves,
            hit_rate = summary.stats.hit_rate(),
            "simulation finished"
        );
        summary
    }

    pub fn summary(&self, started_at: DateTime<Utc>) -> RunSummary {
        RunSummary {
            started_at,
            finished_at: Utc::now(),
            scenario: self.scenario.clone(),
            ticks: self.world.tick(),
            arrivals: self.arrivals,
            moves: self.moves,
            stalled: self.stalled,
            search_calls: self.search.calls(),
            cached_paths: self.navigator.paths().len(),
            outcomes: self.outcomes.clone(),
            stats: self.navigator.stats().clone(),
        }
    }
}

fn spawn_tile() -> Position {
    Position::new(SIM_AREA, AREA_SIZE / 2, AREA_SIZE / 2)
}

fn build_world(scenario: &Scenario, rng: &mut StdRng) -> GridWorld {
    let mut world = GridWorld::new();
    world.add_area(SIM_AREA);
    let spawn = spawn_tile();

    // Keep the ring around the spawn clear so agents can leave it.
    let reserved = |pos: Position| pos.range_to(spawn) <= 2;
    for _ in 0..scenario.walls {
        let pos = random_tile(rng);
        if !reserved(pos) {
            world.set_terrain(pos, Terrain::Wall);
        }
    }
    for _ in 0..scenario.swamps {
        let pos = random_tile(rng);
        if !reserved(pos) && matches!(world.terrain(pos), Ok(Terrain::Plain)) {
            world.set_terrain(pos, Terrain::Swamp);
        }
    }
    if scenario.roads {
        for i in 1..AREA_SIZE - 1 {
            for pos in [
                Position::new(SIM_AREA, i, spawn.y + 1),
                Position::new(SIM_AREA, spawn.x + 1, i),
            ] {
                if !matches!(world.terrain(pos), Ok(Terrain::Wall)) {
                    world.add_structure(pos, Structure::new(StructureKind::Road));
                }
            }
        }
    }
    world.add_structure(spawn, Structure::new(StructureKind::Spawn));

    let ring: Vec<Position> = spawn.neighbors().map(|(_, p)| p).collect();
    for i in 0..scenario.agents {
        let start = ring[i % ring.len()];
        let start = if world.agents_at(start).map(|a| a.is_empty()).unwrap_or(false) {
            start
        } else {
            random_open_tile(&world, rng, 0).unwrap_or(start)
        };
        world.spawn_agent(start);
    }
    world
}

fn random_tile(rng: &mut StdRng) -> Position {
    Position::new(
        SIM_AREA,
        rng.gen_range(1..AREA_SIZE - 1),
        rng.gen_range(1..AREA_SIZE - 1),
    )
}

fn random_open_tile(world: &GridWorld, rng: &mut StdRng, me: AgentId) -> Option<Position> {
    (0..200)
        .map(|_| random_tile(rng))
        .find(|pos| is_free_tile(world, *pos, me))
}

pub fn runs_dir() -> PathBuf {
    store_dir().join("runs")
}

pub fn save_run_summary(summary: &RunSummary) -> Result<PathBuf> {
    let dir = runs_dir();
    fs::create_dir_all(&dir)?;
    let filename = format!(
        "run_{}_{}.json",
        summary.scenario.seed,
        summary.started_at.format("%Y%m%dT%H%M%S")
    );
    let path = dir.join(filename);
    let json = serde_json::to_vec_pretty(summary)?;
    fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::Storage;

    fn small() -> Scenario {
        Scenario {
            seed: 11,
            agents: 4,
            ticks: 60,
            walls: 40,
            swamps: 20,
            ..Scenario::default()
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let a = Simulation::new(small(), NavConfig::default()).unwrap();
        let b = Simulation::new(small(), NavConfig::default()).unwrap();
        let ids: Vec<AgentId> = a.world().agent_ids().collect();
        assert_eq!(ids.len(), 4);
        for id in ids {
            assert_eq!(a.world().position_of(id), b.world().position_of(id));
            assert_eq!(a.goal_of(id), b.goal_of(id));
        }
    }

    #[test]
    fn agents_make_progress() {
        let mut sim = Simulation::new(small(), NavConfig::default()).unwrap();
        let summary = sim.run();
        assert_eq!(summary.ticks, 60);
        assert!(summary.moves > 0);
        assert!(summary.arrivals > 0);
        assert!(summary.stats.misses > 0);
        assert!(summary.search_calls > 0);
    }

    #[test]
    fn resumed_run_reuses_stored_paths() {
        let mut first = Simulation::new(small(), NavConfig::default()).unwrap();
        first.run();
        let paths = first.navigator().paths().storage().clone();
        let agents = first.navigator().agents().clone();
        assert!(!paths.is_empty());

        let resumed = Simulation::with_stores(small(), NavConfig::default(), paths.clone(), agents).unwrap();
        assert_eq!(resumed.navigator().paths().len(), paths.len());
        assert_eq!(
            resumed.navigator().tracked_agents(),
            first.navigator().tracked_agents()
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = NavConfig {
            max_entries: 0,
            ..NavConfig::default()
        };
        assert!(Simulation::new(small(), config).is_err());
    }
}
