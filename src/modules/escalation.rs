use std::cmp::Reverse;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::modules::context::{Remedy, TickContext};
use crate::modules::debug::PathingFlag;
use crate::modules::error::PathFault;
use crate::modules::geometry::{Direction, Position};
use crate::modules::navigator::Navigator;
use crate::modules::outcome::{Escalation, MoveOutcome, StepReport};
use crate::modules::search::{PathSearch, SearchOptions};
use crate::modules::state::{AgentPathState, BypassPath};
use crate::modules::stats::PathEvent;
use crate::modules::stepper::{Ladder, StepFrame, is_valid_next};
use crate::modules::storage::Storage;
use crate::modules::store::PathCacheEntry;
use crate::modules::world::{
    TileInfo, WorldHost, adjacent_spawn, is_free_tile, is_road_like,
};

impl<P, A> Navigator<P, A>
where
    P: Storage<PathCacheEntry>,
    A: Storage<AgentPathState>,
{
    /// Remedies for a next tile held by another agent or claimed by an
    /// earlier mover, cheapest first. Each runs at most once per agent per
    /// tick.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn blocked_ladder(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        state: &mut AgentPathState,
        next: Position,
        info: &TileInfo,
        report: &mut StepReport,
    ) -> Ladder {
        let index = state.active().index;

        if self.config.spawn_ring_scatter
            && index == 0
            && state.active().blocked == 1
            && adjacent_spawn(&*world, f.here).is_some()
            && ctx.try_claim(f.agent, Remedy::SpawnRingScatter)
        {
            if let Some(direction) = self.random_free_step(ctx, world, f, |_| true) {
                self.trace(f.agent, "spawnRing:scatter", format_args!("dir={direction}"));
                report.escalations.push(Escalation::SpawnRingScatter);
                return Ladder::Done(MoveOutcome::Sidestepped { direction });
            }
        }

        if self.config.micro_sidestep
            && index <= self.config.micro_sidestep_max_index
            && ctx.try_claim(f.agent, Remedy::MicroSidestep)
        {
            if let Some(direction) = self.micro_sidestep(ctx, world, f) {
                self.trace(f.agent, "microSidestep", format_args!("dir={direction}"));
                self.note(PathEvent::MicroSidestep);
                report.escalations.push(Escalation::MicroSidestep);
                return Ladder::Done(MoveOutcome::Sidestepped { direction });
            }
        }

        if self.config.agent_swap && ctx.try_claim(f.agent, Remedy::Swap) {
            if let Some(outcome) = self.try_swap(ctx, world, f, next, info) {
                self.trace(f.agent, "swap", format_args!("step={next}"));
                self.note(PathEvent::Swap);
                report.escalations.push(Escalation::Swap);
                state.active_mut().commit(next);
                return Ladder::Done(outcome);
            }
        }

        let fast = self.config.fast_bypass_on_corridor
            && state.active().blocked == 1
            && info.road_like
            && is_road_like(&*world, f.here);
        // An owned builder parked on a site rarely moves on its own.
        if !fast && info.has_site && info.occupants.iter().any(|o| o.owned && o.building) {
            let active = state.active_mut();
            active.blocked = active.blocked.max(self.config.block_bypass_threshold);
        }

        if (fast || state.active().blocked >= self.config.block_bypass_threshold)
            && ctx.budget().allows(self.config.min_bucket_bypass)
            && ctx.try_claim(f.agent, Remedy::Bypass)
        {
            let options = SearchOptions::avoiding_agents(Some(self.config.bypass_ops));
            let steps = self.search_uncached(ctx, &*world, search, f, options, report);
            if let Some(first) = steps.first().copied().filter(|n| is_valid_next(&*world, f.here, *n)) {
                self.install_bypass(f, state, steps);
                report.escalations.push(if fast {
                    Escalation::FastBypass
                } else {
                    Escalation::ThresholdBypass
                });
                if ctx.reserve(f.agent, first) {
                    return Ladder::Proceed(first);
                }
                self.fault(&mut report.faults, PathFault::ReservationConflict);
                return Ladder::Done(MoveOutcome::Stalled);
            }
            self.trace(f.agent, "bypass:notFound", format_args!("blocked={}", state.active().blocked));
        }

        if index <= self.config.early_scatter_max_index
            && ctx.try_claim(f.agent, Remedy::EarlyScatter)
        {
            let spawn = adjacent_spawn(&*world, f.here);
            let away_from_spawn = |tile: Position| spawn.is_none_or(|s| !tile.is_adjacent(s));
            if let Some(direction) = self.random_free_step(ctx, world, f, away_from_spawn) {
                self.trace(f.agent, "earlyScatter", format_args!("dir={direction}"));
                report.escalations.push(Escalation::EarlyScatter);
                return Ladder::Done(MoveOutcome::Sidestepped { direction });
            }
        }

        Ladder::Done(self.best_effort(ctx, world, search, f, report))
    }

    /// Recovery once `stuck` reaches the threshold: an early repath, then an
    /// agent-avoiding bypass, then cheap low-budget moves.
    pub(crate) fn stuck_ladder(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        state: &mut AgentPathState,
        report: &mut StepReport,
    ) {
        if !ctx.try_claim(f.agent, Remedy::StuckRecovery) {
            return;
        }
        self.note(PathEvent::Stuck);
        self.trace(
            f.agent,
            "stuck:thresholdReached",
            format_args!("stuck={} reason={:?}", state.stuck, state.last_stuck_reason),
        );

        if !state.on_bypass()
            && state.base.index <= self.config.early_repath_max_index
            && ctx.budget().allows(self.config.min_bucket_early_repath)
            && AgentPathState::cooled_down(state.last_early_repath, f.tick, self.config.early_repath_cooldown)
        {
            state.last_early_repath = Some(f.tick);
            let options = SearchOptions::avoiding_agents(Some(self.config.early_repath_ops));
            let steps = self.search_uncached(ctx, &*world, search, f, options, report);
            if !steps.is_empty() {
                state.base.replace(steps);
                state.created_tick = f.tick;
                state.stuck = 0;
                report.escalations.push(Escalation::EarlyRepath);
                if !report.outcome.issued_move() {
                    report.outcome = MoveOutcome::Repathed;
                }
                return;
            }
        }

        if ctx.budget().allows(self.config.min_bucket_bypass) {
            let options = SearchOptions {
                max_ops: Some(self.config.stuck_bypass_ops),
                avoid_agents: true,
                plain_cost: Some(self.config.stuck_bypass_plain_cost),
                swamp_cost: Some(self.config.stuck_bypass_swamp_cost),
            };
            let steps = self.search_uncached(ctx, &*world, search, f, options, report);
            if steps.is_empty() {
                if let Some(key) = state.cache_key.take() {
                    self.drop_path(&key);
                }
                return;
            }
            self.install_bypass(f, state, steps);
            state.stuck = 0;
            report.escalations.push(Escalation::StuckBypass);
            return;
        }

        if !AgentPathState::cooled_down(
            state.last_low_budget_recover,
            f.tick,
            self.config.low_budget_recover_cooldown,
        ) {
            return;
        }
        state.last_low_budget_recover = Some(f.tick);
        let options = SearchOptions::avoiding_agents(Some(self.config.low_budget_ops));
        let steps = self.search_uncached(ctx, &*world, search, f, options, report);
        if !steps.is_empty() {
            state.bypass = None;
            state.base.replace(steps);
            state.created_tick = f.tick;
            state.stuck = 0;
            report.escalations.push(Escalation::LowBudgetPath);
            return;
        }
        if !report.outcome.issued_move() {
            if let Some(direction) = self.random_free_step(ctx, world, f, |_| true) {
                report.escalations.push(Escalation::LowBudgetSidestep);
                report.outcome = MoveOutcome::Sidestepped { direction };
            }
        }
    }

    /// Step off a commitment that keeps being accepted but never lands.
    pub(crate) fn divert_ghost(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        f: &StepFrame,
        state: &mut AgentPathState,
        report: &mut StepReport,
        planned: Option<Position>,
    ) {
        if state.active().index > self.config.ghost_divert_max_index
            || f.me.fatigue > 0
            || matches!(
                report.outcome,
                MoveOutcome::Sidestepped { .. } | MoveOutcome::Swapped { .. }
            )
            || !ctx.try_claim(f.agent, Remedy::GhostDiversion)
        {
            return;
        }

        let current = f.here.range_to(f.goal);
        let mut candidates: Vec<(bool, u32, u32, Direction, Position)> = f
            .here
            .neighbors()
            .filter(|(_, tile)| Some(*tile) != planned)
            .filter(|(_, tile)| is_free_tile(&*world, *tile, f.agent))
            .map(|(dir, tile)| (dir, tile, tile.range_to(f.goal)))
            .filter(|(_, _, range)| *range <= current)
            .map(|(dir, tile, range)| (range < current, range, self.rng.r#gen::<u32>(), dir, tile))
            .collect();
        candidates.sort_by_key(|c| (Reverse(c.0), c.1, c.2));

        for (_, _, _, direction, tile) in candidates {
            if !ctx.reserve(f.agent, tile) {
                continue;
            }
            if world.move_agent(f.agent, direction).is_ok() {
                self.trace(f.agent, "ghostBlocked:divert", format_args!("dir={direction}"));
                self.note(PathEvent::GhostDiversion);
                report.escalations.push(Escalation::GhostDiversion);
                report.outcome = MoveOutcome::Sidestepped { direction };
                let active = state.active_mut();
                active.intended = None;
                active.intended_age = 0;
                return;
            }
            ctx.release(f.agent, tile);
        }
    }

    /// Drop the bypass once the agent is next to one of the upcoming base
    /// tiles again. The cursor lands on the committed tile when it is part of
    /// the window, otherwise on the furthest adjacent one.
    pub(crate) fn rejoin(&mut self, f: &StepFrame, state: &mut AgentPathState, report: &mut StepReport) {
        if !self.config.rejoin_when_adjacent {
            return;
        }
        let Some(bypass) = &state.bypass else {
            return;
        };
        if bypass.created == f.tick {
            return;
        }

        let start = state.base.index;
        let end = (start + self.config.rejoin_lookahead).min(state.base.steps.len());
        let window = &state.base.steps[start.min(end)..end];
        if !window.iter().any(|tile| f.here.is_adjacent(*tile)) {
            return;
        }

        let committed = bypass.cursor.intended;
        let (offset, intended) = match committed.and_then(|c| window.iter().position(|t| *t == c)) {
            Some(offset) => (offset, committed),
            None => match window.iter().rposition(|t| f.here.is_adjacent(*t)) {
                Some(offset) => (offset, None),
                None => return,
            },
        };

        state.bypass = None;
        state.base.index = start + offset;
        state.base.intended = intended;
        state.base.intended_age = 0;
        state.base.blocked = 0;
        self.note(PathEvent::Rejoin);
        report.escalations.push(Escalation::Rejoin);
        self.trace(f.agent, "bypass:rejoin", format_args!("index={}", state.base.index));
    }

    pub(crate) fn install_bypass(&mut self, f: &StepFrame, state: &mut AgentPathState, steps: Vec<Position>) {
        let len = steps.len();
        state.bypass = Some(BypassPath::new(steps, f.tick, self.config.bypass_ttl));
        state.base.intended = None;
        state.base.intended_age = 0;
        state.base.blocked = 0;
        self.note(PathEvent::Bypass);
        if self.debug.pathing(PathingFlag::Bypass) {
            debug!(
                target: "waypath::pathing::bypass",
                agent = f.agent,
                here = %f.here,
                len,
                expires = f.tick + self.config.bypass_ttl,
                "bypass installed"
            );
        }
    }

    /// Lateral move that does not lose ground: roads first, then tiles that
    /// close distance, ties broken at random.
    fn micro_sidestep(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        f: &StepFrame,
    ) -> Option<Direction> {
        if f.me.fatigue > 0 {
            return None;
        }
        let current = i64::from(f.here.range_to(f.goal));
        let tolerance = self.config.micro_sidestep_max_range_increase;
        let mut candidates: Vec<(bool, bool, u32, Direction, Position)> = Vec::new();
        for (dir, tile) in f.here.neighbors() {
            if !is_free_tile(&*world, tile, f.agent) {
                continue;
            }
            let range = i64::from(tile.range_to(f.goal));
            if range - current > tolerance {
                continue;
            }
            candidates.push((
                is_road_like(&*world, tile),
                range < current,
                self.rng.r#gen::<u32>(),
                dir,
                tile,
            ));
        }
        candidates.sort_by_key(|c| (Reverse(c.0), Reverse(c.1), c.2));

        for (_, _, _, direction, tile) in candidates {
            if !ctx.reserve(f.agent, tile) {
                continue;
            }
            if world.move_agent(f.agent, direction).is_ok() {
                return Some(direction);
            }
            ctx.release(f.agent, tile);
        }
        None
    }

    /// Trade places with a single owned, rested occupant of `next`.
    fn try_swap(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        f: &StepFrame,
        next: Position,
        info: &TileInfo,
    ) -> Option<MoveOutcome> {
        let [other] = info.occupants.as_slice() else {
            return None;
        };
        if !other.owned || other.fatigue > 0 || f.me.fatigue > 0 {
            return None;
        }
        let direction = f.here.direction_to(next)?;
        if !ctx.lanes().is_open(other.id, f.here) || !ctx.lanes().is_open(f.agent, next) {
            return None;
        }
        ctx.reserve(f.agent, next);
        if world.move_agent(f.agent, direction).is_err() {
            ctx.release(f.agent, next);
            return None;
        }
        ctx.reserve(other.id, f.here);
        if world.move_agent(other.id, direction.reverse()).is_err() {
            // A lone intent into an occupied tile fails in the world; later
            // rungs may replace it.
            ctx.release(other.id, f.here);
            ctx.release(f.agent, next);
            return None;
        }
        Some(MoveOutcome::Swapped {
            with: other.id,
            direction,
        })
    }

    /// Random free neighbour accepted by `accept`.
    fn random_free_step(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        f: &StepFrame,
        accept: impl Fn(Position) -> bool,
    ) -> Option<Direction> {
        if f.me.fatigue > 0 {
            return None;
        }
        let mut directions = Direction::ALL;
        directions.shuffle(&mut self.rng);
        for direction in directions {
            let Some(tile) = f.here.step(direction) else {
                continue;
            };
            if !is_free_tile(&*world, tile, f.agent) || !accept(tile) || !ctx.reserve(f.agent, tile) {
                continue;
            }
            if world.move_agent(f.agent, direction).is_ok() {
                return Some(direction);
            }
            ctx.release(f.agent, tile);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::modules::astar::AStarSearch;
    use crate::modules::config::NavConfig;
    use crate::modules::geometry::{AreaId, Direction, Position};
    use crate::modules::grid::GridWorld;
    use crate::modules::navigator::Navigator;
    use crate::modules::outcome::{Escalation, MoveOutcome, StepOptions, StepReport};
    use crate::modules::world::{AgentId, ConstructionSite, StructureKind, Terrain};

    fn pos(x: i32, y: i32) -> Position {
        Position::new(AreaId(0), x, y)
    }

    fn open_world() -> GridWorld {
        let mut world = GridWorld::new();
        world.add_area(AreaId(0));
        world
    }

    fn step(
        nav: &mut Navigator,
        world: &mut GridWorld,
        search: &mut AStarSearch,
        tick: u64,
        bucket: u32,
        agent: AgentId,
    ) -> StepReport {
        let mut ctx = nav.begin_tick(tick, bucket);
        let report = nav.resolve_step(&mut ctx, world, search, agent, pos(20, 10), &StepOptions::default());
        world.end_tick();
        report
    }

    #[test]
    fn frozen_agent_diverts_then_repaths_early() {
        let mut world = open_world();
        let mut search = AStarSearch::new();
        let mut nav = Navigator::with_seed(NavConfig::default(), 3);
        let a = world.spawn_agent(pos(10, 10));
        world.set_frozen(a, true);

        step(&mut nav, &mut world, &mut search, 1, 10_000, a);
        step(&mut nav, &mut world, &mut search, 2, 10_000, a);

        let report = step(&mut nav, &mut world, &mut search, 3, 10_000, a);
        assert!(report.escalated(Escalation::GhostDiversion));
        assert!(matches!(report.outcome, MoveOutcome::Sidestepped { .. }));
        assert_eq!(nav.stats().ghost_diversions, 1);

        let report = step(&mut nav, &mut world, &mut search, 4, 10_000, a);
        assert!(report.escalated(Escalation::EarlyRepath));
        assert_eq!(nav.agent_state(a).unwrap().stuck, 0);
        assert_eq!(nav.stats().stuck, 1);
    }

    #[test]
    fn low_bucket_falls_back_to_cheap_recovery() {
        let mut world = open_world();
        let mut search = AStarSearch::new();
        let mut nav = Navigator::with_seed(NavConfig::default(), 3);
        let a = world.spawn_agent(pos(10, 10));
        world.set_frozen(a, true);

        for tick in 1..=3 {
            step(&mut nav, &mut world, &mut search, tick, 1000, a);
        }
        let report = step(&mut nav, &mut world, &mut search, 4, 1000, a);
        assert!(!report.escalated(Escalation::EarlyRepath));
        assert!(!report.escalated(Escalation::StuckBypass));
        assert!(report.escalated(Escalation::LowBudgetPath));
        assert_eq!(nav.agent_state(a).unwrap().last_low_budget_recover, Some(4));
    }

    #[test]
    fn repeated_block_builds_a_threshold_bypass() {
        let mut world = open_world();
        world.set_terrain(pos(11, 9), Terrain::Wall);
        world.set_terrain(pos(11, 11), Terrain::Wall);
        let mut search = AStarSearch::new();
        let mut nav = Navigator::with_seed(
            NavConfig {
                micro_sidestep: false,
                ..NavConfig::default()
            },
            3,
        );
        let a = world.spawn_agent(pos(10, 10));
        let b = world.spawn_agent(pos(11, 10));
        world.set_owned(b, false);
        world.set_frozen(a, true);

        let report = step(&mut nav, &mut world, &mut search, 1, 10_000, a);
        assert!(report.escalated(Escalation::EarlyScatter));
        assert!(!nav.agent_state(a).unwrap().on_bypass());

        let report = step(&mut nav, &mut world, &mut search, 2, 10_000, a);
        assert!(report.escalated(Escalation::ThresholdBypass));
        let state = nav.agent_state(a).unwrap();
        assert!(state.on_bypass());
        assert!(!state.bypass.as_ref().unwrap().cursor.steps.contains(&pos(11, 10)));
        assert_eq!(nav.stats().bypasses, 1);
    }

    #[test]
    fn bypass_waits_for_compute_budget() {
        let mut world = open_world();
        world.set_terrain(pos(11, 9), Terrain::Wall);
        world.set_terrain(pos(11, 11), Terrain::Wall);
        let mut search = AStarSearch::new();
        let mut nav = Navigator::with_seed(
            NavConfig {
                micro_sidestep: false,
                ..NavConfig::default()
            },
            3,
        );
        let a = world.spawn_agent(pos(10, 10));
        let b = world.spawn_agent(pos(11, 10));
        world.set_owned(b, false);
        world.set_frozen(a, true);

        step(&mut nav, &mut world, &mut search, 1, 1000, a);
        let report = step(&mut nav, &mut world, &mut search, 2, 1000, a);
        assert!(!report.escalated(Escalation::ThresholdBypass));
        assert!(!nav.agent_state(a).unwrap().on_bypass());
        assert_eq!(nav.stats().bypasses, 0);
    }

    #[test]
    fn micro_sidestep_closes_distance_around_a_blocker() {
        let mut world = open_world();
        let mut search = AStarSearch::new();
        let mut nav = Navigator::with_seed(NavConfig::default(), 3);
        let a = world.spawn_agent(pos(10, 10));
        let b = world.spawn_agent(pos(11, 10));
        world.set_owned(b, false);

        let report = step(&mut nav, &mut world, &mut search, 1, 10_000, a);
        assert!(report.escalated(Escalation::MicroSidestep));
        assert!(matches!(
            report.outcome,
            MoveOutcome::Sidestepped {
                direction: Direction::TopRight | Direction::BottomRight
            }
        ));
        assert_eq!(nav.stats().micro_sidesteps, 1);
    }

    #[test]
    fn micro_sidestep_respects_range_tolerance() {
        // In a corridor the only free neighbour is one tile further away.
        let corridor = || {
            let mut world = open_world();
            for x in 1..49 {
                world.set_terrain(pos(x, 9), Terrain::Wall);
                world.set_terrain(pos(x, 11), Terrain::Wall);
            }
            let a = world.spawn_agent(pos(10, 10));
            let b = world.spawn_agent(pos(11, 10));
            world.set_owned(b, false);
            (world, a)
        };
        let mut search = AStarSearch::new();

        let (mut world, a) = corridor();
        let mut strict = Navigator::with_seed(NavConfig::default(), 3);
        let report = step(&mut strict, &mut world, &mut search, 1, 10_000, a);
        assert!(!report.escalated(Escalation::MicroSidestep));
        assert_eq!(strict.stats().micro_sidesteps, 0);

        let (mut world, a) = corridor();
        let mut lenient = Navigator::with_seed(
            NavConfig {
                micro_sidestep_max_range_increase: 1,
                ..NavConfig::default()
            },
            3,
        );
        let report = step(&mut lenient, &mut world, &mut search, 1, 10_000, a);
        assert!(report.escalated(Escalation::MicroSidestep));
        assert_eq!(
            report.outcome,
            MoveOutcome::Sidestepped {
                direction: Direction::Left
            }
        );
        assert_eq!(world.position_of(a), Some(pos(9, 10)));
    }

    #[test]
    fn stuck_agent_gets_a_bypass_when_early_repath_is_unaffordable() {
        let mut world = open_world();
        let mut search = AStarSearch::new();
        let mut nav = Navigator::with_seed(
            NavConfig {
                min_bucket_early_repath: 20_000,
                ..NavConfig::default()
            },
            3,
        );
        let a = world.spawn_agent(pos(10, 10));
        world.set_frozen(a, true);

        for tick in 1..=3 {
            step(&mut nav, &mut world, &mut search, tick, 10_000, a);
        }
        let report = step(&mut nav, &mut world, &mut search, 4, 10_000, a);
        assert!(!report.escalated(Escalation::EarlyRepath));
        assert!(report.escalated(Escalation::StuckBypass));
        let state = nav.agent_state(a).unwrap();
        assert!(state.on_bypass());
        assert_eq!(state.stuck, 0);
        assert_eq!(nav.stats().bypasses, 1);
    }

    #[test]
    fn boxed_in_agent_drops_its_stored_path() {
        let mut world = open_world();
        for (x, y) in [(9, 9), (10, 9), (11, 9), (9, 10), (9, 11), (10, 11), (11, 11)] {
            world.set_terrain(pos(x, y), Terrain::Wall);
        }
        let mut search = AStarSearch::new();
        let mut nav = Navigator::with_seed(NavConfig::default(), 3);
        let a = world.spawn_agent(pos(10, 10));
        let b = world.spawn_agent(pos(11, 10));
        world.set_owned(b, false);

        for tick in 1..=3 {
            step(&mut nav, &mut world, &mut search, tick, 10_000, a);
        }
        assert_eq!(nav.paths().len(), 1);

        let report = step(&mut nav, &mut world, &mut search, 4, 10_000, a);
        assert!(!report.escalated(Escalation::EarlyRepath));
        assert!(!report.escalated(Escalation::StuckBypass));
        let state = nav.agent_state(a).unwrap();
        assert_eq!(state.last_early_repath, Some(4));
        assert!(state.cache_key.is_none());
        assert!(!state.on_bypass());
        assert!(nav.paths().is_empty());
        assert_eq!(nav.stats().invalidations, 1);
    }

    #[test]
    fn busy_builder_triggers_a_bypass_on_first_block() {
        let setup = |building: bool| {
            let mut world = open_world();
            let a = world.spawn_agent(pos(10, 10));
            let b = world.spawn_agent(pos(11, 10));
            world.add_site(pos(11, 10), ConstructionSite { kind: StructureKind::Road });
            world.set_building(b, building);
            (world, a)
        };
        let config = NavConfig {
            micro_sidestep: false,
            agent_swap: false,
            ..NavConfig::default()
        };
        let mut search = AStarSearch::new();

        let (mut world, a) = setup(true);
        let mut nav = Navigator::with_seed(config.clone(), 3);
        let report = step(&mut nav, &mut world, &mut search, 1, 10_000, a);
        assert!(report.escalated(Escalation::ThresholdBypass));
        assert!(matches!(report.outcome, MoveOutcome::Moved { .. }));
        assert!(nav.agent_state(a).unwrap().on_bypass());

        let (mut world, a) = setup(false);
        let mut nav = Navigator::with_seed(config, 3);
        let report = step(&mut nav, &mut world, &mut search, 1, 10_000, a);
        assert!(!report.escalated(Escalation::ThresholdBypass));
        assert!(!nav.agent_state(a).unwrap().on_bypass());
    }
}
