use tracing::{debug, trace};

use crate::modules::context::TickContext;
use crate::modules::debug::PathingFlag;
use crate::modules::error::PathFault;
use crate::modules::geometry::Position;
use crate::modules::navigator::Navigator;
use crate::modules::outcome::{Escalation, MoveOutcome, StepCause, StepOptions, StepReport};
use crate::modules::search::{PathSearch, SearchError, SearchGoal, SearchOptions, run_search};
use crate::modules::state::{AgentPathState, StuckReason};
use crate::modules::stats::PathEvent;
use crate::modules::storage::Storage;
use crate::modules::store::{CacheLookup, PathCacheEntry, PathKey};
use crate::modules::world::{
    AgentId, AgentInfo, MoveError, WorldHost, classify_tile, is_free_tile, is_road_like,
};

/// Everything fixed for the duration of one `resolve_step` call.
pub(crate) struct StepFrame {
    pub agent: AgentId,
    pub me: AgentInfo,
    pub here: Position,
    pub goal: Position,
    pub range: u32,
    pub ttl: Option<u64>,
    pub tick: u64,
    pub visualize: bool,
}

/// Next tile is usable when it is a real neighbour inside the world.
pub(crate) fn is_valid_next(world: &dyn WorldHost, here: Position, next: Position) -> bool {
    next != here && here.is_adjacent(next) && next.in_area_bounds() && world.in_bounds(next)
}

impl<P, A> Navigator<P, A>
where
    P: Storage<PathCacheEntry>,
    A: Storage<AgentPathState>,
{
    /// Decide and issue this tick's single move for `agent` toward `goal`.
    ///
    /// Never fails: every fault is handled here and listed in the report.
    pub fn resolve_step(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        search: &mut dyn PathSearch,
        agent: AgentId,
        goal: Position,
        options: &StepOptions,
    ) -> StepReport {
        let Some(me) = world.agent(agent) else {
            return StepReport::new(MoveOutcome::Unavailable);
        };
        let here = me.position;
        if here.within_range(goal, options.range) {
            return StepReport::new(MoveOutcome::Arrived);
        }

        let frame = StepFrame {
            agent,
            me,
            here,
            goal,
            range: options.range,
            ttl: options.ttl,
            tick: ctx.tick(),
            visualize: options.visualize,
        };

        let hop_refused = self
            .agent_state(agent)
            .is_some_and(|s| s.direct_refused == Some(goal));
        let mut refused = false;
        if !hop_refused {
            match self.try_fast_path(ctx, world, &frame) {
                FastPath::Moved(outcome) => {
                    self.leave_path(agent);
                    let mut report = StepReport::new(outcome);
                    report.escalations.push(Escalation::FastPath);
                    return report;
                }
                FastPath::Refused => refused = true,
                FastPath::OutOfReach => {}
            }
        }

        let mut state = self.load_state(agent);
        let mut report = StepReport::new(MoveOutcome::Stalled);
        self.advance(ctx, world, search, &frame, &mut state, &mut report);
        if refused {
            state.direct_refused = Some(goal);
        }
        self.store_state(agent, state);
        report
    }

    /// Straight step at a goal a few tiles away, without touching the path
    /// store.
    fn try_fast_path(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        f: &StepFrame,
    ) -> FastPath {
        if f.here.range_to(f.goal) > self.config.fast_path_distance || f.me.fatigue > 0 {
            return FastPath::OutOfReach;
        }
        let Some((direction, tile)) = f
            .here
            .direction_to(f.goal)
            .and_then(|d| f.here.step(d).map(|tile| (d, tile)))
        else {
            return FastPath::OutOfReach;
        };
        if !is_free_tile(&*world, tile, f.agent) || !ctx.lanes().is_open(f.agent, tile) {
            return FastPath::Refused;
        }
        ctx.reserve(f.agent, tile);
        if world.move_agent(f.agent, direction).is_err() {
            ctx.release(f.agent, tile);
            return FastPath::Refused;
        }
        FastPath::Moved(MoveOutcome::Moved {
            direction,
            to: tile,
        })
    }

    /// The agent stepped off its stored path: drop the commitment and
    /// rebuild from wherever it lands.
    fn leave_path(&mut self, agent: AgentId) {
        let key = AgentPathState::storage_key(agent);
        if let Some(state) = self.agents.get_mut(&key) {
            state.cache_key = None;
            state.bypass = None;
            state.base.intended = None;
            state.base.intended_age = 0;
        }
    }

    fn advance(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        state: &mut AgentPathState,
        report: &mut StepReport,
    ) {
        if state.cache_key.is_none() || !state.targets(f.goal, f.range) {
            let key = PathKey::new(f.here, f.goal, f.range);
            let steps = self.fetch_base(ctx, &*world, search, key, f.ttl, report);
            state.reset_for(key, steps, f.tick);
            self.trace(f.agent, "base:reset", format_args!("key={key} len={}", state.base.steps.len()));
        } else if state.base.is_exhausted() || self.base_aged_out(state, f.tick) {
            self.rebase(ctx, &*world, search, f, state, report);
        }

        if state.bypass.as_ref().is_some_and(|b| !b.is_live(f.tick)) {
            state.bypass = None;
            self.trace(f.agent, "bypass:expired", format_args!("at={}", f.here));
        }

        let Some(next) = self.next_on_active(state, f.here) else {
            self.trace(f.agent, "fallback:noPath", format_args!("goal={}", f.goal));
            report.outcome = self.best_effort(ctx, world, search, f, report);
            self.finish(ctx, world, search, f, state, report, None);
            return;
        };

        let Some(next) = self.guard_desync(ctx, &*world, search, f, state, report, next) else {
            report.outcome = self.best_effort(ctx, world, search, f, report);
            self.finish(ctx, world, search, f, state, report, None);
            return;
        };

        let Some(mut next) = self.age_ghost(ctx, &*world, search, f, state, report, next) else {
            report.outcome = self.best_effort(ctx, world, search, f, report);
            self.finish(ctx, world, search, f, state, report, None);
            return;
        };

        let info = classify_tile(&*world, next, f.agent);
        if info.is_obstructed() {
            // The tile became impassable since the path was built.
            self.fault(&mut report.faults, PathFault::HardObstacle);
            report.cause = StepCause::StructureObstacle;
            self.trace(
                f.agent,
                "blocked:structure",
                format_args!("step={next} kinds={:?}", info.unwalkable),
            );
            if state.bypass.take().is_none() {
                if let Some(key) = state.cache_key.take() {
                    self.drop_path(&key);
                }
            }
            report.outcome = self.best_effort(ctx, world, search, f, report);
            return;
        }

        let occupied = !info.occupants.is_empty();
        let conflict = !occupied && !ctx.reserve(f.agent, next);
        if conflict {
            self.fault(&mut report.faults, PathFault::ReservationConflict);
            self.trace(f.agent, "reserve:conflict", format_args!("step={next}"));
        }
        if occupied {
            state.last_blockers = info.occupants.iter().map(|a| a.id).collect();
        }
        report.cause = if f.me.fatigue > 0 {
            StepCause::Fatigue
        } else if conflict {
            StepCause::ReservationConflict
        } else if occupied {
            StepCause::AgentOccupancy
        } else {
            StepCause::None
        };
        self.trace_cause(f, "intent", report.cause, next, state);

        if occupied || conflict {
            state.active_mut().blocked += 1;
            match self.blocked_ladder(ctx, world, search, f, state, next, &info, report) {
                Ladder::Done(outcome) => {
                    report.outcome = outcome;
                    self.finish(ctx, world, search, f, state, report, Some(next));
                    return;
                }
                Ladder::Proceed(bypass_next) => next = bypass_next,
            }
        } else {
            state.active_mut().blocked = 0;
        }

        let Some(direction) = f.here.direction_to(next) else {
            state.active_mut().index += 1;
            self.finish(ctx, world, search, f, state, report, Some(next));
            return;
        };

        match world.move_agent(f.agent, direction) {
            Ok(()) => {
                state.active_mut().commit(next);
                report.outcome = MoveOutcome::Moved {
                    direction,
                    to: next,
                };
                let fresh = state.bypass.as_ref().is_some_and(|b| b.created == f.tick);
                if state.on_bypass() && !fresh && is_road_like(&*world, f.here) {
                    state.bypass = None;
                    self.trace(f.agent, "bypass:onRoad", format_args!("at={}", f.here));
                }
            }
            Err(MoveError::Tired) => {
                ctx.release(f.agent, next);
                report.outcome = MoveOutcome::Tired;
                report.cause = StepCause::Fatigue;
            }
            Err(err) => {
                ctx.release(f.agent, next);
                self.trace(f.agent, "move:rejected", format_args!("err={}", err.label()));
                report.rejected = Some(err);
                report.outcome = self.best_effort(ctx, world, search, f, report);
                if !report.outcome.issued_move() {
                    if let Some(key) = state.cache_key.take() {
                        self.drop_path(&key);
                    }
                }
            }
        }
        self.trace_cause(f, "result", report.cause, next, state);
        self.finish(ctx, world, search, f, state, report, Some(next));
    }

    /// Stuck accounting, the segment hint and the bypass rejoin check.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        state: &mut AgentPathState,
        report: &mut StepReport,
        next: Option<Position>,
    ) {
        self.account_stuck(ctx, world, search, f, state, report, next);

        if let Some(next) = next {
            if f.visualize || self.debug.pathing(PathingFlag::Visual) {
                report.segment = Some((f.here, next));
            }
        }

        self.rejoin(f, state, report);

        if self.debug.pathing(PathingFlag::Detail) {
            let active = state.active();
            debug!(
                target: "waypath::pathing::detail",
                agent = f.agent,
                here = %f.here,
                goal = %f.goal,
                index = active.index,
                len = active.steps.len(),
                blocked = active.blocked,
                stuck = state.stuck,
                bypass = state.on_bypass(),
                outcome = %report.outcome,
                "step detail"
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn account_stuck(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        state: &mut AgentPathState,
        report: &mut StepReport,
        next: Option<Position>,
    ) {
        if report.outcome == MoveOutcome::Tired || state.last_position != Some(f.here) {
            state.stuck = 0;
            state.last_position = Some(f.here);
            return;
        }

        state.stuck += 1;
        let reason = if state.active().blocked > 0 {
            StuckReason::BlockedTile
        } else if let (Some(err), false) = (&report.rejected, report.outcome.issued_move()) {
            StuckReason::rejected(err)
        } else if state.active().intended.is_some_and(|t| t != f.here) {
            state.active_mut().blocked += 1;
            report.cause = StepCause::GhostBlock;
            StuckReason::GhostBlock
        } else {
            StuckReason::NoAdvanceOnCursor
        };
        if state.stuck <= self.config.stuck_threshold {
            self.trace(
                f.agent,
                "stuck:increment",
                format_args!("stuck={} reason={reason} blockers={:?}", state.stuck, state.last_blockers),
            );
        }

        let ghost = reason == StuckReason::GhostBlock;
        state.last_stuck_reason = Some(reason);

        if ghost && state.stuck >= 2 && state.stuck < self.config.stuck_threshold {
            self.divert_ghost(ctx, world, f, state, report, next);
        }
        if state.stuck >= self.config.stuck_threshold {
            self.stuck_ladder(ctx, world, search, f, state, report);
        }
    }

    fn base_aged_out(&self, state: &AgentPathState, tick: u64) -> bool {
        self.config.repath_after > 0
            && tick.saturating_sub(state.created_tick) >= self.config.repath_after
    }

    /// Advance the active cursor and return the tile to enter next. A
    /// finished bypass hands control back to the base path.
    fn next_on_active(&mut self, state: &mut AgentPathState, here: Position) -> Option<Position> {
        let active = state.active_mut();
        active.confirm_arrival(here);
        active.skip_self_steps(here);
        if state.bypass.as_ref().is_some_and(|b| b.cursor.is_exhausted()) {
            state.bypass = None;
            state.base.skip_self_steps(here);
        }
        state.active().next_step()
    }

    /// A next step that is not a neighbour means the stored path no longer
    /// matches where the agent is. Rebuild from here.
    #[allow(clippy::too_many_arguments)]
    fn guard_desync(
        &mut self,
        ctx: &mut TickContext,
        world: &dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        state: &mut AgentPathState,
        report: &mut StepReport,
        next: Position,
    ) -> Option<Position> {
        if is_valid_next(world, f.here, next) {
            return Some(next);
        }
        self.fault(&mut report.faults, PathFault::PathDesync);
        self.trace(
            f.agent,
            "desync:pathGap",
            format_args!("here={} next={next} index={}", f.here, state.active().index),
        );

        if state.bypass.take().is_some() {
            state.base.skip_self_steps(f.here);
            if let Some(base_next) = state.base.next_step().filter(|n| is_valid_next(world, f.here, *n)) {
                return Some(base_next);
            }
        }
        if let Some(key) = state.cache_key {
            self.drop_path(&key);
        }
        self.rebase(ctx, world, search, f, state, report);
        state
            .base
            .next_step()
            .filter(|n| is_valid_next(world, f.here, *n))
    }

    /// Age an unfulfilled commitment: promote it to a block, then hard-reset
    /// the base path.
    #[allow(clippy::too_many_arguments)]
    fn age_ghost(
        &mut self,
        ctx: &mut TickContext,
        world: &dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        state: &mut AgentPathState,
        report: &mut StepReport,
        next: Position,
    ) -> Option<Position> {
        let Some(age) = state.active_mut().age_commitment(f.here) else {
            return Some(next);
        };
        if age == self.config.ghost_promote_age {
            state.active_mut().blocked += 1;
            self.fault(&mut report.faults, PathFault::GhostBlock);
            self.trace(f.agent, "ghostBlocked:promote", format_args!("age={age}"));
            return Some(next);
        }
        if age < self.config.ghost_reset_age {
            return Some(next);
        }

        self.trace(f.agent, "ghostBlocked:hardReset", format_args!("age={age}"));
        report.escalations.push(Escalation::GhostReset);
        if let Some(key) = state.cache_key.take() {
            self.drop_path(&key);
        }
        state.bypass = None;
        self.rebase(ctx, world, search, f, state, report);
        state
            .base
            .next_step()
            .filter(|n| is_valid_next(world, f.here, *n))
    }

    /// Replace the base path with one starting at the agent's tile.
    pub(crate) fn rebase(
        &mut self,
        ctx: &mut TickContext,
        world: &dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        state: &mut AgentPathState,
        report: &mut StepReport,
    ) {
        let key = PathKey::new(f.here, f.goal, f.range);
        let steps = self.fetch_base(ctx, world, search, key, f.ttl, report);
        self.trace(f.agent, "base:recompute", format_args!("key={key} len={}", steps.len()));
        state.replace_base(key, steps, f.tick);
    }

    /// Base paths ignore other agents so they stay shareable.
    pub(crate) fn fetch_base(
        &mut self,
        ctx: &mut TickContext,
        world: &dyn WorldHost,
        search: &mut dyn PathSearch,
        key: PathKey,
        ttl: Option<u64>,
        report: &mut StepReport,
    ) -> Vec<Position> {
        let tick = ctx.tick();
        let config = &self.config;
        let mut invalid_endpoint = false;
        let (steps, lookup) = self.paths.get_or_compute(&key, tick, ttl, || {
            let goal = SearchGoal::new(key.goal, key.range);
            match run_search(ctx, world, search, config, key.origin, goal, SearchOptions::base()) {
                Ok(result) => result.steps,
                Err(SearchError::InvalidEndpoint { .. }) => {
                    invalid_endpoint = true;
                    Vec::new()
                }
                Err(SearchError::CrossArea { .. }) => Vec::new(),
            }
        });

        if invalid_endpoint {
            self.fault(&mut report.faults, PathFault::InvalidEndpoint);
        }
        match lookup {
            CacheLookup::Hit => self.note(PathEvent::CacheHit),
            CacheLookup::Miss { evicted } => {
                self.note(PathEvent::CacheMiss);
                if evicted > 0 {
                    self.note(PathEvent::Evictions(evicted));
                }
            }
        }
        steps
    }

    /// One-off search from the agent's tile; the result is not cached.
    pub(crate) fn search_uncached(
        &mut self,
        ctx: &mut TickContext,
        world: &dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        options: SearchOptions,
        report: &mut StepReport,
    ) -> Vec<Position> {
        let goal = SearchGoal::new(f.goal, f.range);
        match run_search(ctx, world, search, &self.config, f.here, goal, options) {
            Ok(result) => result.steps,
            Err(SearchError::InvalidEndpoint { .. }) => {
                self.fault(&mut report.faults, PathFault::InvalidEndpoint);
                Vec::new()
            }
            Err(SearchError::CrossArea { .. }) => Vec::new(),
        }
    }

    /// Uncached move toward the goal around other agents, or a straight
    /// step when no route is found.
    pub(crate) fn best_effort(
        &mut self,
        ctx: &mut TickContext,
        world: &mut dyn WorldHost,
        search: &mut dyn PathSearch,
        f: &StepFrame,
        report: &mut StepReport,
    ) -> MoveOutcome {
        self.note(PathEvent::Fallback);
        let steps = self.search_uncached(
            ctx,
            &*world,
            search,
            f,
            SearchOptions::avoiding_agents(None),
            report,
        );
        let tile = steps
            .first()
            .copied()
            .filter(|n| is_valid_next(&*world, f.here, *n))
            .or_else(|| f.here.direction_to(f.goal).and_then(|d| f.here.step(d)));
        let Some(tile) = tile else {
            return MoveOutcome::Stalled;
        };
        let Some(direction) = f.here.direction_to(tile) else {
            return MoveOutcome::Stalled;
        };
        if f.me.fatigue > 0 {
            return MoveOutcome::Tired;
        }
        if !ctx.reserve(f.agent, tile) {
            return MoveOutcome::Stalled;
        }
        match world.move_agent(f.agent, direction) {
            Ok(()) => MoveOutcome::Fallback { direction },
            Err(err) => {
                ctx.release(f.agent, tile);
                if err == MoveError::Tired {
                    return MoveOutcome::Tired;
                }
                report.rejected = Some(err);
                MoveOutcome::Stalled
            }
        }
    }

    fn trace_cause(
        &self,
        f: &StepFrame,
        phase: &str,
        cause: StepCause,
        next: Position,
        state: &AgentPathState,
    ) {
        if self.debug.pathing(PathingFlag::Causes) {
            trace!(
                target: "waypath::pathing::cause",
                agent = f.agent,
                phase,
                cause = cause.label(),
                here = %f.here,
                next = %next,
                index = state.active().index,
                bypass = state.on_bypass(),
                "step cause"
            );
        }
    }
}

enum FastPath {
    OutOfReach,
    /// The direct tile is blocked or the move was refused.
    Refused,
    Moved(MoveOutcome),
}

/// Result of the blocked-tile ladder.
pub(crate) enum Ladder {
    /// A remedy issued this tick's move (or decided none is possible).
    Done(MoveOutcome),
    /// A bypass was installed; move onto its first tile.
    Proceed(Position),
}
