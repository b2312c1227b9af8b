use thiserror::Error;
use tracing::trace;

use crate::modules::config::NavConfig;
use crate::modules::context::TickContext;
use crate::modules::geometry::Position;
use crate::modules::world::WorldHost;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchGoal {
    pub pos: Position,
    pub range: u32,
}

impl SearchGoal {
    pub const fn new(pos: Position, range: u32) -> Self {
        Self { pos, range }
    }
}

/// One call into the shortest-path primitive. `cost` already reflects
/// `avoid_agents`; the flag is informational for primitives that care.
pub struct SearchRequest<'a> {
    pub origin: Position,
    pub goal: SearchGoal,
    pub cost: &'a dyn Fn(Position) -> Option<u32>,
    pub max_ops: u32,
    pub avoid_agents: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Tiles to walk, excluding the origin.
    pub steps: Vec<Position>,
    pub incomplete: bool,
    pub ops: u32,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self {
            steps: Vec::new(),
            incomplete: true,
            ops: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.incomplete
    }
}

/// External grid-search primitive.
pub trait PathSearch {
    fn search(&mut self, request: SearchRequest<'_>) -> SearchResult;
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("invalid endpoint: origin {origin} (valid: {origin_valid}), goal {goal} (valid: {goal_valid})")]
    InvalidEndpoint {
        origin: Position,
        goal: Position,
        origin_valid: bool,
        goal_valid: bool,
    },
    #[error("search from {origin} to {goal} spans more than one area")]
    CrossArea { origin: Position, goal: Position },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_ops: Option<u32>,
    pub avoid_agents: bool,
    pub plain_cost: Option<u32>,
    pub swamp_cost: Option<u32>,
}

impl SearchOptions {
    /// Stable base-path search: other agents are ignored.
    pub fn base() -> Self {
        Self::default()
    }

    pub fn avoiding_agents(max_ops: Option<u32>) -> Self {
        Self {
            max_ops,
            avoid_agents: true,
            ..Self::default()
        }
    }
}

/// Validate endpoints, size the operation budget and hand the tick's cost
/// model to the primitive.
pub fn run_search(
    ctx: &mut TickContext,
    world: &dyn WorldHost,
    primitive: &mut dyn PathSearch,
    config: &NavConfig,
    origin: Position,
    goal: SearchGoal,
    options: SearchOptions,
) -> Result<SearchResult, SearchError> {
    let origin_valid = origin.in_area_bounds() && world.in_bounds(origin);
    let goal_valid = goal.pos.in_area_bounds() && world.in_bounds(goal.pos);
    if !origin_valid || !goal_valid {
        return Err(SearchError::InvalidEndpoint {
            origin,
            goal: goal.pos,
            origin_valid,
            goal_valid,
        });
    }
    if origin.area != goal.pos.area {
        return Err(SearchError::CrossArea {
            origin,
            goal: goal.pos,
        });
    }

    let max_ops = options
        .max_ops
        .unwrap_or_else(|| config.budget.for_distance(origin.range_to(goal.pos)));
    let plain = options.plain_cost.unwrap_or(config.costs.plain);
    let swamp = options.swamp_cost.unwrap_or(config.costs.swamp);
    let model = ctx.cost_model(world, origin.area, &config.costs);
    let avoid_agents = options.avoid_agents;

    let cost = |pos: Position| -> Option<u32> {
        let terrain = world.terrain(pos).ok()?;
        let weight = model.weight(pos, terrain, plain, swamp)?;
        if avoid_agents && pos != origin {
            let occupied = world.agents_at(pos).map(|a| !a.is_empty()).unwrap_or(false);
            if occupied {
                return None;
            }
        }
        Some(weight)
    };

    let result = primitive.search(SearchRequest {
        origin,
        goal,
        cost: &cost,
        max_ops,
        avoid_agents,
    });
    trace!(
        target: "waypath::search",
        origin = %origin,
        goal = %goal.pos,
        range = goal.range,
        max_ops,
        ops = result.ops,
        steps = result.steps.len(),
        incomplete = result.incomplete,
        "search finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::geometry::AreaId;
    use crate::modules::grid::GridWorld;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Position, SearchGoal, u32, bool)>,
    }

    impl PathSearch for Recorder {
        fn search(&mut self, request: SearchRequest<'_>) -> SearchResult {
            self.calls.push((
                request.origin,
                request.goal,
                request.max_ops,
                request.avoid_agents,
            ));
            SearchResult {
                steps: vec![request.goal.pos],
                incomplete: false,
                ops: 1,
            }
        }
    }

    fn setup() -> (GridWorld, TickContext, NavConfig) {
        let mut world = GridWorld::new();
        world.add_area(AreaId(0));
        (world, TickContext::new(1, 10_000), NavConfig::default())
    }

    #[test]
    fn invalid_endpoint_skips_the_primitive() {
        let (world, mut ctx, config) = setup();
        let mut recorder = Recorder::default();
        let origin = Position::new(AreaId(0), 5, 5);
        let goal = SearchGoal::new(Position::new(AreaId(0), 60, 5), 1);

        let err = run_search(&mut ctx, &world, &mut recorder, &config, origin, goal, SearchOptions::base())
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidEndpoint { goal_valid: false, .. }));
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn unknown_area_is_an_invalid_endpoint() {
        let (world, mut ctx, config) = setup();
        let mut recorder = Recorder::default();
        let origin = Position::new(AreaId(7), 5, 5);
        let goal = SearchGoal::new(Position::new(AreaId(0), 6, 5), 1);

        let err = run_search(&mut ctx, &world, &mut recorder, &config, origin, goal, SearchOptions::base())
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidEndpoint { origin_valid: false, .. }));
    }

    #[test]
    fn budget_scales_with_distance() {
        let (world, mut ctx, config) = setup();
        let mut recorder = Recorder::default();
        let origin = Position::new(AreaId(0), 5, 5);

        for (dx, expected) in [(2, 150), (10, 620), (30, 2000)] {
            let goal = SearchGoal::new(origin.offset(dx, 0), 1);
            run_search(&mut ctx, &world, &mut recorder, &config, origin, goal, SearchOptions::base())
                .unwrap();
            assert_eq!(recorder.calls.last().unwrap().2, expected);
        }

        let goal = SearchGoal::new(origin.offset(30, 0), 1);
        run_search(
            &mut ctx,
            &world,
            &mut recorder,
            &config,
            origin,
            goal,
            SearchOptions::avoiding_agents(Some(42)),
        )
        .unwrap();
        assert_eq!(recorder.calls.last().unwrap().2, 42);
        assert!(recorder.calls.last().unwrap().3);
    }

    #[test]
    fn cost_model_is_built_once_per_tick() {
        let (world, mut ctx, config) = setup();
        let mut recorder = Recorder::default();
        let origin = Position::new(AreaId(0), 5, 5);
        let goal = SearchGoal::new(origin.offset(3, 3), 0);

        for _ in 0..3 {
            run_search(&mut ctx, &world, &mut recorder, &config, origin, goal, SearchOptions::base())
                .unwrap();
        }
        assert_eq!(ctx.cost_model_builds(), 1);
    }
}
