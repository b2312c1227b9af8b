use std::cell::Cell;

use pathfinding::directed::astar::astar;

use crate::modules::geometry::Position;
use crate::modules::search::{PathSearch, SearchRequest, SearchResult};

/// Tile costs are scaled so that a one-unit diagonal surcharge only decides
/// between routes of equal cost. Holds while a route has fewer than this
/// many steps.
const COST_SCALE: u64 = 4096;

/// Reference search primitive: 8-way A* over one area.
///
/// Every expanded node costs one operation. Once `max_ops` is spent the
/// frontier stops growing and the result is reported incomplete. Among
/// equal-cost routes the one with the fewest diagonal moves wins.
#[derive(Debug, Default)]
pub struct AStarSearch {
    calls: u64,
}

impl AStarSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of searches run so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl PathSearch for AStarSearch {
    fn search(&mut self, request: SearchRequest<'_>) -> SearchResult {
        self.calls += 1;
        let SearchRequest {
            origin,
            goal,
            cost,
            max_ops,
            ..
        } = request;

        if origin.within_range(goal.pos, goal.range) {
            return SearchResult {
                steps: Vec::new(),
                incomplete: false,
                ops: 0,
            };
        }

        let ops = Cell::new(0u32);

        let found = astar(
            &origin,
            |&pos: &Position| {
                let spent = ops.get();
                if spent >= max_ops {
                    return Vec::new();
                }
                ops.set(spent + 1);
                pos.neighbors()
                    .filter_map(|(direction, next)| {
                        cost(next).map(|c| {
                            let surcharge = u64::from(direction.is_diagonal());
                            (next, u64::from(c) * COST_SCALE + surcharge)
                        })
                    })
                    .collect::<Vec<_>>()
            },
            |pos| u64::from(pos.range_to(goal.pos).saturating_sub(goal.range)) * COST_SCALE,
            |pos| pos.within_range(goal.pos, goal.range),
        );

        match found {
            Some((mut path, _)) => {
                path.remove(0);
                SearchResult {
                    steps: path,
                    incomplete: false,
                    ops: ops.get(),
                }
            }
            None => SearchResult {
                steps: Vec::new(),
                incomplete: true,
                ops: ops.get(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::geometry::AreaId;
    use crate::modules::search::SearchGoal;

    fn pos(x: i32, y: i32) -> Position {
        Position::new(AreaId(0), x, y)
    }

    fn run(origin: Position, goal: SearchGoal, max_ops: u32, cost: &dyn Fn(Position) -> Option<u32>) -> SearchResult {
        AStarSearch::new().search(SearchRequest {
            origin,
            goal,
            cost,
            max_ops,
            avoid_agents: false,
        })
    }

    #[test]
    fn straight_line_excludes_origin() {
        let result = run(pos(5, 5), SearchGoal::new(pos(9, 5), 0), 1000, &|_| Some(1));
        assert!(result.is_complete());
        assert_eq!(result.steps, vec![pos(6, 5), pos(7, 5), pos(8, 5), pos(9, 5)]);
    }

    #[test]
    fn equal_cost_routes_keep_diagonals_to_a_minimum() {
        let result = run(pos(5, 5), SearchGoal::new(pos(9, 6), 0), 1000, &|_| Some(1));
        assert_eq!(result.steps.len(), 4);
        let mut prev = pos(5, 5);
        let mut diagonals = 0;
        for step in &result.steps {
            let direction = prev.direction_to(*step).unwrap();
            diagonals += usize::from(direction.is_diagonal());
            prev = *step;
        }
        assert_eq!(diagonals, 1);
    }

    #[test]
    fn range_goal_stops_early() {
        let result = run(pos(5, 5), SearchGoal::new(pos(9, 5), 1), 1000, &|_| Some(1));
        assert_eq!(result.steps.len(), 3);
        assert!(result.steps.last().unwrap().within_range(pos(9, 5), 1));
    }

    #[test]
    fn routes_around_impassable_tiles() {
        let wall = |p: Position| (p.x != 7 || p.y > 8).then_some(1);
        let result = run(pos(5, 5), SearchGoal::new(pos(9, 5), 0), 1000, &wall);
        assert!(result.is_complete());
        assert!(result.steps.iter().all(|p| p.x != 7 || p.y > 8));
        let mut prev = pos(5, 5);
        for step in &result.steps {
            assert!(prev.is_adjacent(*step));
            prev = *step;
        }
    }

    #[test]
    fn prefers_cheap_tiles() {
        // A road along y = 6 is cheaper than plain ground on y = 5.
        let cost = |p: Position| Some(if p.y == 6 { 1 } else { 10 });
        let result = run(pos(2, 6), SearchGoal::new(pos(10, 6), 0), 1000, &cost);
        assert!(result.steps.iter().all(|p| p.y == 6));
    }

    #[test]
    fn exhausted_budget_is_incomplete() {
        let result = run(pos(1, 1), SearchGoal::new(pos(48, 48), 0), 5, &|_| Some(1));
        assert!(result.incomplete);
        assert!(result.steps.is_empty());
        assert_eq!(result.ops, 5);
    }

    #[test]
    fn already_in_range_is_complete_and_empty() {
        let result = run(pos(5, 5), SearchGoal::new(pos(6, 5), 1), 1000, &|_| Some(1));
        assert!(result.is_complete());
        assert!(result.steps.is_empty());
    }
}
