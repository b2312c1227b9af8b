use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tiles per area along each axis.
pub const AREA_SIZE: i32 = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(pub u32);

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub area: AreaId,
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(area: AreaId, x: i32, y: i32) -> Self {
        Self { area, x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            area: self.area,
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// True when the tile lies inside its area's grid.
    pub const fn in_area_bounds(self) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < AREA_SIZE && self.y < AREA_SIZE
    }

    /// Excludes the outermost ring, which holds area exits.
    pub const fn is_interior(self) -> bool {
        self.x >= 1 && self.y >= 1 && self.x < AREA_SIZE - 1 && self.y < AREA_SIZE - 1
    }

    /// Chebyshev distance. Tiles in different areas are treated as unreachable.
    pub fn range_to(self, other: Position) -> u32 {
        if self.area != other.area {
            return u32::MAX;
        }
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    pub fn within_range(self, other: Position, range: u32) -> bool {
        self.range_to(other) <= range
    }

    pub fn is_adjacent(self, other: Position) -> bool {
        self.range_to(other) <= 1
    }

    /// General heading toward `other`; `None` on the same tile or across areas.
    pub fn direction_to(self, other: Position) -> Option<Direction> {
        if self.area != other.area {
            return None;
        }
        Direction::from_delta((other.x - self.x).signum(), (other.y - self.y).signum())
    }

    /// Neighbor in `dir`, or `None` when it would leave the area.
    pub fn step(self, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.delta();
        let next = self.offset(dx, dy);
        next.in_area_bounds().then_some(next)
    }

    pub fn neighbors(self) -> impl Iterator<Item = (Direction, Position)> {
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| self.step(dir).map(|pos| (dir, pos)))
    }

    /// Stable string form `area:x,y`, used inside cache keys.
    pub fn key(self) -> String {
        format!("{}:{},{}", self.area.0, self.x, self.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.area.0, self.x, self.y)
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (area, coords) = s
            .trim()
            .split_once(':')
            .ok_or("position must be formatted as area:x,y")?;
        let (x, y) = coords
            .split_once(',')
            .ok_or("position must be formatted as area:x,y")?;

        let area = area
            .trim()
            .parse::<u32>()
            .map_err(|_| "area must be a non-negative integer")?;
        let x = x.trim().parse::<i32>().map_err(|_| "x must be an integer")?;
        let y = y.trim().parse::<i32>().map_err(|_| "y must be an integer")?;

        Ok(Position::new(AreaId(area), x, y))
    }
}

/// Eight-way heading, numbered clockwise from the top starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Top = 1,
    TopRight = 2,
    Right = 3,
    BottomRight = 4,
    Bottom = 5,
    BottomLeft = 6,
    Left = 7,
    TopLeft = 8,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Top,
        Direction::TopRight,
        Direction::Right,
        Direction::BottomRight,
        Direction::Bottom,
        Direction::BottomLeft,
        Direction::Left,
        Direction::TopLeft,
    ];

    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Top => (0, -1),
            Direction::TopRight => (1, -1),
            Direction::Right => (1, 0),
            Direction::BottomRight => (1, 1),
            Direction::Bottom => (0, 1),
            Direction::BottomLeft => (-1, 1),
            Direction::Left => (-1, 0),
            Direction::TopLeft => (-1, -1),
        }
    }

    pub const fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        match (dx, dy) {
            (0, -1) => Some(Direction::Top),
            (1, -1) => Some(Direction::TopRight),
            (1, 0) => Some(Direction::Right),
            (1, 1) => Some(Direction::BottomRight),
            (0, 1) => Some(Direction::Bottom),
            (-1, 1) => Some(Direction::BottomLeft),
            (-1, 0) => Some(Direction::Left),
            (-1, -1) => Some(Direction::TopLeft),
            _ => None,
        }
    }

    pub const fn is_diagonal(self) -> bool {
        let (dx, dy) = self.delta();
        dx != 0 && dy != 0
    }

    pub const fn reverse(self) -> Direction {
        match self {
            Direction::Top => Direction::Bottom,
            Direction::TopRight => Direction::BottomLeft,
            Direction::Right => Direction::Left,
            Direction::BottomRight => Direction::TopLeft,
            Direction::Bottom => Direction::Top,
            Direction::BottomLeft => Direction::TopRight,
            Direction::Left => Direction::Right,
            Direction::TopLeft => Direction::BottomRight,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Direction::Top => "top",
            Direction::TopRight => "top_right",
            Direction::Right => "right",
            Direction::BottomRight => "bottom_right",
            Direction::Bottom => "bottom",
            Direction::BottomLeft => "bottom_left",
            Direction::Left => "left",
            Direction::TopLeft => "top_left",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, y: i32) -> Position {
        Position::new(AreaId(0), x, y)
    }

    #[test]
    fn range_is_chebyshev() {
        assert_eq!(pos(5, 5).range_to(pos(8, 6)), 3);
        assert_eq!(pos(5, 5).range_to(pos(5, 5)), 0);
        assert!(pos(5, 5).is_adjacent(pos(6, 6)));
        assert!(!pos(5, 5).is_adjacent(pos(7, 5)));
    }

    #[test]
    fn different_areas_are_out_of_range() {
        let a = Position::new(AreaId(1), 5, 5);
        assert_eq!(a.range_to(pos(5, 5)), u32::MAX);
        assert_eq!(a.direction_to(pos(5, 6)), None);
    }

    #[test]
    fn direction_points_toward_far_targets() {
        assert_eq!(pos(5, 5).direction_to(pos(9, 1)), Some(Direction::TopRight));
        assert_eq!(pos(5, 5).direction_to(pos(5, 9)), Some(Direction::Bottom));
        assert_eq!(pos(5, 5).direction_to(pos(5, 5)), None);
    }

    #[test]
    fn step_stays_inside_the_area() {
        assert_eq!(pos(0, 0).step(Direction::Left), None);
        assert_eq!(pos(0, 0).step(Direction::BottomRight), Some(pos(1, 1)));
        assert_eq!(pos(49, 10).neighbors().count(), 5);
    }

    #[test]
    fn direction_deltas_round_trip_through_reverse() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(dir));
            assert_eq!(dir.reverse().reverse(), dir);
            let (rx, ry) = dir.reverse().delta();
            assert_eq!((dx + rx, dy + ry), (0, 0));
        }
    }

    #[test]
    fn parses_position_keys() {
        let parsed: Position = "3:10,42".parse().unwrap();
        assert_eq!(parsed, Position::new(AreaId(3), 10, 42));
        assert_eq!(parsed.key(), "3:10,42");
        assert!("10,42".parse::<Position>().is_err());
    }
}
