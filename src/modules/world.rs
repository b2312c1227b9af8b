use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modules::geometry::{AreaId, Direction, Position};

pub type AgentId = u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    #[default]
    Plain,
    Swamp,
    Wall,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Road,
    Container,
    Portal,
    Rampart,
    Spawn,
    Extension,
    Wall,
    Tower,
    Storage,
    Observer,
    PowerSpawn,
    Lab,
    Terminal,
    Nuker,
    Factory,
    Link,
}

impl StructureKind {
    pub const fn label(self) -> &'static str {
        match self {
            StructureKind::Road => "road",
            StructureKind::Container => "container",
            StructureKind::Portal => "portal",
            StructureKind::Rampart => "rampart",
            StructureKind::Spawn => "spawn",
            StructureKind::Extension => "extension",
            StructureKind::Wall => "wall",
            StructureKind::Tower => "tower",
            StructureKind::Storage => "storage",
            StructureKind::Observer => "observer",
            StructureKind::PowerSpawn => "power_spawn",
            StructureKind::Lab => "lab",
            StructureKind::Terminal => "terminal",
            StructureKind::Nuker => "nuker",
            StructureKind::Factory => "factory",
            StructureKind::Link => "link",
        }
    }

    /// Kinds that always block movement.
    pub const fn is_obstacle(self) -> bool {
        matches!(
            self,
            StructureKind::Spawn
                | StructureKind::Extension
                | StructureKind::Wall
                | StructureKind::Tower
                | StructureKind::Storage
                | StructureKind::Observer
                | StructureKind::PowerSpawn
                | StructureKind::Lab
                | StructureKind::Terminal
                | StructureKind::Nuker
                | StructureKind::Factory
                | StructureKind::Link
        )
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for StructureKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "road" => Ok(StructureKind::Road),
            "container" => Ok(StructureKind::Container),
            "portal" => Ok(StructureKind::Portal),
            "rampart" => Ok(StructureKind::Rampart),
            "spawn" => Ok(StructureKind::Spawn),
            "extension" => Ok(StructureKind::Extension),
            "wall" | "constructed_wall" => Ok(StructureKind::Wall),
            "tower" => Ok(StructureKind::Tower),
            "storage" => Ok(StructureKind::Storage),
            "observer" => Ok(StructureKind::Observer),
            "power_spawn" | "powerspawn" => Ok(StructureKind::PowerSpawn),
            "lab" => Ok(StructureKind::Lab),
            "terminal" => Ok(StructureKind::Terminal),
            "nuker" => Ok(StructureKind::Nuker),
            "factory" => Ok(StructureKind::Factory),
            "link" => Ok(StructureKind::Link),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub kind: StructureKind,
    pub owned: bool,
    pub public: bool,
}

impl Structure {
    pub const fn new(kind: StructureKind) -> Self {
        Self {
            kind,
            owned: true,
            public: false,
        }
    }

    pub const fn foreign(kind: StructureKind) -> Self {
        Self {
            kind,
            owned: false,
            public: false,
        }
    }

    pub const fn is_walkable(&self) -> bool {
        match self.kind {
            StructureKind::Road | StructureKind::Container | StructureKind::Portal => true,
            StructureKind::Rampart => self.owned || self.public,
            kind => !kind.is_obstacle(),
        }
    }
}

/// A pending build; always walkable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionSite {
    pub kind: StructureKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub position: Position,
    pub fatigue: u32,
    pub owned: bool,
    /// Busy working a construction site; such agents rarely yield their tile.
    pub building: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("area {0} is not visible")]
    AreaNotVisible(AreaId),
    #[error("position {0} is outside the world")]
    OutOfBounds(Position),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("agent is fatigued")]
    Tired,
    #[error("agent {0} not found")]
    UnknownAgent(AgentId),
    #[error("agent cannot move")]
    NoMoveParts,
    #[error("agent is still spawning")]
    Busy,
    #[error("agent is not controlled by us")]
    NotOwner,
    #[error("direction leaves the world")]
    InvalidDirection,
}

impl MoveError {
    pub const fn label(&self) -> &'static str {
        match self {
            MoveError::Tired => "tired",
            MoveError::UnknownAgent(_) => "unknownAgent",
            MoveError::NoMoveParts => "noMoveParts",
            MoveError::Busy => "busy",
            MoveError::NotOwner => "notOwner",
            MoveError::InvalidDirection => "invalidDirection",
        }
    }
}

/// The host world as seen by the navigation engine: tile lookups plus a
/// single-step move intent per agent per tick.
pub trait WorldHost {
    fn in_bounds(&self, pos: Position) -> bool;

    fn terrain(&self, pos: Position) -> Result<Terrain, WorldError>;

    fn structures_at(&self, pos: Position) -> Result<Vec<Structure>, WorldError>;

    fn sites_at(&self, pos: Position) -> Result<Vec<ConstructionSite>, WorldError>;

    fn agents_at(&self, pos: Position) -> Result<Vec<AgentInfo>, WorldError>;

    fn agent(&self, id: AgentId) -> Option<AgentInfo>;

    fn structures_in(&self, area: AreaId) -> Result<Vec<(Position, Structure)>, WorldError>;

    fn sites_in(&self, area: AreaId) -> Result<Vec<(Position, ConstructionSite)>, WorldError>;

    /// Road tiles a planner intends to build later.
    fn planned_roads(&self, _area: AreaId) -> Vec<Position> {
        Vec::new()
    }

    /// Queue a one-tile move. Acceptance does not guarantee the agent arrives.
    fn move_agent(&mut self, id: AgentId, dir: Direction) -> Result<(), MoveError>;
}

/// Snapshot of what sits on a tile, from one agent's point of view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileInfo {
    pub occupants: Vec<AgentInfo>,
    pub structures: Vec<StructureKind>,
    pub unwalkable: Vec<StructureKind>,
    pub has_site: bool,
    pub road_like: bool,
    pub wall: bool,
}

impl TileInfo {
    pub fn is_obstructed(&self) -> bool {
        self.wall || !self.unwalkable.is_empty()
    }
}

/// Lookup failures degrade to an empty, unobstructed description.
pub fn classify_tile(world: &dyn WorldHost, pos: Position, me: AgentId) -> TileInfo {
    let mut info = TileInfo {
        wall: matches!(world.terrain(pos), Ok(Terrain::Wall)),
        ..TileInfo::default()
    };

    if let Ok(agents) = world.agents_at(pos) {
        info.occupants = agents.into_iter().filter(|a| a.id != me).collect();
    }
    if let Ok(structures) = world.structures_at(pos) {
        for s in structures {
            info.structures.push(s.kind);
            if s.kind == StructureKind::Road {
                info.road_like = true;
            }
            if !s.is_walkable() {
                info.unwalkable.push(s.kind);
            }
        }
    }
    if let Ok(sites) = world.sites_at(pos) {
        info.has_site = !sites.is_empty();
        if sites.iter().any(|c| c.kind == StructureKind::Road) {
            info.road_like = true;
        }
    }
    info
}

/// Built road or road construction site on the tile.
pub fn is_road_like(world: &dyn WorldHost, pos: Position) -> bool {
    let road = world
        .structures_at(pos)
        .map(|s| s.iter().any(|s| s.kind == StructureKind::Road))
        .unwrap_or(false);
    road || world
        .sites_at(pos)
        .map(|c| c.iter().any(|c| c.kind == StructureKind::Road))
        .unwrap_or(false)
}

/// Interior, walkable and not holding another agent.
pub fn is_free_tile(world: &dyn WorldHost, pos: Position, me: AgentId) -> bool {
    if !pos.is_interior() || !world.in_bounds(pos) {
        return false;
    }
    let info = classify_tile(world, pos, me);
    !info.is_obstructed() && info.occupants.is_empty()
}

/// A spawn adjacent to `pos`, if any.
pub fn adjacent_spawn(world: &dyn WorldHost, pos: Position) -> Option<Position> {
    pos.neighbors().map(|(_, p)| p).find(|p| {
        world
            .structures_at(*p)
            .map(|s| s.iter().any(|s| s.kind == StructureKind::Spawn))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rampart_walkability_depends_on_ownership() {
        let mut rampart = Structure::foreign(StructureKind::Rampart);
        assert!(!rampart.is_walkable());
        rampart.public = true;
        assert!(rampart.is_walkable());
        assert!(Structure::new(StructureKind::Rampart).is_walkable());
    }

    #[test]
    fn passable_and_blocking_kinds() {
        for kind in [
            StructureKind::Road,
            StructureKind::Container,
            StructureKind::Portal,
        ] {
            assert!(Structure::foreign(kind).is_walkable(), "{kind} should be walkable");
        }
        for kind in [
            StructureKind::Spawn,
            StructureKind::Extension,
            StructureKind::Tower,
            StructureKind::Link,
        ] {
            assert!(!Structure::new(kind).is_walkable(), "{kind} should block");
        }
    }

    #[test]
    fn structure_kind_parses_aliases() {
        assert_eq!("Power_Spawn".parse(), Ok(StructureKind::PowerSpawn));
        assert_eq!("constructed_wall".parse(), Ok(StructureKind::Wall));
        assert!("moat".parse::<StructureKind>().is_err());
    }
}
