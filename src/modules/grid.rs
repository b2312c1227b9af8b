use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::modules::geometry::{AREA_SIZE, AreaId, Direction, Position};
use crate::modules::world::{
    AgentId, AgentInfo, ConstructionSite, MoveError, Structure, StructureKind, Terrain,
    WorldError, WorldHost,
};

/// Fatigue set on an agent that steps onto swamp without a road.
pub const SWAMP_FATIGUE: u32 = 1;

#[derive(Clone, Debug)]
struct Area {
    terrain: Vec<Terrain>,
}

impl Area {
    fn new() -> Self {
        Self {
            terrain: vec![Terrain::Plain; (AREA_SIZE * AREA_SIZE) as usize],
        }
    }

    fn index(pos: Position) -> usize {
        (pos.y * AREA_SIZE + pos.x) as usize
    }
}

#[derive(Clone, Debug)]
struct GridAgent {
    position: Position,
    fatigue: u32,
    owned: bool,
    building: bool,
    /// Moves are accepted but never carried out.
    frozen: bool,
}

impl GridAgent {
    fn info(&self, id: AgentId) -> AgentInfo {
        AgentInfo {
            id,
            position: self.position,
            fatigue: self.fatigue,
            owned: self.owned,
            building: self.building,
        }
    }
}

/// Why a queued move did not happen at the end of the tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BlockReason {
    Wall,
    Obstacle,
    /// Two or more agents wanted the same tile.
    Contested,
    /// The occupant stayed put.
    Occupied,
    Frozen,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum GridEvent {
    TickStarted {
        tick: u64,
    },
    AgentSpawned {
        agent: AgentId,
        position: Position,
    },
    AgentRemoved {
        agent: AgentId,
    },
    AgentMoved {
        agent: AgentId,
        from: Position,
        to: Position,
    },
    MoveBlocked {
        agent: AgentId,
        target: Position,
        reason: BlockReason,
    },
    TickCompleted {
        tick: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickResult {
    pub tick: u64,
    pub moved: usize,
    pub events: Vec<GridEvent>,
}

impl TickResult {
    pub fn blocked(&self) -> impl Iterator<Item = (AgentId, BlockReason)> + '_ {
        self.events.iter().filter_map(|event| match event {
            GridEvent::MoveBlocked { agent, reason, .. } => Some((*agent, *reason)),
            _ => None,
        })
    }
}

/// In-memory host world. Moves queued through `WorldHost::move_agent` are
/// resolved together by `end_tick`.
#[derive(Debug, Default)]
pub struct GridWorld {
    tick: u64,
    next_agent_id: AgentId,
    areas: HashMap<AreaId, Area>,
    structures: HashMap<Position, Vec<Structure>>,
    sites: HashMap<Position, Vec<ConstructionSite>>,
    planned: HashSet<Position>,
    agents: BTreeMap<AgentId, GridAgent>,
    occupied: HashMap<Position, AgentId>,
    intents: BTreeMap<AgentId, Direction>,
    events: Vec<GridEvent>,
}

impl GridWorld {
    pub fn new() -> Self {
        Self {
            next_agent_id: 1,
            ..Self::default()
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn events(&self) -> &[GridEvent] {
        &self.events
    }

    pub fn add_area(&mut self, area: AreaId) {
        self.areas.entry(area).or_insert_with(Area::new);
    }

    pub fn set_terrain(&mut self, pos: Position, terrain: Terrain) {
        if !pos.in_area_bounds() {
            return;
        }
        if let Some(area) = self.areas.get_mut(&pos.area) {
            area.terrain[Area::index(pos)] = terrain;
        }
    }

    pub fn add_structure(&mut self, pos: Position, structure: Structure) {
        self.structures.entry(pos).or_default().push(structure);
    }

    /// Remove every structure of `kind` on the tile; returns how many went.
    pub fn remove_structure(&mut self, pos: Position, kind: StructureKind) -> usize {
        let Some(list) = self.structures.get_mut(&pos) else {
            return 0;
        };
        let before = list.len();
        list.retain(|s| s.kind != kind);
        let removed = before - list.len();
        if list.is_empty() {
            self.structures.remove(&pos);
        }
        removed
    }

    pub fn add_site(&mut self, pos: Position, site: ConstructionSite) {
        self.sites.entry(pos).or_default().push(site);
    }

    pub fn plan_road(&mut self, pos: Position) {
        self.planned.insert(pos);
    }

    /// Place a new owned agent, shifting along +x past occupied tiles.
    pub fn spawn_agent(&mut self, position: Position) -> AgentId {
        let mut pos = position;
        while self.occupied.contains_key(&pos) && pos.x < AREA_SIZE - 1 {
            pos = pos.offset(1, 0);
        }

        let id = self.next_agent_id.max(1);
        self.next_agent_id = id + 1;
        self.agents.insert(
            id,
            GridAgent {
                position: pos,
                fatigue: 0,
                owned: true,
                building: false,
                frozen: false,
            },
        );
        self.occupied.insert(pos, id);
        self.events.push(GridEvent::AgentSpawned {
            agent: id,
            position: pos,
        });
        id
    }

    pub fn remove_agent(&mut self, id: AgentId) -> bool {
        let Some(agent) = self.agents.remove(&id) else {
            return false;
        };
        if self.occupied.get(&agent.position) == Some(&id) {
            self.occupied.remove(&agent.position);
        }
        self.intents.remove(&id);
        self.events.push(GridEvent::AgentRemoved { agent: id });
        true
    }

    pub fn set_fatigue(&mut self, id: AgentId, fatigue: u32) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.fatigue = fatigue;
        }
    }

    pub fn set_building(&mut self, id: AgentId, building: bool) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.building = building;
        }
    }

    pub fn set_owned(&mut self, id: AgentId, owned: bool) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.owned = owned;
        }
    }

    /// A frozen agent's moves are accepted and then silently dropped.
    pub fn set_frozen(&mut self, id: AgentId, frozen: bool) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.frozen = frozen;
        }
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    pub fn position_of(&self, id: AgentId) -> Option<Position> {
        self.agents.get(&id).map(|a| a.position)
    }

    pub fn pending_moves(&self) -> usize {
        self.intents.len()
    }

    fn area(&self, pos: Position) -> Result<&Area, WorldError> {
        let area = self
            .areas
            .get(&pos.area)
            .ok_or(WorldError::AreaNotVisible(pos.area))?;
        if !pos.in_area_bounds() {
            return Err(WorldError::OutOfBounds(pos));
        }
        Ok(area)
    }

    fn blocks_entry(&self, pos: Position) -> Option<BlockReason> {
        match self.terrain(pos) {
            Ok(Terrain::Wall) | Err(_) => return Some(BlockReason::Wall),
            Ok(_) => {}
        }
        let obstacle = self
            .structures
            .get(&pos)
            .is_some_and(|list| list.iter().any(|s| !s.is_walkable()));
        obstacle.then_some(BlockReason::Obstacle)
    }

    fn has_road(&self, pos: Position) -> bool {
        self.structures
            .get(&pos)
            .is_some_and(|list| list.iter().any(|s| s.kind == StructureKind::Road))
    }

    /// Resolve every queued move at once, then advance the tick.
    ///
    /// Moves into walls, obstacles or contested tiles fail. A move into an
    /// occupied tile succeeds only when the occupant leaves in the same
    /// tick, which covers swaps and rotations.
    pub fn end_tick(&mut self) -> TickResult {
        let tick = self.tick + 1;
        let mut events = vec![GridEvent::TickStarted { tick }];
        let intents = std::mem::take(&mut self.intents);

        let mut wanted: BTreeMap<AgentId, (Position, Position)> = BTreeMap::new();
        for (id, dir) in intents {
            let Some(agent) = self.agents.get(&id) else {
                continue;
            };
            let from = agent.position;
            let Some(to) = from.step(dir) else {
                continue;
            };
            let reason = if agent.frozen {
                Some(BlockReason::Frozen)
            } else {
                self.blocks_entry(to)
            };
            match reason {
                Some(reason) => events.push(GridEvent::MoveBlocked {
                    agent: id,
                    target: to,
                    reason,
                }),
                None => {
                    wanted.insert(id, (from, to));
                }
            }
        }

        let mut contenders: HashMap<Position, usize> = HashMap::new();
        for (_, to) in wanted.values() {
            *contenders.entry(*to).or_default() += 1;
        }
        let contested: Vec<AgentId> = wanted
            .iter()
            .filter(|(_, (_, to))| contenders.get(to).copied().unwrap_or(0) > 1)
            .map(|(id, _)| *id)
            .collect();
        for id in contested {
            if let Some((_, to)) = wanted.remove(&id) {
                events.push(GridEvent::MoveBlocked {
                    agent: id,
                    target: to,
                    reason: BlockReason::Contested,
                });
            }
        }

        loop {
            let stuck: Vec<AgentId> = wanted
                .iter()
                .filter(|(id, (_, to))| {
                    self.occupied
                        .get(to)
                        .is_some_and(|other| other != *id && !wanted.contains_key(other))
                })
                .map(|(id, _)| *id)
                .collect();
            if stuck.is_empty() {
                break;
            }
            for id in stuck {
                if let Some((_, to)) = wanted.remove(&id) {
                    events.push(GridEvent::MoveBlocked {
                        agent: id,
                        target: to,
                        reason: BlockReason::Occupied,
                    });
                }
            }
        }

        for (from, _) in wanted.values() {
            self.occupied.remove(from);
        }
        let moved = wanted.len();
        for (id, (from, to)) in &wanted {
            self.occupied.insert(*to, *id);
            events.push(GridEvent::AgentMoved {
                agent: *id,
                from: *from,
                to: *to,
            });
        }

        let swamp_entries: HashSet<AgentId> = wanted
            .iter()
            .filter(|(_, (_, to))| {
                matches!(self.terrain(*to), Ok(Terrain::Swamp)) && !self.has_road(*to)
            })
            .map(|(id, _)| *id)
            .collect();
        for (id, agent) in self.agents.iter_mut() {
            match wanted.get(id) {
                Some((_, to)) => {
                    agent.position = *to;
                    agent.fatigue = if swamp_entries.contains(id) { SWAMP_FATIGUE } else { 0 };
                }
                None => agent.fatigue = agent.fatigue.saturating_sub(1),
            }
        }

        events.push(GridEvent::TickCompleted { tick });
        self.tick = tick;
        self.events.extend(events.iter().cloned());

        TickResult {
            tick,
            moved,
            events,
        }
    }
}

impl WorldHost for GridWorld {
    fn in_bounds(&self, pos: Position) -> bool {
        self.area(pos).is_ok()
    }

    fn terrain(&self, pos: Position) -> Result<Terrain, WorldError> {
        let area = self.area(pos)?;
        Ok(area.terrain[Area::index(pos)])
    }

    fn structures_at(&self, pos: Position) -> Result<Vec<Structure>, WorldError> {
        self.area(pos)?;
        Ok(self.structures.get(&pos).cloned().unwrap_or_default())
    }

    fn sites_at(&self, pos: Position) -> Result<Vec<ConstructionSite>, WorldError> {
        self.area(pos)?;
        Ok(self.sites.get(&pos).cloned().unwrap_or_default())
    }

    fn agents_at(&self, pos: Position) -> Result<Vec<AgentInfo>, WorldError> {
        self.area(pos)?;
        Ok(self
            .occupied
            .get(&pos)
            .and_then(|id| self.agents.get(id).map(|a| a.info(*id)))
            .into_iter()
            .collect())
    }

    fn agent(&self, id: AgentId) -> Option<AgentInfo> {
        self.agents.get(&id).map(|a| a.info(id))
    }

    fn structures_in(&self, area: AreaId) -> Result<Vec<(Position, Structure)>, WorldError> {
        if !self.areas.contains_key(&area) {
            return Err(WorldError::AreaNotVisible(area));
        }
        Ok(self
            .structures
            .iter()
            .filter(|(pos, _)| pos.area == area)
            .flat_map(|(pos, list)| list.iter().map(move |s| (*pos, *s)))
            .collect())
    }

    fn sites_in(&self, area: AreaId) -> Result<Vec<(Position, ConstructionSite)>, WorldError> {
        if !self.areas.contains_key(&area) {
            return Err(WorldError::AreaNotVisible(area));
        }
        Ok(self
            .sites
            .iter()
            .filter(|(pos, _)| pos.area == area)
            .flat_map(|(pos, list)| list.iter().map(move |c| (*pos, *c)))
            .collect())
    }

    fn planned_roads(&self, area: AreaId) -> Vec<Position> {
        self.planned
            .iter()
            .filter(|pos| pos.area == area)
            .copied()
            .collect()
    }

    fn move_agent(&mut self, id: AgentId, dir: Direction) -> Result<(), MoveError> {
        let agent = self.agents.get(&id).ok_or(MoveError::UnknownAgent(id))?;
        if !agent.owned {
            return Err(MoveError::NotOwner);
        }
        if agent.fatigue > 0 {
            return Err(MoveError::Tired);
        }
        if agent.position.step(dir).is_none() {
            return Err(MoveError::InvalidDirection);
        }
        self.intents.insert(id, dir);
        Ok(())
    }
}
