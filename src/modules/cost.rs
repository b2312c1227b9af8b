use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::modules::config::CostTable;
use crate::modules::geometry::{AREA_SIZE, AreaId, Position};
use crate::modules::world::{StructureKind, Terrain, WorldHost};

/// Marks a tile the search must never enter.
pub const IMPASSABLE: u8 = u8::MAX;

/// Per-area traversal weights. Zero means "use the terrain default".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CostModel {
    area: AreaId,
    weights: Vec<u8>,
}

impl CostModel {
    pub fn new(area: AreaId) -> Self {
        Self {
            area,
            weights: vec![0; (AREA_SIZE * AREA_SIZE) as usize],
        }
    }

    pub fn area(&self) -> AreaId {
        self.area
    }

    fn index(&self, pos: Position) -> Option<usize> {
        (pos.area == self.area && pos.in_area_bounds())
            .then(|| (pos.y * AREA_SIZE + pos.x) as usize)
    }

    pub fn get(&self, pos: Position) -> u8 {
        self.index(pos).map(|i| self.weights[i]).unwrap_or(0)
    }

    pub fn set(&mut self, pos: Position, weight: u8) {
        if let Some(i) = self.index(pos) {
            self.weights[i] = weight;
        }
    }

    fn set_if_default(&mut self, pos: Position, weight: u8) -> bool {
        match self.index(pos) {
            Some(i) if self.weights[i] == 0 => {
                self.weights[i] = weight;
                true
            }
            _ => false,
        }
    }

    /// Effective weight for entering `pos`, or `None` when impassable.
    pub fn weight(&self, pos: Position, terrain: Terrain, plain: u32, swamp: u32) -> Option<u32> {
        if pos.area != self.area {
            return None;
        }
        match self.get(pos) {
            IMPASSABLE => None,
            0 => match terrain {
                Terrain::Wall => None,
                Terrain::Plain => Some(plain),
                Terrain::Swamp => Some(swamp),
            },
            w => Some(u32::from(w)),
        }
    }
}

/// Build the weight grid for one area from roads, pending roads, planned
/// roads and blocking structures.
pub fn build_cost_model(world: &dyn WorldHost, area: AreaId, costs: &CostTable) -> CostModel {
    let mut model = CostModel::new(area);
    let mut road_like: Vec<Position> = Vec::new();
    let mut obstacles: Vec<Position> = Vec::new();

    if let Ok(structures) = world.structures_in(area) {
        for (pos, structure) in structures {
            if structure.kind == StructureKind::Road {
                model.set(pos, costs.road);
                road_like.push(pos);
            } else if !structure.is_walkable() {
                obstacles.push(pos);
            }
        }
    }

    if let Ok(sites) = world.sites_in(area) {
        for (pos, site) in sites {
            if site.kind == StructureKind::Road
                && model.set_if_default(pos, costs.road_site)
            {
                road_like.push(pos);
            }
        }
    }

    for pos in world.planned_roads(area) {
        if pos.area != area || !pos.in_area_bounds() {
            continue;
        }
        if model.set_if_default(pos, costs.planned_road) {
            road_like.push(pos);
        }
    }

    for road in &road_like {
        for (_, pos) in road.neighbors() {
            if matches!(world.terrain(pos), Ok(Terrain::Wall)) {
                continue;
            }
            model.set_if_default(pos, costs.adjacent_road);
        }
    }

    for pos in obstacles {
        model.set(pos, IMPASSABLE);
    }

    trace!(
        target: "waypath::cost",
        area = area.0,
        roads = road_like.len(),
        "built cost model"
    );
    model
}

/// Cost models built during the current tick, at most one per area.
#[derive(Debug, Default)]
pub struct CostModelCache {
    models: HashMap<AreaId, Rc<CostModel>>,
    builds: u32,
}

impl CostModelCache {
    pub fn get_or_build(
        &mut self,
        world: &dyn WorldHost,
        area: AreaId,
        costs: &CostTable,
    ) -> Rc<CostModel> {
        if let Some(model) = self.models.get(&area) {
            return Rc::clone(model);
        }
        self.builds += 1;
        let model = Rc::new(build_cost_model(world, area, costs));
        self.models.insert(area, Rc::clone(&model));
        model
    }

    pub fn builds(&self) -> u32 {
        self.builds
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
