pub mod modules;

pub use modules::astar::AStarSearch;
pub use modules::config::{
    CostTable, NavConfig, SearchBudget, config_file_path, load_config, load_config_from,
    save_config, save_config_to,
};
pub use modules::context::{ComputeBudget, Remedy, TickContext};
pub use modules::cost::{CostModel, CostModelCache, IMPASSABLE, build_cost_model};
pub use modules::debug::{
    DebugFlags, FlagDiff, PathingFlag, debug_file_path, load_debug_flags, save_debug_flags,
};
pub use modules::error::{NavError, PathFault, Result};
pub use modules::geometry::{AREA_SIZE, AreaId, Direction, Position};
pub use modules::grid::{BlockReason, GridEvent, GridWorld, SWAMP_FATIGUE, TickResult};
pub use modules::lanes::LaneReservations;
pub use modules::navigator::Navigator;
pub use modules::outcome::{Escalation, MoveOutcome, StepCause, StepOptions, StepReport};
pub use modules::search::{
    PathSearch, SearchError, SearchGoal, SearchOptions, SearchRequest, SearchResult, run_search,
};
pub use modules::sim::{
    RunSummary, SIM_AREA, Scenario, Simulation, TickSummary, runs_dir, save_run_summary,
};
pub use modules::state::{AgentPathState, BypassPath, PathCursor, StuckReason};
pub use modules::stats::{PathEvent, PathingStats, load_stats, save_stats, stats_file_path};
pub use modules::storage::{
    MemoryStorage, SCHEMA_VERSION, Storage, agents_file_path, paths_file_path, store_dir,
};
pub use modules::store::{CacheLookup, PathCacheEntry, PathKey, PathStore, is_contiguous};
pub use modules::world::{
    AgentId, AgentInfo, ConstructionSite, MoveError, Structure, StructureKind, Terrain, TileInfo,
    WorldError, WorldHost, adjacent_spawn, classify_tile, is_free_tile, is_road_like,
};
