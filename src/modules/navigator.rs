use std::collections::HashSet;
use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::modules::config::NavConfig;
use crate::modules::context::TickContext;
use crate::modules::debug::{DebugFlags, PathingFlag};
use crate::modules::error::{PathFault, Result};
use crate::modules::state::AgentPathState;
use crate::modules::stats::{PathEvent, PathingStats};
use crate::modules::storage::{MemoryStorage, Storage};
use crate::modules::store::{PathCacheEntry, PathKey, PathStore};
use crate::modules::world::{AgentId, WorldHost};

/// The navigation engine: a shared path store, per-agent path state and
/// the knobs that drive escalation.
pub struct Navigator<P = MemoryStorage<PathCacheEntry>, A = MemoryStorage<AgentPathState>> {
    pub(crate) config: NavConfig,
    pub(crate) paths: PathStore<P>,
    pub(crate) agents: A,
    pub(crate) debug: DebugFlags,
    pub(crate) stats: PathingStats,
    pub(crate) rng: StdRng,
}

impl Navigator {
    pub fn new(config: NavConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic tie-breaking for tests and replays.
    pub fn with_seed(config: NavConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: NavConfig, rng: StdRng) -> Self {
        let paths = PathStore::new(MemoryStorage::new(), config.max_entries, config.default_ttl);
        Self {
            config,
            paths,
            agents: MemoryStorage::new(),
            debug: DebugFlags::default(),
            stats: PathingStats::default(),
            rng,
        }
    }
}

impl<P, A> Navigator<P, A>
where
    P: Storage<PathCacheEntry>,
    A: Storage<AgentPathState>,
{
    /// Build from caller-owned storage, e.g. state loaded from disk.
    pub fn with_parts(config: NavConfig, paths: P, agents: A, seed: u64) -> Result<Self> {
        config.validate()?;
        let paths = PathStore::new(paths, config.max_entries, config.default_ttl);
        Ok(Self {
            config,
            paths,
            agents,
            debug: DebugFlags::default(),
            stats: PathingStats::default(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Fresh per-tick context. Lane claims, cost models and remedy claims
    /// from the previous tick are gone.
    pub fn begin_tick(&mut self, tick: u64, bucket: u32) -> TickContext {
        TickContext::new(tick, bucket)
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn stats(&self) -> &PathingStats {
        &self.stats
    }

    pub fn take_stats(&mut self) -> PathingStats {
        std::mem::take(&mut self.stats)
    }

    pub fn debug_flags(&self) -> &DebugFlags {
        &self.debug
    }

    pub fn debug_flags_mut(&mut self) -> &mut DebugFlags {
        &mut self.debug
    }

    pub fn set_debug_flags(&mut self, flags: DebugFlags) {
        self.debug = flags;
    }

    pub fn paths(&self) -> &PathStore<P> {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut PathStore<P> {
        &mut self.paths
    }

    pub fn agents(&self) -> &A {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut A {
        &mut self.agents
    }

    pub fn into_parts(self) -> (P, A) {
        (self.paths.into_storage(), self.agents)
    }

    pub fn agent_state(&self, agent: AgentId) -> Option<&AgentPathState> {
        self.agents.get(&AgentPathState::storage_key(agent))
    }

    /// Drop the stored path for `key`. Agents following it rebuild from
    /// their own tile on their next step.
    pub fn invalidate(&mut self, key: &PathKey) -> bool {
        for name in self.agents.keys() {
            if let Some(state) = self.agents.get_mut(&name) {
                if state.cache_key == Some(*key) {
                    state.cache_key = None;
                }
            }
        }
        self.drop_path(key)
    }

    /// Store-only removal; followers keep their copy until it fails them.
    pub(crate) fn drop_path(&mut self, key: &PathKey) -> bool {
        let removed = self.paths.invalidate(key);
        if removed {
            self.note(PathEvent::Invalidation);
        }
        removed
    }

    pub fn invalidate_key(&mut self, raw: &str) -> Result<bool> {
        let key: PathKey = raw.parse()?;
        Ok(self.invalidate(&key))
    }

    pub fn forget_agent(&mut self, agent: AgentId) -> bool {
        self.agents.delete(&AgentPathState::storage_key(agent)).is_some()
    }

    /// Drop state for agents the world no longer reports.
    pub fn sweep_departed(&mut self, world: &dyn WorldHost) -> usize {
        let departed: Vec<String> = self
            .agents
            .iter()
            .filter(|(key, _)| {
                key.parse::<AgentId>()
                    .map(|id| world.agent(id).is_none())
                    .unwrap_or(true)
            })
            .map(|(key, _)| key.to_string())
            .collect();
        for key in &departed {
            self.agents.delete(key);
        }
        if !departed.is_empty() {
            info!(target: "waypath::pathing", count = departed.len(), "dropped state of departed agents");
        }
        departed.len()
    }

    pub(crate) fn note(&mut self, event: PathEvent) {
        if self.debug.pathing(PathingFlag::Stats) {
            self.stats.record(event);
        }
    }

    pub(crate) fn fault(&mut self, faults: &mut Vec<PathFault>, fault: PathFault) {
        faults.push(fault);
        self.note(PathEvent::Fault(fault));
    }

    /// Verbose per-agent trace, only when `pathing.verbose` is on.
    pub(crate) fn trace(&self, agent: AgentId, reason: &str, detail: fmt::Arguments<'_>) {
        if self.debug.pathing(PathingFlag::Verbose) {
            debug!(target: "waypath::pathing", agent, reason, "{detail}");
        }
    }

    pub(crate) fn load_state(&self, agent: AgentId) -> AgentPathState {
        self.agents
            .get(&AgentPathState::storage_key(agent))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn store_state(&mut self, agent: AgentId, state: AgentPathState) {
        self.agents.set(AgentPathState::storage_key(agent), state);
    }

    /// Ids of agents with stored state.
    pub fn tracked_agents(&self) -> HashSet<AgentId> {
        self.agents
            .iter()
            .filter_map(|(key, _)| key.parse().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::geometry::{AreaId, Position};

    fn key() -> PathKey {
        PathKey::new(
            Position::new(AreaId(0), 5, 5),
            Position::new(AreaId(0), 9, 5),
            1,
        )
    }

    #[test]
    fn invalidate_by_encoded_key() {
        let mut nav = Navigator::with_seed(NavConfig::default(), 1);
        let steps = (6..=8).map(|x| Position::new(AreaId(0), x, 5)).collect();
        nav.paths_mut().insert(&key(), steps, 1, None);

        assert!(nav.invalidate_key(&key().encode()).unwrap());
        assert!(!nav.invalidate_key(&key().encode()).unwrap());
        assert!(nav.paths().is_empty());
        assert_eq!(nav.stats().invalidations, 1);
        assert_eq!(nav.invalidate_key("nonsense").unwrap_err().code(), "invalid_key");
    }

    #[test]
    fn invalidate_releases_followers() {
        let mut nav = Navigator::with_seed(NavConfig::default(), 1);
        let steps = (6..=8).map(|x| Position::new(AreaId(0), x, 5)).collect();
        nav.paths_mut().insert(&key(), steps, 1, None);

        let mut follower = AgentPathState::default();
        follower.reset_for(key(), vec![Position::new(AreaId(0), 6, 5)], 1);
        nav.store_state(1, follower);
        let other = PathKey::new(
            Position::new(AreaId(0), 5, 5),
            Position::new(AreaId(0), 20, 5),
            1,
        );
        let mut bystander = AgentPathState::default();
        bystander.reset_for(other, vec![Position::new(AreaId(0), 6, 5)], 1);
        nav.store_state(2, bystander);

        assert!(nav.invalidate(&key()));
        assert!(nav.agent_state(1).unwrap().cache_key.is_none());
        assert_eq!(nav.agent_state(1).unwrap().goal, Some(key().goal));
        assert_eq!(nav.agent_state(2).unwrap().cache_key, Some(other));
    }

    #[test]
    fn stats_follow_the_stats_flag() {
        let mut nav = Navigator::with_seed(NavConfig::default(), 1);
        nav.debug_flags_mut().set(PathingFlag::Stats.path(), false).unwrap();
        nav.note(PathEvent::CacheHit);
        assert_eq!(nav.stats().hits, 0);

        nav.debug_flags_mut().reset();
        nav.note(PathEvent::CacheHit);
        assert_eq!(nav.take_stats().hits, 1);
        assert_eq!(nav.stats().hits, 0);
    }

    #[test]
    fn persisted_parts_round_trip() {
        let mut nav = Navigator::with_seed(NavConfig::default(), 1);
        let steps = (6..=8).map(|x| Position::new(AreaId(0), x, 5)).collect();
        nav.paths_mut().insert(&key(), steps, 1, None);
        let (paths, agents) = nav.into_parts();

        let nav = Navigator::with_parts(NavConfig::default(), paths, agents, 1).unwrap();
        assert_eq!(nav.paths().len(), 1);
        assert!(nav.tracked_agents().is_empty());
    }
}
