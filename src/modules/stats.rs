use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::modules::error::{NavError, PathFault, Result};
use crate::modules::storage::store_dir;

/// Something worth counting happened during a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathEvent {
    CacheHit,
    CacheMiss,
    Fallback,
    MicroSidestep,
    Swap,
    GhostDiversion,
    Stuck,
    Bypass,
    Rejoin,
    Invalidation,
    Evictions(usize),
    Fault(PathFault),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathingStats {
    pub hits: u64,
    pub misses: u64,
    pub fallbacks: u64,
    pub desyncs: u64,
    pub micro_sidesteps: u64,
    pub swaps: u64,
    pub ghost_diversions: u64,
    pub ghost_blocks: u64,
    pub hard_obstacles: u64,
    pub invalid_endpoints: u64,
    pub stuck: u64,
    pub bypasses: u64,
    pub rejoins: u64,
    pub reservation_collisions: u64,
    pub invalidations: u64,
    pub evictions: u64,
}

impl PathingStats {
    pub fn record(&mut self, event: PathEvent) {
        match event {
            PathEvent::CacheHit => self.hits = self.hits.saturating_add(1),
            PathEvent::CacheMiss => self.misses = self.misses.saturating_add(1),
            PathEvent::Fallback => self.fallbacks = self.fallbacks.saturating_add(1),
            PathEvent::MicroSidestep => self.micro_sidesteps = self.micro_sidesteps.saturating_add(1),
            PathEvent::Swap => self.swaps = self.swaps.saturating_add(1),
            PathEvent::GhostDiversion => self.ghost_diversions = self.ghost_diversions.saturating_add(1),
            PathEvent::Stuck => self.stuck = self.stuck.saturating_add(1),
            PathEvent::Bypass => self.bypasses = self.bypasses.saturating_add(1),
            PathEvent::Rejoin => self.rejoins = self.rejoins.saturating_add(1),
            PathEvent::Invalidation => self.invalidations = self.invalidations.saturating_add(1),
            PathEvent::Evictions(n) => self.evictions = self.evictions.saturating_add(n as u64),
            PathEvent::Fault(fault) => self.record_fault(fault),
        }
    }

    fn record_fault(&mut self, fault: PathFault) {
        match fault {
            PathFault::InvalidEndpoint => {
                self.invalid_endpoints = self.invalid_endpoints.saturating_add(1)
            }
            PathFault::PathDesync => self.desyncs = self.desyncs.saturating_add(1),
            PathFault::GhostBlock => self.ghost_blocks = self.ghost_blocks.saturating_add(1),
            PathFault::HardObstacle => self.hard_obstacles = self.hard_obstacles.saturating_add(1),
            PathFault::ReservationConflict => {
                self.reservation_collisions = self.reservation_collisions.saturating_add(1)
            }
        }
    }

    /// Share of base-path lookups served from the store.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    pub fn merge(&mut self, other: &PathingStats) {
        self.hits = self.hits.saturating_add(other.hits);
        self.misses = self.misses.saturating_add(other.misses);
        self.fallbacks = self.fallbacks.saturating_add(other.fallbacks);
        self.desyncs = self.desyncs.saturating_add(other.desyncs);
        self.micro_sidesteps = self.micro_sidesteps.saturating_add(other.micro_sidesteps);
        self.swaps = self.swaps.saturating_add(other.swaps);
        self.ghost_diversions = self.ghost_diversions.saturating_add(other.ghost_diversions);
        self.ghost_blocks = self.ghost_blocks.saturating_add(other.ghost_blocks);
        self.hard_obstacles = self.hard_obstacles.saturating_add(other.hard_obstacles);
        self.invalid_endpoints = self.invalid_endpoints.saturating_add(other.invalid_endpoints);
        self.stuck = self.stuck.saturating_add(other.stuck);
        self.bypasses = self.bypasses.saturating_add(other.bypasses);
        self.rejoins = self.rejoins.saturating_add(other.rejoins);
        self.reservation_collisions = self
            .reservation_collisions
            .saturating_add(other.reservation_collisions);
        self.invalidations = self.invalidations.saturating_add(other.invalidations);
        self.evictions = self.evictions.saturating_add(other.evictions);
    }

    pub fn rows(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("hits", self.hits),
            ("misses", self.misses),
            ("fallbacks", self.fallbacks),
            ("desyncs", self.desyncs),
            ("micro_sidesteps", self.micro_sidesteps),
            ("swaps", self.swaps),
            ("ghost_diversions", self.ghost_diversions),
            ("ghost_blocks", self.ghost_blocks),
            ("hard_obstacles", self.hard_obstacles),
            ("invalid_endpoints", self.invalid_endpoints),
            ("stuck", self.stuck),
            ("bypasses", self.bypasses),
            ("rejoins", self.rejoins),
            ("reservation_collisions", self.reservation_collisions),
            ("invalidations", self.invalidations),
            ("evictions", self.evictions),
        ]
    }
}

pub fn stats_file_path() -> PathBuf {
    store_dir().join("stats.json")
}

pub fn load_stats(path: &Path) -> Result<PathingStats> {
    if !path.exists() {
        return Ok(PathingStats::default());
    }

    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Ok(PathingStats::default());
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        NavError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "failed to parse stats file {}; delete it or run `waypath cache clear` to reset: {}",
                path.display(),
                e
            ),
        ))
    })
}

pub fn save_stats(stats: &PathingStats, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(stats)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events_and_faults() {
        let mut stats = PathingStats::default();
        stats.record(PathEvent::CacheHit);
        stats.record(PathEvent::CacheHit);
        stats.record(PathEvent::CacheMiss);
        stats.record(PathEvent::Evictions(3));
        stats.record(PathEvent::Fault(PathFault::PathDesync));
        stats.record(PathEvent::Fault(PathFault::ReservationConflict));

        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.desyncs, 1);
        assert_eq!(stats.reservation_collisions, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn counters_saturate() {
        let mut stats = PathingStats {
            swaps: u64::MAX,
            ..PathingStats::default()
        };
        stats.record(PathEvent::Swap);
        assert_eq!(stats.swaps, u64::MAX);
    }

    #[test]
    fn merge_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let mut total = load_stats(&path).unwrap();
        let run = PathingStats {
            bypasses: 2,
            rejoins: 1,
            ..PathingStats::default()
        };
        total.merge(&run);
        total.merge(&run);
        save_stats(&total, &path).unwrap();

        let loaded = load_stats(&path).unwrap();
        assert_eq!(loaded.bypasses, 4);
        assert_eq!(loaded.rejoins, 2);
    }
}
