use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::modules::error::{NavError, Result};
use crate::modules::storage::store_dir;

/// Traversal weights fed to the search primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTable {
    pub road: u8,
    pub road_site: u8,
    pub planned_road: u8,
    pub adjacent_road: u8,
    pub plain: u32,
    pub swamp: u32,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            road: 1,
            road_site: 1,
            planned_road: 2,
            adjacent_road: 3,
            plain: 4,
            swamp: 12,
        }
    }
}

/// Operation budget passed to the search primitive: `base + d² * factor`,
/// clamped to `[floor, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBudget {
    pub base: u32,
    pub factor: u32,
    pub floor: u32,
    pub ceiling: u32,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            base: 20,
            factor: 6,
            floor: 150,
            ceiling: 2000,
        }
    }
}

impl SearchBudget {
    pub fn for_distance(&self, distance: u32) -> u32 {
        let d = distance.min(u16::MAX as u32);
        let raw = self
            .base
            .saturating_add(d.saturating_mul(d).saturating_mul(self.factor));
        raw.clamp(self.floor, self.ceiling.max(self.floor))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Path store capacity; oldest-touched entries are evicted past this.
    pub max_entries: usize,
    pub default_ttl: u64,
    /// Ticks without progress before the stuck ladder runs.
    pub stuck_threshold: u32,
    pub bypass_ttl: u64,
    /// Base paths older than this are recomputed. Zero disables.
    pub repath_after: u64,
    pub min_bucket_bypass: u32,
    pub min_bucket_early_repath: u32,
    pub early_repath_cooldown: u64,
    pub early_repath_max_index: usize,
    pub low_budget_recover_cooldown: u64,
    /// Consecutive blocked ticks before a bypass is computed.
    pub block_bypass_threshold: u32,
    pub micro_sidestep: bool,
    pub micro_sidestep_max_range_increase: i64,
    pub micro_sidestep_max_index: usize,
    pub fast_bypass_on_corridor: bool,
    pub rejoin_when_adjacent: bool,
    pub rejoin_lookahead: usize,
    pub agent_swap: bool,
    pub spawn_ring_scatter: bool,
    pub early_scatter_max_index: usize,
    pub ghost_divert_max_index: usize,
    pub ghost_promote_age: u32,
    pub ghost_reset_age: u32,
    /// Goals this close are approached with a direct step first.
    pub fast_path_distance: u32,
    pub costs: CostTable,
    pub budget: SearchBudget,
    pub bypass_ops: u32,
    pub stuck_bypass_ops: u32,
    pub stuck_bypass_plain_cost: u32,
    pub stuck_bypass_swamp_cost: u32,
    pub early_repath_ops: u32,
    pub low_budget_ops: u32,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            max_entries: 200,
            default_ttl: 180,
            stuck_threshold: 3,
            bypass_ttl: 8,
            repath_after: 25,
            min_bucket_bypass: 1500,
            min_bucket_early_repath: 1200,
            early_repath_cooldown: 3,
            early_repath_max_index: 3,
            low_budget_recover_cooldown: 5,
            block_bypass_threshold: 2,
            micro_sidestep: true,
            micro_sidestep_max_range_increase: 0,
            micro_sidestep_max_index: 6,
            fast_bypass_on_corridor: true,
            rejoin_when_adjacent: true,
            rejoin_lookahead: 5,
            agent_swap: true,
            spawn_ring_scatter: true,
            early_scatter_max_index: 3,
            ghost_divert_max_index: 6,
            ghost_promote_age: 3,
            ghost_reset_age: 6,
            fast_path_distance: 3,
            costs: CostTable::default(),
            budget: SearchBudget::default(),
            bypass_ops: 2500,
            stuck_bypass_ops: 3000,
            stuck_bypass_plain_cost: 2,
            stuck_bypass_swamp_cost: 10,
            early_repath_ops: 1500,
            low_budget_ops: 800,
        }
    }
}

impl NavConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(NavError::InvalidConfig("max_entries must be at least 1".into()));
        }
        if self.default_ttl == 0 {
            return Err(NavError::InvalidConfig("default_ttl must be at least 1".into()));
        }
        if self.bypass_ttl == 0 {
            return Err(NavError::InvalidConfig("bypass_ttl must be at least 1".into()));
        }
        if self.stuck_threshold == 0 || self.block_bypass_threshold == 0 {
            return Err(NavError::InvalidConfig(
                "stuck and block thresholds must be at least 1".into(),
            ));
        }
        if self.ghost_promote_age >= self.ghost_reset_age {
            return Err(NavError::InvalidConfig(format!(
                "ghost_promote_age ({}) must be below ghost_reset_age ({})",
                self.ghost_promote_age, self.ghost_reset_age
            )));
        }
        if self.costs.road == 0 || self.costs.plain == 0 || self.costs.swamp == 0 {
            return Err(NavError::InvalidConfig("costs must be positive".into()));
        }
        Ok(())
    }
}

pub fn config_file_path() -> PathBuf {
    store_dir().join("config.json")
}

pub fn load_config() -> Result<NavConfig> {
    load_config_from(&config_file_path())
}

pub fn load_config_from(path: &Path) -> Result<NavConfig> {
    if !path.exists() {
        return Ok(NavConfig::default());
    }

    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Ok(NavConfig::default());
    }

    let config: NavConfig = serde_json::from_slice(&bytes).map_err(|e| {
        NavError::InvalidConfig(format!(
            "failed to parse config file {}; delete it or run `waypath config init` to reset: {}",
            path.display(),
            e
        ))
    })?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &NavConfig) -> Result<PathBuf> {
    let path = config_file_path();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &NavConfig, path: &Path) -> Result<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_scales_quadratically_and_clamps() {
        let budget = SearchBudget::default();
        assert_eq!(budget.for_distance(0), 150);
        assert_eq!(budget.for_distance(5), 170);
        assert_eq!(budget.for_distance(10), 620);
        assert_eq!(budget.for_distance(20), 2000);
        assert_eq!(budget.for_distance(u32::MAX), 2000);
    }

    #[test]
    fn defaults_validate() {
        assert!(NavConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_ghost_ages() {
        let config = NavConfig {
            ghost_promote_age: 6,
            ghost_reset_age: 3,
            ..NavConfig::default()
        };
        assert!(matches!(config.validate(), Err(NavError::InvalidConfig(_))));
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{ "max_entries": 12, "costs": { "swamp": 20 } }"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.max_entries, 12);
        assert_eq!(config.costs.swamp, 20);
        assert_eq!(config.costs.plain, 4);
        assert_eq!(config.default_ttl, 180);
    }

    #[test]
    fn missing_or_empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_eq!(load_config_from(&path).unwrap(), NavConfig::default());
        fs::write(&path, b"").unwrap();
        assert_eq!(load_config_from(&path).unwrap(), NavConfig::default());
    }

    #[test]
    fn save_then_load_keeps_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = NavConfig {
            stuck_threshold: 7,
            agent_swap: false,
            ..NavConfig::default()
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }
}
