use std::fs;

use clap::Subcommand;
use waypath::{
    AgentPathState, MemoryStorage, Navigator, PathCacheEntry, PathKey, PathStore, PathingStats,
    Storage, agents_file_path, load_config, load_stats, paths_file_path, save_stats,
    stats_file_path,
};

use super::print_stats;

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show stored paths and cumulative counters
    Stats {
        /// Also list every stored key with its length and expiry
        #[arg(long)]
        keys: bool,
    },
    /// Drop every stored path and reset counters
    Clear,
    /// Drop one stored path, e.g. `0:10,10>0:30,12|1`
    Invalidate { key: String },
}

pub(super) fn run_cache(cmd: CacheCommand) -> Result<(), String> {
    let path = paths_file_path();
    let storage = MemoryStorage::<PathCacheEntry>::load_json(&path).map_err(|e| e.to_string())?;

    match cmd {
        CacheCommand::Stats { keys } => {
            let stats = load_stats(&stats_file_path()).map_err(|e| e.to_string())?;
            println!("Stored paths: {} ({})", storage.len(), path.display());
            println!(
                "Lookups: hits={} misses={} hit_rate={:.1}%",
                stats.hits,
                stats.misses,
                stats.hit_rate() * 100.0
            );
            print_stats(&stats);
            if keys {
                for (key, entry) in storage.iter() {
                    println!(
                        "  {} steps={} expiry={} last_touch={}",
                        key,
                        entry.steps.len(),
                        entry.expiry,
                        entry.last_touch
                    );
                }
            }
        }
        CacheCommand::Clear => {
            let config = load_config().map_err(|e| e.to_string())?;
            let mut store = PathStore::new(storage, config.max_entries, config.default_ttl);
            let removed = store.clear();
            store
                .into_storage()
                .save_json(&path)
                .map_err(|e| e.to_string())?;
            let stats_path = stats_file_path();
            if stats_path.exists() {
                fs::remove_file(&stats_path).map_err(|e| e.to_string())?;
            }
            save_stats(&PathingStats::default(), &stats_path).map_err(|e| e.to_string())?;
            println!("Cleared {} stored path(s) and reset counters", removed);
        }
        CacheCommand::Invalidate { key } => {
            let key: PathKey = key.parse().map_err(|e: waypath::NavError| e.to_string())?;
            let config = load_config().map_err(|e| e.to_string())?;
            let agents = MemoryStorage::<AgentPathState>::load_json(&agents_file_path())
                .map_err(|e| e.to_string())?;
            let mut nav = Navigator::with_parts(config, storage, agents, 0).map_err(|e| e.to_string())?;
            if !nav.invalidate(&key) {
                return Err(format!("no stored path for {}", key));
            }
            let stats = nav.take_stats();
            let (paths, agents) = nav.into_parts();
            paths.save_json(&path).map_err(|e| e.to_string())?;
            agents
                .save_json(&agents_file_path())
                .map_err(|e| e.to_string())?;

            let stats_path = stats_file_path();
            let mut total = load_stats(&stats_path).map_err(|e| e.to_string())?;
            total.merge(&stats);
            save_stats(&total, &stats_path).map_err(|e| e.to_string())?;
            println!("Invalidated {}", key);
        }
    }

    Ok(())
}
