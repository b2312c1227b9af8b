use std::fs;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use waypath::{
    AgentPathState, MemoryStorage, NavConfig, PathCacheEntry, PathingStats, RunSummary, Scenario,
    Simulation, Storage, agents_file_path, config_file_path, debug_file_path, load_config,
    load_debug_flags, load_stats, paths_file_path, save_config, save_debug_flags,
    save_run_summary, save_stats, stats_file_path, store_dir,
};

mod cache;
mod config;
mod debug;

use cache::{CacheCommand, run_cache};
use config::{ConfigCommand, run_config};
use debug::{DebugCommand, run_debug};

#[derive(Parser)]
#[command(
    name = "waypath",
    version,
    about = "Cached multi-agent grid navigation (path store, lanes, escalation)",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize local state under .waypath/
    Init {
        /// Overwrite existing config and debug flags with defaults
        #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
        force: bool,
    },
    /// Run agents through a generated grid world
    Simulate {
        /// Seed for terrain, start tiles and goals
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Number of agents
        #[arg(short = 'n', long, default_value_t = 8)]
        agents: usize,
        /// Number of ticks to run
        #[arg(short = 't', long, default_value_t = 200)]
        ticks: u64,
        /// Compute bucket reported every tick (gates bypass and repath)
        #[arg(long, default_value_t = 10_000)]
        bucket: u32,
        /// Wall tiles to scatter
        #[arg(long, default_value_t = 120)]
        walls: usize,
        /// Swamp tiles to scatter
        #[arg(long, default_value_t = 80)]
        swamps: usize,
        /// Skip the road cross through the spawn
        #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
        no_roads: bool,
        /// Start from the persisted path store and agent state
        #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
        resume: bool,
        /// Persist stores, stats and a run summary under .waypath/
        #[arg(long, action = ArgAction::SetTrue, default_value_t = false)]
        save: bool,
    },
    /// Shared path store operations
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Debug flag operations
    Debug {
        #[command(subcommand)]
        command: DebugCommand,
    },
    /// Navigation config operations
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn dispatch(command: Command) -> Result<(), String> {
    match command {
        Command::Init { force } => run_init(force),
        Command::Simulate {
            seed,
            agents,
            ticks,
            bucket,
            walls,
            swamps,
            no_roads,
            resume,
            save,
        } => {
            let scenario = Scenario {
                seed,
                agents,
                ticks,
                bucket,
                walls,
                swamps,
                roads: !no_roads,
            };
            run_simulate(scenario, resume, save)
        }
        Command::Cache { command } => run_cache(command),
        Command::Debug { command } => run_debug(command),
        Command::Config { command } => run_config(command),
    }
}

fn run_init(force: bool) -> Result<(), String> {
    fs::create_dir_all(store_dir()).map_err(|e| e.to_string())?;

    let config_path = config_file_path();
    if force || !config_path.exists() {
        save_config(&NavConfig::default()).map_err(|e| e.to_string())?;
    } else {
        eprintln!(
            "warning: keeping existing config at {} (use --force to reset)",
            config_path.display()
        );
    }

    let debug_path = debug_file_path();
    if force || !debug_path.exists() {
        save_debug_flags(&Default::default(), &debug_path).map_err(|e| e.to_string())?;
    }

    write_empty_store::<PathCacheEntry>(paths_file_path(), force)?;
    write_empty_store::<AgentPathState>(agents_file_path(), force)?;
    if force || !stats_file_path().exists() {
        save_stats(&PathingStats::default(), &stats_file_path()).map_err(|e| e.to_string())?;
    }

    println!("Initialized waypath state at {}", store_dir().display());
    Ok(())
}

fn write_empty_store<V>(path: PathBuf, force: bool) -> Result<(), String>
where
    V: serde::Serialize + serde::de::DeserializeOwned,
{
    if path.exists() && !force {
        return Ok(());
    }
    MemoryStorage::<V>::new()
        .save_json(&path)
        .map_err(|e| e.to_string())
}

fn run_simulate(scenario: Scenario, resume: bool, save: bool) -> Result<(), String> {
    let config = load_config().map_err(|e| e.to_string())?;
    let flags = load_debug_flags(&debug_file_path()).map_err(|e| e.to_string())?;

    let mut sim = if resume {
        let paths = MemoryStorage::<PathCacheEntry>::load_json(&paths_file_path())
            .map_err(|e| e.to_string())?;
        let agents = MemoryStorage::<AgentPathState>::load_json(&agents_file_path())
            .map_err(|e| e.to_string())?;
        println!(
            "Resuming with {} cached path(s) and {} agent state(s)",
            paths.len(),
            agents.len()
        );
        Simulation::with_stores(scenario, config, paths, agents).map_err(|e| e.to_string())?
    } else {
        Simulation::new(scenario, config).map_err(|e| e.to_string())?
    };
    sim.navigator_mut().set_debug_flags(flags);

    let summary = sim.run();
    print_summary(&summary);

    if save {
        let navigator = sim.navigator();
        navigator
            .paths()
            .storage()
            .save_json(&paths_file_path())
            .map_err(|e| e.to_string())?;
        navigator
            .agents()
            .save_json(&agents_file_path())
            .map_err(|e| e.to_string())?;

        let stats_path = stats_file_path();
        let mut totals = load_stats(&stats_path).map_err(|e| e.to_string())?;
        totals.merge(&summary.stats);
        save_stats(&totals, &stats_path).map_err(|e| e.to_string())?;

        let path = save_run_summary(&summary).map_err(|e| e.to_string())?;
        println!("Saved run summary to {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let elapsed = summary.finished_at - summary.started_at;
    println!(
        "Simulated {} tick(s) with {} agent(s) in {} ms (seed={})",
        summary.ticks,
        summary.scenario.agents,
        elapsed.num_milliseconds(),
        summary.scenario.seed
    );
    println!(
        "arrivals={} moves={} stalled={} search_calls={} cached_paths={}",
        summary.arrivals, summary.moves, summary.stalled, summary.search_calls, summary.cached_paths
    );
    println!("hit_rate={:.1}%", summary.stats.hit_rate() * 100.0);
    println!("Outcomes:");
    for (label, count) in &summary.outcomes {
        println!("  {:<14} {}", label, count);
    }
    println!("Counters:");
    print_stats(&summary.stats);
}

pub(crate) fn print_stats(stats: &PathingStats) {
    for (name, value) in stats.rows() {
        if value > 0 {
            println!("  {:<24} {}", name, value);
        }
    }
}
