use clap::{ArgAction, Subcommand};
use waypath::{DebugFlags, debug_file_path, load_debug_flags, save_debug_flags};

#[derive(Subcommand)]
pub enum DebugCommand {
    /// Print every flag and its value
    List,
    /// Set a flag, e.g. `pathing.verbose true`
    Set {
        path: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    /// Flip a flag
    Toggle { path: String },
    /// Turn on flags matching a pattern (`*` matches one segment)
    On { pattern: String },
    /// Turn off flags matching a pattern
    Off { pattern: String },
    /// Restore defaults
    Reset,
    /// Show flags that differ from their defaults
    Diff,
}

pub(super) fn run_debug(cmd: DebugCommand) -> Result<(), String> {
    let path = debug_file_path();
    let mut flags = load_debug_flags(&path).map_err(|e| e.to_string())?;

    match cmd {
        DebugCommand::List => {
            for (name, value) in flags.iter() {
                println!("{:<20} {}", name, value);
            }
            return Ok(());
        }
        DebugCommand::Diff => {
            let diff = flags.diff();
            if diff.is_empty() {
                println!("All flags at defaults");
            }
            for entry in diff {
                println!("{}", entry);
            }
            return Ok(());
        }
        DebugCommand::Set { path: flag, value } => {
            flags.set(&flag, value).map_err(|e| e.to_string())?;
            println!("{} = {}", flag, value);
        }
        DebugCommand::Toggle { path: flag } => {
            let value = flags.toggle(&flag).map_err(|e| e.to_string())?;
            println!("{} = {}", flag, value);
        }
        DebugCommand::On { pattern } => {
            let changed = flags.on(&pattern);
            report_matches(&pattern, changed, true)?;
        }
        DebugCommand::Off { pattern } => {
            let changed = flags.off(&pattern);
            report_matches(&pattern, changed, false)?;
        }
        DebugCommand::Reset => {
            flags = DebugFlags::default();
            println!("Debug flags reset to defaults");
        }
    }

    save_debug_flags(&flags, &path).map_err(|e| e.to_string())
}

fn report_matches(pattern: &str, changed: usize, value: bool) -> Result<(), String> {
    if changed == 0 {
        return Err(format!("no flags match `{}`", pattern));
    }
    println!("Set {} flag(s) matching `{}` to {}", changed, pattern, value);
    Ok(())
}
