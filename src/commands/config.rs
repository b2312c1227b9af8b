use clap::Subcommand;
use waypath::{NavConfig, config_file_path, load_config, save_config};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective config as JSON
    Show,
    /// Write the default config to .waypath/config.json
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

pub(super) fn run_config(cmd: ConfigCommand) -> Result<(), String> {
    match cmd {
        ConfigCommand::Show => {
            let config = load_config().map_err(|e| e.to_string())?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
            println!("{}", json);
            if !config_file_path().exists() {
                eprintln!("warning: no config file; showing defaults");
            }
        }
        ConfigCommand::Init { force } => {
            let path = config_file_path();
            if path.exists() && !force {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ));
            }
            let written = save_config(&NavConfig::default()).map_err(|e| e.to_string())?;
            println!("Wrote default config to {}", written.display());
        }
    }
    Ok(())
}
