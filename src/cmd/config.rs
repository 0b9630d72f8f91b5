//! Configuration view and validation commands: `clause-audit config`.

use anyhow::{Context, Result};
use std::path::Path;

use super::super::ConfigCommands;
use super::{config_path, load_config};

pub fn cmd_config(
    project_dir: &Path,
    explicit: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let path = config_path(project_dir, explicit);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Clause Audit Configuration");
            println!("==========================");
            println!();
            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No config file at {} (using defaults)", path.display());
            }
            println!();

            let config = load_config(project_dir, explicit)?;
            println!("Effective values (with env overrides):");
            println!();
            let text = config
                .to_toml_string()
                .context("Failed to render configuration")?;
            println!("{}", text);
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = load_config(project_dir, explicit)?;
            match config.validate() {
                Ok(()) => {
                    if path.exists() {
                        println!("Configuration is valid.");
                    } else {
                        println!("No config file found. Using defaults (valid).");
                    }
                }
                Err(e) => {
                    anyhow::bail!("Configuration is invalid: {}", e);
                }
            }
            println!();
        }
    }

    Ok(())
}
