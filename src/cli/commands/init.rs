//! Init command implementation

use anyhow::Result;
use clap::{ArgMatches, Command};
use std::path::PathBuf;
use tracing::info;

use crate::config::config::DEFAULT_CONFIG_FILE;
use crate::utils::ensure_directory;
use crate::Config;

pub fn command() -> Command {
    Command::new("init")
        .about("Initialize a new configuration file")
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("Output file path")
                .value_name("FILE")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            clap::Arg::new("directory")
                .short('d')
                .long("directory")
                .help("Script directory to configure")
                .value_name("DIR"),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let output_path = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    info!("Initializing configuration file: {:?}", output_path);

    let mut config = Config::default();
    if let Some(directory) = matches.get_one::<String>("directory") {
        config.scripts.directory = PathBuf::from(directory);
    }
    config.validate()?;
    config.save_to_file(&output_path)?;

    let scripts_dir = config.scripts.resolved_directory()?;
    ensure_directory(&scripts_dir)?;

    info!("Configuration file created: {:?}", output_path);

    println!("Configuration file created: {}", output_path.display());
    println!("Scripts directory: {}", scripts_dir.display());
    println!("Create a connector with 'quarry new <NAME>'.");

    Ok(())
}
