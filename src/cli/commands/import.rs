//! Import command implementation

use anyhow::{anyhow, Result};
use clap::{ArgMatches, Command};
use std::path::PathBuf;

use crate::cli::utils;

pub fn command() -> Command {
    Command::new("import")
        .about("Copy a script file into the script directory under a new id")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("path")
                .help("Script file to import")
                .value_name("PATH")
                .required(true),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let path = PathBuf::from(utils::required(matches, "path")?);
    let mut app = utils::open_app(matches).await?;

    let mut script = app.repository_mut().import(&path).await?;
    if !app.repository_mut().save(&mut script).await {
        return Err(anyhow!("Failed to save imported script '{}'", script.name()));
    }

    println!("Imported '{}' as {}", script.name(), script.id());
    Ok(())
}
