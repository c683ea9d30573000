//! New command implementation

use anyhow::{anyhow, Result};
use clap::{ArgMatches, Command};
use tracing::info;

use crate::cli::utils;

pub fn command() -> Command {
    Command::new("new")
        .about("Create a connector script from the starter template")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("name")
                .help("Display name of the connector")
                .value_name("NAME")
                .required(true),
        )
        .arg(
            clap::Arg::new("description")
                .short('d')
                .long("description")
                .help("Short description")
                .value_name("TEXT")
                .default_value(""),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let name = utils::required(matches, "name")?;
    let description = matches
        .get_one::<String>("description")
        .map(String::as_str)
        .unwrap_or_default();

    let mut app = utils::open_app(matches).await?;
    let mut script = app.repository().create(name, description);

    if !app.repository_mut().save(&mut script).await {
        return Err(anyhow!("Failed to save script '{}'", name));
    }
    info!("Created script '{}' ({})", name, script.id());

    println!("Created script '{}'", script.name());
    println!("  ID:   {}", script.id());
    if let Some(path) = &script.file_path {
        println!("  File: {}", path.display());
    }

    Ok(())
}
