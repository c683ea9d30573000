//! Export command implementation

use anyhow::{anyhow, Result};
use clap::{ArgMatches, Command};
use std::path::PathBuf;

use crate::cli::utils;

pub fn command() -> Command {
    Command::new("export")
        .about("Write a script's source to a file")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("id")
                .help("Script id or unique id prefix")
                .value_name("ID")
                .required(true),
        )
        .arg(
            clap::Arg::new("path")
                .help("Destination file")
                .value_name("PATH")
                .required(true),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let app = utils::open_app(matches).await?;
    let id = app.resolve(utils::required(matches, "id")?)?;
    let path = PathBuf::from(utils::required(matches, "path")?);

    if !app.repository().export(&id, &path).await {
        return Err(anyhow!("Failed to export script {}", id));
    }

    println!("Exported {} to {}", id, path.display());
    Ok(())
}
