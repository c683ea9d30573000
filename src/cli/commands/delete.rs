//! Delete command implementation

use anyhow::{anyhow, Result};
use clap::{ArgMatches, Command};

use crate::cli::utils;

pub fn command() -> Command {
    Command::new("delete")
        .about("Delete a stored script and its metadata")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("id")
                .help("Script id or unique id prefix")
                .value_name("ID")
                .required(true),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let mut app = utils::open_app(matches).await?;
    let id = app.resolve(utils::required(matches, "id")?)?;

    if !app.repository_mut().delete(&id) {
        return Err(anyhow!("Script {} could not be deleted", id));
    }

    println!("Deleted script {}", id);
    Ok(())
}
