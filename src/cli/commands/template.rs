//! Template command implementation

use anyhow::Result;
use clap::{ArgMatches, Command};

use crate::cli::utils;
use crate::{QuarryCompiler, ScriptCompiler};

pub fn command() -> Command {
    Command::new("template")
        .about("Print starter source for a connector")
        .arg(
            clap::Arg::new("name")
                .help("Display name of the connector")
                .value_name("NAME")
                .required(true),
        )
        .arg(
            clap::Arg::new("id")
                .long("id")
                .help("Connector id to embed (defaults to a new UUID)")
                .value_name("ID"),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let name = utils::required(matches, "name")?;
    let id = matches
        .get_one::<String>("id")
        .cloned()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    print!("{}", QuarryCompiler::new().template(name, &id));
    Ok(())
}
