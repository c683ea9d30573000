//! Complete command implementation

use anyhow::{anyhow, Result};
use clap::{ArgMatches, Command};
use std::path::PathBuf;

use crate::cli::utils;
use crate::{QuarryCompiler, ScriptCompiler};

pub fn command() -> Command {
    Command::new("complete")
        .about("List completions at a byte offset in a script file")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("file")
                .help("Script file")
                .value_name("FILE")
                .required(true),
        )
        .arg(
            clap::Arg::new("offset")
                .help("Cursor position as a byte offset")
                .value_name("OFFSET")
                .required(true),
        )
        .arg(
            clap::Arg::new("json")
                .long("json")
                .help("Print items as JSON")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let path = PathBuf::from(utils::required(matches, "file")?);
    let offset: usize = utils::required(matches, "offset")?
        .parse()
        .map_err(|e| anyhow!("Invalid offset: {}", e))?;
    let source = tokio::fs::read_to_string(&path).await?;

    let config = utils::load_config(matches)?;
    let items = QuarryCompiler::from_config(&config.compiler).completions(&source, offset);

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for item in items {
        println!("{:<10} {:<40} {}", format!("{:?}", item.kind), item.display_text, item.description);
    }
    Ok(())
}
