//! Compile command implementation

use anyhow::{anyhow, Result};
use clap::{ArgMatches, Command};
use std::time::Instant;
use tracing::info;

use crate::cli::utils;
use crate::utils::format_duration;

pub fn command() -> Command {
    Command::new("compile")
        .about("Compile stored scripts and register their connectors")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("id")
                .help("Script id or unique id prefix")
                .value_name("ID")
                .required_unless_present("all"),
        )
        .arg(
            clap::Arg::new("all")
                .short('a')
                .long("all")
                .help("Compile every enabled script")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("id"),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let mut app = utils::open_app(matches).await?;
    let start = Instant::now();

    if matches.get_flag("all") {
        let summary = app.repository_mut().compile_all().await;
        info!("Compiled all scripts in {}", format_duration(start.elapsed()));

        for script in app.repository().get_all() {
            for error in &script.last_compilation_errors {
                println!("{}: {}", script.name(), error);
            }
        }
        println!(
            "Compiled {} script(s): {} succeeded, {} failed, {} skipped ({})",
            summary.succeeded + summary.failed,
            summary.succeeded,
            summary.failed,
            summary.skipped,
            format_duration(start.elapsed())
        );
        println!("Registered connectors: {}", app.registry().ids().await.join(", "));

        if summary.failed > 0 {
            return Err(anyhow!("{} script(s) failed", summary.failed));
        }
        return Ok(());
    }

    let id = app.resolve(utils::required(matches, "id")?)?;
    let result = app.compile(&id).await?;
    let name = app
        .repository()
        .get_by_id(&id)
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| id.clone());
    utils::print_diagnostics(&name, &result);

    match (&result.connector, result.success) {
        (Some(connector), true) => {
            println!(
                "Compiled '{}' and registered connector '{}' ({})",
                name,
                connector.id(),
                format_duration(start.elapsed())
            );
            Ok(())
        }
        (None, true) => Err(anyhow!("'{}' compiled but produced no connector", name)),
        _ => Err(anyhow!(
            "'{}' failed to compile with {} error(s)",
            name,
            result.errors.len()
        )),
    }
}
