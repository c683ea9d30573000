//! List command implementation

use anyhow::Result;
use clap::{ArgMatches, Command};

use crate::cli::utils;

pub fn command() -> Command {
    Command::new("list")
        .about("List stored connector scripts")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("compile")
                .long("compile")
                .help("Compile enabled scripts and show their status")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let mut app = utils::open_app(matches).await?;
    if matches.get_flag("compile") {
        app.repository_mut().compile_all().await;
    }

    let scripts = app.repository().get_all();
    if scripts.is_empty() {
        println!("No scripts in {}", app.scripts_dir().display());
        return Ok(());
    }

    println!("Scripts in {}:", app.scripts_dir().display());
    for script in scripts {
        let status = if !script.metadata.is_enabled {
            "disabled"
        } else if script.is_compiled {
            "compiled"
        } else if !script.last_compilation_errors.is_empty() {
            "failed"
        } else {
            "enabled"
        };
        println!(
            "  {}  {:<24} {:<9} v{}",
            script.metadata.short_id(),
            script.name(),
            status,
            script.metadata.version
        );
        for error in &script.last_compilation_errors {
            println!("      {}", error);
        }
    }

    Ok(())
}
