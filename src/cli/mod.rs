//! CLI command implementations

use anyhow::Result;
use clap::{ArgMatches, Command};

pub mod commands;

/// Main CLI application
pub struct CliApp;

impl CliApp {
    /// Create the CLI application
    pub fn app() -> Command {
        Command::new("quarry")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Author, compile and run Quarry connector scripts")
            .subcommand_negates_reqs(true)
            .subcommand(commands::init::command())
            .subcommand(commands::new::command())
            .subcommand(commands::list::command())
            .subcommand(commands::check::command())
            .subcommand(commands::compile::command())
            .subcommand(commands::template::command())
            .subcommand(commands::import::command())
            .subcommand(commands::export::command())
            .subcommand(commands::delete::command())
            .subcommand(commands::complete::command())
            .subcommand(commands::run::command())
    }

    /// Run the CLI application
    pub async fn run(matches: &ArgMatches) -> Result<()> {
        match matches.subcommand() {
            Some(("init", sub_matches)) => commands::init::run(sub_matches).await,
            Some(("new", sub_matches)) => commands::new::run(sub_matches).await,
            Some(("list", sub_matches)) => commands::list::run(sub_matches).await,
            Some(("check", sub_matches)) => commands::check::run(sub_matches).await,
            Some(("compile", sub_matches)) => commands::compile::run(sub_matches).await,
            Some(("template", sub_matches)) => commands::template::run(sub_matches).await,
            Some(("import", sub_matches)) => commands::import::run(sub_matches).await,
            Some(("export", sub_matches)) => commands::export::run(sub_matches).await,
            Some(("delete", sub_matches)) => commands::delete::run(sub_matches).await,
            Some(("complete", sub_matches)) => commands::complete::run(sub_matches).await,
            Some(("run", sub_matches)) => commands::run::run(sub_matches).await,
            _ => {
                // No subcommand provided, show help
                let _ = Self::app().print_help();
                Ok(())
            }
        }
    }
}

/// Common CLI utilities
pub mod utils {
    use anyhow::{anyhow, Result};
    use clap::{Arg, ArgMatches};
    use std::path::PathBuf;

    use crate::{CompilationResult, Config, Quarry};

    /// `--config` argument shared by commands that read configuration
    pub fn config_arg() -> Arg {
        Arg::new("config")
            .short('c')
            .long("config")
            .help("Configuration file path")
            .value_name("FILE")
    }

    /// Get configuration file path from arguments or the default location
    pub fn get_config_path(matches: &ArgMatches) -> Option<PathBuf> {
        matches
            .try_get_one::<String>("config")
            .ok()
            .flatten()
            .map(PathBuf::from)
    }

    /// Load configuration, falling back to `.quarry.yaml` and then defaults
    pub fn load_config(matches: &ArgMatches) -> Result<Config> {
        Config::load(get_config_path(matches).as_deref())
    }

    /// Create a Quarry instance with its stored scripts loaded
    pub async fn open_app(matches: &ArgMatches) -> Result<Quarry> {
        let config = load_config(matches)?;
        let mut app = Quarry::new(config)?;
        app.repository_mut().load_all().await;
        Ok(app)
    }

    /// Value of an argument clap has already checked for presence
    pub fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String> {
        matches
            .get_one::<String>(name)
            .ok_or_else(|| anyhow!("Missing argument: {}", name))
    }

    /// Print the diagnostics of a compilation, one per line
    pub fn print_diagnostics(label: &str, result: &CompilationResult) {
        for diagnostic in result.errors.iter().chain(&result.warnings) {
            println!("{}:{}", label, diagnostic);
        }
    }
}
