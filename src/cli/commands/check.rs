//! Check command implementation

use anyhow::{anyhow, Result};
use clap::{ArgMatches, Command};
use std::path::PathBuf;

use crate::cli::utils;
use crate::{ConnectorScript, ScriptCompiler, ScriptMetadata};

pub fn command() -> Command {
    Command::new("check")
        .about("Compile a script file without registering it")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("file")
                .help("Script file to check")
                .value_name("FILE")
                .required(true),
        )
        .arg(
            clap::Arg::new("syntax-only")
                .long("syntax-only")
                .help("Only check syntax")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let path = PathBuf::from(utils::required(matches, "file")?);
    let source = tokio::fs::read_to_string(&path).await?;
    let label = path.display().to_string();

    let config = utils::load_config(matches)?;
    let compiler = crate::QuarryCompiler::from_config(&config.compiler);

    if matches.get_flag("syntax-only") {
        let errors = compiler.validate(&source);
        for error in &errors {
            println!("{}:{}", label, error);
        }
        if errors.iter().any(|e| e.is_error()) {
            return Err(anyhow!("{} has syntax errors", label));
        }
        println!("{}: syntax OK", label);
        return Ok(());
    }

    let script = ConnectorScript::new(ScriptMetadata::new(label.clone(), ""), source);
    let result = compiler.compile_async(&script).await;
    utils::print_diagnostics(&label, &result);

    if !result.success {
        return Err(anyhow!(
            "{} failed to compile with {} error(s)",
            label,
            result.errors.len()
        ));
    }

    match &result.connector {
        Some(connector) => println!(
            "{}: OK, connector '{}' ({})",
            label,
            connector.id(),
            connector.name()
        ),
        None => println!("{}: OK, no connector instantiated", label),
    }

    Ok(())
}
