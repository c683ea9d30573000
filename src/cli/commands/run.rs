//! Run command implementation

use anyhow::Result;
use clap::{ArgMatches, Command};
use tracing::{info, warn};

use quarry_connector::CancellationToken;

use crate::cli::utils;

pub fn command() -> Command {
    Command::new("run")
        .about("Search with a script's connector")
        .arg(utils::config_arg())
        .arg(
            clap::Arg::new("id")
                .help("Script id or unique id prefix")
                .value_name("ID")
                .required(true),
        )
        .arg(
            clap::Arg::new("query")
                .help("Search query")
                .value_name("QUERY")
                .required(true),
        )
        .arg(
            clap::Arg::new("max")
                .short('m')
                .long("max")
                .help("Maximum number of results")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .default_value("10"),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let id = utils::required(matches, "id")?;
    let query = utils::required(matches, "query")?;
    let max_results = matches.get_one::<usize>("max").copied().unwrap_or(10);

    let mut app = utils::open_app(matches).await?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling search");
                cancel.cancel();
            }
        })
    };

    info!("Searching '{}' with script {}", query, id);
    let results = app.search(id, query, max_results, &cancel).await;
    interrupt.abort();
    let results = results?;

    if results.is_empty() {
        println!("No results");
        return Ok(());
    }

    for (index, result) in results.iter().enumerate() {
        println!("{:>3}. {}", index + 1, result.title);
        if !result.description.is_empty() {
            println!("     {}", result.description);
        }
        if let Some(url) = &result.url {
            println!("     {}", url);
        }
    }
    Ok(())
}
