mod commands;

use crate::commands::{demo_source, list, reveal};
use clap::{Parser, Subcommand};
use election_reveal::model::election::{ElectionId, PageSize};
use election_reveal::source::http::HttpSource;
use election_reveal::source::{ElectionSource, NameLookup};
use election_reveal::{EngineConfig, ResultsEngine};
use std::convert::TryFrom;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Opts {
    /// JSON config file; flags below override it.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// Base URL of the election platform API.
    #[clap(long, global = true)]
    api_url: Option<String>,
    /// Seconds counted down before names are resolved.
    #[clap(long, global = true)]
    countdown: Option<u32>,
    /// Use built-in sample elections instead of the platform API.
    #[clap(long, global = true)]
    demo: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List one page of concluded elections.
    List {
        #[clap(long, default_value = "1")]
        page: u32,
        /// Elections per page: 6, 12, 24 or 48.
        #[clap(long)]
        per_page: Option<u32>,
    },
    /// Count down, resolve candidate names and show an election's results.
    Reveal {
        /// Id of an election on the selected page.
        election: String,
        #[clap(long, default_value = "1")]
        page: u32,
        /// Elections per page: 6, 12, 24 or 48.
        #[clap(long)]
        per_page: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .compact()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("❌ Could not install logger: {}", e);
    }

    let opts = Opts::parse();

    if let Err(e) = run(opts).await {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(opts: Opts) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &opts.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(url) = &opts.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(countdown) = opts.countdown {
        config.countdown_from = countdown;
    }

    if opts.demo {
        let source = Arc::new(demo_source().await);
        execute(opts.command, &config, source).await
    } else {
        let source = Arc::new(HttpSource::new(
            &config.api_base_url,
            config.request_timeout(),
        )?);
        execute(opts.command, &config, source).await
    }
}

async fn execute<S>(
    command: Command,
    config: &EngineConfig,
    source: Arc<S>,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: ElectionSource + NameLookup,
{
    let engine = ResultsEngine::new(config, source);
    let page_size = |per_page: Option<u32>| match per_page {
        Some(n) => PageSize::try_from(n),
        None => Ok(config.default_page_size),
    };

    match command {
        Command::List { page, per_page } => {
            list(&engine, page, page_size(per_page)?).await?;
        }
        Command::Reveal {
            election,
            page,
            per_page,
        } => {
            reveal(
                &engine,
                page,
                page_size(per_page)?,
                &ElectionId::new(election),
            )
            .await?;
        }
    }
    Ok(())
}
