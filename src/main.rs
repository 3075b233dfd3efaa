use anyhow::Result;
use clap::{Parser, Subcommand};
use proxy_harvester::proxy::{
    aggregate, default_sources, harvest, sources_by_name, CheckerConfig, PlainTextSource,
    ProxyChecker, ProxyEndpoint, ProxyParser, UserAgentPool,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Fetch timeout for extra plain-text list sources
const LIST_FETCH_TIMEOUT_SECS: u64 = 30;

/// Harvests open proxies from public listing sites and checks them
#[derive(Parser)]
#[command(name = "proxy-harvester")]
#[command(about = "Harvests open proxies from public listing sites and checks them")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output file for working proxies
    #[arg(short, long, default_value = "proxies.txt")]
    output: PathBuf,

    /// Maximum number of concurrent probe attempts
    #[arg(short = 'n', long, default_value = "400")]
    concurrency: usize,

    /// Timeout in seconds for each probe attempt
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// URL requested through each candidate
    #[arg(long, default_value = "http://check.zennolab.com")]
    probe_url: String,

    /// File with one user-agent string per line
    #[arg(long)]
    user_agents: Option<PathBuf>,

    /// Bundled source names to harvest from (defaults to all of them)
    #[arg(short, long)]
    source: Vec<String>,

    /// Additional plain-text list URLs to harvest from
    #[arg(long)]
    url: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest and save candidates without checking them
    Fetch,
    /// Check proxies from a file instead of harvesting
    Check {
        /// Input file containing `ip:port` lines
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Fetch) => {
            let candidates = harvest_candidates(&cli).await?;
            ProxyParser::save_to_file(&candidates, &cli.output)?;
            println!("Saved {} candidates to {:?}", candidates.len(), cli.output);
        }
        Some(Commands::Check { input }) => {
            let candidates = ProxyParser::parse_file(input)?;
            println!("Loaded {} proxies from {:?}", candidates.len(), input);
            check_and_save(&cli, candidates).await?;
        }
        None => {
            let candidates = harvest_candidates(&cli).await?;
            check_and_save(&cli, candidates).await?;
        }
    }

    Ok(())
}

/// Query the configured sources and merge their results
async fn harvest_candidates(cli: &Cli) -> Result<Vec<ProxyEndpoint>> {
    let mut sources = if cli.source.is_empty() {
        default_sources()?
    } else {
        sources_by_name(&cli.source)?
    };
    for url in &cli.url {
        sources.push(Box::new(PlainTextSource::new(
            url,
            url,
            Duration::from_secs(LIST_FETCH_TIMEOUT_SECS),
        )?));
    }

    println!("Loading proxies...");
    let reports = harvest(&sources).await;
    for report in &reports {
        if report.is_success() {
            println!(
                "Found {} proxies from {}",
                report.endpoints.len(),
                report.source
            );
        } else if let Some(error) = &report.error {
            eprintln!("Error fetching {}: {}", report.source, error);
        }
    }

    let merged = aggregate(
        reports
            .into_iter()
            .filter(|r| r.is_success())
            .map(|r| r.endpoints),
    );
    println!("Got {} proxies.", merged.len());

    Ok(merged)
}

/// Check the candidates and persist the ones that passed
async fn check_and_save(cli: &Cli, candidates: Vec<ProxyEndpoint>) -> Result<()> {
    let total = candidates.len();

    let config = CheckerConfig::new()
        .with_concurrency(cli.concurrency)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_probe_url(cli.probe_url.clone());

    let pool = match &cli.user_agents {
        Some(path) => UserAgentPool::from_file(path)?,
        None => UserAgentPool::default(),
    };
    let checker = ProxyChecker::with_config(config)?.with_header_provider(Arc::new(pool));

    println!("Testing proxies...");
    let (good, _bad) = checker.check_and_separate(candidates).await;
    println!("{}/{} proxies passed the test.", good.len(), total);

    ProxyParser::save_to_file(&good, &cli.output)?;
    println!("Saved to {:?}", cli.output);

    Ok(())
}
