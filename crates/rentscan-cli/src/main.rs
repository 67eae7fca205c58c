use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, io};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use rentscan_crawler::{
    crawl_site, postcodes, CrawlReport, CrawlerConfig, CsvStore, DedupeStore, DomainAdapter,
    HttpFetcher, Postcode, ReaAdapter, SourceAdapter, SqliteStore, State,
};
use tokio::runtime;

/// Incremental rental listing crawler
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "crawl")]
    Crawl(CrawlArgs),
    #[command(name = "postcodes")]
    Postcodes(PostcodesArgs),
    #[command(hide = true)]
    Completion,
}

/// Crawl listing sites and store listings not seen before
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("output").multiple(false))]
pub struct CrawlArgs {
    /// CSV file holding every listing found so far
    #[arg(group = "output", long, short)]
    pub output_file: Option<PathBuf>,
    /// SQLite database holding every listing found so far, e.g. sqlite://listings.db
    #[arg(group = "output", long, env = "RENTSCAN_DATABASE_URL")]
    pub database_url: Option<String>,
    /// Optional crawler yaml configuration file
    #[arg(env = "RENTSCAN_CRAWLER_CONFIG", long)]
    pub crawler_config: Option<PathBuf>,
    /// Override crawler's user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override crawler's number of concurrent walks
    #[arg(long)]
    pub num_workers: Option<usize>,
    /// Only crawl the postcodes of these states
    #[arg(long, value_enum)]
    pub state: Vec<State>,
    /// Only crawl these postcodes
    #[arg(long)]
    pub postcode: Vec<Postcode>,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(file) = args.crawler_config.as_ref().map(File::open) {
            serde_yaml::from_reader(file?)?
        } else {
            CrawlerConfig::default()
        };
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(num_workers) = args.num_workers {
            conf.num_workers = num_workers;
        }
        Ok(conf)
    }
}

/// Print the postcodes a crawl walks through
#[derive(Debug, clap::Args)]
pub struct PostcodesArgs {
    /// Only print the postcodes of these states
    #[arg(long, value_enum)]
    pub state: Vec<State>,
}

fn select_postcodes(states: &[State], explicit: &[Postcode]) -> Vec<Postcode> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    if states.is_empty() {
        return postcodes();
    }
    states.iter().flat_map(|s| s.postcodes()).collect()
}

fn print_summary(report: &CrawlReport) {
    println!("Loaded {} seen listings", report.previously_seen);
    for (postcode, listings) in &report.results {
        if !listings.is_empty() {
            println!("postcode {postcode}: {} new listings", listings.len());
        }
    }
    for (source, postcode) in &report.failed {
        println!("postcode {postcode}: {source} walk failed");
    }
    println!("total_new_listings={}", report.total_new);
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let conf: CrawlerConfig = (&args).try_into()?;
    let regions = select_postcodes(&args.state, &args.postcode);

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let (report, stored) = rt.block_on(async {
        let store: Box<dyn DedupeStore> = match &args.database_url {
            Some(url) => Box::new(SqliteStore::connect(url, conf.batch_size).await?),
            None => Box::new(CsvStore::new(
                args.output_file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("output.csv")),
            )),
        };

        let fetcher = Arc::new(HttpFetcher::new(&conf)?);
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(DomainAdapter::new(fetcher, &conf)?),
            Arc::new(ReaAdapter),
        ];

        crawl_site(&conf, store.as_ref(), &regions, &adapters).await
    })?;

    print_summary(&report);
    stored.context("Couldn't store new listings")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            if !args.quiet {
                if env::var_os("RUST_LOG").is_none() {
                    env::set_var("RUST_LOG", "rentscan_crawler=info");
                }
                env_logger::init();
            }
            crawl(args)
        }
        SubCommand::Postcodes(args) => {
            for postcode in select_postcodes(&args.state, &[]) {
                println!("{postcode}");
            }
            Ok(())
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "rentscan", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "rentscan",
            "crawl",
            "--user-agent",
            "test-agent",
            "--num-workers",
            "3",
            "--postcode",
            "2000",
            "--state",
            "vic",
        ]);
        let SubCommand::Crawl(args) = args.cmd else {
            panic!("expected the crawl command");
        };
        let conf = CrawlerConfig::try_from(&args).unwrap();
        assert_eq!(conf.user_agent, "test-agent");
        assert_eq!(conf.num_workers, 3);
        assert_eq!(
            select_postcodes(&args.state, &args.postcode),
            vec!["2000".parse::<Postcode>().unwrap()]
        );
    }

    #[test]
    fn outputs_are_exclusive() {
        let res = Args::try_parse_from([
            "rentscan",
            "crawl",
            "--output-file",
            "out.csv",
            "--database-url",
            "sqlite://x.db",
        ]);
        assert!(res.is_err());
    }
}
