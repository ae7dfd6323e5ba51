#[macro_use]
extern crate log;

use async_once::AsyncOnce;
use clap::{Parser, Subcommand};
use humantime::format_duration;
use lazy_static::lazy_static;
use reqwest::header;
use reqwest::redirect::Policy;
use std::error::Error;
use std::time::{Duration, Instant};
use time_resolved_kg::config::{DataLayout, DatasetArgs};
use time_resolved_kg::io::{read_lines, write_json};
use time_resolved_kg::pubyear::{ebi_cache, load_checkpoint, load_sources, merge_sources, remaining_pmids, EbiFetcher, EBI_SOURCE};

lazy_static! {
    pub static ref REQWEST_CLIENT: AsyncOnce<reqwest::Client> = AsyncOnce::new(async {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        let result = reqwest::Client::builder()
            .redirect(Policy::limited(5))
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build();

        match result {
            Ok(request_client) => request_client,
            Err(e) => panic!("Could not create Reqwest Client: {}", e),
        }
    });
}

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, PartialEq, Debug)]
enum Commands {
    /// Merge the per-source PMID year caches into pmid_to_year.json
    Merge,

    /// Look up PMIDs no other source resolves through the Europe PMC search API
    FetchEbi {
        #[arg(short, long, default_value_t = 16)]
        concurrency: usize,

        #[arg(long, default_value_t = 5000)]
        checkpoint_every: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let layout = options.dataset.layout();

    match &options.command {
        Some(Commands::Merge) => merge(&layout)?,
        Some(Commands::FetchEbi { concurrency, checkpoint_every }) => fetch_ebi(&layout, *concurrency, *checkpoint_every).await?,
        None => {}
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}

fn merge(layout: &DataLayout) -> Result<(), Box<dyn Error>> {
    let merged = merge_sources(load_sources(|source| layout.pmid_to_year_source(source))?);
    let years = merged.flatten();
    info!("{} PMIDs have a publication year", years.len());
    write_json(&layout.pmid_to_year(), &years)?;
    Ok(())
}

async fn fetch_ebi(layout: &DataLayout, concurrency: usize, checkpoint_every: usize) -> Result<(), Box<dyn Error>> {
    let wanted = read_lines(&layout.pmid_list())?;
    let sources = load_sources(|source| layout.pmid_to_year_source(source))?.into_iter().filter(|(name, _)| name != EBI_SOURCE).collect();
    let known = merge_sources(sources);
    let remaining = remaining_pmids(&wanted, &known, &load_checkpoint(&layout.ebi_checkpoint())?);
    info!("{} of {} PMIDs are not resolved by any other source", remaining.len(), wanted.len());

    let client = REQWEST_CLIENT.get().await.clone();
    let checkpoint = EbiFetcher::new(client, concurrency, checkpoint_every, layout.ebi_checkpoint()).fetch(remaining).await?;

    write_json(&layout.pmid_to_year_source(EBI_SOURCE), &ebi_cache(&checkpoint))?;
    Ok(())
}
