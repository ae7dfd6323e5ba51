#[macro_use]
extern crate log;

use clap::Parser;
use humantime::format_duration;
use std::collections::BTreeMap;
use std::error::Error;
use std::path;
use std::time::Instant;
use time_resolved_kg::config::DatasetArgs;
use time_resolved_kg::io::{read_json, write_edges};
use time_resolved_kg::pubyear::pmid_years;
use time_resolved_kg::timeline::{resolve_first_pub, TimelineBuilder, FIRST_YEAR};
use time_resolved_kg::{read_edges_file, read_indications_file, read_nodes_file};

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long, default_value_t = FIRST_YEAR)]
    first_year: i32,

    /// Defaults to the latest first publication year among the edges
    #[arg(long)]
    last_year: Option<i32>,

    /// Where the per-year directories are written
    #[arg(short, long)]
    base_dir: Option<path::PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let layout = options.dataset.layout();
    let base_dir = options.base_dir.clone().unwrap_or_else(|| layout.time_networks_dir());

    let years: BTreeMap<String, i32> = read_json(&layout.pmid_to_year())?;
    let years = pmid_years(years);
    info!("{} PMIDs with a publication year", years.len());

    let nodes = read_nodes_file(&layout.pruned_nodes())?;
    let edges = read_edges_file(&layout.pruned_edges())?;
    let indications = read_indications_file(&layout.indications())?;

    let (dated, undated) = resolve_first_pub(edges, &years);
    if !undated.is_empty() {
        write_edges(&base_dir.join("undated_edges.tsv"), &undated)?;
    }

    let timeline = TimelineBuilder::new(nodes, dated, indications);
    let range = timeline.years(options.first_year, options.last_year);
    info!("building snapshots for {:?}", range);
    let summary = timeline.write_all(&base_dir, range)?;
    if let (Some(first), Some(last)) = (summary.first(), summary.last()) {
        info!("snapshots grew from {:?} to {:?} (year, nodes, edges, indications)", first, last);
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
