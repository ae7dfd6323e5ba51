#[macro_use]
extern crate log;

use clap::Parser;
use humantime::format_duration;
use std::error::Error;
use std::time::Instant;
use time_resolved_kg::config::DatasetArgs;
use time_resolved_kg::filter::EdgeFilter;
use time_resolved_kg::io::{write_edges, write_nodes};
use time_resolved_kg::{read_edges_file, read_nodes_file};

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Minimum share of all edges a relation needs to survive, e.g. 0.001
    #[arg(long)]
    cutoff: Option<f64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let layout = options.dataset.layout();
    let overrides = options.dataset.load_overrides()?;
    let cutoff = options.cutoff.unwrap_or(overrides.low_abundance_cutoff);

    let nodes = read_nodes_file(&layout.condensed_nodes())?;
    let edges = read_edges_file(&layout.condensed_edges())?;

    let filtered = EdgeFilter::new(cutoff, &overrides.too_general).filter(nodes, edges)?;
    info!("dropped relations below {}: {:?}", cutoff, filtered.dropped_relations);

    write_nodes(&layout.filtered_nodes(), &filtered.nodes)?;
    write_edges(&layout.filtered_edges(), &filtered.edges)?;

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
