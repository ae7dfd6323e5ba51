#[macro_use]
extern crate log;

use clap::Parser;
use humantime::format_duration;
use std::error::Error;
use std::path;
use std::time::Instant;
use time_resolved_kg::condense::{read_condense_map, EdgeCondenser};
use time_resolved_kg::config::{DatasetArgs, RelationArgs};
use time_resolved_kg::io::{write_edges, write_nodes};
use time_resolved_kg::{read_edges_file, read_nodes_file};

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[command(flatten)]
    relations: RelationArgs,

    /// Condense map CSV with columns original_edge, condensed_to, reverse
    #[arg(short = 'm', long)]
    condense_map: Option<path::PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let mode = options.relations.mode()?;
    let layout = options.dataset.layout();

    let rules = if mode.condenses() {
        let map_path = options.condense_map.clone().unwrap_or_else(|| layout.condense_map());
        read_condense_map(&map_path)?
    } else {
        vec![]
    };

    let nodes = read_nodes_file(&layout.consolidated_nodes())?;
    let edges = read_edges_file(&layout.consolidated_edges())?;

    let edges = EdgeCondenser::new(rules, mode).condense(edges, &nodes)?;

    write_nodes(&layout.condensed_nodes(), &nodes)?;
    write_edges(&layout.condensed_edges(), &edges)?;

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
