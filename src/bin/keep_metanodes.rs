#[macro_use]
extern crate log;

use clap::Parser;
use humantime::format_duration;
use itertools::Itertools;
use std::error::Error;
use std::time::Instant;
use time_resolved_kg::config::DatasetArgs;
use time_resolved_kg::io::{write_edges, write_nodes};
use time_resolved_kg::prune::keep_metanodes;
use time_resolved_kg::{read_edges_file, read_nodes_file};

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(flatten)]
    dataset: DatasetArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let layout = options.dataset.layout();
    let overrides = options.dataset.load_overrides()?;
    let keep = overrides.keep_metanode_set();
    info!("keeping metanodes: {}", keep.iter().map(|t| t.name()).join(", "));

    let nodes = read_nodes_file(&layout.filtered_nodes())?;
    let edges = read_edges_file(&layout.filtered_edges())?;

    let (nodes, edges) = keep_metanodes(nodes, edges, &keep)?;

    write_nodes(&layout.pruned_nodes(), &nodes)?;
    write_edges(&layout.pruned_edges(), &edges)?;

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
