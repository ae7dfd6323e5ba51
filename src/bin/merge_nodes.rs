#[macro_use]
extern crate log;

use clap::Parser;
use humantime::format_duration;
use std::error::Error;
use std::time::Instant;
use time_resolved_kg::config::DatasetArgs;
use time_resolved_kg::consolidate::{NodeConsolidator, XrefTables};
use time_resolved_kg::io::{write_edges, write_indications, write_json, write_lines, write_nodes, write_tsv};
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

    let nodes = read_nodes_file(&layout.nodes())?;
    let edges = read_edges_file(&layout.edges())?;
    let tables = XrefTables::load(&layout)?;

    let consolidated = NodeConsolidator::new(&tables, &overrides.consolidation).consolidate(nodes, edges)?;

    if !consolidated.unmapped.is_empty() {
        warn!("{} canonical ids have no id source or name and were excluded", consolidated.unmapped.len());
        write_lines(&layout.data_dir.join("unmapped_ids.txt"), consolidated.unmapped.iter().cloned())?;
    }

    write_nodes(&layout.consolidated_nodes(), &consolidated.nodes)?;
    write_edges(&layout.consolidated_edges(), &consolidated.edges)?;
    write_indications(&layout.indications(), &consolidated.indications)?;
    write_tsv(&layout.gold_standard(), &consolidated.gold_standard)?;
    write_json(&layout.merge_map("drug"), &consolidated.drug_map)?;
    write_json(&layout.merge_map("disease"), &consolidated.disease_map)?;
    write_json(&layout.merge_map("node_id"), &consolidated.node_map)?;
    write_json(&layout.all_names(), &consolidated.names)?;

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
