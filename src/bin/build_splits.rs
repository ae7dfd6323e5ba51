#[macro_use]
extern crate log;

use clap::Parser;
use humantime::format_duration;
use itertools::Itertools;
use rayon::prelude::*;
use std::error::Error;
use std::fs;
use std::path;
use std::time::Instant;
use time_resolved_kg::config::{DatasetArgs, RelationArgs, SplitSeeds};
use time_resolved_kg::split::{write_hpo, write_train_test, write_ttv, SplitBuilder, DEFAULT_HPO_YEAR};
use time_resolved_kg::{read_edges_file, read_indications_file, read_nodes_file};

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[command(flatten)]
    relations: RelationArgs,

    /// Directory holding one sub-directory per snapshot year
    #[arg(short, long)]
    base_dir: Option<path::PathBuf>,

    #[arg(short, long)]
    output_dir: Option<path::PathBuf>,

    #[arg(long)]
    split_train_test_valid: bool,

    #[arg(long)]
    split_hyperparameter_optimization: bool,

    #[arg(long, default_value_t = DEFAULT_HPO_YEAR)]
    hpo_year: i32,

    /// Append the year column to every triple
    #[arg(short = 't', long)]
    include_time: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    options.relations.mode()?;
    let layout = options.dataset.layout();
    let overrides = options.dataset.load_overrides()?;
    let base_dir = options.base_dir.clone().unwrap_or_else(|| layout.time_networks_dir());
    let output_dir = options.output_dir.clone().unwrap_or_else(|| layout.splits_dir());

    let mut years = vec![];
    for entry in fs::read_dir(&base_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(year) = entry.file_name().to_str().and_then(|name| name.parse::<i32>().ok()) {
            years.push(year);
        }
    }
    years.sort();
    info!("found {} snapshot years in {:?}", years.len(), base_dir);

    let failures = years
        .par_iter()
        .filter_map(|year| split_year(&options, &base_dir, &output_dir, overrides.seeds.clone(), *year).err().map(|e| (*year, e.to_string())))
        .collect::<Vec<_>>();
    if !failures.is_empty() {
        for (year, e) in failures.iter().sorted() {
            error!("{}: {}", year, e);
        }
        return Err(format!("{} snapshot years failed to split", failures.len()).into());
    }

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}

fn split_year(options: &Options, base_dir: &path::Path, output_dir: &path::Path, seeds: SplitSeeds, year: i32) -> Result<(), Box<dyn Error + Send + Sync>> {
    let in_dir = base_dir.join(year.to_string());
    let out_dir = output_dir.join(year.to_string());

    let nodes = read_nodes_file(&in_dir.join("nodes.tsv"))?;
    let edges = read_edges_file(&in_dir.join("edges.tsv"))?;
    let indications = read_indications_file(&in_dir.join("indications.tsv"))?;
    let builder = SplitBuilder::new(&nodes, &edges, &indications, seeds);

    write_train_test(&out_dir, &builder.train_test(), options.include_time)?;
    if options.split_train_test_valid {
        write_ttv(&out_dir, &builder.train_test_valid(), options.include_time)?;
    }
    if options.split_hyperparameter_optimization && year == options.hpo_year {
        write_hpo(&out_dir, &builder.hpo(), options.include_time)?;
    }
    Ok(())
}
