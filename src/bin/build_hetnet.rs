#[macro_use]
extern crate log;

use clap::Parser;
use humantime::format_duration;
use std::error::Error;
use std::path;
use std::time::Instant;
use time_resolved_kg::config::{DatasetArgs, RelationArgs};
use time_resolved_kg::frames::{edges_frame, log_value_counts};
use time_resolved_kg::hetnet::HetnetBuilder;
use time_resolved_kg::io::{read_delimited, read_tsv, write_edges, write_nodes};
use time_resolved_kg::normalize::Predication;
use time_resolved_kg::semtype::{CuiTuiRow, SemGroupRow, SemTypeResolver, SemTypeRow};

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(flatten)]
    dataset: DatasetArgs,

    #[command(flatten)]
    relations: RelationArgs,

    /// SemGroups table, pipe delimited: GROUP|Group Name|TUI|Type Name
    #[arg(long, required = true)]
    sem_groups: path::PathBuf,

    /// SemanticTypes table, pipe delimited: abbr|TUI|name
    #[arg(long, required = true)]
    sem_types: path::PathBuf,

    /// MRSTY extract with a header: cui, tui
    #[arg(long, required = true)]
    cui_tuis: path::PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let mode = options.relations.mode()?;
    info!("relation mode: {:?}", mode);
    let layout = options.dataset.layout();
    let overrides = options.dataset.load_overrides()?;

    let sem_groups: Vec<SemGroupRow> = read_delimited(&options.sem_groups, b'|', false)?;
    let sem_types: Vec<SemTypeRow> = read_delimited(&options.sem_types, b'|', false)?;
    let cui_tuis: Vec<CuiTuiRow> = read_tsv(&options.cui_tuis)?;
    let resolver = SemTypeResolver::new(&sem_groups, &sem_types, &cui_tuis, overrides.semantic_types.clone())?;

    let rows: Vec<Predication> = read_tsv(&layout.clean_triples())?;
    let hetnet = HetnetBuilder::new(&resolver, overrides.predicate_table(), &overrides.corrupted_predicates, mode).build(rows)?;

    log_value_counts(&edges_frame(&hetnet.edges)?, "relation")?;
    write_nodes(&layout.nodes(), &hetnet.nodes)?;
    write_edges(&layout.edges(), &hetnet.edges)?;

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
