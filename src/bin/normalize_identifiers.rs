#[macro_use]
extern crate log;

use clap::Parser;
use humantime::format_duration;
use itertools::Itertools;
use std::error::Error;
use std::path;
use std::time::Instant;
use time_resolved_kg::config::DatasetArgs;
use time_resolved_kg::frames;
use time_resolved_kg::io::{read_tsv, write_json, write_lines, write_tsv};
use time_resolved_kg::normalize::{expand_synonyms, predications_from_frame, ConceptName, GeneAnnotation, HgncCui, IdentifierNormalizer, RetiredCui};

#[derive(Parser, PartialEq, Debug)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Raw SemMedDB PREDICATION dump (comma separated, no header)
    #[arg(short, long, required = true)]
    input: path::PathBuf,

    /// Gene-service annotations: entrez, symbol, name, umls_cui, hgnc
    #[arg(short, long, required = true)]
    genes: path::PathBuf,

    /// UMLS HGNC table: hgnc, cui
    #[arg(long, required = true)]
    hgnc: path::PathBuf,

    /// UMLS preferred names: cui, name
    #[arg(long, required = true)]
    umls_names: path::PathBuf,

    /// Retired CUI table: old, new
    #[arg(long)]
    retired: Option<path::PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    env_logger::init();

    let options = Options::parse();
    debug!("{:?}", options);

    let layout = options.dataset.layout();

    let raw = frames::scan_semmed_dump(&options.input)?;
    let rows = predications_from_frame(&raw)?;
    let (rows, mismatched) = expand_synonyms(rows);
    if mismatched > 0 {
        warn!("dropped {} rows whose synonym id and name lists differ in length", mismatched);
    }
    info!("{} predications after synonym expansion", rows.len());

    let genes: Vec<GeneAnnotation> = read_tsv(&options.genes)?;
    let hgnc: Vec<HgncCui> = read_tsv(&options.hgnc)?;
    let umls_names: Vec<ConceptName> = read_tsv(&options.umls_names)?;
    let retired: Vec<RetiredCui> = match &options.retired {
        Some(path) => read_tsv(path)?,
        None => vec![],
    };

    let normalized = IdentifierNormalizer::new(&genes, &hgnc, &umls_names, &retired).normalize(rows)?;

    write_tsv(&layout.clean_triples(), &normalized.clean)?;
    write_tsv(&layout.unmapped_triples(), &normalized.unmapped)?;
    write_lines(&layout.pmid_list(), normalized.pmids().into_iter().map(|p| p.to_string()).collect_vec())?;
    write_json(&layout.entrez_to_cui(), &normalized.entrez_to_cui)?;
    write_json(&layout.cui_to_name(), &normalized.cui_to_name)?;

    info!("Duration: {}", format_duration(start.elapsed()).to_string());
    Ok(())
}
