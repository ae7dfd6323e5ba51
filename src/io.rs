use crate::error::Result;
use crate::frames;
use crate::{Edge, Indication, Node};
use log::{debug, info};
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::{fs, path};

/// Reads a tab-separated file with a header row into typed records.
pub fn read_tsv<T: DeserializeOwned>(path: &path::Path) -> Result<Vec<T>> {
    read_delimited(path, b'\t', true)
}

pub fn read_delimited<T: DeserializeOwned>(path: &path::Path, delimiter: u8, has_headers: bool) -> Result<Vec<T>> {
    debug!("reading {:?}", path);
    let file = fs::File::open(path)?;
    let reader = BufReader::with_capacity(2_usize.pow(14), file);
    let mut rdr = csv::ReaderBuilder::new().has_headers(has_headers).delimiter(delimiter).flexible(true).from_reader(reader);
    let mut records = vec![];
    for result in rdr.deserialize() {
        let record: T = result?;
        records.push(record);
    }
    info!("read {} records from {:?}", records.len(), path.file_name().unwrap_or_default());
    Ok(records)
}

/// Writes typed records as a tab-separated file with a header row.
pub fn write_tsv<T: Serialize>(path: &path::Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(BufWriter::new(file));
    for record in records.iter() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    info!("wrote {} records to {:?}", records.len(), path);
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &path::Path) -> Result<T> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn write_json<T: Serialize>(path: &path::Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let mut bw = BufWriter::new(file);
    serde_json::to_writer(&mut bw, value)?;
    bw.flush()?;
    Ok(())
}

/// Reads the non-empty lines of a file.
pub fn read_lines(path: &path::Path) -> Result<Vec<String>> {
    let file = fs::File::open(path)?;
    let mut lines = vec![];
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line.trim().to_string());
        }
    }
    Ok(lines)
}

/// Writes one value per line.
pub fn write_lines<I: IntoIterator<Item = String>>(path: &path::Path, lines: I) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let mut bw = BufWriter::new(file);
    for line in lines {
        writeln!(bw, "{}", line)?;
    }
    bw.flush()?;
    Ok(())
}

pub fn write_frame(path: &path::Path, df: &mut DataFrame, include_header: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file).with_separator(b'\t').include_header(include_header).finish(df)?;
    info!("wrote {:?} with shape {:?}", path, df.shape());
    Ok(())
}

pub fn write_nodes(path: &path::Path, nodes: &[Node]) -> Result<()> {
    write_frame(path, &mut frames::nodes_frame(nodes)?, true)
}

pub fn write_edges(path: &path::Path, edges: &[Edge]) -> Result<()> {
    write_frame(path, &mut frames::edges_frame(edges)?, true)
}

pub fn write_indications(path: &path::Path, indications: &[Indication]) -> Result<()> {
    write_frame(path, &mut frames::indications_frame(indications)?, true)
}
