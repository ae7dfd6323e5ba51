use crate::error::Result;
use crate::{pmid_list, Edge, Indication, Node};
use itertools::Itertools;
use log::info;
use polars::prelude::*;
use std::path;

pub const SEMMED_COLUMNS: [&str; 12] = [
    "PREDICATION_ID",
    "SENTENCE_ID",
    "PMID",
    "PREDICATE",
    "SUBJECT_CUI",
    "SUBJECT_NAME",
    "SUBJECT_SEMTYPE",
    "SUBJECT_NOVELTY",
    "OBJECT_CUI",
    "OBJECT_NAME",
    "OBJECT_SEMTYPE",
    "OBJECT_NOVELTY",
];

pub fn nodes_frame(nodes: &[Node]) -> Result<DataFrame> {
    Ok(df!(
        "id" => nodes.iter().map(|n| n.id.as_str()).collect_vec(),
        "name" => nodes.iter().map(|n| n.name.as_str()).collect_vec(),
        "label" => nodes.iter().map(|n| n.label.name()).collect_vec(),
        "abv_label" => nodes.iter().map(|n| n.abv_label.as_str()).collect_vec(),
        "id_source" => nodes.iter().map(|n| n.id_source.map(|s| id_source_name(&s))).collect_vec(),
    )?)
}

fn id_source_name(source: &crate::IdSource) -> &'static str {
    match source {
        crate::IdSource::Umls => "UMLS",
        crate::IdSource::Mesh => "MeSH",
        crate::IdSource::DoSlim => "DO-Slim",
        crate::IdSource::Problem => "problem",
    }
}

pub fn edges_frame(edges: &[Edge]) -> Result<DataFrame> {
    let mut df = df!(
        "h_id" => edges.iter().map(|e| e.h_id.as_str()).collect_vec(),
        "t_id" => edges.iter().map(|e| e.t_id.as_str()).collect_vec(),
        "relation" => edges.iter().map(|e| e.relation.as_str()).collect_vec(),
        "sem" => edges.iter().map(|e| e.sem.as_str()).collect_vec(),
        "pmids" => edges.iter().map(|e| pmid_list::to_string(&e.pmids)).collect_vec(),
        "n_pmids" => edges.iter().map(|e| e.n_pmids() as u64).collect_vec(),
        "htype" => edges.iter().map(|e| e.htype.as_str()).collect_vec(),
        "ttype" => edges.iter().map(|e| e.ttype.as_str()).collect_vec(),
        "rtype" => edges.iter().map(|e| e.rtype.as_str()).collect_vec(),
        "rdir" => edges.iter().map(|e| e.rdir.as_str()).collect_vec(),
        "abbrev" => edges.iter().map(|e| e.abbrev.as_str()).collect_vec(),
    )?;
    if edges.iter().any(|e| e.first_pub.is_some()) {
        let first_pub = Series::new("first_pub".into(), edges.iter().map(|e| e.first_pub).collect_vec());
        df.with_column(first_pub)?;
    }
    Ok(df)
}

pub fn indications_frame(indications: &[Indication]) -> Result<DataFrame> {
    let mut df = df!(
        "compound_semmed_id" => indications.iter().map(|i| i.compound_semmed_id.as_str()).collect_vec(),
        "disease_semmed_id" => indications.iter().map(|i| i.disease_semmed_id.as_str()).collect_vec(),
        "compound_name" => indications.iter().map(|i| i.compound_name.as_str()).collect_vec(),
        "disease_name" => indications.iter().map(|i| i.disease_name.as_str()).collect_vec(),
        "approval_date" => indications.iter().map(|i| i.approval_date.as_str()).collect_vec(),
        "approval_year" => indications.iter().map(|i| i.approval_year).collect_vec(),
    )?;
    if indications.iter().any(|i| i.year_diff.is_some()) {
        df.with_column(Series::new("year_diff".into(), indications.iter().map(|i| i.year_diff).collect_vec()))?;
        df.with_column(Series::new("year_cat".into(), indications.iter().map(|i| i.year_cat.clone()).collect_vec()))?;
    }
    Ok(df)
}

/// Headerless `(head, relation, tail[, year])` rows.
pub fn triples_frame(triples: &[(String, String, String, i32)], include_time: bool) -> Result<DataFrame> {
    let mut df = df!(
        "h_id" => triples.iter().map(|t| t.0.as_str()).collect_vec(),
        "relation" => triples.iter().map(|t| t.1.as_str()).collect_vec(),
        "t_id" => triples.iter().map(|t| t.2.as_str()).collect_vec(),
    )?;
    if include_time {
        df.with_column(Series::new("year".into(), triples.iter().map(|t| t.3).collect_vec()))?;
    }
    Ok(df)
}

/// Scans a raw SemMedDB PREDICATION dump (comma separated, no header) with every column read as text.
pub fn scan_semmed_dump(path: &path::PathBuf) -> Result<DataFrame> {
    let selection = SEMMED_COLUMNS.iter().enumerate().map(|(idx, name)| col(format!("column_{}", idx + 1)).alias(*name)).collect_vec();
    let df = LazyCsvReader::new(path.clone())
        .with_separator(b',')
        .with_infer_schema_length(Some(0))
        .with_ignore_errors(true)
        .with_truncate_ragged_lines(true)
        .with_has_header(false)
        .finish()?
        .select(selection)
        .drop_nulls(None)
        .collect()?;
    info!("raw SemMedDB shape: {:?}", df.shape());
    Ok(df)
}

/// Row counts per distinct value of `column`, largest first.
pub fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, u32)>> {
    let counts = df
        .clone()
        .lazy()
        .group_by([col(column)])
        .agg([len().alias("count")])
        .sort(["count"], SortMultipleOptions::default().with_order_descending(true))
        .collect()?;
    let keys = counts.column(column)?.cast(&DataType::String)?;
    let values = counts.column("count")?.cast(&DataType::UInt32)?;
    Ok(keys
        .str()?
        .into_iter()
        .zip(values.u32()?.into_iter())
        .map(|(k, v)| (k.unwrap_or_default().to_string(), v.unwrap_or_default()))
        .collect_vec())
}

pub fn log_value_counts(df: &DataFrame, column: &str) -> Result<()> {
    for (value, count) in value_counts(df, column)?.iter() {
        info!("{}: {} -> {}", column, value, count);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::semtype::SuperType;
    use crate::RelationParts;
    use std::collections::BTreeSet;

    #[test]
    fn label_counts() {
        let nodes = vec![
            Node::new("C1", "a", SuperType::ChemicalsDrugs),
            Node::new("C2", "b", SuperType::ChemicalsDrugs),
            Node::new("C3", "c", SuperType::Disorders),
        ];
        let counts = value_counts(&nodes_frame(&nodes).unwrap(), "label").unwrap();
        assert_eq!(counts, vec![("Chemicals & Drugs".to_string(), 2), ("Disorders".to_string(), 1)]);
    }

    #[test]
    fn first_pub_column_only_when_resolved() {
        let mut edge = Edge::new("C1", "C2", RelationParts::parse("TREATS_CDtDO").unwrap(), BTreeSet::from([1, 2]));
        let df = edges_frame(&[edge.clone()]).unwrap();
        assert!(!df.get_column_names_str().contains(&"first_pub"));
        edge.first_pub = Some(1960);
        let df = edges_frame(&[edge]).unwrap();
        assert!(df.get_column_names_str().contains(&"first_pub"));
        assert_eq!(df.column("pmids").unwrap().str().unwrap().get(0), Some("1|2"));
    }
}
