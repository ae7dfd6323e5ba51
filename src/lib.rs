pub mod condense;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod filter;
pub mod frames;
pub mod hetnet;
pub mod io;
pub mod normalize;
pub mod prune;
pub mod pubyear;
pub mod semtype;
pub mod sources;
pub mod split;
pub mod timeline;
pub mod xref;

use crate::config::DIRECTION_MARKER;
use crate::error::{PipelineError, Result};
use crate::semtype::SuperType;
use lazy_static::lazy_static;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path;

lazy_static! {
    static ref RELATION_REGEX: regex::Regex = regex::Regex::new(r"^(.+)_([A-Z]+)([a-z]+)(>?)([A-Z]+)$").expect("Could not create relation regex");
}

pub const PMID_DELIMITER: char = '|';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub enum IdSource {
    #[serde(rename = "UMLS")]
    Umls,
    #[serde(rename = "MeSH")]
    Mesh,
    #[serde(rename = "DO-Slim")]
    DoSlim,
    #[serde(rename = "problem")]
    Problem,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub label: SuperType,
    pub abv_label: String,
    #[serde(default)]
    pub id_source: Option<IdSource>,
}

impl Node {
    pub fn new(id: &str, name: &str, label: SuperType) -> Self {
        Node {
            id: id.to_string(),
            name: name.to_string(),
            label,
            abv_label: label.abbreviation().to_string(),
            id_source: None,
        }
    }
}

/// The pieces a relation string such as `TREATS_CDtDO` or `higher_than_CDdf>CD` is built from.
#[derive(Clone, Debug, PartialEq, Eq, Ord, PartialOrd)]
pub struct RelationParts {
    pub sem: String,
    pub htype: String,
    pub rtype: String,
    pub rdir: String,
    pub ttype: String,
}

impl RelationParts {
    pub fn parse(relation: &str) -> Result<Self> {
        let caps = RELATION_REGEX.captures(relation).ok_or_else(|| PipelineError::Missing { what: "relation parts", key: relation.to_string() })?;
        Ok(RelationParts {
            sem: caps[1].to_string(),
            htype: caps[2].to_string(),
            rtype: caps[3].to_string(),
            rdir: caps[4].to_string(),
            ttype: caps[5].to_string(),
        })
    }

    pub fn abbrev(&self) -> String {
        format!("{}{}{}{}", self.htype, self.rtype, self.rdir, self.ttype)
    }

    pub fn relation(&self) -> String {
        format!("{}_{}", self.sem, self.abbrev())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct Edge {
    pub h_id: String,
    pub t_id: String,
    pub relation: String,
    pub sem: String,
    #[serde(with = "pmid_list")]
    pub pmids: BTreeSet<u64>,
    pub htype: String,
    pub ttype: String,
    pub rtype: String,
    #[serde(default)]
    pub rdir: String,
    pub abbrev: String,
    #[serde(default)]
    pub first_pub: Option<i32>,
}

impl Edge {
    pub fn new(h_id: &str, t_id: &str, parts: RelationParts, pmids: BTreeSet<u64>) -> Self {
        Edge {
            h_id: h_id.to_string(),
            t_id: t_id.to_string(),
            relation: parts.relation(),
            sem: parts.sem.clone(),
            pmids,
            abbrev: parts.abbrev(),
            htype: parts.htype,
            ttype: parts.ttype,
            rtype: parts.rtype,
            rdir: parts.rdir,
            first_pub: None,
        }
    }

    pub fn parts(&self) -> RelationParts {
        RelationParts {
            sem: self.sem.clone(),
            htype: self.htype.clone(),
            rtype: self.rtype.clone(),
            rdir: self.rdir.clone(),
            ttype: self.ttype.clone(),
        }
    }

    /// Rebuilds `relation` and `abbrev` from the component columns.
    pub fn relabel(&mut self) {
        let parts = self.parts();
        self.relation = parts.relation();
        self.abbrev = parts.abbrev();
    }

    pub fn n_pmids(&self) -> usize {
        self.pmids.len()
    }

    pub fn is_directed(&self) -> bool {
        self.rdir == DIRECTION_MARKER
    }

    pub fn is_self_loop(&self) -> bool {
        self.h_id == self.t_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct Indication {
    pub compound_semmed_id: String,
    pub disease_semmed_id: String,
    pub compound_name: String,
    pub disease_name: String,
    pub approval_date: String,
    pub approval_year: i32,
    #[serde(default)]
    pub year_diff: Option<i32>,
    #[serde(default)]
    pub year_cat: Option<String>,
}

/// `|`-joined PMID sets in tabular files.
pub mod pmid_list {
    use itertools::Itertools;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::collections::BTreeSet;

    pub fn serialize<S: Serializer>(pmids: &BTreeSet<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(to_string(pmids).as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<u64>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        from_str(raw.as_str()).map_err(de::Error::custom)
    }

    pub fn to_string(pmids: &BTreeSet<u64>) -> String {
        pmids.iter().join(&super::PMID_DELIMITER.to_string())
    }

    pub fn from_str(raw: &str) -> Result<BTreeSet<u64>, std::num::ParseIntError> {
        raw.split(super::PMID_DELIMITER).map(str::trim).filter(|p| !p.is_empty()).map(|p| p.parse::<u64>()).collect()
    }
}

pub fn read_nodes_file(nodes_path: &path::PathBuf) -> Result<Vec<Node>> {
    io::read_tsv(nodes_path)
}

pub fn read_edges_file(edges_path: &path::PathBuf) -> Result<Vec<Edge>> {
    io::read_tsv(edges_path)
}

pub fn read_indications_file(indications_path: &path::PathBuf) -> Result<Vec<Indication>> {
    io::read_tsv(indications_path)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relation_parts_parse() {
        let parts = RelationParts::parse("ADMINISTERED_TO_CDatLB").unwrap();
        assert_eq!(parts.sem, "ADMINISTERED_TO");
        assert_eq!(parts.htype, "CD");
        assert_eq!(parts.rtype, "at");
        assert_eq!(parts.rdir, "");
        assert_eq!(parts.ttype, "LB");

        let directed = RelationParts::parse("higher_than_CDdf>CD").unwrap();
        assert_eq!(directed.sem, "higher_than");
        assert_eq!(directed.rdir, ">");
        assert_eq!(directed.relation(), "higher_than_CDdf>CD");

        assert!(RelationParts::parse("TREATS").is_err());
    }

    #[test]
    fn pmid_list_joins_sorted() {
        let pmids = BTreeSet::from([30u64, 10, 20]);
        assert_eq!(pmid_list::to_string(&pmids), "10|20|30");
        assert_eq!(pmid_list::from_str("20|10|30").unwrap(), pmids);
        assert!(pmid_list::from_str("").unwrap().is_empty());
        assert!(pmid_list::from_str("12|x").is_err());
    }

    #[test]
    fn edge_relabel_follows_types() {
        let mut edge = Edge::new("C1", "C2", RelationParts::parse("TREATS_CDtDO").unwrap(), BTreeSet::from([1]));
        edge.ttype = "PS".to_string();
        edge.relabel();
        assert_eq!(edge.relation, "TREATS_CDtPS");
        assert_eq!(edge.abbrev, "CDtPS");
        assert_eq!(edge.n_pmids(), 1);
    }
}
