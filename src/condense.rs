use crate::config::RelationMode;
use crate::ensure_integrity;
use crate::error::Result;
use crate::{Edge, Node, RelationParts};
use itertools::Itertools;
use log::{debug, info};
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path;

/// One row of the edge condense map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondenseRule {
    pub original_edge: String,
    pub condensed_to: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub reverse: bool,
}

fn deserialize_flag<'de, D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw: String = serde::Deserialize::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!("not a boolean: {}", other))),
    }
}

impl CondenseRule {
    pub fn new(from: &str, to: &str, reverse: bool) -> Self {
        CondenseRule {
            original_edge: from.to_string(),
            condensed_to: to.to_string(),
            reverse,
        }
    }

    pub fn apply(&self, mut edge: Edge) -> Edge {
        if edge.relation != self.original_edge {
            return edge;
        }
        edge.relation = self.condensed_to.clone();
        if self.reverse {
            std::mem::swap(&mut edge.h_id, &mut edge.t_id);
            std::mem::swap(&mut edge.htype, &mut edge.ttype);
        }
        edge
    }
}

pub fn read_condense_map(path: &path::Path) -> Result<Vec<CondenseRule>> {
    crate::io::read_delimited(path, b',', true)
}

/// Checks that every id referenced by `edges` carries exactly one type.
pub fn check_single_type(edges: &[Edge]) -> Result<()> {
    let mut types: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for e in edges.iter() {
        types.entry(e.h_id.as_str()).or_default().insert(e.htype.as_str());
        types.entry(e.t_id.as_str()).or_default().insert(e.ttype.as_str());
    }
    let multi = types.iter().filter(|(_, t)| t.len() > 1).map(|(id, _)| *id).take(10).collect_vec();
    ensure_integrity!(multi.is_empty(), "single-type-per-id", "ids with several types: {:?}", multi);
    Ok(())
}

pub fn check_endpoints(edges: &[Edge], nodes: &[Node]) -> Result<()> {
    let ids: BTreeSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let missing = edges
        .iter()
        .flat_map(|e| [e.h_id.as_str(), e.t_id.as_str()])
        .filter(|id| !ids.contains(id))
        .unique()
        .take(10)
        .collect_vec();
    ensure_integrity!(missing.is_empty(), "edge-endpoints-exist", "edge endpoints missing from the node table: {:?}", missing);
    Ok(())
}

/// Groups edges on `(h_id, t_id, relation)` and unions their evidence.
pub fn dedup(edges: Vec<Edge>) -> Vec<Edge> {
    let mut grouped: BTreeMap<(String, String, String), Edge> = BTreeMap::new();
    for edge in edges.into_iter() {
        let key = (edge.h_id.clone(), edge.t_id.clone(), edge.relation.clone());
        match grouped.get_mut(&key) {
            Some(existing) => existing.pmids.extend(edge.pmids.into_iter()),
            None => {
                grouped.insert(key, edge);
            }
        }
    }
    grouped.into_values().collect_vec()
}

/// Orders the endpoints of undirected edges between nodes of the same type, then dedups them.
pub fn dedup_undirected_same_type(edges: Vec<Edge>) -> Vec<Edge> {
    let (same, other): (Vec<Edge>, Vec<Edge>) = edges.into_iter().partition(|e| e.htype == e.ttype && !e.is_directed());
    let before = same.len();
    let same = same
        .into_iter()
        .map(|mut e| {
            if e.h_id > e.t_id {
                std::mem::swap(&mut e.h_id, &mut e.t_id);
            }
            e
        })
        .collect_vec();
    let same = dedup(same);
    info!("undirected same-type edges: {} before dedup, {} after", before, same.len());
    same.into_iter().chain(other.into_iter()).collect_vec()
}

pub struct EdgeCondenser {
    rules: Vec<CondenseRule>,
    mode: RelationMode,
}

impl EdgeCondenser {
    pub fn new(rules: Vec<CondenseRule>, mode: RelationMode) -> Self {
        EdgeCondenser { rules, mode }
    }

    /// Applies every rule in order. Later rules see the output of earlier ones.
    pub fn fold(&self, edge: Edge) -> Edge {
        self.rules.iter().fold(edge, |e, rule| rule.apply(e))
    }

    /// Re-derives `sem`, `rtype`, `rdir` and `abbrev` from the condensed relation and checks them
    /// against the endpoint types the edge carries.
    fn rederive(&self, edges: Vec<Edge>) -> Result<Vec<Edge>> {
        let mut rederived = Vec::with_capacity(edges.len());
        let mut sem_to_rtype: BTreeMap<String, String> = BTreeMap::new();
        for mut edge in edges.into_iter() {
            let parts = RelationParts::parse(edge.relation.as_str())?;
            match sem_to_rtype.get(&parts.sem) {
                Some(rtype) => ensure_integrity!(
                    rtype == &parts.rtype,
                    "one-abbreviation-per-relation",
                    "{} is abbreviated as both {} and {}",
                    parts.sem,
                    rtype,
                    parts.rtype
                ),
                None => {
                    sem_to_rtype.insert(parts.sem.clone(), parts.rtype.clone());
                }
            }
            let recomputed = RelationParts {
                sem: parts.sem.clone(),
                htype: edge.htype.clone(),
                rtype: parts.rtype.clone(),
                rdir: parts.rdir.clone(),
                ttype: edge.ttype.clone(),
            };
            ensure_integrity!(
                recomputed.abbrev() == parts.abbrev(),
                "recomputed-abbreviation-matches",
                "{} between {} and {} recomputes to {}",
                edge.relation,
                edge.h_id,
                edge.t_id,
                recomputed.abbrev()
            );
            edge.sem = parts.sem;
            edge.rtype = parts.rtype;
            edge.rdir = parts.rdir;
            edge.abbrev = recomputed.abbrev();
            rederived.push(edge);
        }
        debug!("relation abbreviations: {:?}", sem_to_rtype);
        Ok(rederived)
    }

    pub fn condense(&self, edges: Vec<Edge>, nodes: &[Node]) -> Result<Vec<Edge>> {
        let before = edges.len();
        let edges = if self.mode.condenses() {
            info!("condensing edge semantics with {} rules", self.rules.len());
            let folded = edges.into_iter().map(|e| self.fold(e)).collect_vec();
            self.rederive(folded)?
        } else {
            info!("negative relations are kept, relations pass through unchanged");
            edges
        };

        check_endpoints(&edges, nodes)?;
        check_single_type(&edges)?;
        let edges = dedup_undirected_same_type(edges);
        let edges = dedup(edges);
        check_single_type(&edges)?;
        info!("{} edges before condensing, {} after", before, edges.len());
        Ok(edges)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::semtype::SuperType;

    fn edge(h: &str, t: &str, relation: &str, pmids: &[u64]) -> Edge {
        Edge::new(h, t, RelationParts::parse(relation).unwrap(), pmids.iter().copied().collect())
    }

    fn nodes() -> Vec<Node> {
        vec![
            Node::new("C1", "a", SuperType::ChemicalsDrugs),
            Node::new("C2", "b", SuperType::ChemicalsDrugs),
            Node::new("D1", "c", SuperType::Disorders),
        ]
    }

    #[test]
    fn rules_fold_in_order() {
        let rules = vec![
            CondenseRule::new("CAUSED_BY_DOcbCD", "CAUSES_CDcDO", true),
            CondenseRule::new("CAUSES_CDcDO", "ASSOCIATED_WITH_CDawDO", false),
        ];
        let condenser = EdgeCondenser::new(rules, RelationMode::Convert { include_direction: false });
        let folded = condenser.fold(edge("D1", "C1", "CAUSED_BY_DOcbCD", &[1]));
        assert_eq!(folded.relation, "ASSOCIATED_WITH_CDawDO");
        assert_eq!((folded.h_id.as_str(), folded.t_id.as_str()), ("C1", "D1"));
        assert_eq!((folded.htype.as_str(), folded.ttype.as_str()), ("CD", "DO"));
    }

    #[test]
    fn condensed_duplicates_merge_evidence() {
        let rules = vec![CondenseRule::new("CAUSED_BY_DOcbCD", "CAUSES_CDcDO", true)];
        let condenser = EdgeCondenser::new(rules, RelationMode::Drop { include_direction: false });
        let edges = vec![edge("D1", "C1", "CAUSED_BY_DOcbCD", &[1, 2]), edge("C1", "D1", "CAUSES_CDcDO", &[2, 3])];
        let out = condenser.condense(edges, &nodes()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pmids, BTreeSet::from([1, 2, 3]));
        assert_eq!(out[0].abbrev, "CDcDO");
    }

    #[test]
    fn undirected_same_type_edges_are_canonical() {
        let condenser = EdgeCondenser::new(vec![], RelationMode::Keep);
        let edges = vec![
            edge("C2", "C1", "INTERACTS_WITH_CDiwCD", &[1]),
            edge("C1", "C2", "INTERACTS_WITH_CDiwCD", &[2]),
            edge("C2", "C1", "higher_than_CDdf>CD", &[3]),
        ];
        let out = condenser.condense(edges, &nodes()).unwrap();
        assert_eq!(out.len(), 2);
        let undirected = out.iter().find(|e| e.sem == "INTERACTS_WITH").unwrap();
        assert_eq!((undirected.h_id.as_str(), undirected.t_id.as_str()), ("C1", "C2"));
        assert_eq!(undirected.pmids, BTreeSet::from([1, 2]));
        let directed = out.iter().find(|e| e.sem == "higher_than").unwrap();
        assert_eq!(directed.h_id, "C2");
    }

    #[test]
    fn dedup_is_idempotent() {
        let edges = vec![edge("C1", "D1", "TREATS_CDtDO", &[1]), edge("C1", "D1", "TREATS_CDtDO", &[2]), edge("C2", "D1", "TREATS_CDtDO", &[2])];
        let once = dedup(edges);
        assert_eq!(dedup(once.clone()), once);
    }

    #[test]
    fn inconsistent_abbreviations_fail() {
        let rules = vec![CondenseRule::new("CAUSES_CDcDO", "TREATS_CDcDO", false)];
        let condenser = EdgeCondenser::new(rules, RelationMode::Drop { include_direction: false });
        let edges = vec![edge("C1", "D1", "CAUSES_CDcDO", &[1]), edge("C2", "D1", "TREATS_CDtDO", &[2])];
        assert!(condenser.condense(edges, &nodes()).unwrap_err().is_integrity());
    }

    #[test]
    fn reversed_rule_with_wrong_types_fails() {
        let rules = vec![CondenseRule::new("CAUSES_CDcDO", "CAUSES_CDcDO", true)];
        let condenser = EdgeCondenser::new(rules, RelationMode::Drop { include_direction: false });
        let err = condenser.condense(vec![edge("C1", "D1", "CAUSES_CDcDO", &[1])], &nodes()).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn unknown_endpoints_fail() {
        let condenser = EdgeCondenser::new(vec![], RelationMode::Keep);
        let err = condenser.condense(vec![edge("C9", "D1", "TREATS_CDtDO", &[1])], &nodes()).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn reads_condense_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge_condense_map.csv");
        std::fs::write(&path, "original_edge,condensed_to,reverse\nCAUSED_BY_DOcbCD,CAUSES_CDcDO,True\nAFFECTS_CDafDO,AFFECTS_CDafDO,False\n").unwrap();
        let rules = read_condense_map(&path).unwrap();
        assert_eq!(rules, vec![CondenseRule::new("CAUSED_BY_DOcbCD", "CAUSES_CDcDO", true), CondenseRule::new("AFFECTS_CDafDO", "AFFECTS_CDafDO", false)]);
    }
}
