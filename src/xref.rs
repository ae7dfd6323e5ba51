//! Identifier consolidation over a cross-reference graph.
//!
//! Every identifier is compared only against its direct neighbours (a breadth-first search
//! with depth limit 1), never against its whole connected component. Hubs linked to many
//! unrelated concepts therefore cannot pull those concepts together.

use crate::ensure_integrity;
use crate::error::Result;
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Undirected adjacency between identifiers asserted to be equivalent by some source table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XrefGraph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl XrefGraph {
    pub fn new() -> Self {
        XrefGraph::default()
    }

    pub fn link(&mut self, a: &str, b: &str) {
        self.adjacency.entry(a.to_string()).or_default().insert(b.to_string());
        self.adjacency.entry(b.to_string()).or_default().insert(a.to_string());
    }

    /// Adds `id` with no neighbours of its own.
    pub fn ensure_node(&mut self, id: &str) {
        self.adjacency.entry(id.to_string()).or_default();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.adjacency.keys()
    }

    /// `{id} ∪ adj(id)`.
    pub fn neighborhood(&self, id: &str) -> BTreeSet<String> {
        let mut hood = BTreeSet::from([id.to_string()]);
        if let Some(adj) = self.adjacency.get(id) {
            hood.extend(adj.iter().cloned());
        }
        hood
    }
}

/// Which identifier vocabularies each id belongs to.
#[derive(Clone, Debug, Default)]
pub struct IdClasses {
    pub mesh: BTreeSet<String>,
    pub umls: BTreeSet<String>,
    pub slim: BTreeSet<String>,
}

impl IdClasses {
    pub fn check_disjoint(&self) -> Result<()> {
        let shared = self.mesh.intersection(&self.umls).take(10).collect_vec();
        ensure_integrity!(shared.is_empty(), "mesh-and-umls-disjoint", "identifiers classed as both MeSH and UMLS: {:?}", shared);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOrder {
    /// source frequency, then MeSH, then UMLS.
    FrequencyFirst,
    /// MeSH, then source frequency, then UMLS, then the lower CUI number.
    MeshFirst,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
    /// Each identifier takes the representative of its own neighbourhood.
    Centre,
    /// Each neighbourhood's representative claims every member; a member claimed more than
    /// once keeps the greatest claim.
    Members,
}

/// Greater wins. The trailing reversed id makes the lexicographically smallest id win ties.
pub type PriorityKey = (i64, i64, i64, i64, Reverse<String>);

pub struct Consolidator<'a> {
    graph: &'a XrefGraph,
    counts: &'a BTreeMap<String, usize>,
    classes: &'a IdClasses,
    fallback: &'a BTreeMap<String, String>,
    order: KeyOrder,
    assignment: Assignment,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Consolidation {
    pub map: BTreeMap<String, String>,
    /// Identifiers whose neighbourhood had no discriminating candidate.
    pub tied: BTreeSet<String>,
}

impl<'a> Consolidator<'a> {
    /// `fallback` supplies the 1:1 MeSH id used when a neighbourhood is tied.
    pub fn new(
        graph: &'a XrefGraph,
        counts: &'a BTreeMap<String, usize>,
        classes: &'a IdClasses,
        fallback: &'a BTreeMap<String, String>,
        order: KeyOrder,
        assignment: Assignment,
    ) -> Self {
        Consolidator {
            graph,
            counts,
            classes,
            fallback,
            order,
            assignment,
        }
    }

    fn frequency(&self, id: &str) -> i64 {
        self.counts.get(id).copied().unwrap_or(0) as i64
    }

    /// `(frequency, is MeSH, is UMLS)`. Candidates differing in none of these are indistinguishable.
    pub fn signature(&self, id: &str) -> (i64, bool, bool) {
        (self.frequency(id), self.classes.mesh.contains(id), self.classes.umls.contains(id))
    }

    pub fn key(&self, id: &str) -> PriorityKey {
        let (freq, is_mesh, is_umls) = self.signature(id);
        match self.order {
            KeyOrder::FrequencyFirst => (freq, is_mesh as i64, is_umls as i64, 0, Reverse(id.to_string())),
            KeyOrder::MeshFirst => {
                let cui_rank = if is_umls { id.get(1..).and_then(|n| n.parse::<i64>().ok()).map(|n| 9_999_999 - n).unwrap_or(0) } else { 0 };
                (is_mesh as i64, freq, is_umls as i64, cui_rank, Reverse(id.to_string()))
            }
        }
    }

    fn is_tied(&self, hood: &BTreeSet<String>) -> bool {
        hood.iter().map(|id| self.signature(id)).all_equal()
    }

    /// The representative of a neighbourhood, or `None` when no candidate is distinguishable.
    /// A DO-Slim member always wins.
    pub fn representative(&self, hood: &BTreeSet<String>) -> Option<String> {
        if let Some(slim) = hood.iter().filter(|id| self.classes.slim.contains(*id)).max_by_key(|id| self.key(id)) {
            return Some(slim.clone());
        }
        if self.is_tied(hood) {
            return None;
        }
        hood.iter().max_by_key(|id| self.key(id)).cloned()
    }

    fn fallback_for(&self, id: &str) -> String {
        self.fallback.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    pub fn consolidate(&self) -> Consolidation {
        let ids = self.graph.ids().cloned().collect_vec();
        let reps: BTreeMap<String, Option<String>> = ids.par_iter().map(|id| (id.clone(), self.representative(&self.graph.neighborhood(id)))).collect();

        let mut result = Consolidation::default();
        match self.assignment {
            Assignment::Centre => {
                for (id, rep) in reps.into_iter() {
                    match rep {
                        Some(r) => {
                            result.map.insert(id, r);
                        }
                        None => {
                            result.map.insert(id.clone(), self.fallback_for(&id));
                            result.tied.insert(id);
                        }
                    }
                }
            }
            Assignment::Members => {
                let mut claims: BTreeMap<String, (bool, PriorityKey, String)> = BTreeMap::new();
                for (centre, rep) in reps.iter() {
                    let Some(r) = rep else {
                        continue;
                    };
                    let claim = (self.classes.slim.contains(r), self.key(r), r.clone());
                    for member in self.graph.neighborhood(centre).into_iter() {
                        match claims.get(&member) {
                            Some(existing) if (existing.0, &existing.1) >= (claim.0, &claim.1) => {}
                            _ => {
                                claims.insert(member, claim.clone());
                            }
                        }
                    }
                }
                for id in ids.into_iter() {
                    match claims.remove(&id) {
                        Some((_, _, r)) => {
                            result.map.insert(id, r);
                        }
                        None => {
                            result.map.insert(id.clone(), self.fallback_for(&id));
                            result.tied.insert(id);
                        }
                    }
                }
            }
        }
        debug!("tied identifiers: {:?}", result.tied.iter().take(20).collect_vec());
        info!(
            "consolidated {} identifiers onto {} representatives ({} tied)",
            result.map.len(),
            result.map.values().unique().count(),
            result.tied.len()
        );
        result
    }
}

/// Counts how many rows across the given source columns mention each identifier.
pub fn count_mentions<'a, I: IntoIterator<Item = &'a str>>(mentions: I) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for id in mentions.into_iter() {
        *counts.entry(id.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod test {
    use super::*;

    fn classes(mesh: &[&str], umls: &[&str], slim: &[&str]) -> IdClasses {
        IdClasses {
            mesh: mesh.iter().map(|s| s.to_string()).collect(),
            umls: umls.iter().map(|s| s.to_string()).collect(),
            slim: slim.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn neighborhood_is_depth_one() {
        let mut g = XrefGraph::new();
        g.link("A", "B");
        g.link("B", "C");
        assert_eq!(g.neighborhood("A"), BTreeSet::from(["A".to_string(), "B".to_string()]));
        assert_eq!(g.neighborhood("B").len(), 3);
        assert_eq!(g.neighborhood("Z"), BTreeSet::from(["Z".to_string()]));
    }

    #[test]
    fn cui_consolidates_to_mesh() {
        let mut g = XrefGraph::new();
        g.link("C0039608", "D013739");
        let counts = BTreeMap::from([("C0039608".to_string(), 2), ("D013739".to_string(), 2)]);
        let cls = classes(&["D013739"], &["C0039608"], &[]);
        let fallback = BTreeMap::new();
        let out = Consolidator::new(&g, &counts, &cls, &fallback, KeyOrder::FrequencyFirst, Assignment::Centre).consolidate();
        assert_eq!(out.map["C0039608"], "D013739");
        assert_eq!(out.map["D013739"], "D013739");
        assert!(out.tied.is_empty());
    }

    #[test]
    fn indistinguishable_neighbours_fall_back() {
        let mut g = XrefGraph::new();
        g.link("X1", "X2");
        g.link("Y1", "Y2");
        let counts = BTreeMap::from([("X1".to_string(), 1), ("X2".to_string(), 1), ("Y1".to_string(), 1), ("Y2".to_string(), 1)]);
        let cls = classes(&[], &[], &[]);
        let fallback = BTreeMap::from([("X2".to_string(), "D000001".to_string())]);
        let out = Consolidator::new(&g, &counts, &cls, &fallback, KeyOrder::FrequencyFirst, Assignment::Centre).consolidate();
        assert_eq!(out.map["X1"], "X1");
        assert_eq!(out.map["X2"], "D000001");
        assert_eq!(out.map["Y1"], "Y1");
        assert_eq!(out.map["Y2"], "Y2");
        assert_eq!(out.tied.len(), 4);
    }

    #[test]
    fn ties_on_frequency_break_by_smallest_id() {
        let mut g = XrefGraph::new();
        g.link("M2", "C1");
        g.link("M1", "C1");
        let counts = BTreeMap::from([("M1".to_string(), 3), ("M2".to_string(), 3), ("C1".to_string(), 1)]);
        let cls = classes(&["M1", "M2"], &["C1"], &[]);
        let fallback = BTreeMap::new();
        let out = Consolidator::new(&g, &counts, &cls, &fallback, KeyOrder::FrequencyFirst, Assignment::Centre).consolidate();
        assert_eq!(out.map["C1"], "M1");
        assert_eq!(out.map["M2"], "M2");
    }

    #[test]
    fn tied_members_fall_back_to_one_to_one_mesh() {
        let mut g = XrefGraph::new();
        g.link("C0000001", "C0000002");
        g.link("C0000003", "D000009");
        let counts = BTreeMap::from([("C0000001".to_string(), 4), ("C0000002".to_string(), 4), ("C0000003".to_string(), 1)]);
        let cls = classes(&["D000009"], &["C0000001", "C0000002", "C0000003"], &[]);
        let fallback = BTreeMap::from([("C0000002".to_string(), "D000002".to_string())]);
        let out = Consolidator::new(&g, &counts, &cls, &fallback, KeyOrder::MeshFirst, Assignment::Members).consolidate();
        assert_eq!(out.map["C0000001"], "C0000001");
        assert_eq!(out.map["C0000002"], "D000002");
        assert_eq!(out.map["C0000003"], "D000009");
        assert_eq!(out.map["D000009"], "D000009");
        assert_eq!(out.tied, BTreeSet::from(["C0000001".to_string(), "C0000002".to_string()]));
    }

    #[test]
    fn slim_terms_claim_their_members() {
        let mut g = XrefGraph::new();
        g.link("C0000100", "DOID:1");
        g.link("C0000100", "D000200");
        g.link("D000200", "C0000300");
        let counts = BTreeMap::from([("D000200".to_string(), 5)]);
        let cls = classes(&["D000200"], &["C0000100", "C0000300"], &["DOID:1"]);
        let fallback = BTreeMap::new();
        let out = Consolidator::new(&g, &counts, &cls, &fallback, KeyOrder::MeshFirst, Assignment::Members).consolidate();
        assert_eq!(out.map["C0000100"], "DOID:1");
        assert_eq!(out.map["DOID:1"], "DOID:1");
        assert_eq!(out.map["D000200"], "DOID:1");
        assert_eq!(out.map["C0000300"], "D000200");
    }

    #[test]
    fn mesh_first_prefers_lower_cui_number() {
        let mut g = XrefGraph::new();
        g.link("C0000005", "C0000009");
        let counts = BTreeMap::new();
        let cls = classes(&[], &["C0000005", "C0000009"], &[]);
        let fallback = BTreeMap::new();
        let c = Consolidator::new(&g, &counts, &cls, &fallback, KeyOrder::MeshFirst, Assignment::Members);
        assert!(c.key("C0000005") > c.key("C0000009"));
    }

    #[test]
    fn consolidation_is_deterministic() {
        let mut g = XrefGraph::new();
        for (a, b) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "A"), ("E", "A")] {
            g.link(a, b);
        }
        let counts = count_mentions(vec!["A", "B", "B", "C", "D", "D", "D", "E"]);
        let cls = classes(&["B", "D"], &["A", "C", "E"], &[]);
        let fallback = BTreeMap::new();
        let first = Consolidator::new(&g, &counts, &cls, &fallback, KeyOrder::MeshFirst, Assignment::Members).consolidate();
        for _ in 0..5 {
            let again = Consolidator::new(&g, &counts, &cls, &fallback, KeyOrder::MeshFirst, Assignment::Members).consolidate();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn overlapping_classes_are_rejected() {
        assert!(classes(&["X"], &["X"], &[]).check_disjoint().unwrap_err().is_integrity());
        assert!(classes(&["X"], &["Y"], &[]).check_disjoint().is_ok());
    }
}
