use crate::ensure_integrity;
use crate::error::Result;
use crate::io::{write_edges, write_indications, write_nodes};
use crate::{Edge, Indication, Node};
use itertools::Itertools;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::path;

pub const FIRST_YEAR: i32 = 1950;

/// Buckets `approval_year - snapshot_year` by magnitude, five years wide, open beyond twenty.
pub fn year_category(diff: i32) -> String {
    let magnitude = diff.unsigned_abs();
    let band = match magnitude {
        0..=5 => "0-5",
        6..=10 => "5-10",
        11..=15 => "10-15",
        16..=20 => "15-20",
        _ => "20+",
    };
    let side = if diff >= 0 { "After" } else { "Before" };
    format!("{} {}", band, side)
}

/// Earliest resolvable year among the edge's PMIDs.
pub fn first_publication(edge: &Edge, years: &BTreeMap<u64, i32>) -> Option<i32> {
    edge.pmids.iter().filter_map(|p| years.get(p)).min().copied()
}

/// Sets `first_pub` on every edge. Edges without any resolvable year are split off.
pub fn resolve_first_pub(edges: Vec<Edge>, years: &BTreeMap<u64, i32>) -> (Vec<Edge>, Vec<Edge>) {
    let resolved: Vec<Edge> = edges
        .into_par_iter()
        .map(|mut e| {
            e.first_pub = first_publication(&e, years);
            e
        })
        .collect();
    let (dated, undated): (Vec<Edge>, Vec<Edge>) = resolved.into_iter().partition(|e| e.first_pub.is_some());
    if !undated.is_empty() {
        warn!("{} edges have no resolvable publication year and are excluded from every snapshot", undated.len());
    }
    (dated, undated)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub year: i32,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub indications: Vec<Indication>,
}

impl Snapshot {
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nodes.len(), self.edges.len(), self.indications.len())
    }
}

pub struct TimelineBuilder {
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
    indications: Vec<Indication>,
}

impl TimelineBuilder {
    /// `edges` must already carry `first_pub`; edges without one are ignored.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>, indications: Vec<Indication>) -> Self {
        let mut edges = edges.into_iter().filter(|e| e.first_pub.is_some()).collect_vec();
        edges.sort_by_key(|e| e.first_pub);
        TimelineBuilder {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            edges,
            indications,
        }
    }

    pub fn last_year(&self) -> Option<i32> {
        self.edges.iter().filter_map(|e| e.first_pub).max()
    }

    pub fn years(&self, first_year: i32, last_year: Option<i32>) -> RangeInclusive<i32> {
        let last = last_year.or_else(|| self.last_year()).unwrap_or(first_year - 1);
        first_year..=last
    }

    pub fn snapshot(&self, year: i32) -> Snapshot {
        let cut = self.edges.partition_point(|e| e.first_pub.is_some_and(|y| y <= year));
        let edges = self.edges[..cut].to_vec();
        let ids: BTreeSet<&str> = edges.iter().flat_map(|e| [e.h_id.as_str(), e.t_id.as_str()]).collect();
        let nodes = ids.iter().filter_map(|id| self.nodes.get(*id)).cloned().collect_vec();
        let indications = self
            .indications
            .iter()
            .filter(|i| ids.contains(i.compound_semmed_id.as_str()) && ids.contains(i.disease_semmed_id.as_str()))
            .map(|i| {
                let diff = i.approval_year - year;
                Indication {
                    year_diff: Some(diff),
                    year_cat: Some(year_category(diff)),
                    ..i.clone()
                }
            })
            .collect_vec();
        Snapshot { year, nodes, edges, indications }
    }

    /// Builds every snapshot in `years`, handing each to `sink`, and checks that the graph
    /// only grows from one year to the next.
    pub fn for_each_snapshot<F: FnMut(&Snapshot) -> Result<()>>(&self, years: RangeInclusive<i32>, mut sink: F) -> Result<Vec<(i32, usize, usize, usize)>> {
        let mut summary = vec![];
        let mut previous: Option<(usize, usize)> = None;
        for year in years {
            let snapshot = self.snapshot(year);
            let (n_nodes, n_edges, n_indications) = snapshot.shape();
            ensure_integrity!(
                nodes_reference_check(&snapshot),
                "snapshot-endpoints-exist",
                "{}: an edge endpoint is missing from the node table",
                year
            );
            if let Some((prev_nodes, prev_edges)) = previous {
                ensure_integrity!(
                    n_nodes >= prev_nodes && n_edges >= prev_edges,
                    "snapshot-monotonic",
                    "{} has {} nodes and {} edges after {} and {}",
                    year,
                    n_nodes,
                    n_edges,
                    prev_nodes,
                    prev_edges
                );
            }
            previous = Some((n_nodes, n_edges));
            info!("{}: {} nodes, {} edges, {} indications", year, n_nodes, n_edges, n_indications);
            sink(&snapshot)?;
            summary.push((year, n_nodes, n_edges, n_indications));
        }
        Ok(summary)
    }

    /// Writes `{dir}/{year}/nodes.tsv`, `edges.tsv` and `indications.tsv` for every year.
    pub fn write_all(&self, dir: &path::Path, years: RangeInclusive<i32>) -> Result<Vec<(i32, usize, usize, usize)>> {
        self.for_each_snapshot(years, |snapshot| {
            let out_dir = dir.join(snapshot.year.to_string());
            write_nodes(&out_dir.join("nodes.tsv"), &snapshot.nodes)?;
            write_edges(&out_dir.join("edges.tsv"), &snapshot.edges)?;
            write_indications(&out_dir.join("indications.tsv"), &snapshot.indications)
        })
    }
}

fn nodes_reference_check(snapshot: &Snapshot) -> bool {
    let ids: BTreeSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    snapshot.edges.iter().all(|e| ids.contains(e.h_id.as_str()) && ids.contains(e.t_id.as_str()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::semtype::SuperType;
    use crate::RelationParts;

    fn edge(h: &str, t: &str, pmids: &[u64]) -> Edge {
        Edge::new(h, t, RelationParts::parse("TREATS_CDtDO").unwrap(), pmids.iter().copied().collect())
    }

    fn indication(compound: &str, disease: &str, year: i32) -> Indication {
        Indication {
            compound_semmed_id: compound.into(),
            disease_semmed_id: disease.into(),
            compound_name: "c".into(),
            disease_name: "d".into(),
            approval_date: format!("{}-01-01", year),
            approval_year: year,
            year_diff: None,
            year_cat: None,
        }
    }

    fn builder() -> TimelineBuilder {
        let years = BTreeMap::from([(1, 1960), (2, 1980), (3, 1990), (4, 1970)]);
        let nodes = vec![
            Node::new("C1", "a", SuperType::ChemicalsDrugs),
            Node::new("C2", "b", SuperType::ChemicalsDrugs),
            Node::new("D1", "c", SuperType::Disorders),
        ];
        let edges = vec![edge("C1", "D1", &[1, 2, 3]), edge("C2", "D1", &[4]), edge("C2", "C1", &[99])];
        let (dated, undated) = resolve_first_pub(edges, &years);
        assert_eq!(undated.len(), 1);
        TimelineBuilder::new(nodes, dated, vec![indication("C1", "D1", 1990), indication("C2", "D1", 1950)])
    }

    #[test]
    fn edge_enters_at_earliest_year() {
        let b = builder();
        let s1959 = b.snapshot(1959);
        assert!(s1959.edges.is_empty());
        assert!(s1959.nodes.is_empty());

        let s1960 = b.snapshot(1960);
        assert_eq!(s1960.edges.len(), 1);
        assert_eq!(s1960.edges[0].first_pub, Some(1960));

        let s1975 = b.snapshot(1975);
        assert_eq!(s1975.edges.len(), 2);
        assert_eq!(s1975.nodes.len(), 3);
    }

    #[test]
    fn indications_carry_year_difference() {
        let b = builder();
        let s1985 = b.snapshot(1985);
        let ind = s1985.indications.iter().find(|i| i.compound_semmed_id == "C1").unwrap();
        assert_eq!(ind.year_diff, Some(5));
        assert_eq!(ind.year_cat.as_deref(), Some("0-5 After"));

        let s2000 = b.snapshot(2000);
        let ind = s2000.indications.iter().find(|i| i.compound_semmed_id == "C1").unwrap();
        assert_eq!(ind.year_diff, Some(-10));
        assert_eq!(ind.year_cat.as_deref(), Some("5-10 Before"));

        assert_eq!(b.snapshot(1965).indications.len(), 1);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(year_category(0), "0-5 After");
        assert_eq!(year_category(5), "0-5 After");
        assert_eq!(year_category(6), "5-10 After");
        assert_eq!(year_category(20), "15-20 After");
        assert_eq!(year_category(21), "20+ After");
        assert_eq!(year_category(-1), "0-5 Before");
        assert_eq!(year_category(-5), "0-5 Before");
        assert_eq!(year_category(-6), "5-10 Before");
        assert_eq!(year_category(-15), "10-15 Before");
        assert_eq!(year_category(-16), "15-20 Before");
        assert_eq!(year_category(-21), "20+ Before");
    }

    #[test]
    fn snapshots_grow_and_are_written() {
        let b = builder();
        assert_eq!(b.years(FIRST_YEAR, None), 1950..=1970);
        let dir = tempfile::tempdir().unwrap();
        let summary = b.write_all(dir.path(), 1958..=1971).unwrap();
        assert_eq!(summary.len(), 14);
        assert!(summary.windows(2).all(|w| w[1].1 >= w[0].1 && w[1].2 >= w[0].2));
        assert!(dir.path().join("1971").join("edges.tsv").exists());
        let edges: Vec<Edge> = crate::io::read_tsv(&dir.path().join("1971").join("edges.tsv")).unwrap();
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn last_year_follows_latest_dated_edge() {
        let years = BTreeMap::from([(1, 1960), (5, 1995)]);
        let nodes = vec![Node::new("C1", "a", SuperType::ChemicalsDrugs), Node::new("D1", "c", SuperType::Disorders)];
        let (dated, _) = resolve_first_pub(vec![edge("C1", "D1", &[1]), edge("D1", "C1", &[5])], &years);
        let b = TimelineBuilder::new(nodes, dated, vec![]);
        assert_eq!(b.last_year(), Some(1995));
        assert_eq!(b.years(FIRST_YEAR, None), 1950..=1995);
        assert_eq!(b.years(FIRST_YEAR, Some(1980)), 1950..=1980);
    }
}
