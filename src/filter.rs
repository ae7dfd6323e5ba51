use crate::ensure_integrity;
use crate::error::Result;
use crate::frames::{edges_frame, value_counts};
use crate::{Edge, Node};
use itertools::Itertools;
use log::info;
use std::collections::BTreeSet;

pub struct EdgeFilter {
    cutoff: f64,
    too_general: BTreeSet<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Filtered {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub dropped_relations: Vec<String>,
}

impl EdgeFilter {
    pub fn new(cutoff: f64, too_general: &[String]) -> Self {
        EdgeFilter {
            cutoff,
            too_general: too_general.iter().cloned().collect(),
        }
    }

    /// Relations whose edge count is strictly greater than `cutoff` times the edge total.
    pub fn abundant_relations(&self, edges: &[Edge]) -> Result<BTreeSet<String>> {
        if edges.is_empty() {
            return Ok(BTreeSet::new());
        }
        let threshold = self.cutoff * edges.len() as f64;
        let counts = value_counts(&edges_frame(edges)?, "relation")?;
        for (relation, count) in counts.iter() {
            info!("relation {} -> {}", relation, count);
        }
        Ok(counts.into_iter().filter(|(_, count)| *count as f64 > threshold).map(|(relation, _)| relation).collect())
    }

    pub fn filter(&self, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Filtered> {
        let before = edges.len();
        let keep = self.abundant_relations(&edges)?;
        let all_relations: BTreeSet<String> = edges.iter().map(|e| e.relation.clone()).collect();
        let dropped_relations = all_relations.difference(&keep).cloned().collect_vec();
        info!("dropping {} low-abundance relations: {:?}", dropped_relations.len(), dropped_relations);
        let edges = edges.into_iter().filter(|e| keep.contains(&e.relation)).collect_vec();
        info!("{} edges before the abundance cutoff, {} after", before, edges.len());

        let endpoints: BTreeSet<String> = edges.iter().flat_map(|e| [e.h_id.clone(), e.t_id.clone()]).collect();
        let node_count = nodes.len();
        let nodes = nodes.into_iter().filter(|n| endpoints.contains(&n.id)).collect_vec();
        info!("{} nodes not in any edge were dropped", node_count - nodes.len());
        ensure_integrity!(
            nodes.len() == endpoints.len(),
            "nodes-match-edge-endpoints",
            "{} nodes for {} distinct edge endpoints",
            nodes.len(),
            endpoints.len()
        );

        let with_loops = edges.len();
        let edges = edges.into_iter().filter(|e| !e.is_self_loop()).collect_vec();
        info!("{} self-referential edges removed", with_loops - edges.len());

        let nodes = nodes.into_iter().filter(|n| !self.too_general.contains(&n.name)).collect_vec();
        info!("{} nodes remain after removing overly general nodes", nodes.len());
        let ids: BTreeSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let general = edges.len();
        let edges = edges.into_iter().filter(|e| ids.contains(e.h_id.as_str()) && ids.contains(e.t_id.as_str())).collect_vec();
        info!("{} edges before removing overly general nodes, {} after", general, edges.len());

        log_evidence_depth(&edges);
        Ok(Filtered { nodes, edges, dropped_relations })
    }
}

/// Number of edges supported by at least `k` distinct PMIDs, for k = 1..=10.
pub fn evidence_depth(edges: &[Edge]) -> Vec<(usize, usize)> {
    (1..=10).map(|k| (k, edges.iter().filter(|e| e.n_pmids() >= k).count())).collect_vec()
}

fn log_evidence_depth(edges: &[Edge]) {
    for (k, count) in evidence_depth(edges).into_iter() {
        info!("edges with at least {} unique PMIDs: {}", k, count);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::semtype::SuperType;
    use crate::RelationParts;

    fn edge(h: &str, t: &str, relation: &str, pmids: &[u64]) -> Edge {
        Edge::new(h, t, RelationParts::parse(relation).unwrap(), pmids.iter().copied().collect())
    }

    fn nodes() -> Vec<Node> {
        vec![
            Node::new("C1", "aspirin", SuperType::ChemicalsDrugs),
            Node::new("C2", "Water", SuperType::ChemicalsDrugs),
            Node::new("D1", "headache", SuperType::Disorders),
            Node::new("D2", "fever", SuperType::Disorders),
            Node::new("G1", "lonely gene", SuperType::GenesMolecularSequences),
        ]
    }

    #[test]
    fn cutoff_is_strict() {
        let edges = vec![
            edge("C1", "D1", "TREATS_CDtDO", &[1]),
            edge("C1", "D2", "TREATS_CDtDO", &[2]),
            edge("C2", "D1", "CAUSES_CDcDO", &[3]),
            edge("C2", "D2", "CAUSES_CDcDO", &[4]),
        ];
        let keep = EdgeFilter::new(0.5, &[]).abundant_relations(&edges).unwrap();
        assert!(keep.is_empty());
        let keep = EdgeFilter::new(0.49, &[]).abundant_relations(&edges).unwrap();
        assert_eq!(keep.len(), 2);
    }

    #[test]
    fn drops_rare_relations_loops_and_general_nodes() {
        let edges = vec![
            edge("C1", "D1", "TREATS_CDtDO", &[1, 2]),
            edge("C1", "D2", "TREATS_CDtDO", &[3]),
            edge("C2", "D1", "TREATS_CDtDO", &[4]),
            edge("D1", "D1", "ISA_DOiDO", &[5]),
            edge("D2", "D1", "ISA_DOiDO", &[6]),
            edge("C1", "G1", "INTERACTS_WITH_CDiwG", &[7]),
        ];
        let out = EdgeFilter::new(0.2, &["Water".to_string()]).filter(nodes(), edges).unwrap();
        assert_eq!(out.dropped_relations, vec!["INTERACTS_WITH_CDiwG".to_string()]);
        let ids = out.nodes.iter().map(|n| n.id.as_str()).collect_vec();
        assert_eq!(ids, vec!["C1", "D1", "D2"]);
        assert_eq!(out.edges.len(), 3);
        assert!(out.edges.iter().all(|e| !e.is_self_loop()));
        assert!(out.edges.iter().all(|e| e.h_id != "C2"));
    }

    #[test]
    fn evidence_depth_counts() {
        let edges = vec![edge("C1", "D1", "TREATS_CDtDO", &[1, 2, 3]), edge("C1", "D2", "TREATS_CDtDO", &[3])];
        let depth = evidence_depth(&edges);
        assert_eq!(depth[0], (1, 2));
        assert_eq!(depth[2], (3, 1));
        assert_eq!(depth[3], (4, 0));
    }
}
