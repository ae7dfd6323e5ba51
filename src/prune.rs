use crate::condense::check_single_type;
use crate::ensure_integrity;
use crate::error::Result;
use crate::frames::{edges_frame, log_value_counts, nodes_frame};
use crate::semtype::SuperType;
use crate::{Edge, Node};
use itertools::Itertools;
use log::info;
use std::collections::{BTreeMap, BTreeSet};

/// Checks that the types declared on each edge agree with the node table.
pub fn check_type_agreement(edges: &[Edge], nodes: &[Node]) -> Result<()> {
    let types: BTreeMap<&str, &str> = nodes.iter().map(|n| (n.id.as_str(), n.abv_label.as_str())).collect();
    let disagreeing = edges
        .iter()
        .flat_map(|e| [(e.h_id.as_str(), e.htype.as_str()), (e.t_id.as_str(), e.ttype.as_str())])
        .filter(|(id, declared)| types.get(id) != Some(declared))
        .unique()
        .take(10)
        .collect_vec();
    ensure_integrity!(disagreeing.is_empty(), "edge-types-match-nodes", "edge-declared types disagree with the node table: {:?}", disagreeing);
    Ok(())
}

/// Keeps only nodes whose label is in `keep`, and the edges between them.
pub fn keep_metanodes(nodes: Vec<Node>, edges: Vec<Edge>, keep: &BTreeSet<SuperType>) -> Result<(Vec<Node>, Vec<Edge>)> {
    check_single_type(&edges)?;
    check_type_agreement(&edges, &nodes)?;

    let node_count = nodes.len();
    let nodes = nodes.into_iter().filter(|n| keep.contains(&n.label)).collect_vec();
    let ids: BTreeSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edge_count = edges.len();
    let edges = edges.into_iter().filter(|e| ids.contains(e.h_id.as_str()) && ids.contains(e.t_id.as_str())).collect_vec();
    info!("nodes: {} before pruning metanodes, {} after", node_count, nodes.len());
    info!("edges: {} before pruning metanodes, {} after", edge_count, edges.len());

    log_value_counts(&nodes_frame(&nodes)?, "label")?;
    log_value_counts(&edges_frame(&edges)?, "relation")?;
    Ok((nodes, edges))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Overrides;
    use crate::RelationParts;

    fn edge(h: &str, t: &str, relation: &str) -> Edge {
        Edge::new(h, t, RelationParts::parse(relation).unwrap(), BTreeSet::from([1]))
    }

    #[test]
    fn keeps_six_metanodes() {
        let keep = Overrides::embedded().unwrap().keep_metanode_set();
        assert_eq!(keep.len(), 6);
        let nodes = vec![
            Node::new("C1", "aspirin", SuperType::ChemicalsDrugs),
            Node::new("D1", "headache", SuperType::Disorders),
            Node::new("L1", "mouse", SuperType::LivingBeings),
        ];
        let edges = vec![edge("C1", "D1", "TREATS_CDtDO"), edge("C1", "L1", "AFFECTS_CDafLB")];
        let (nodes, edges) = keep_metanodes(nodes, edges, &keep).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].t_id, "D1");
    }

    #[test]
    fn type_disagreement_fails() {
        let keep = Overrides::embedded().unwrap().keep_metanode_set();
        let nodes = vec![Node::new("C1", "aspirin", SuperType::ChemicalsDrugs), Node::new("D1", "headache", SuperType::Phenomena)];
        let err = keep_metanodes(nodes, vec![edge("C1", "D1", "TREATS_CDtDO")], &keep).unwrap_err();
        assert!(err.is_integrity());
    }
}
