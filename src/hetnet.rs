use crate::config::{PredicateInfo, RelationMode, DIRECTION_MARKER, NEGATION_PREFIX};
use crate::ensure_integrity;
use crate::error::{PipelineError, Result};
use crate::normalize::Predication;
use crate::semtype::SemTypeResolver;
use crate::{Edge, Node, RelationParts};
use itertools::Itertools;
use log::info;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default)]
pub struct Hetnet {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub struct HetnetBuilder<'a> {
    resolver: &'a SemTypeResolver,
    predicates: BTreeMap<String, PredicateInfo>,
    corrupted: BTreeSet<String>,
    mode: RelationMode,
}

impl<'a> HetnetBuilder<'a> {
    pub fn new(resolver: &'a SemTypeResolver, predicates: BTreeMap<String, PredicateInfo>, corrupted: &[String], mode: RelationMode) -> Self {
        HetnetBuilder {
            resolver,
            predicates,
            corrupted: corrupted.iter().cloned().collect(),
            mode,
        }
    }

    /// Keeps novel rows with known predicates, deduplicated on the full subject/predicate/object
    /// description plus the citing PMID.
    pub fn clean(&self, rows: Vec<Predication>) -> Result<Vec<Predication>> {
        let before = rows.len();
        let rows: BTreeSet<Predication> = rows
            .into_iter()
            .filter(|r| r.subject_novelty != 0 && r.object_novelty != 0)
            .filter(|r| !self.corrupted.contains(&r.predicate))
            .collect();
        info!("{} predications left from {} after novelty, corruption and duplicate filters", rows.len(), before);

        let unknown = rows.iter().map(|r| r.predicate.as_str()).filter(|p| !self.predicates.contains_key(*p)).collect::<BTreeSet<_>>();
        ensure_integrity!(unknown.is_empty(), "known-predicates", "predicates without an abbreviation: {:?}", unknown);
        Ok(rows.into_iter().collect_vec())
    }

    pub fn build_nodes(&self, rows: &[Predication]) -> Result<Vec<Node>> {
        let mut names: BTreeMap<&str, &str> = BTreeMap::new();
        let mut semtypes: BTreeSet<(&str, &str)> = BTreeSet::new();
        for r in rows.iter() {
            names.entry(r.subject_cui.as_str()).or_insert(r.subject_name.as_str());
            names.entry(r.object_cui.as_str()).or_insert(r.object_name.as_str());
            semtypes.insert((r.subject_cui.as_str(), r.subject_semtype.as_str()));
            semtypes.insert((r.object_cui.as_str(), r.object_semtype.as_str()));
        }
        let labels = self.resolver.resolve_all(semtypes.into_iter())?;
        let nodes = names
            .into_iter()
            .map(|(id, name)| {
                labels
                    .get(id)
                    .map(|label| Node::new(id, name, *label))
                    .ok_or_else(|| PipelineError::Missing { what: "semantic group", key: id.to_string() })
            })
            .collect::<Result<Vec<_>>>()?;
        info!("built {} nodes", nodes.len());
        Ok(nodes)
    }

    fn relation_parts(&self, predicate: &str, htype: &str, ttype: &str) -> Result<RelationParts> {
        let info = self.predicates.get(predicate).ok_or_else(|| PipelineError::Missing { what: "predicate abbreviation", key: predicate.to_string() })?;
        let rdir = if self.mode.include_direction() && info.directed { DIRECTION_MARKER } else { "" };
        Ok(RelationParts {
            sem: predicate.to_string(),
            htype: htype.to_string(),
            rtype: info.abbreviation.clone(),
            rdir: rdir.to_string(),
            ttype: ttype.to_string(),
        })
    }

    /// Groups evidence per (subject, predicate, object) and applies the negative-relation mode.
    pub fn build_edges(&self, rows: &[Predication], nodes: &[Node]) -> Result<Vec<Edge>> {
        let node_types: BTreeMap<&str, &str> = nodes.iter().map(|n| (n.id.as_str(), n.abv_label.as_str())).collect();

        let mut evidence: BTreeMap<(String, String, String), BTreeSet<u64>> = BTreeMap::new();
        let mut negatives = 0_usize;
        for r in rows.iter() {
            let predicate = match r.predicate.strip_prefix(NEGATION_PREFIX) {
                Some(positive) => {
                    negatives += 1;
                    match self.mode {
                        RelationMode::Drop { .. } => continue,
                        RelationMode::Convert { .. } => positive.to_string(),
                        RelationMode::Keep => r.predicate.clone(),
                    }
                }
                None => r.predicate.clone(),
            };
            evidence.entry((r.subject_cui.clone(), predicate, r.object_cui.clone())).or_default().insert(r.pmid);
        }
        info!("{} negated predications handled as {:?}", negatives, self.mode);

        let mut edges = Vec::with_capacity(evidence.len());
        for ((s, p, o), pmids) in evidence.into_iter() {
            let htype = node_types.get(s.as_str()).ok_or_else(|| PipelineError::Missing { what: "node", key: s.clone() })?;
            let ttype = node_types.get(o.as_str()).ok_or_else(|| PipelineError::Missing { what: "node", key: o.clone() })?;
            edges.push(Edge::new(s.as_str(), o.as_str(), self.relation_parts(p.as_str(), htype, ttype)?, pmids));
        }
        info!("built {} edges", edges.len());
        Ok(edges)
    }

    pub fn build(&self, rows: Vec<Predication>) -> Result<Hetnet> {
        let rows = self.clean(rows)?;
        let nodes = self.build_nodes(&rows)?;
        let edges = self.build_edges(&rows, &nodes)?;
        Ok(Hetnet { nodes, edges })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Overrides;
    use crate::semtype::{CuiTuiRow, SemGroupRow, SemTypeRow, SuperType};

    fn resolver() -> SemTypeResolver {
        let groups = vec![
            SemGroupRow { group_abbrev: "CHEM".into(), group_name: "Chemicals & Drugs".into(), tui: "T121".into(), type_name: "Pharmacologic Substance".into() },
            SemGroupRow { group_abbrev: "DISO".into(), group_name: "Disorders".into(), tui: "T047".into(), type_name: "Disease or Syndrome".into() },
        ];
        let types = vec![
            SemTypeRow { abbrev: "phsu".into(), tui: "T121".into(), name: "Pharmacologic Substance".into() },
            SemTypeRow { abbrev: "dsyn".into(), tui: "T047".into(), name: "Disease or Syndrome".into() },
        ];
        let cui_tuis = vec![CuiTuiRow { cui: "C1".into(), tui: "T121".into() }];
        SemTypeResolver::new(&groups, &types, &cui_tuis, Default::default()).unwrap()
    }

    fn row(pmid: u64, s: &str, p: &str, o: &str) -> Predication {
        Predication {
            pmid,
            predicate: p.into(),
            subject_cui: s.into(),
            subject_name: format!("{} name", s),
            subject_semtype: "phsu".into(),
            subject_novelty: 1,
            object_cui: o.into(),
            object_name: format!("{} name", o),
            object_semtype: "dsyn".into(),
            object_novelty: 1,
        }
    }

    fn builder(resolver: &SemTypeResolver, mode: RelationMode) -> HetnetBuilder<'_> {
        let overrides = Overrides::embedded().unwrap();
        HetnetBuilder::new(resolver, overrides.predicate_table(), &overrides.corrupted_predicates, mode)
    }

    #[test]
    fn converted_negatives_merge_evidence() {
        let r = resolver();
        let rows = vec![row(10, "C1", "NEG_CAUSES", "C2"), row(11, "C1", "NEG_CAUSES", "C2"), row(20, "C1", "CAUSES", "C2")];
        let net = builder(&r, RelationMode::Convert { include_direction: false }).build(rows).unwrap();
        assert_eq!(net.edges.len(), 1);
        let edge = &net.edges[0];
        assert_eq!(edge.relation, "CAUSES_CDcDO");
        assert_eq!((edge.h_id.as_str(), edge.t_id.as_str()), ("C1", "C2"));
        assert_eq!(edge.pmids, BTreeSet::from([10, 11, 20]));
    }

    #[test]
    fn dropped_and_kept_negatives() {
        let r = resolver();
        let rows = vec![row(10, "C1", "NEG_CAUSES", "C2"), row(20, "C1", "CAUSES", "C2")];
        let dropped = builder(&r, RelationMode::Drop { include_direction: false }).build(rows.clone()).unwrap();
        assert_eq!(dropped.edges.iter().map(|e| e.relation.as_str()).collect_vec(), vec!["CAUSES_CDcDO"]);
        let kept = builder(&r, RelationMode::Keep).build(rows).unwrap();
        assert_eq!(kept.edges.iter().map(|e| e.relation.as_str()).collect_vec(), vec!["CAUSES_CDcDO", "NEG_CAUSES_CDncDO"]);
    }

    #[test]
    fn direction_marker_only_for_directed_predicates() {
        let r = resolver();
        let rows = vec![row(1, "C1", "higher_than", "C2"), row(2, "C1", "TREATS", "C2")];
        let net = builder(&r, RelationMode::Drop { include_direction: true }).build(rows).unwrap();
        let relations = net.edges.iter().map(|e| e.relation.as_str()).collect::<BTreeSet<_>>();
        assert!(relations.contains("higher_than_CDdf>DO"));
        assert!(relations.contains("TREATS_CDtDO"));
    }

    #[test]
    fn filters_novelty_and_corrupt_predicates() {
        let r = resolver();
        let mut stale = row(1, "C1", "TREATS", "C3");
        stale.subject_novelty = 0;
        let rows = vec![stale, row(2, "C1", "1532", "C2"), row(3, "C1", "TREATS", "C2")];
        let net = builder(&r, RelationMode::Keep).build(rows).unwrap();
        assert_eq!(net.edges.len(), 1);
        assert_eq!(net.nodes.len(), 2);
        assert_eq!(net.nodes.iter().find(|n| n.id == "C1").unwrap().label, SuperType::ChemicalsDrugs);
    }

    #[test]
    fn unknown_predicates_fail() {
        let r = resolver();
        let err = builder(&r, RelationMode::Keep).build(vec![row(1, "C1", "FOO_BAR", "C2")]).unwrap_err();
        assert!(err.is_integrity());
    }
}
