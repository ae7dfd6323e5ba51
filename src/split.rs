use crate::config::SplitSeeds;
use crate::error::Result;
use crate::frames::triples_frame;
use crate::io::write_frame;
use crate::{Edge, Indication, Node};
use itertools::Itertools;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::path;

pub const INDICATION_SEM: &str = "INDICATION";
pub const INDICATION_RTYPE: &str = "i";
pub const EXCLUDED_INDICATION: &str = "INDICATION_CDiCD";
pub const HPO_RELATIONS: [&str; 2] = ["INDICATION_CDiDO", "INDICATION_CDiPS"];
pub const DEFAULT_HPO_YEAR: i32 = 1987;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Triple {
    pub head: String,
    pub relation: String,
    pub tail: String,
    pub year: i32,
}

pub fn indication_relation(h_abv: &str, t_abv: &str) -> String {
    format!("{}_{}{}{}", INDICATION_SEM, h_abv, INDICATION_RTYPE, t_abv)
}

/// Typed indication triples for one snapshot, paired with their `year_diff`.
pub fn indication_triples(nodes: &[Node], indications: &[Indication]) -> Vec<(Triple, i32)> {
    let types: BTreeMap<&str, &str> = nodes.iter().map(|n| (n.id.as_str(), n.abv_label.as_str())).collect();
    let mut untyped = 0_usize;
    let triples = indications
        .iter()
        .filter_map(|i| {
            let (Some(h), Some(t), Some(diff)) = (types.get(i.compound_semmed_id.as_str()), types.get(i.disease_semmed_id.as_str()), i.year_diff) else {
                untyped += 1;
                return None;
            };
            Some((
                Triple {
                    head: i.compound_semmed_id.clone(),
                    relation: indication_relation(h, t),
                    tail: i.disease_semmed_id.clone(),
                    year: i.approval_year,
                },
                diff,
            ))
        })
        .filter(|(t, _)| t.relation != EXCLUDED_INDICATION)
        .collect_vec();
    if untyped > 0 {
        warn!("{} indications lack a typed endpoint or a year difference", untyped);
    }
    triples
}

pub fn edge_triples(edges: &[Edge]) -> Vec<Triple> {
    edges
        .iter()
        .filter_map(|e| {
            e.first_pub.map(|year| Triple {
                head: e.h_id.clone(),
                relation: e.relation.clone(),
                tail: e.t_id.clone(),
                year,
            })
        })
        .collect_vec()
}

fn shuffled(mut triples: Vec<Triple>, seed: u64) -> Vec<Triple> {
    let mut rng = StdRng::seed_from_u64(seed);
    triples.shuffle(&mut rng);
    triples
}

/// Splits `triples` after shuffling with `seed`, the head getting ⌊fraction·n⌋ entries.
fn sample(triples: Vec<Triple>, fraction: f64, seed: u64) -> (Vec<Triple>, Vec<Triple>) {
    let mut triples = shuffled(triples, seed);
    let n = (fraction * triples.len() as f64).floor() as usize;
    let rest = triples.split_off(n);
    (triples, rest)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Split {
    pub train: Vec<Triple>,
    pub test: Vec<Triple>,
    pub valid: Vec<Triple>,
}

pub struct SplitBuilder {
    edges: Vec<Triple>,
    indications: Vec<(Triple, i32)>,
    seeds: SplitSeeds,
}

impl SplitBuilder {
    pub fn new(nodes: &[Node], edges: &[Edge], indications: &[Indication], seeds: SplitSeeds) -> Self {
        SplitBuilder {
            edges: edge_triples(edges),
            indications: indication_triples(nodes, indications),
            seeds,
        }
    }

    fn past_indications(&self) -> Vec<Triple> {
        self.indications.iter().filter(|(_, diff)| *diff <= 0).map(|(t, _)| t.clone()).collect_vec()
    }

    fn future_indications(&self) -> Vec<Triple> {
        self.indications.iter().filter(|(_, diff)| *diff > 0).map(|(t, _)| t.clone()).collect_vec()
    }

    /// Train is every edge plus indications approved by the snapshot year; test is the rest.
    pub fn train_test(&self) -> Split {
        let train = self.edges.iter().cloned().chain(self.past_indications()).collect_vec();
        Split {
            train,
            test: self.future_indications(),
            valid: vec![],
        }
    }

    pub fn train_test_valid(&self) -> Split {
        let (sampled, test) = sample(self.past_indications(), 0.8, self.seeds.primary);
        Split {
            train: self.edges.iter().cloned().chain(sampled).collect_vec(),
            test,
            valid: self.future_indications(),
        }
    }

    /// Hyperparameter split drawn from the train/test training triples only.
    pub fn hpo(&self) -> Split {
        let train = self.train_test().train;
        let (indications, others): (Vec<Triple>, Vec<Triple>) = train.into_iter().partition(|t| HPO_RELATIONS.contains(&t.relation.as_str()));
        let (hpo_train, rest) = sample(indications, 0.8, self.seeds.primary);
        let (hpo_test, hpo_valid) = sample(rest, 0.5, self.seeds.secondary);
        Split {
            train: others.into_iter().chain(hpo_train).collect_vec(),
            test: hpo_test,
            valid: hpo_valid,
        }
    }
}

fn time_tag(include_time: bool) -> &'static str {
    if include_time {
        "time"
    } else {
        "notime"
    }
}

fn write_triples(path: &path::Path, triples: &[Triple], include_time: bool) -> Result<()> {
    let rows = triples.iter().map(|t| (t.head.clone(), t.relation.clone(), t.tail.clone(), t.year)).collect_vec();
    write_frame(path, &mut triples_frame(&rows, include_time)?, false)
}

fn write_parts(dir: &path::Path, names: [String; 3], split: &Split, include_time: bool, with_valid: bool) -> Result<()> {
    let [train, test, valid] = names;
    write_triples(&dir.join(train), &split.train, include_time)?;
    write_triples(&dir.join(test), &split.test, include_time)?;
    if with_valid {
        write_triples(&dir.join(valid), &split.valid, include_time)?;
    }
    info!(
        "{:?}: {} train, {} test, {} valid triples",
        dir.file_name().unwrap_or_default(),
        split.train.len(),
        split.test.len(),
        split.valid.len()
    );
    Ok(())
}

/// `train_{tag}.txt` and `test_{tag}.txt`.
pub fn write_train_test(dir: &path::Path, split: &Split, include_time: bool) -> Result<()> {
    let tag = time_tag(include_time);
    let names = [format!("train_{}.txt", tag), format!("test_{}.txt", tag), String::new()];
    write_parts(dir, names, split, include_time, false)
}

pub fn write_ttv(dir: &path::Path, split: &Split, include_time: bool) -> Result<()> {
    let tag = time_tag(include_time);
    let names = [format!("train_ttv_{}.txt", tag), format!("test_ttv_{}.txt", tag), format!("valid_ttv_{}.txt", tag)];
    write_parts(dir, names, split, include_time, true)
}

pub fn write_hpo(dir: &path::Path, split: &Split, include_time: bool) -> Result<()> {
    let tag = time_tag(include_time);
    let names = [format!("hpo_train_{}.txt", tag), format!("hpo_test_{}.txt", tag), format!("hpo_valid_{}.txt", tag)];
    write_parts(dir, names, split, include_time, true)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::semtype::SuperType;
    use crate::RelationParts;
    use std::collections::BTreeSet;

    fn distinct_keys(triples: &[Triple]) -> BTreeSet<(&str, &str, &str)> {
        triples.iter().map(|t| (t.head.as_str(), t.relation.as_str(), t.tail.as_str())).collect()
    }

    fn indication(compound: &str, disease: &str, year: i32, diff: i32) -> Indication {
        Indication {
            compound_semmed_id: compound.into(),
            disease_semmed_id: disease.into(),
            compound_name: "c".into(),
            disease_name: "d".into(),
            approval_date: format!("{}-01-01", year),
            approval_year: year,
            year_diff: Some(diff),
            year_cat: None,
        }
    }

    fn fixture() -> SplitBuilder {
        let mut nodes = vec![Node::new("C0", "c0", SuperType::ChemicalsDrugs), Node::new("C9", "c9", SuperType::ChemicalsDrugs), Node::new("P1", "p", SuperType::Physiology)];
        let mut indications = vec![indication("C0", "C9", 1980, -1), indication("C0", "P1", 1990, 3)];
        for i in 0..10 {
            nodes.push(Node::new(&format!("D{}", i), "d", SuperType::Disorders));
            indications.push(indication("C0", &format!("D{}", i), 1980, -i));
        }
        let mut edge = Edge::new("C0", "D0", RelationParts::parse("TREATS_CDtDO").unwrap(), BTreeSet::from([1]));
        edge.first_pub = Some(1970);
        let seeds = SplitSeeds { primary: 12345, secondary: 67890 };
        SplitBuilder::new(&nodes, &[edge], &indications, seeds)
    }

    #[test]
    fn indication_relations_are_typed() {
        let b = fixture();
        assert_eq!(b.indications.len(), 11);
        assert!(b.indications.iter().all(|(t, _)| t.relation != EXCLUDED_INDICATION));
        assert!(b.indications.iter().any(|(t, _)| t.relation == "INDICATION_CDiPS"));
    }

    #[test]
    fn train_test_by_approval() {
        let split = fixture().train_test();
        assert_eq!(split.train.len(), 11);
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.test[0].tail, "P1");
    }

    #[test]
    fn ttv_is_deterministic_and_disjoint() {
        let a = fixture().train_test_valid();
        let b = fixture().train_test_valid();
        assert_eq!(a, b);
        assert_eq!(a.train.len(), 1 + 8);
        assert_eq!(a.test.len(), 2);
        assert_eq!(a.valid.len(), 1);
        assert!(distinct_keys(&a.train).is_disjoint(&distinct_keys(&a.test)));
    }

    #[test]
    fn hpo_partitions_training_indications() {
        let split = fixture().hpo();
        assert_eq!(split.train.len(), 1 + 8);
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.valid.len(), 1);
        assert!(split.train.iter().any(|t| t.relation == "TREATS_CDtDO"));
    }

    #[test]
    fn files_are_headerless() {
        let dir = tempfile::tempdir().unwrap();
        let split = fixture().train_test();
        write_train_test(dir.path(), &split, true).unwrap();
        let text = std::fs::read_to_string(dir.path().join("test_time.txt")).unwrap();
        assert_eq!(text.trim_end(), "C0\tINDICATION_CDiPS\tP1\t1990");
        assert!(!dir.path().join("valid_time.txt").exists());
        write_ttv(dir.path(), &fixture().train_test_valid(), false).unwrap();
        let text = std::fs::read_to_string(dir.path().join("valid_ttv_notime.txt")).unwrap();
        assert_eq!(text.trim_end(), "C0\tINDICATION_CDiPS\tP1");
    }
}
