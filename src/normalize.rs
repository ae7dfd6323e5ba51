use crate::ensure_integrity;
use crate::error::Result;
use crate::sources::LayeredLookup;
use itertools::Itertools;
use lazy_static::lazy_static;
use log::{info, warn};
use polars::prelude::*;
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

lazy_static! {
    static ref CUI_REGEX: regex::Regex = regex::Regex::new(r"^C\d+$").expect("Could not create CUI regex");
}

pub const SYNONYM_DELIMITER: char = '|';

pub fn is_cui(id: &str) -> bool {
    CUI_REGEX.is_match(id)
}

/// One SemMedDB predication, as kept after cleaning.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct Predication {
    pub pmid: u64,
    pub predicate: String,
    pub subject_cui: String,
    pub subject_name: String,
    pub subject_semtype: String,
    pub subject_novelty: i64,
    pub object_cui: String,
    pub object_name: String,
    pub object_semtype: String,
    pub object_novelty: i64,
}

/// Gene-annotation service record for an Entrez id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct GeneAnnotation {
    pub entrez: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub umls_cui: Option<String>,
    pub hgnc: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct HgncCui {
    pub hgnc: String,
    pub cui: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct ConceptName {
    pub cui: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct RetiredCui {
    pub old: String,
    pub new: String,
}

#[derive(Clone, Debug, Default)]
pub struct NormalizedTriples {
    pub clean: Vec<Predication>,
    pub unmapped: Vec<Predication>,
    pub entrez_to_cui: BTreeMap<String, String>,
    pub cui_to_name: BTreeMap<String, String>,
}

impl NormalizedTriples {
    pub fn pmids(&self) -> BTreeSet<u64> {
        self.clean.iter().map(|p| p.pmid).collect()
    }
}

/// Converts the scanned raw dump into typed rows. Rows whose PMID or novelty flags are not
/// integers are dropped.
pub fn predications_from_frame(df: &DataFrame) -> Result<Vec<Predication>> {
    let text = |name: &str| -> Result<Vec<Option<String>>> { Ok(df.column(name)?.str()?.into_iter().map(|v| v.map(str::to_string)).collect_vec()) };
    let pmid = text("PMID")?;
    let predicate = text("PREDICATE")?;
    let subject_cui = text("SUBJECT_CUI")?;
    let subject_name = text("SUBJECT_NAME")?;
    let subject_semtype = text("SUBJECT_SEMTYPE")?;
    let subject_novelty = text("SUBJECT_NOVELTY")?;
    let object_cui = text("OBJECT_CUI")?;
    let object_name = text("OBJECT_NAME")?;
    let object_semtype = text("OBJECT_SEMTYPE")?;
    let object_novelty = text("OBJECT_NOVELTY")?;

    let mut malformed = 0_usize;
    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let parsed = (|| {
            Some(Predication {
                pmid: pmid[idx].as_deref()?.trim().parse::<u64>().ok()?,
                predicate: predicate[idx].clone()?,
                subject_cui: subject_cui[idx].clone()?,
                subject_name: subject_name[idx].clone()?,
                subject_semtype: subject_semtype[idx].clone()?,
                subject_novelty: subject_novelty[idx].as_deref()?.trim().parse::<i64>().ok()?,
                object_cui: object_cui[idx].clone()?,
                object_name: object_name[idx].clone()?,
                object_semtype: object_semtype[idx].clone()?,
                object_novelty: object_novelty[idx].as_deref()?.trim().parse::<i64>().ok()?,
            })
        })();
        match parsed {
            Some(row) => rows.push(row),
            None => malformed += 1,
        }
    }
    if malformed > 0 {
        warn!("dropped {} predications with malformed PMIDs or novelty flags", malformed);
    }
    Ok(rows)
}

/// Splits pipe-delimited synonym lists into one row per (subject, object) pair. Rows whose id
/// and name lists differ in length are dropped; the count of dropped rows is returned.
pub fn expand_synonyms(rows: Vec<Predication>) -> (Vec<Predication>, usize) {
    let mut mismatched = 0_usize;
    let mut expanded = BTreeSet::new();
    for row in rows.into_iter() {
        let s_ids = row.subject_cui.split(SYNONYM_DELIMITER).collect_vec();
        let s_names = row.subject_name.split(SYNONYM_DELIMITER).collect_vec();
        let o_ids = row.object_cui.split(SYNONYM_DELIMITER).collect_vec();
        let o_names = row.object_name.split(SYNONYM_DELIMITER).collect_vec();
        if s_ids.len() != s_names.len() || o_ids.len() != o_names.len() {
            mismatched += 1;
            continue;
        }
        for ((s_id, s_name), (o_id, o_name)) in s_ids.iter().zip(s_names.iter()).cartesian_product(o_ids.iter().zip(o_names.iter())) {
            let mut exploded = row.clone();
            exploded.subject_cui = s_id.to_string();
            exploded.subject_name = s_name.to_string();
            exploded.object_cui = o_id.to_string();
            exploded.object_name = o_name.to_string();
            expanded.insert(exploded);
        }
    }
    (expanded.into_iter().collect_vec(), mismatched)
}

/// Keeps only retirements with exactly one replacement concept.
pub fn one_to_one_retirements(rows: &[RetiredCui]) -> BTreeMap<String, String> {
    let mut targets: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for row in rows.iter() {
        targets.entry(row.old.as_str()).or_default().insert(row.new.as_str());
    }
    targets
        .into_iter()
        .filter(|(_, v)| v.len() == 1)
        .filter_map(|(k, v)| v.into_iter().next().map(|n| (k.to_string(), n.to_string())))
        .collect()
}

/// Maps non-CUI identifiers onto UMLS concepts and names every concept it produces.
pub struct IdentifierNormalizer {
    entrez_to_cui: LayeredLookup<String>,
    names: LayeredLookup<String>,
    retired: BTreeMap<String, String>,
}

impl IdentifierNormalizer {
    /// `genes` is the primary Entrez source; `hgnc_to_cui` is consulted only for Entrez ids the
    /// gene service cannot map directly.
    pub fn new(genes: &[GeneAnnotation], hgnc_to_cui: &[HgncCui], umls_names: &[ConceptName], retired: &[RetiredCui]) -> Self {
        let direct: BTreeMap<String, String> = genes.iter().filter_map(|g| g.umls_cui.as_ref().map(|c| (g.entrez.clone(), c.clone()))).collect();

        let hgnc_index: BTreeMap<&str, &str> = hgnc_to_cui.iter().map(|r| (r.hgnc.as_str(), r.cui.as_str())).collect();
        let via_hgnc: BTreeMap<String, String> = genes
            .iter()
            .filter(|g| !direct.contains_key(&g.entrez))
            .filter_map(|g| {
                let hgnc = g.hgnc.as_ref()?;
                let key = if hgnc.starts_with("HGNC:") { hgnc.clone() } else { format!("HGNC:{}", hgnc) };
                hgnc_index.get(key.as_str()).map(|cui| (g.entrez.clone(), cui.to_string()))
            })
            .collect();
        info!("{} Entrez ids map to CUIs via the gene service, {} more via HGNC", direct.len(), via_hgnc.len());

        let entrez_to_cui = LayeredLookup::new().with_layer("hgnc", via_hgnc).with_layer("gene_service", direct);

        let symbols: BTreeMap<String, String> = genes
            .iter()
            .filter_map(|g| Some((g.umls_cui.clone()?, format!("{} gene", g.symbol.as_ref()?))))
            .collect();
        let preferred: BTreeMap<String, String> = umls_names.iter().map(|r| (r.cui.clone(), r.name.clone())).collect();
        let names = LayeredLookup::new().with_layer("gene_symbols", symbols).with_layer("umls_preferred", preferred);

        IdentifierNormalizer {
            entrez_to_cui,
            names,
            retired: one_to_one_retirements(retired),
        }
    }

    fn map_id(&self, id: &str) -> Option<String> {
        if is_cui(id) {
            return Some(id.to_string());
        }
        self.entrez_to_cui.get(id).cloned()
    }

    pub fn normalize(mut self, rows: Vec<Predication>) -> Result<NormalizedTriples> {
        let semmed_names: BTreeMap<String, String> = rows
            .iter()
            .flat_map(|r| vec![(r.subject_cui.clone(), r.subject_name.clone()), (r.object_cui.clone(), r.object_name.clone())])
            .filter(|(id, _)| is_cui(id))
            .collect();
        self.names.push_layer("semmed", semmed_names);

        let mut clean = BTreeSet::new();
        let mut unmapped = vec![];
        let mut used_cuis = BTreeSet::new();
        let mut retired_targets = BTreeSet::new();
        for row in rows.into_iter() {
            let (Some(s), Some(o)) = (self.map_id(&row.subject_cui), self.map_id(&row.object_cui)) else {
                unmapped.push(row);
                continue;
            };
            let mut fixed = row.clone();
            if s != row.subject_cui {
                used_cuis.insert(s.clone());
                fixed.subject_name = self.names.get(&s).cloned().unwrap_or_default();
                fixed.subject_cui = s;
            }
            if o != row.object_cui {
                used_cuis.insert(o.clone());
                fixed.object_name = self.names.get(&o).cloned().unwrap_or_default();
                fixed.object_cui = o;
            }
            if let Some(new) = self.retired.get(&fixed.subject_cui) {
                retired_targets.insert(new.clone());
                fixed.subject_name = self.names.get(new).cloned().unwrap_or(fixed.subject_name);
                fixed.subject_cui = new.clone();
            }
            if let Some(new) = self.retired.get(&fixed.object_cui) {
                retired_targets.insert(new.clone());
                fixed.object_name = self.names.get(new).cloned().unwrap_or(fixed.object_name);
                fixed.object_cui = new.clone();
            }
            clean.insert(fixed);
        }

        let nameless = used_cuis.iter().filter(|c| !self.names.contains_key(c)).collect_vec();
        ensure_integrity!(
            nameless.is_empty(),
            "normalized-ids-have-names",
            "{} mapped concepts have no name, e.g. {:?}",
            nameless.len(),
            nameless.iter().take(10).collect_vec()
        );
        let unnamed_targets = retired_targets.iter().filter(|c| !self.names.contains_key(c)).count();
        if unnamed_targets > 0 {
            warn!("{} replacement concepts have no preferred name and keep the retired concept's name", unnamed_targets);
        }
        if !unmapped.is_empty() {
            warn!("{} predications keep a non-CUI identifier and are set aside", unmapped.len());
        }

        let cui_to_name = used_cuis.iter().chain(retired_targets.iter()).filter_map(|c| self.names.get(c).map(|n| (c.clone(), n.clone()))).collect();
        Ok(NormalizedTriples {
            clean: clean.into_iter().collect_vec(),
            unmapped,
            entrez_to_cui: self.entrez_to_cui.flatten(),
            cui_to_name,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn predication(s: &str, s_name: &str, o: &str, o_name: &str) -> Predication {
        Predication {
            pmid: 1,
            predicate: "INTERACTS_WITH".into(),
            subject_cui: s.into(),
            subject_name: s_name.into(),
            subject_semtype: "gngm".into(),
            subject_novelty: 1,
            object_cui: o.into(),
            object_name: o_name.into(),
            object_semtype: "phsu".into(),
            object_novelty: 1,
        }
    }

    fn normalizer() -> IdentifierNormalizer {
        let genes = vec![
            GeneAnnotation { entrez: "5443".into(), symbol: Some("POMC".into()), name: None, umls_cui: Some("C1418938".into()), hgnc: Some("9201".into()) },
            GeneAnnotation { entrez: "7157".into(), symbol: Some("TP53".into()), name: None, umls_cui: None, hgnc: Some("11998".into()) },
            GeneAnnotation { entrez: "999".into(), symbol: Some("ZZZ".into()), name: None, umls_cui: None, hgnc: None },
        ];
        let hgnc = vec![HgncCui { hgnc: "HGNC:11998".into(), cui: "C0079419".into() }, HgncCui { hgnc: "HGNC:9201".into(), cui: "C9999999".into() }];
        let umls = vec![ConceptName { cui: "C0079419".into(), name: "TP53 gene".into() }];
        let retired = vec![
            RetiredCui { old: "C0000001".into(), new: "C0000002".into() },
            RetiredCui { old: "C0000003".into(), new: "C0000004".into() },
            RetiredCui { old: "C0000003".into(), new: "C0000005".into() },
        ];
        IdentifierNormalizer::new(&genes, &hgnc, &umls, &retired)
    }

    #[test]
    fn cui_shape() {
        assert!(is_cui("C0039608"));
        assert!(!is_cui("5443"));
        assert!(!is_cui("Cx12"));
    }

    #[test]
    fn synonyms_expand_pairwise() {
        let rows = vec![
            predication("C1|C2", "a|b", "C3", "c"),
            predication("C1", "a", "C4|C5", "d"),
        ];
        let (expanded, mismatched) = expand_synonyms(rows);
        assert_eq!(mismatched, 1);
        assert_eq!(expanded.len(), 2);
        assert!(expanded.iter().any(|p| p.subject_cui == "C2" && p.subject_name == "b"));
    }

    #[test]
    fn retirements_must_be_one_to_one() {
        let map = one_to_one_retirements(&[
            RetiredCui { old: "C1".into(), new: "C2".into() },
            RetiredCui { old: "C3".into(), new: "C4".into() },
            RetiredCui { old: "C3".into(), new: "C5".into() },
        ]);
        assert_eq!(map, BTreeMap::from([("C1".to_string(), "C2".to_string())]));
    }

    #[test]
    fn entrez_ids_map_to_named_cuis() {
        let rows = vec![
            predication("5443", "POMC", "C0000001", "old name"),
            predication("7157", "TP53", "C0000003", "ambiguous"),
            predication("999", "ZZZ", "C0000010", "x"),
        ];
        let out = normalizer().normalize(rows).unwrap();
        assert_eq!(out.entrez_to_cui["5443"], "C1418938");
        assert_eq!(out.entrez_to_cui["7157"], "C0079419");
        assert_eq!(out.cui_to_name["C1418938"], "POMC gene");
        assert_eq!(out.unmapped.len(), 1);
        let pomc = out.clean.iter().find(|p| p.subject_cui == "C1418938").unwrap();
        assert_eq!(pomc.subject_name, "POMC gene");
        assert_eq!(pomc.object_cui, "C0000002");
        let tp53 = out.clean.iter().find(|p| p.subject_cui == "C0079419").unwrap();
        assert_eq!(tp53.object_cui, "C0000003");
    }

    #[test]
    fn unnamed_concepts_fail() {
        let genes = vec![GeneAnnotation { entrez: "1".into(), symbol: None, name: None, umls_cui: Some("C1".into()), hgnc: None }];
        let err = IdentifierNormalizer::new(&genes, &[], &[], &[]).normalize(vec![predication("1", "x", "C2", "y")]).unwrap_err();
        assert!(err.is_integrity());
    }
}
