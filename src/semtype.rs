use crate::error::{PipelineError, Result};
use crate::sources::LayeredLookup;
use crate::ensure_integrity;
use itertools::Itertools;
use log::{info, warn};
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Coarse semantic group a concept belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub enum SuperType {
    #[serde(rename = "Activities & Behaviors")]
    ActivitiesBehaviors,
    #[serde(rename = "Anatomy")]
    Anatomy,
    #[serde(rename = "Compound")]
    Compound,
    #[serde(rename = "Chemicals & Drugs")]
    ChemicalsDrugs,
    #[serde(rename = "Concepts & Ideas")]
    ConceptsIdeas,
    #[serde(rename = "Devices")]
    Devices,
    #[serde(rename = "Disease")]
    Disease,
    #[serde(rename = "Disorders")]
    Disorders,
    #[serde(rename = "Genes & Molecular Sequences")]
    GenesMolecularSequences,
    #[serde(rename = "Geographic Areas")]
    GeographicAreas,
    #[serde(rename = "Living Beings")]
    LivingBeings,
    #[serde(rename = "Objects")]
    Objects,
    #[serde(rename = "Occupations")]
    Occupations,
    #[serde(rename = "Organizations")]
    Organizations,
    #[serde(rename = "Phenomena")]
    Phenomena,
    #[serde(rename = "Physiology")]
    Physiology,
    #[serde(rename = "Procedures")]
    Procedures,
}

impl SuperType {
    pub const ALL: [SuperType; 17] = [
        SuperType::ActivitiesBehaviors,
        SuperType::Anatomy,
        SuperType::Compound,
        SuperType::ChemicalsDrugs,
        SuperType::ConceptsIdeas,
        SuperType::Devices,
        SuperType::Disease,
        SuperType::Disorders,
        SuperType::GenesMolecularSequences,
        SuperType::GeographicAreas,
        SuperType::LivingBeings,
        SuperType::Objects,
        SuperType::Occupations,
        SuperType::Organizations,
        SuperType::Phenomena,
        SuperType::Physiology,
        SuperType::Procedures,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SuperType::ActivitiesBehaviors => "Activities & Behaviors",
            SuperType::Anatomy => "Anatomy",
            SuperType::Compound => "Compound",
            SuperType::ChemicalsDrugs => "Chemicals & Drugs",
            SuperType::ConceptsIdeas => "Concepts & Ideas",
            SuperType::Devices => "Devices",
            SuperType::Disease => "Disease",
            SuperType::Disorders => "Disorders",
            SuperType::GenesMolecularSequences => "Genes & Molecular Sequences",
            SuperType::GeographicAreas => "Geographic Areas",
            SuperType::LivingBeings => "Living Beings",
            SuperType::Objects => "Objects",
            SuperType::Occupations => "Occupations",
            SuperType::Organizations => "Organizations",
            SuperType::Phenomena => "Phenomena",
            SuperType::Physiology => "Physiology",
            SuperType::Procedures => "Procedures",
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            SuperType::ActivitiesBehaviors => "AB",
            SuperType::Anatomy => "A",
            SuperType::Compound => "C",
            SuperType::ChemicalsDrugs => "CD",
            SuperType::ConceptsIdeas => "CI",
            SuperType::Devices => "DV",
            SuperType::Disease => "D",
            SuperType::Disorders => "DO",
            SuperType::GenesMolecularSequences => "G",
            SuperType::GeographicAreas => "GA",
            SuperType::LivingBeings => "LB",
            SuperType::Objects => "OB",
            SuperType::Occupations => "OC",
            SuperType::Organizations => "OR",
            SuperType::Phenomena => "PH",
            SuperType::Physiology => "PS",
            SuperType::Procedures => "PR",
        }
    }

    pub fn from_abbreviation(abbrev: &str) -> Option<SuperType> {
        SuperType::ALL.iter().find(|t| t.abbreviation() == abbrev).copied()
    }
}

impl fmt::Display for SuperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SuperType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        SuperType::ALL
            .iter()
            .find(|t| t.name() == s)
            .copied()
            .ok_or_else(|| PipelineError::Missing { what: "semantic group", key: s.to_string() })
    }
}

/// Group-set rule: when a concept's groups are exactly `groups`, it takes `resolve_to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRule {
    pub groups: BTreeSet<SuperType>,
    pub resolve_to: SuperType,
}

/// Manual decisions for concepts that land in more than one group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictOverrides {
    #[serde(default)]
    pub unmapped_abbreviations: BTreeMap<String, SuperType>,
    #[serde(default)]
    pub cui_overrides: BTreeMap<String, SuperType>,
    #[serde(default)]
    pub pair_rules: Vec<PairRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct SemGroupRow {
    pub group_abbrev: String,
    pub group_name: String,
    pub tui: String,
    pub type_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct SemTypeRow {
    pub abbrev: String,
    pub tui: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct CuiTuiRow {
    pub cui: String,
    pub tui: String,
}

/// Assigns one `SuperType` per concept.
#[derive(Clone, Debug, Default)]
pub struct SemTypeResolver {
    abbreviations: LayeredLookup<SuperType>,
    cui_groups: BTreeMap<String, BTreeSet<SuperType>>,
    overrides: ConflictOverrides,
}

impl SemTypeResolver {
    pub fn new(sem_groups: &[SemGroupRow], sem_types: &[SemTypeRow], cui_tuis: &[CuiTuiRow], overrides: ConflictOverrides) -> Result<Self> {
        let mut tui_to_group = BTreeMap::new();
        for row in sem_groups.iter() {
            tui_to_group.insert(row.tui.clone(), SuperType::from_str(row.group_name.as_str())?);
        }

        let mut abbrev_to_group: BTreeMap<String, SuperType> = BTreeMap::new();
        for row in sem_types.iter() {
            if let Some(group) = tui_to_group.get(&row.tui) {
                abbrev_to_group.insert(row.abbrev.clone(), *group);
            }
        }

        let mut cui_groups: BTreeMap<String, BTreeSet<SuperType>> = BTreeMap::new();
        for row in cui_tuis.iter() {
            if let Some(group) = tui_to_group.get(&row.tui) {
                cui_groups.entry(row.cui.clone()).or_default().insert(*group);
            }
        }
        info!("semantic groups known for {} concepts", cui_groups.len());

        Ok(SemTypeResolver {
            abbreviations: LayeredLookup::new()
                .with_layer("semantic_types", abbrev_to_group)
                .with_layer("unmapped_overrides", overrides.unmapped_abbreviations.clone()),
            cui_groups,
            overrides,
        })
    }

    /// Maps a SemMedDB semantic-type abbreviation (e.g. `phsu`) to its group.
    pub fn group_for_abbreviation(&self, abbrev: &str) -> Result<SuperType> {
        self.abbreviations
            .get(abbrev)
            .copied()
            .ok_or_else(|| PipelineError::Missing { what: "semantic group for abbreviation", key: abbrev.to_string() })
    }

    /// Group for a concept from its TUIs, after applying the override tables.
    /// `Ok(None)` when the concept has no TUI on record; `Err` when its groups still conflict.
    pub fn group_for_cui(&self, cui: &str) -> Result<Option<SuperType>> {
        if let Some(forced) = self.overrides.cui_overrides.get(cui) {
            return Ok(Some(*forced));
        }
        let Some(groups) = self.cui_groups.get(cui) else {
            return Ok(None);
        };
        if groups.len() == 1 {
            return Ok(groups.iter().next().copied());
        }
        match self.overrides.pair_rules.iter().find(|r| &r.groups == groups) {
            Some(rule) => Ok(Some(rule.resolve_to)),
            None => Err(PipelineError::integrity(
                "no-semantic-type-conflicts",
                format!("{} belongs to {}", cui, groups.iter().map(|g| g.name()).join(", ")),
            )),
        }
    }

    /// Resolves the label of every concept in `cuis`, falling back to the triple's semtype
    /// abbreviation. Fails when any concept is left with more than one group.
    pub fn resolve_all<'a>(&self, cuis: impl Iterator<Item = (&'a str, &'a str)>) -> Result<BTreeMap<String, SuperType>> {
        let mut resolved = BTreeMap::new();
        let mut conflicts = BTreeSet::new();
        for (cui, semtype_abbrev) in cuis {
            match self.group_for_cui(cui) {
                Ok(Some(group)) => {
                    resolved.insert(cui.to_string(), group);
                }
                Ok(None) => {
                    let group = self.group_for_abbreviation(semtype_abbrev)?;
                    resolved.entry(cui.to_string()).or_insert(group);
                }
                Err(e) if e.is_integrity() => {
                    conflicts.insert(cui.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        if !conflicts.is_empty() {
            warn!("unresolved semantic group conflicts: {:?}", conflicts.iter().take(20).collect_vec());
        }
        ensure_integrity!(
            conflicts.is_empty(),
            "no-semantic-type-conflicts",
            "{} concepts still have more than one semantic group",
            conflicts.len()
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn resolver() -> SemTypeResolver {
        let groups = vec![
            SemGroupRow { group_abbrev: "CHEM".into(), group_name: "Chemicals & Drugs".into(), tui: "T121".into(), type_name: "Pharmacologic Substance".into() },
            SemGroupRow { group_abbrev: "LIVB".into(), group_name: "Living Beings".into(), tui: "T007".into(), type_name: "Bacterium".into() },
            SemGroupRow { group_abbrev: "CONC".into(), group_name: "Concepts & Ideas".into(), tui: "T078".into(), type_name: "Idea or Concept".into() },
            SemGroupRow { group_abbrev: "OBJC".into(), group_name: "Objects".into(), tui: "T073".into(), type_name: "Manufactured Object".into() },
            SemGroupRow { group_abbrev: "DISO".into(), group_name: "Disorders".into(), tui: "T047".into(), type_name: "Disease or Syndrome".into() },
        ];
        let types = vec![
            SemTypeRow { abbrev: "phsu".into(), tui: "T121".into(), name: "Pharmacologic Substance".into() },
            SemTypeRow { abbrev: "dsyn".into(), tui: "T047".into(), name: "Disease or Syndrome".into() },
        ];
        let cui_tuis = vec![
            CuiTuiRow { cui: "C1".into(), tui: "T121".into() },
            CuiTuiRow { cui: "C2".into(), tui: "T078".into() },
            CuiTuiRow { cui: "C2".into(), tui: "T073".into() },
            CuiTuiRow { cui: "C3".into(), tui: "T121".into() },
            CuiTuiRow { cui: "C3".into(), tui: "T007".into() },
            CuiTuiRow { cui: "C4".into(), tui: "T047".into() },
            CuiTuiRow { cui: "C4".into(), tui: "T073".into() },
        ];
        let overrides = ConflictOverrides {
            unmapped_abbreviations: BTreeMap::from([("alga".to_string(), SuperType::LivingBeings)]),
            cui_overrides: BTreeMap::from([("C3".to_string(), SuperType::ChemicalsDrugs)]),
            pair_rules: vec![PairRule {
                groups: BTreeSet::from([SuperType::ConceptsIdeas, SuperType::Objects]),
                resolve_to: SuperType::ConceptsIdeas,
            }],
        };
        SemTypeResolver::new(&groups, &types, &cui_tuis, overrides).unwrap()
    }

    #[test]
    fn abbreviations_round_trip_through_names() {
        for t in SuperType::ALL.iter() {
            assert_eq!(SuperType::from_abbreviation(t.abbreviation()), Some(*t));
            assert_eq!(SuperType::from_str(t.name()).unwrap(), *t);
        }
    }

    #[test]
    fn overrides_resolve_conflicts() {
        let r = resolver();
        assert_eq!(r.group_for_cui("C1").unwrap(), Some(SuperType::ChemicalsDrugs));
        assert_eq!(r.group_for_cui("C2").unwrap(), Some(SuperType::ConceptsIdeas));
        assert_eq!(r.group_for_cui("C3").unwrap(), Some(SuperType::ChemicalsDrugs));
        assert!(r.group_for_cui("C4").unwrap_err().is_integrity());
        assert_eq!(r.group_for_cui("C999").unwrap(), None);
    }

    #[test]
    fn unmapped_abbreviations_use_override_table() {
        let r = resolver();
        assert_eq!(r.group_for_abbreviation("phsu").unwrap(), SuperType::ChemicalsDrugs);
        assert_eq!(r.group_for_abbreviation("alga").unwrap(), SuperType::LivingBeings);
        assert!(r.group_for_abbreviation("zzzz").is_err());
    }

    #[test]
    fn remaining_conflicts_fail_resolution() {
        let r = resolver();
        let ok = r.resolve_all(vec![("C1", "phsu"), ("C9", "dsyn")].into_iter()).unwrap();
        assert_eq!(ok["C9"], SuperType::Disorders);
        let err = r.resolve_all(vec![("C1", "phsu"), ("C4", "dsyn")].into_iter()).unwrap_err();
        assert!(err.is_integrity());
    }
}
