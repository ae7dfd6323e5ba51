use crate::error::{PipelineError, Result};
use crate::semtype::{ConflictOverrides, SuperType};
use log::{debug, info};
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::{fs, path};

const DEFAULT_OVERRIDES: &str = include_str!("../data/overrides.yml");

pub const NEGATION_PREFIX: &str = "NEG_";
pub const DIRECTION_MARKER: &str = ">";

/// How negated predicates (`NEG_*`) are treated when building edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationMode {
    Drop { include_direction: bool },
    Convert { include_direction: bool },
    Keep,
}

impl RelationMode {
    /// Converting takes precedence over dropping. Keeping negatives while asking for
    /// direction markers is rejected since negated predicates carry no direction.
    pub fn from_flags(drop_negative: bool, convert_negative: bool, include_direction: bool) -> Result<Self> {
        match (drop_negative, convert_negative, include_direction) {
            (_, true, dir) => Ok(RelationMode::Convert { include_direction: dir }),
            (true, false, dir) => Ok(RelationMode::Drop { include_direction: dir }),
            (false, false, false) => Ok(RelationMode::Keep),
            (false, false, true) => Err(PipelineError::Config(
                "cannot add predicate directionality while keeping negative predicates; drop or convert them".to_string(),
            )),
        }
    }

    pub fn include_direction(&self) -> bool {
        match self {
            RelationMode::Drop { include_direction } | RelationMode::Convert { include_direction } => *include_direction,
            RelationMode::Keep => false,
        }
    }

    /// Condensing relation semantics only applies once negatives are gone.
    pub fn condenses(&self) -> bool {
        !matches!(self, RelationMode::Keep)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateInfo {
    pub name: String,
    pub abbreviation: String,
    #[serde(default)]
    pub directed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationOverrides {
    #[serde(default)]
    pub oracles: BTreeMap<String, String>,
    #[serde(default)]
    pub do_resources: Vec<String>,
    #[serde(default)]
    pub canonical_labels: BTreeMap<String, SuperType>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitSeeds {
    pub primary: u64,
    pub secondary: u64,
}

/// Versioned manual-override tables. These encode domain judgement calls and must be
/// re-checked whenever a new SemMedDB, UMLS or DrugCentral dump is used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    pub version: String,
    pub semantic_types: ConflictOverrides,
    pub corrupted_predicates: Vec<String>,
    pub predicates: Vec<PredicateInfo>,
    pub too_general: Vec<String>,
    pub keep_metanodes: Vec<SuperType>,
    pub consolidation: ConsolidationOverrides,
    pub low_abundance_cutoff: f64,
    pub seeds: SplitSeeds,
}

impl Overrides {
    pub fn embedded() -> Result<Self> {
        Ok(serde_yml::from_str(DEFAULT_OVERRIDES)?)
    }

    /// Loads `path` when given, else the tables shipped with the crate.
    pub fn load(path: Option<&path::PathBuf>) -> Result<Self> {
        let overrides: Overrides = match path {
            Some(p) => {
                debug!("reading overrides from {:?}", p);
                serde_yml::from_str(fs::read_to_string(p)?.as_str())?
            }
            None => Overrides::embedded()?,
        };
        info!("using override tables version {}", overrides.version);
        Ok(overrides)
    }

    pub fn predicate_table(&self) -> BTreeMap<String, PredicateInfo> {
        self.predicates.iter().map(|p| (p.name.clone(), p.clone())).collect()
    }

    pub fn keep_metanode_set(&self) -> BTreeSet<SuperType> {
        self.keep_metanodes.iter().copied().collect()
    }
}

/// Dataset location and version tags shared by every stage binary.
#[derive(clap::Args, PartialEq, Debug, Clone)]
pub struct DatasetArgs {
    #[arg(short = 'd', long, default_value = "data")]
    pub data_dir: path::PathBuf,

    #[arg(short = 'v', long, default_value = "VER43_R")]
    pub semmed_version: String,

    #[arg(long, default_value = "20220822")]
    pub dc_date: String,

    /// Replacement for the bundled override tables
    #[arg(long)]
    pub overrides: Option<path::PathBuf>,
}

impl DatasetArgs {
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(self.data_dir.clone(), &self.semmed_version, &self.dc_date)
    }

    pub fn load_overrides(&self) -> Result<Overrides> {
        Overrides::load(self.overrides.as_ref())
    }
}

#[derive(clap::Args, PartialEq, Debug, Clone, Copy)]
pub struct RelationArgs {
    /// Remove negated predications from the graph
    #[arg(short = 'n', long)]
    pub drop_negative_relations: bool,

    /// Fold negated predications into their positive form, e.g. NEG_ISA -> ISA
    #[arg(short = 'c', long)]
    pub convert_negative_relations: bool,

    /// Mark directional predicates with `>` in relation abbreviations
    #[arg(short = 'i', long)]
    pub include_direction: bool,
}

impl RelationArgs {
    pub fn mode(&self) -> Result<RelationMode> {
        RelationMode::from_flags(self.drop_negative_relations, self.convert_negative_relations, self.include_direction)
    }
}

/// Artifact locations for one build, keyed by dataset version tags.
#[derive(Clone, Debug, PartialEq)]
pub struct DataLayout {
    pub data_dir: path::PathBuf,
    pub semmed_version: String,
    pub dc_date: String,
}

impl DataLayout {
    pub fn new(data_dir: path::PathBuf, semmed_version: &str, dc_date: &str) -> Self {
        DataLayout {
            data_dir,
            semmed_version: semmed_version.to_string(),
            dc_date: dc_date.to_string(),
        }
    }

    fn versioned(&self, stem: &str, suffix: &str) -> path::PathBuf {
        self.data_dir.join(format!("{}_{}{}.tsv", stem, self.semmed_version, suffix))
    }

    pub fn clean_triples(&self) -> path::PathBuf {
        self.data_dir.join(format!("semmed_{}_clean.tsv", self.semmed_version))
    }

    pub fn unmapped_triples(&self) -> path::PathBuf {
        self.data_dir.join(format!("semmed_{}_no_cui.tsv", self.semmed_version))
    }

    pub fn pmid_list(&self) -> path::PathBuf {
        self.data_dir.join(format!("pmid_list_{}.txt", self.semmed_version))
    }

    pub fn nodes(&self) -> path::PathBuf {
        self.versioned("nodes", "")
    }

    pub fn edges(&self) -> path::PathBuf {
        self.versioned("edges", "")
    }

    pub fn consolidated_nodes(&self) -> path::PathBuf {
        self.versioned("nodes", "_consolidated")
    }

    pub fn consolidated_edges(&self) -> path::PathBuf {
        self.versioned("edges", "_consolidated")
    }

    pub fn condensed_nodes(&self) -> path::PathBuf {
        self.versioned("nodes", "_consolidated_condensed")
    }

    pub fn condensed_edges(&self) -> path::PathBuf {
        self.versioned("edges", "_consolidated_condensed")
    }

    pub fn filtered_nodes(&self) -> path::PathBuf {
        self.versioned("nodes", "_consolidated_condensed_filtered")
    }

    pub fn filtered_edges(&self) -> path::PathBuf {
        self.versioned("edges", "_consolidated_condensed_filtered")
    }

    pub fn pruned_nodes(&self) -> path::PathBuf {
        self.versioned("nodes", "_consolidated_condensed_filtered_six")
    }

    pub fn pruned_edges(&self) -> path::PathBuf {
        self.versioned("edges", "_consolidated_condensed_filtered_six")
    }

    pub fn indications(&self) -> path::PathBuf {
        self.data_dir.join("indications_nodemerge.tsv")
    }

    pub fn gold_standard(&self) -> path::PathBuf {
        self.data_dir.join("gold_standard_relationships_nodemerge.tsv")
    }

    pub fn merge_map(&self, domain: &str) -> path::PathBuf {
        self.data_dir.join(format!("{}_merge_map.json", domain))
    }

    pub fn all_names(&self) -> path::PathBuf {
        self.data_dir.join("all_ids_to_names.json")
    }

    pub fn pmid_to_year(&self) -> path::PathBuf {
        self.data_dir.join("pmid_to_year.json")
    }

    /// Per-source PMID→year cache, e.g. `pmid_to_year_PMC.json`.
    pub fn pmid_to_year_source(&self, source: &str) -> path::PathBuf {
        self.data_dir.join(format!("pmid_to_year_{}.json", source))
    }

    pub fn entrez_to_cui(&self) -> path::PathBuf {
        self.data_dir.join("entrez_to_cui.json")
    }

    pub fn cui_to_name(&self) -> path::PathBuf {
        self.data_dir.join("cui_to_name.json")
    }

    pub fn ebi_checkpoint(&self) -> path::PathBuf {
        self.data_dir.join("ebi_checkpoint.json")
    }

    pub fn condense_map(&self) -> path::PathBuf {
        self.data_dir.join("edge_condense_map.csv")
    }

    pub fn drugcentral_dir(&self) -> path::PathBuf {
        self.data_dir.join(format!("drugcentral_{}", self.dc_date))
    }

    pub fn time_networks_dir(&self) -> path::PathBuf {
        self.data_dir.join(format!("time_networks_{}", self.semmed_version))
    }

    pub fn splits_dir(&self) -> path::PathBuf {
        self.data_dir.join(format!("splits_{}", self.semmed_version))
    }
}
