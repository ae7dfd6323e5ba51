use crate::config::{ConsolidationOverrides, DataLayout};
use crate::ensure_integrity;
use crate::error::{PipelineError, Result};
use crate::io::read_tsv;
use crate::semtype::SuperType;
use crate::sources::LayeredLookup;
use crate::xref::{count_mentions, Assignment, Consolidation, Consolidator, IdClasses, KeyOrder, XrefGraph};
use crate::{Edge, IdSource, Indication, Node};
use itertools::Itertools;
use log::{info, warn};
use serde_derive::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path;

pub const DRUG_ID_TYPES: [&str; 3] = ["MESH_DESCRIPTOR_UI", "MESH_SUPPLEMENTAL_RECORD_UI", "UMLSCUI"];
pub const INDICATION: &str = "indication";
pub const DOID_PREFIX: &str = "DOID:";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcIdentifier {
    pub struct_id: String,
    pub identifier: String,
    pub id_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcRelationship {
    pub struct_id: String,
    pub umls_cui: Option<String>,
    pub snomed_conceptid: Option<String>,
    pub relationship_name: String,
    #[serde(default)]
    pub concept_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcSynonym {
    pub struct_id: String,
    pub name: String,
    pub preferred_name: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcApproval {
    pub struct_id: String,
    pub approval: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmlsMesh {
    pub umls: String,
    pub mesh: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnomedXref {
    pub cui: String,
    pub scui: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoXref {
    pub doid_code: String,
    pub resource: String,
    pub resource_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoSlimTerm {
    pub subsumed_id: String,
    pub slim_id: String,
    pub slim_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoidCui {
    pub doid: String,
    pub umlscui: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshName {
    pub mesh: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct GoldStandardRelationship {
    pub compound_semmed_id: String,
    pub disease_semmed_id: String,
    pub compound_name: String,
    pub disease_name: String,
    pub relationship_name: String,
    pub approval_date: String,
    pub approval_year: i32,
}

/// Every cross-reference table the consolidation reads.
#[derive(Clone, Debug, Default)]
pub struct XrefTables {
    pub dc_identifiers: Vec<DcIdentifier>,
    pub dc_relationships: Vec<DcRelationship>,
    pub dc_synonyms: Vec<DcSynonym>,
    pub dc_approvals: Vec<DcApproval>,
    pub umls_mesh: Vec<UmlsMesh>,
    pub snomed: Vec<SnomedXref>,
    pub do_xrefs: Vec<DoXref>,
    pub do_slim: Vec<DoSlimTerm>,
    pub doid_cui: Vec<DoidCui>,
    pub mesh_names: Vec<MeshName>,
    pub mesh_names_via_umls: Vec<MeshName>,
}

fn read_optional<T: DeserializeOwned>(path: &path::Path) -> Result<Vec<T>> {
    if path.exists() {
        read_tsv(path)
    } else {
        warn!("{:?} not found, continuing without it", path);
        Ok(vec![])
    }
}

impl XrefTables {
    /// DrugCentral extracts and the UMLS→MeSH table are required. SNOMED, Disease
    /// Ontology and MeSH name tables only sharpen the merge and may be absent.
    pub fn load(layout: &DataLayout) -> Result<Self> {
        let dc_dir = layout.drugcentral_dir();
        let data_dir = &layout.data_dir;
        let tables = XrefTables {
            dc_identifiers: read_tsv(&dc_dir.join("identifiers.tsv"))?,
            dc_relationships: read_tsv(&dc_dir.join("relationships.tsv"))?,
            dc_synonyms: read_tsv(&dc_dir.join("synonyms.tsv"))?,
            dc_approvals: read_tsv(&dc_dir.join("approvals.tsv"))?,
            umls_mesh: read_tsv(&data_dir.join("umls_to_mesh.tsv"))?,
            snomed: read_optional(&data_dir.join("umls_to_snomed.tsv"))?,
            do_xrefs: read_optional(&data_dir.join("xrefs-prop-slim.tsv"))?,
            do_slim: read_optional(&data_dir.join("slim-terms-prop.tsv"))?,
            doid_cui: read_optional(&data_dir.join("doid_to_umls.tsv"))?,
            mesh_names: read_optional(&data_dir.join("mesh_names.tsv"))?,
            mesh_names_via_umls: read_optional(&data_dir.join("mesh_names_via_umls.tsv"))?,
        };
        info!(
            "loaded {} DrugCentral identifiers, {} relationships, {} UMLS→MeSH rows, {} DO xrefs",
            tables.dc_identifiers.len(),
            tables.dc_relationships.len(),
            tables.umls_mesh.len(),
            tables.do_xrefs.len()
        );
        Ok(tables)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Consolidated {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub indications: Vec<Indication>,
    pub gold_standard: Vec<GoldStandardRelationship>,
    pub drug_map: BTreeMap<String, String>,
    pub disease_map: BTreeMap<String, String>,
    pub node_map: BTreeMap<String, String>,
    pub names: BTreeMap<String, String>,
    pub unmapped: BTreeSet<String>,
}

/// One raw node on its way to a canonical id.
#[derive(Clone, Debug, PartialEq, Eq, Ord, PartialOrd)]
struct Assigned {
    raw: String,
    canonical: String,
    label: SuperType,
}

/// Counts how often each raw id appears as an edge endpoint.
pub fn edge_degree(edges: &[Edge]) -> BTreeMap<String, usize> {
    count_mentions(edges.iter().flat_map(|e| [e.h_id.as_str(), e.t_id.as_str()]))
}

/// Groups canonical ids that carry more than one label and settles each on one label.
///
/// Chemicals & Drugs is preferred, then Disorders. Raw members with the preferred label keep
/// the canonical id. The remaining members fold onto whichever of them has the highest edge
/// degree (smallest id on ties) and take that member's label.
fn resolve_multi_labels(assigned: Vec<Assigned>, degree: &BTreeMap<String, usize>) -> Result<Vec<Assigned>> {
    let mut groups: BTreeMap<String, Vec<Assigned>> = BTreeMap::new();
    for a in assigned.into_iter() {
        groups.entry(a.canonical.clone()).or_default().push(a);
    }

    let mut resolved = vec![];
    let mut conflicted = 0_usize;
    for members in groups.into_values() {
        let labels: BTreeSet<SuperType> = members.iter().map(|m| m.label).collect();
        if labels.len() < 2 {
            resolved.extend(members);
            continue;
        }
        conflicted += 1;
        let preferred = [SuperType::ChemicalsDrugs, SuperType::Disorders].into_iter().find(|p| labels.contains(p));
        let (keep, fold): (Vec<Assigned>, Vec<Assigned>) = members.into_iter().partition(|m| Some(m.label) == preferred);
        resolved.extend(keep);

        let Some(target) = fold.iter().max_by_key(|m| (degree.get(&m.raw).copied().unwrap_or(0), std::cmp::Reverse(m.raw.clone()))).cloned() else {
            continue;
        };
        for m in fold.into_iter() {
            resolved.push(Assigned {
                raw: m.raw,
                canonical: target.raw.clone(),
                label: target.label,
            });
        }
    }
    info!("{} canonical ids carried more than one label", conflicted);

    let mut labels_per_id: BTreeMap<&str, BTreeSet<SuperType>> = BTreeMap::new();
    for a in resolved.iter() {
        labels_per_id.entry(a.canonical.as_str()).or_default().insert(a.label);
    }
    let remaining = labels_per_id.iter().filter(|(_, l)| l.len() > 1).map(|(id, _)| *id).take(10).collect_vec();
    ensure_integrity!(remaining.is_empty(), "single-label-per-id", "ids still carrying several labels: {:?}", remaining);
    Ok(resolved)
}

/// Remaps edge endpoints through `node_map`, recomputes node types and merges evidence of
/// edges that collapse onto the same (head, tail, predicate, direction).
pub fn remap_edges(edges: Vec<Edge>, node_map: &BTreeMap<String, String>, nodes: &[Node]) -> Result<Vec<Edge>> {
    let types: BTreeMap<&str, &str> = nodes.iter().map(|n| (n.id.as_str(), n.abv_label.as_str())).collect();
    let before = edges.len();
    let mut dropped = 0_usize;
    let mut merged: BTreeMap<(String, String, String, String, String), Edge> = BTreeMap::new();
    for mut edge in edges.into_iter() {
        let (Some(h), Some(t)) = (node_map.get(&edge.h_id), node_map.get(&edge.t_id)) else {
            dropped += 1;
            continue;
        };
        let (Some(htype), Some(ttype)) = (types.get(h.as_str()), types.get(t.as_str())) else {
            dropped += 1;
            continue;
        };
        edge.h_id = h.clone();
        edge.t_id = t.clone();
        edge.htype = htype.to_string();
        edge.ttype = ttype.to_string();
        edge.relabel();
        let key = (edge.h_id.clone(), edge.t_id.clone(), edge.sem.clone(), edge.rtype.clone(), edge.rdir.clone());
        match merged.get_mut(&key) {
            Some(existing) => existing.pmids.extend(edge.pmids.into_iter()),
            None => {
                merged.insert(key, edge);
            }
        }
    }
    if dropped > 0 {
        warn!("{} edges touch nodes without a canonical id and were dropped", dropped);
    }
    let remapped = merged.into_values().collect_vec();
    info!("{} edges before consolidation, {} after", before, remapped.len());

    let missing = remapped
        .iter()
        .flat_map(|e| [e.h_id.as_str(), e.t_id.as_str()])
        .filter(|id| !types.contains_key(id))
        .unique()
        .take(10)
        .collect_vec();
    ensure_integrity!(missing.is_empty(), "edge-endpoints-exist", "edge endpoints missing from the node table: {:?}", missing);
    Ok(remapped)
}

pub struct NodeConsolidator<'a> {
    tables: &'a XrefTables,
    overrides: &'a ConsolidationOverrides,
}

impl<'a> NodeConsolidator<'a> {
    pub fn new(tables: &'a XrefTables, overrides: &'a ConsolidationOverrides) -> Self {
        NodeConsolidator { tables, overrides }
    }

    fn umls_to_mesh(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in self.tables.umls_mesh.iter() {
            map.entry(row.umls.clone()).or_default().insert(row.mesh.clone());
        }
        map
    }

    fn drug_identifiers(&self) -> Vec<&DcIdentifier> {
        self.tables.dc_identifiers.iter().filter(|r| DRUG_ID_TYPES.contains(&r.id_type.as_str())).collect_vec()
    }

    fn mesh_set(&self) -> BTreeSet<String> {
        self.tables
            .umls_mesh
            .iter()
            .map(|r| r.mesh.clone())
            .chain(self.drug_identifiers().into_iter().filter(|r| r.id_type != "UMLSCUI").map(|r| r.identifier.clone()))
            .collect()
    }

    fn indications(&self) -> impl Iterator<Item = &DcRelationship> {
        self.tables.dc_relationships.iter().filter(|r| r.relationship_name == INDICATION)
    }

    pub fn consolidate_drugs(&self, drug_ids: &BTreeSet<String>, one_to_one: &BTreeMap<String, String>) -> Result<Consolidation> {
        let dc_maps = self.drug_identifiers();
        let umls_to_mesh = self.umls_to_mesh();

        let mut graph = XrefGraph::new();
        for row in dc_maps.iter() {
            graph.link(&row.struct_id, &row.identifier);
        }
        for (umls, meshes) in umls_to_mesh.iter().filter(|(u, _)| drug_ids.contains(*u)) {
            for mesh in meshes.iter() {
                graph.link(umls, mesh);
            }
        }
        for rel in self.indications() {
            graph.ensure_node(&rel.struct_id);
        }
        info!("drug cross-reference graph has {} identifiers", graph.len());

        let classes = IdClasses {
            mesh: self.mesh_set(),
            umls: drug_ids.iter().cloned().chain(dc_maps.iter().filter(|r| r.id_type == "UMLSCUI").map(|r| r.identifier.clone())).collect(),
            slim: BTreeSet::new(),
        };
        classes.check_disjoint()?;

        let struct_ids: BTreeSet<&str> = dc_maps.iter().map(|r| r.struct_id.as_str()).collect();
        let counts = count_mentions(
            self.tables
                .umls_mesh
                .iter()
                .flat_map(|r| [r.umls.as_str(), r.mesh.as_str()])
                .chain(dc_maps.iter().map(|r| r.identifier.as_str()))
                .chain(struct_ids.into_iter()),
        );

        let result = Consolidator::new(&graph, &counts, &classes, one_to_one, KeyOrder::FrequencyFirst, Assignment::Centre).consolidate();
        Ok(result)
    }

    pub fn consolidate_diseases(&self, disease_ids: &BTreeSet<String>, one_to_one: &BTreeMap<String, String>) -> Result<(Consolidation, BTreeSet<String>)> {
        let umls_to_mesh = self.umls_to_mesh();
        let rels = &self.tables.dc_relationships;

        let mut graph = XrefGraph::new();
        for (umls, meshes) in umls_to_mesh.iter().filter(|(u, _)| disease_ids.contains(*u)) {
            for mesh in meshes.iter() {
                graph.link(umls, mesh);
            }
        }
        for rel in rels.iter() {
            if let (Some(cui), Some(snomed)) = (&rel.umls_cui, &rel.snomed_conceptid) {
                graph.link(cui, snomed);
            }
        }
        for (umls, mesh) in one_to_one.iter() {
            graph.link(umls, mesh);
        }

        let indication_snomed: BTreeSet<&str> = rels.iter().filter_map(|r| r.snomed_conceptid.as_deref()).collect();
        let disease_umls: BTreeSet<&str> = rels.iter().filter_map(|r| r.umls_cui.as_deref()).chain(disease_ids.iter().map(|s| s.as_str())).collect();
        for row in self.tables.snomed.iter().filter(|r| disease_umls.contains(r.cui.as_str()) && indication_snomed.contains(r.scui.as_str())) {
            graph.link(&row.cui, &row.scui);
        }

        let resources: BTreeSet<&str> = self.overrides.do_resources.iter().map(|s| s.as_str()).collect();
        for row in self.tables.do_xrefs.iter().filter(|r| resources.contains(r.resource.as_str())) {
            graph.link(&row.doid_code, &row.resource_id);
        }

        let doid_to_cui: BTreeMap<&str, &str> = self.tables.doid_cui.iter().map(|r| (r.doid.as_str(), r.umlscui.as_str())).collect();
        for term in self.tables.do_slim.iter() {
            if let Some(cui) = doid_to_cui.get(term.subsumed_id.as_str()) {
                graph.link(&term.subsumed_id, cui);
            }
        }
        info!("disease cross-reference graph has {} identifiers", graph.len());

        let umls_set: BTreeSet<String> = disease_ids.iter().cloned().chain(rels.iter().filter_map(|r| r.umls_cui.clone())).collect();
        let classes = IdClasses {
            mesh: self.mesh_set(),
            umls: umls_set.clone(),
            slim: self.tables.do_slim.iter().map(|t| t.slim_id.clone()).collect(),
        };
        classes.check_disjoint()?;

        let counts = count_mentions(
            self.tables
                .umls_mesh
                .iter()
                .flat_map(|r| [r.umls.as_str(), r.mesh.as_str()])
                .chain(rels.iter().filter_map(|r| r.umls_cui.as_deref()).map(|cui| one_to_one.get(cui).map(|m| m.as_str()).unwrap_or(cui))),
        );

        let result = Consolidator::new(&graph, &counts, &classes, one_to_one, KeyOrder::MeshFirst, Assignment::Members).consolidate();
        Ok((result, umls_set))
    }

    /// Fails when an oracle identifier maps elsewhere; warns when it is absent.
    pub fn check_oracles(&self, map: &BTreeMap<String, String>) -> Result<()> {
        for (raw, expected) in self.overrides.oracles.iter() {
            match map.get(raw) {
                Some(actual) => ensure_integrity!(actual == expected, "consolidation-oracle", "{} maps to {} instead of {}", raw, actual, expected),
                None => warn!("consolidation oracle {} is absent from this build", raw),
            }
        }
        Ok(())
    }

    fn earliest_approvals(&self) -> BTreeMap<String, String> {
        let mut earliest: BTreeMap<String, String> = BTreeMap::new();
        for row in self.tables.dc_approvals.iter() {
            let Some(date) = row.approval.as_ref().filter(|d| !d.trim().is_empty()) else {
                continue;
            };
            match earliest.get(&row.struct_id) {
                Some(existing) if existing <= date => {}
                _ => {
                    earliest.insert(row.struct_id.clone(), date.clone());
                }
            }
        }
        earliest
    }

    fn struct_names(&self) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();
        for syn in self.tables.dc_synonyms.iter().filter(|s| s.preferred_name == Some(1)) {
            names.entry(syn.struct_id.clone()).or_insert_with(|| syn.name.clone());
        }
        names
    }

    fn gold_standard(&self, drug_map: &BTreeMap<String, String>, disease_map: &BTreeMap<String, String>) -> Result<Vec<GoldStandardRelationship>> {
        let approvals = self.earliest_approvals();
        let struct_names = self.struct_names();
        let mut rows = BTreeSet::new();
        let mut unapproved = 0_usize;
        for rel in self.tables.dc_relationships.iter() {
            let compound_name = struct_names
                .get(&rel.struct_id)
                .ok_or_else(|| PipelineError::integrity("compound-names-present", format!("struct {} has no preferred name", rel.struct_id)))?;
            let Some(cui) = rel.umls_cui.as_ref() else {
                continue;
            };
            let Some(date) = approvals.get(&rel.struct_id) else {
                unapproved += 1;
                continue;
            };
            let approval_year = date
                .get(0..4)
                .and_then(|y| y.parse::<i32>().ok())
                .ok_or_else(|| PipelineError::Missing { what: "approval year", key: date.clone() })?;
            rows.insert(GoldStandardRelationship {
                compound_semmed_id: drug_map.get(&rel.struct_id).cloned().unwrap_or_else(|| rel.struct_id.clone()),
                disease_semmed_id: disease_map.get(cui).cloned().unwrap_or_else(|| cui.clone()),
                compound_name: compound_name.clone(),
                disease_name: rel.concept_name.clone().unwrap_or_default(),
                relationship_name: rel.relationship_name.clone(),
                approval_date: date.clone(),
                approval_year,
            });
        }
        info!("{} relationships dropped for lack of an approval date", unapproved);
        Ok(rows.into_iter().collect_vec())
    }

    /// Names for canonical ids, lowest precedence first.
    fn names(&self, nodes: &[Node], gold: &[GoldStandardRelationship]) -> LayeredLookup<String> {
        let slim_names: BTreeMap<String, String> = self.tables.do_slim.iter().map(|t| (t.slim_id.clone(), t.slim_name.clone())).collect();

        let mut cui_names: BTreeMap<String, String> = nodes.iter().map(|n| (n.id.clone(), n.name.clone())).collect();
        for rel in self.tables.dc_relationships.iter() {
            if let (Some(cui), Some(name)) = (&rel.umls_cui, &rel.concept_name) {
                cui_names.insert(cui.clone(), name.clone());
            }
        }
        for g in gold.iter() {
            cui_names.insert(g.compound_semmed_id.clone(), g.compound_name.clone());
        }

        let mut mesh_names: BTreeMap<String, String> = self.tables.mesh_names.iter().map(|r| (r.mesh.clone(), r.name.clone())).collect();
        mesh_names.extend(self.tables.mesh_names_via_umls.iter().map(|r| (r.mesh.clone(), r.name.clone())));

        LayeredLookup::new()
            .with_layer("drugcentral_preferred", self.struct_names())
            .with_layer("do_slim", slim_names)
            .with_layer("cui_names", cui_names)
            .with_layer("mesh_names", mesh_names)
    }

    pub fn consolidate(&self, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Consolidated> {
        let umls_to_mesh = self.umls_to_mesh();
        let one_to_one: BTreeMap<String, String> = umls_to_mesh
            .iter()
            .filter(|(_, v)| v.len() == 1)
            .filter_map(|(k, v)| v.iter().next().map(|m| (k.clone(), m.clone())))
            .collect();

        let drug_ids: BTreeSet<String> = nodes.iter().filter(|n| n.label == SuperType::ChemicalsDrugs).map(|n| n.id.clone()).collect();
        let disease_ids: BTreeSet<String> = nodes.iter().filter(|n| n.label == SuperType::Disorders).map(|n| n.id.clone()).collect();

        let drugs = self.consolidate_drugs(&drug_ids, &one_to_one)?;
        self.check_oracles(&drugs.map)?;
        let (diseases, disease_umls) = self.consolidate_diseases(&disease_ids, &one_to_one)?;

        let mut assigned = vec![];
        for node in nodes.iter() {
            let canonical = match node.label {
                SuperType::ChemicalsDrugs => drugs.map.get(&node.id),
                SuperType::Disorders => diseases.map.get(&node.id),
                _ => None,
            }
            .or_else(|| one_to_one.get(&node.id))
            .cloned()
            .unwrap_or_else(|| node.id.clone());
            let label = self.overrides.canonical_labels.get(&canonical).copied().unwrap_or(node.label);
            assigned.push(Assigned {
                raw: node.id.clone(),
                canonical,
                label,
            });
        }
        let degree = edge_degree(&edges);
        let assigned = resolve_multi_labels(assigned, &degree)?;

        let gold_standard = self.gold_standard(&drugs.map, &diseases.map)?;
        let names = self.names(&nodes, &gold_standard);
        for (layer, n) in names.contributions() {
            info!("names from {}: {}", layer, n);
        }

        let mesh_set = self.mesh_set();
        let umls_set: BTreeSet<String> = nodes
            .iter()
            .map(|n| n.id.clone())
            .chain(self.drug_identifiers().into_iter().filter(|r| r.id_type == "UMLSCUI").map(|r| r.identifier.clone()))
            .chain(disease_umls.into_iter())
            .collect();
        let source_of = |id: &str| {
            if mesh_set.contains(id) {
                IdSource::Mesh
            } else if umls_set.contains(id) {
                IdSource::Umls
            } else if id.starts_with(DOID_PREFIX) {
                IdSource::DoSlim
            } else {
                IdSource::Problem
            }
        };

        let mut node_table: BTreeMap<String, Node> = BTreeMap::new();
        let mut node_map = BTreeMap::new();
        let mut unmapped = BTreeSet::new();
        for a in assigned.iter() {
            let source = source_of(&a.canonical);
            let name = names.get(&a.canonical);
            match (source, name) {
                (IdSource::Problem, _) | (_, None) => {
                    unmapped.insert(a.canonical.clone());
                }
                (source, Some(name)) => {
                    node_map.insert(a.raw.clone(), a.canonical.clone());
                    node_table.entry(a.canonical.clone()).or_insert_with(|| {
                        let mut node = Node::new(&a.canonical, name, a.label);
                        node.id_source = Some(source);
                        node
                    });
                }
            }
        }
        if !unmapped.is_empty() {
            warn!("{} canonical ids have no source vocabulary or name and were excluded: {:?}", unmapped.len(), unmapped.iter().take(20).collect_vec());
        }
        let raw_count = nodes.len();
        let nodes = node_table.into_values().collect_vec();
        info!("nodes reduced from {} to {}", raw_count, nodes.len());

        let edges = remap_edges(edges, &node_map, &nodes)?;

        let mut seen = BTreeSet::new();
        let indications = gold_standard
            .iter()
            .filter(|g| g.relationship_name == INDICATION)
            .filter(|g| seen.insert((g.compound_semmed_id.clone(), g.disease_semmed_id.clone())))
            .map(|g| Indication {
                compound_semmed_id: g.compound_semmed_id.clone(),
                disease_semmed_id: g.disease_semmed_id.clone(),
                compound_name: g.compound_name.clone(),
                disease_name: g.disease_name.clone(),
                approval_date: g.approval_date.clone(),
                approval_year: g.approval_year,
                year_diff: None,
                year_cat: None,
            })
            .collect_vec();
        info!("{} unique indications", indications.len());

        Ok(Consolidated {
            nodes,
            edges,
            indications,
            gold_standard,
            drug_map: drugs.map,
            disease_map: diseases.map,
            node_map,
            names: names.flatten(),
            unmapped,
        })
    }
}
