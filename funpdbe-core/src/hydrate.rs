//! Flat row model and re-hydration
//!
//! Stores keep the tree as six flat tables linked by parent ids. `hydrate`
//! folds those rows back into nested records, ordering every level by row id
//! so that documents come back in the order they were written.

use crate::document::{
    ChainDocument, EntryDocument, EntryRecord, EvidenceCodeOntologyDocument, ResidueDocument,
    SiteDataDocument, SiteDocument,
};
use crate::error::{FunpdbeResult, StorageError};
use crate::identity::{PdbId, RowId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct EntryRow {
    pub id: RowId,
    pub pdb_id: String,
    pub data_resource: String,
    pub resource_version: Option<String>,
    pub software_version: Option<String>,
    pub resource_entry_url: Option<String>,
    pub release_date: Option<String>,
    pub owner: String,
}

impl EntryRow {
    pub fn new(id: RowId, doc: &EntryDocument, owner: &str) -> Self {
        Self {
            id,
            pdb_id: doc.pdb_id.to_string(),
            data_resource: doc.data_resource.clone(),
            resource_version: doc.resource_version.clone(),
            software_version: doc.software_version.clone(),
            resource_entry_url: doc.resource_entry_url.clone(),
            release_date: doc.release_date.clone(),
            owner: owner.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteRow {
    pub id: RowId,
    pub entry_id: RowId,
    pub site_id: i64,
    pub label: String,
    pub source_database: String,
    pub source_accession: String,
    pub source_release_date: Option<String>,
}

impl SiteRow {
    pub fn new(id: RowId, entry_id: RowId, site: &SiteDocument) -> Self {
        Self {
            id,
            entry_id,
            site_id: site.site_id,
            label: site.label.clone(),
            source_database: site.source_database.clone(),
            source_accession: site.source_accession.clone(),
            source_release_date: site.source_release_date.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceCodeRow {
    pub id: RowId,
    pub entry_id: RowId,
    pub eco_term: Option<String>,
    pub eco_code: Option<String>,
}

impl EvidenceCodeRow {
    pub fn new(id: RowId, entry_id: RowId, eco: &EvidenceCodeOntologyDocument) -> Self {
        Self {
            id,
            entry_id,
            eco_term: eco.eco_term.clone(),
            eco_code: eco.eco_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    pub id: RowId,
    pub entry_id: RowId,
    pub chain_label: String,
    pub chain_annotation: Option<String>,
}

impl ChainRow {
    pub fn new(id: RowId, entry_id: RowId, chain: &ChainDocument) -> Self {
        Self {
            id,
            entry_id,
            chain_label: chain.chain_label.clone(),
            chain_annotation: chain.chain_annotation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResidueRow {
    pub id: RowId,
    pub chain_id: RowId,
    pub pdb_res_label: String,
    pub aa_type: String,
}

impl ResidueRow {
    pub fn new(id: RowId, chain_id: RowId, residue: &ResidueDocument) -> Self {
        Self {
            id,
            chain_id,
            pdb_res_label: residue.pdb_res_label.clone(),
            aa_type: residue.aa_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteDataRow {
    pub id: RowId,
    pub residue_id: RowId,
    pub site_id_ref: i64,
    pub raw_score: Option<f64>,
    pub confidence_score: Option<f64>,
    pub confidence_classification: Option<String>,
}

impl SiteDataRow {
    pub fn new(id: RowId, residue_id: RowId, data: &SiteDataDocument) -> Self {
        Self {
            id,
            residue_id,
            site_id_ref: data.site_id_ref,
            raw_score: data.raw_score,
            confidence_score: data.confidence_score,
            confidence_classification: data.confidence_classification.clone(),
        }
    }
}

/// The six tables of one or more entry trees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeRows {
    pub entries: Vec<EntryRow>,
    pub sites: Vec<SiteRow>,
    pub evidence_codes: Vec<EvidenceCodeRow>,
    pub chains: Vec<ChainRow>,
    pub residues: Vec<ResidueRow>,
    pub site_data: Vec<SiteDataRow>,
}

impl TreeRows {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Group `rows` by parent id after ordering them by their own id.
fn by_parent<T>(
    mut rows: Vec<T>,
    id: fn(&T) -> RowId,
    parent: fn(&T) -> RowId,
) -> HashMap<RowId, Vec<T>> {
    rows.sort_by_key(id);
    let mut grouped: HashMap<RowId, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(parent(&row)).or_default().push(row);
    }
    grouped
}

/// Rebuild nested records from flat rows. Child rows whose parent is absent
/// are ignored.
pub fn hydrate(rows: TreeRows) -> FunpdbeResult<Vec<EntryRecord>> {
    let TreeRows {
        mut entries,
        sites,
        evidence_codes,
        chains,
        residues,
        site_data,
    } = rows;

    let mut sites = by_parent(sites, |r: &SiteRow| r.id, |r: &SiteRow| r.entry_id);
    let mut ecos = by_parent(
        evidence_codes,
        |r: &EvidenceCodeRow| r.id,
        |r: &EvidenceCodeRow| r.entry_id,
    );
    let mut chains = by_parent(chains, |r: &ChainRow| r.id, |r: &ChainRow| r.entry_id);
    let mut residues = by_parent(residues, |r: &ResidueRow| r.id, |r: &ResidueRow| r.chain_id);
    let mut site_data = by_parent(
        site_data,
        |r: &SiteDataRow| r.id,
        |r: &SiteDataRow| r.residue_id,
    );

    entries.sort_by_key(|e| e.id);
    entries
        .into_iter()
        .map(|entry| -> FunpdbeResult<EntryRecord> {
            let pdb_id = PdbId::parse(&entry.pdb_id).map_err(|e| StorageError::QueryFailed {
                reason: format!("entry {} holds a corrupt pdb_id: {}", entry.id, e),
            })?;

            let chains = chains
                .remove(&entry.id)
                .unwrap_or_default()
                .into_iter()
                .map(|chain| ChainDocument {
                    residues: residues
                        .remove(&chain.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|residue| ResidueDocument {
                            site_data: site_data
                                .remove(&residue.id)
                                .unwrap_or_default()
                                .into_iter()
                                .map(|d| SiteDataDocument {
                                    site_id_ref: d.site_id_ref,
                                    raw_score: d.raw_score,
                                    confidence_score: d.confidence_score,
                                    confidence_classification: d.confidence_classification,
                                })
                                .collect(),
                            pdb_res_label: residue.pdb_res_label,
                            aa_type: residue.aa_type,
                        })
                        .collect(),
                    chain_label: chain.chain_label,
                    chain_annotation: chain.chain_annotation,
                })
                .collect();

            let sites = sites
                .remove(&entry.id)
                .unwrap_or_default()
                .into_iter()
                .map(|s| SiteDocument {
                    site_id: s.site_id,
                    label: s.label,
                    source_database: s.source_database,
                    source_accession: s.source_accession,
                    source_release_date: s.source_release_date,
                })
                .collect();

            let evidence_code_ontology = ecos
                .remove(&entry.id)
                .unwrap_or_default()
                .into_iter()
                .map(|e| EvidenceCodeOntologyDocument {
                    eco_term: e.eco_term,
                    eco_code: e.eco_code,
                })
                .collect();

            Ok(EntryRecord {
                pk: entry.id,
                document: EntryDocument {
                    pdb_id,
                    data_resource: entry.data_resource,
                    resource_version: entry.resource_version,
                    software_version: entry.software_version,
                    resource_entry_url: entry.resource_entry_url,
                    release_date: entry.release_date,
                    chains,
                    sites,
                    evidence_code_ontology,
                },
                owner: entry.owner,
            })
        })
        .collect()
}
