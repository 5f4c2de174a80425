//! Deposition document tree
//!
//! One record type per level of the tree:
//!
//! ```text
//! EntryDocument
//! ├── chains: [ChainDocument]
//! │   └── residues: [ResidueDocument]
//! │       └── site_data: [SiteDataDocument]
//! ├── sites: [SiteDocument]
//! └── evidence_code_ontology: [EvidenceCodeOntologyDocument]
//! ```
//!
//! Child collections are always sequences. A missing key, an explicit `null`
//! and `[]` all deserialize to an empty `Vec`.

use crate::identity::{EntryPk, PdbId, PrincipalId};
use serde::{Deserialize, Deserializer, Serialize};

fn nullable_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Root document for one (PDB structure, contributing resource) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntryDocument {
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "2abc"))]
    pub pdb_id: PdbId,
    pub data_resource: String,
    #[serde(default)]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub software_version: Option<String>,
    #[serde(default)]
    pub resource_entry_url: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "nullable_seq")]
    pub chains: Vec<ChainDocument>,
    #[serde(default, deserialize_with = "nullable_seq")]
    pub sites: Vec<SiteDocument>,
    #[serde(default, deserialize_with = "nullable_seq")]
    pub evidence_code_ontology: Vec<EvidenceCodeOntologyDocument>,
}

impl EntryDocument {
    /// Minimal document with no child collections.
    pub fn new(pdb_id: PdbId, data_resource: impl Into<String>) -> Self {
        Self {
            pdb_id,
            data_resource: data_resource.into(),
            resource_version: None,
            software_version: None,
            resource_entry_url: None,
            release_date: None,
            chains: Vec::new(),
            sites: Vec::new(),
            evidence_code_ontology: Vec::new(),
        }
    }

    /// Number of rows this document materializes into, Entry included.
    pub fn row_count(&self) -> usize {
        let residue_rows: usize = self
            .chains
            .iter()
            .flat_map(|c| c.residues.iter())
            .map(|r| 1 + r.site_data.len())
            .sum();
        1 + self.sites.len() + self.evidence_code_ontology.len() + self.chains.len() + residue_rows
    }
}

/// Polymer chain of the deposited structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChainDocument {
    pub chain_label: String,
    #[serde(default)]
    pub chain_annotation: Option<String>,
    #[serde(default, deserialize_with = "nullable_seq")]
    pub residues: Vec<ResidueDocument>,
}

/// Amino acid position within a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResidueDocument {
    pub pdb_res_label: String,
    pub aa_type: String,
    #[serde(default, deserialize_with = "nullable_seq")]
    pub site_data: Vec<SiteDataDocument>,
}

/// Scored per-residue evidence for a site.
///
/// `site_id_ref` is an advisory reference to a `SiteDocument::site_id` of the
/// same entry. It is stored verbatim and never checked against `sites`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SiteDataDocument {
    pub site_id_ref: i64,
    #[serde(default)]
    pub raw_score: Option<f64>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub confidence_classification: Option<String>,
}

/// Named functional site. `site_id` is unique only within its entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SiteDocument {
    pub site_id: i64,
    pub label: String,
    pub source_database: String,
    pub source_accession: String,
    #[serde(default)]
    pub source_release_date: Option<String>,
}

/// Evidence code justification attached to an entry. Both fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EvidenceCodeOntologyDocument {
    #[serde(default)]
    pub eco_term: Option<String>,
    #[serde(default)]
    pub eco_code: Option<String>,
}

/// A persisted entry: the document plus its server-assigned key and owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntryRecord {
    pub pk: EntryPk,
    #[serde(flatten)]
    pub document: EntryDocument,
    pub owner: PrincipalId,
}

/// Row selection for entry queries. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub resource: Option<String>,
    pub pdb_id: Option<PdbId>,
}

impl EntryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_resource(resource: impl Into<String>) -> Self {
        Self {
            resource: Some(resource.into()),
            pdb_id: None,
        }
    }

    pub fn by_pdb(pdb_id: PdbId) -> Self {
        Self {
            resource: None,
            pdb_id: Some(pdb_id),
        }
    }

    pub fn by_resource_and_pdb(resource: impl Into<String>, pdb_id: PdbId) -> Self {
        Self {
            resource: Some(resource.into()),
            pdb_id: Some(pdb_id),
        }
    }

    /// Check an entry's key columns against this filter.
    pub fn matches(&self, data_resource: &str, pdb_id: &str) -> bool {
        self.resource.as_deref().map_or(true, |r| r == data_resource)
            && self.pdb_id.as_ref().map_or(true, |p| p.as_str() == pdb_id)
    }
}
