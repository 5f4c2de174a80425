//! Document validation
//!
//! Pure checks run before any storage access, in a fixed order:
//! PDB id pattern, resource whitelist, then for writes the payload's own
//! PDB id, its resource field, the match with the path, and the document
//! structure.
//!
//! Text fields are bounded to the widths of the relational schema so a
//! document accepted here fits every store.

use crate::document::EntryDocument;
use crate::error::DepositionError;
use crate::identity::PdbId;
use crate::resource::ResourceRegistry;
use serde::Deserialize;
use serde_json::Value;

/// The resource named by a payload, or `None` when the payload is not an
/// object or carries no string `data_resource`.
pub fn has_resource_field(payload: &Value) -> Option<&str> {
    payload.as_object()?.get("data_resource")?.as_str()
}

/// Validate path parameters. The PDB id, when present, is checked first.
pub fn check_path(
    registry: &ResourceRegistry,
    resource: Option<&str>,
    pdb_id: Option<&str>,
) -> Result<Option<PdbId>, DepositionError> {
    let pdb_id = pdb_id.map(PdbId::parse).transpose()?;
    if let Some(resource) = resource {
        registry.require(resource)?;
    }
    Ok(pdb_id)
}

/// Validate a (resource, pdb_id) path pair, PDB id first.
pub fn check_entry_path(
    registry: &ResourceRegistry,
    resource: &str,
    pdb_id: &str,
) -> Result<PdbId, DepositionError> {
    let pdb_id = PdbId::parse(pdb_id)?;
    registry.require(resource)?;
    Ok(pdb_id)
}

/// Validate a write payload against the path resource and decode it.
///
/// The payload's own `pdb_id` pattern is checked before its resource field.
pub fn check_payload(path_resource: &str, payload: &Value) -> Result<EntryDocument, DepositionError> {
    match payload.get("pdb_id") {
        Some(Value::String(raw)) => {
            PdbId::parse(raw)?;
        }
        Some(other) => {
            return Err(DepositionError::MalformedDocument {
                reason: format!("pdb_id must be a string, got {}", json_kind(other)),
            })
        }
        None => {}
    }

    let declared = has_resource_field(payload).ok_or(DepositionError::MissingResourceField)?;
    if declared != path_resource {
        return Err(DepositionError::ResourceMismatch {
            path: path_resource.to_string(),
            payload: declared.to_string(),
        });
    }

    let document = parse_document(payload)?;
    check_field_limits(&document)?;
    Ok(document)
}

/// Decode the nested tree, mapping shape errors to `MalformedDocument`.
pub fn parse_document(payload: &Value) -> Result<EntryDocument, DepositionError> {
    EntryDocument::deserialize(payload).map_err(|e| DepositionError::MalformedDocument {
        reason: e.to_string(),
    })
}

/// Maximum column widths, in characters.
pub mod limits {
    pub const DATA_RESOURCE: usize = 100;
    pub const VERSION: usize = 255;
    pub const DATE: usize = 32;
    pub const NAME: usize = 255;
    pub const LABEL: usize = 20;
    pub const PRINCIPAL: usize = 255;
}

/// Reject text that no store can hold: over-long values and NUL characters.
pub fn check_field_limits(document: &EntryDocument) -> Result<(), DepositionError> {
    bounded_text("data_resource", &document.data_resource, Some(limits::DATA_RESOURCE))?;
    optional_text("resource_version", &document.resource_version, Some(limits::VERSION))?;
    optional_text("software_version", &document.software_version, Some(limits::VERSION))?;
    optional_text("resource_entry_url", &document.resource_entry_url, None)?;
    optional_text("release_date", &document.release_date, Some(limits::DATE))?;

    for site in &document.sites {
        bounded_text("sites.label", &site.label, Some(limits::NAME))?;
        bounded_text("sites.source_database", &site.source_database, Some(limits::NAME))?;
        bounded_text("sites.source_accession", &site.source_accession, Some(limits::NAME))?;
        optional_text("sites.source_release_date", &site.source_release_date, Some(limits::DATE))?;
    }

    for eco in &document.evidence_code_ontology {
        optional_text("evidence_code_ontology.eco_term", &eco.eco_term, None)?;
        optional_text("evidence_code_ontology.eco_code", &eco.eco_code, Some(limits::NAME))?;
    }

    for chain in &document.chains {
        bounded_text("chains.chain_label", &chain.chain_label, Some(limits::LABEL))?;
        optional_text("chains.chain_annotation", &chain.chain_annotation, None)?;
        for residue in &chain.residues {
            bounded_text("residues.pdb_res_label", &residue.pdb_res_label, Some(limits::LABEL))?;
            bounded_text("residues.aa_type", &residue.aa_type, Some(limits::LABEL))?;
            for site_data in &residue.site_data {
                optional_text(
                    "site_data.confidence_classification",
                    &site_data.confidence_classification,
                    Some(limits::NAME),
                )?;
            }
        }
    }

    Ok(())
}

/// The owner column has the same constraints as document text.
pub fn check_principal(principal: &str) -> Result<(), DepositionError> {
    bounded_text("owner", principal, Some(limits::PRINCIPAL))
}

fn optional_text(
    field: &str,
    value: &Option<String>,
    max_chars: Option<usize>,
) -> Result<(), DepositionError> {
    match value {
        Some(value) => bounded_text(field, value, max_chars),
        None => Ok(()),
    }
}

fn bounded_text(field: &str, value: &str, max_chars: Option<usize>) -> Result<(), DepositionError> {
    if value.contains('\0') {
        return Err(DepositionError::MalformedDocument {
            reason: format!("{field} contains a NUL character"),
        });
    }
    if let Some(max) = max_chars {
        if value.chars().count() > max {
            return Err(DepositionError::MalformedDocument {
                reason: format!("{field} is longer than {max} characters"),
            });
        }
    }
    Ok(())
}

/// Replace additionally pins the document to the path PDB id.
pub fn check_same_pdb(path: &PdbId, document: &EntryDocument) -> Result<(), DepositionError> {
    if &document.pdb_id == path {
        Ok(())
    } else {
        Err(DepositionError::PdbMismatch {
            path: path.to_string(),
            payload: document.pdb_id.to_string(),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
