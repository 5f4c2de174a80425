//! FunPDBe Test Utilities
//!
//! Shared test infrastructure for the FunPDBe workspace:
//! - The reference deposition payload and its decoded form
//! - Fixture membership directories
//! - Proptest generators for PDB ids and entry documents

pub use funpdbe_core::{
    ChainDocument, EntryDocument, EntryRecord, EvidenceCodeOntologyDocument, PdbId,
    ResidueDocument, SiteDataDocument, SiteDocument,
};
pub use funpdbe_storage::{InMemoryStore, StaticDirectory};

use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// FIXTURES
// ============================================================================

/// The reference funsites deposition for structure `2abc`: one chain, one
/// residue with scored site data, one site and one evidence code.
pub fn mock_payload() -> Value {
    mock_payload_for("2abc", "funsites")
}

/// [`mock_payload`] with a different PDB id and resource.
pub fn mock_payload_for(pdb_id: &str, resource: &str) -> Value {
    json!({
        "pdb_id": pdb_id,
        "data_resource": resource,
        "chains": [{
            "chain_label": "A",
            "residues": [{
                "pdb_res_label": "1",
                "aa_type": "ALA",
                "site_data": [{
                    "site_id_ref": 1,
                    "raw_score": 0.7,
                    "confidence_score": 0.9,
                    "confidence_classification": "high"
                }]
            }]
        }],
        "sites": [{
            "site_id": 1,
            "label": "ligand_binding_site",
            "source_database": "pdb",
            "source_accession": pdb_id,
            "source_release_date": "01/01/2000"
        }],
        "evidence_code_ontology": [{
            "eco_term": "computational combinatorial evidence used in automatic assertion",
            "eco_code": "ECO:0000246"
        }]
    })
}

/// The decoded form of [`mock_payload`].
pub fn mock_document() -> EntryDocument {
    serde_json::from_value(mock_payload()).expect("reference payload decodes")
}

/// `alice` may write funsites, `bob` may write nod and cath.
pub fn mock_directory() -> StaticDirectory {
    StaticDirectory::new()
        .with_member("funsites", "alice")
        .with_member("nod", "bob")
        .with_member("cath", "bob")
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Valid PDB ids in mixed case.
pub fn arb_pdb_id() -> impl Strategy<Value = String> {
    "[0-9][A-Za-z][A-Za-z0-9]{2}"
}

/// Strings that are not PDB ids.
pub fn arb_invalid_pdb_id() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[0-9]{4}",
        "[A-Za-z][A-Za-z0-9]{3}",
        "[0-9][A-Za-z][A-Za-z0-9]{3,6}",
        "[0-9][A-Za-z][A-Za-z0-9]?",
    ]
}

fn arb_label() -> impl Strategy<Value = String> {
    "[a-z_]{1,12}"
}

/// Scores with at most two decimals so they survive a JSON round trip.
fn arb_score() -> impl Strategy<Value = Option<f64>> {
    proptest::option::of((0u32..=100).prop_map(|n| f64::from(n) / 100.0))
}

pub fn arb_site_data() -> impl Strategy<Value = SiteDataDocument> {
    (
        0i64..20,
        arb_score(),
        arb_score(),
        proptest::option::of(prop_oneof![
            Just("high".to_string()),
            Just("medium".to_string()),
            Just("low".to_string()),
        ]),
    )
        .prop_map(
            |(site_id_ref, raw_score, confidence_score, confidence_classification)| {
                SiteDataDocument {
                    site_id_ref,
                    raw_score,
                    confidence_score,
                    confidence_classification,
                }
            },
        )
}

pub fn arb_residue() -> impl Strategy<Value = ResidueDocument> {
    (
        "[0-9]{1,4}",
        "[A-Z]{3}",
        prop::collection::vec(arb_site_data(), 0..3),
    )
        .prop_map(|(pdb_res_label, aa_type, site_data)| ResidueDocument {
            pdb_res_label,
            aa_type,
            site_data,
        })
}

pub fn arb_chain() -> impl Strategy<Value = ChainDocument> {
    (
        "[A-Z]",
        proptest::option::of(arb_label()),
        prop::collection::vec(arb_residue(), 0..4),
    )
        .prop_map(|(chain_label, chain_annotation, residues)| ChainDocument {
            chain_label,
            chain_annotation,
            residues,
        })
}

pub fn arb_site() -> impl Strategy<Value = SiteDocument> {
    (
        0i64..20,
        arb_label(),
        "[a-z]{2,8}",
        "[0-9][a-z0-9]{3}",
        proptest::option::of("[0-9]{2}/[0-9]{2}/[0-9]{4}"),
    )
        .prop_map(
            |(site_id, label, source_database, source_accession, source_release_date)| {
                SiteDocument {
                    site_id,
                    label,
                    source_database,
                    source_accession,
                    source_release_date,
                }
            },
        )
}

pub fn arb_eco() -> impl Strategy<Value = EvidenceCodeOntologyDocument> {
    (
        proptest::option::of("[a-z ]{1,30}"),
        proptest::option::of("ECO:[0-9]{7}"),
    )
        .prop_map(|(eco_term, eco_code)| EvidenceCodeOntologyDocument { eco_term, eco_code })
}

/// Full entry trees for `resource`, with a lower-cased PDB id.
pub fn arb_document(resource: &'static str) -> impl Strategy<Value = EntryDocument> {
    (
        arb_pdb_id(),
        proptest::option::of("[0-9]\\.[0-9]"),
        prop::collection::vec(arb_chain(), 0..3),
        prop::collection::vec(arb_site(), 0..3),
        prop::collection::vec(arb_eco(), 0..3),
    )
        .prop_map(move |(pdb_id, resource_version, chains, sites, eco)| {
            let mut document = EntryDocument::new(
                PdbId::parse(&pdb_id).expect("generated PDB id is valid"),
                resource,
            );
            document.resource_version = resource_version;
            document.chains = chains;
            document.sites = sites;
            document.evidence_code_ontology = eco;
            document
        })
}
