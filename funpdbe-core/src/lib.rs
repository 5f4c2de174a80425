//! FunPDBe Core - Deposition Domain
//!
//! Document tree types, identifier and resource validation, the
//! authorization policy, and the storage-agnostic persist and hydrate steps.
//! No I/O beyond reading configuration.

pub mod document;
pub mod error;
pub mod gate;
pub mod hydrate;
pub mod identity;
pub mod membership;
pub mod persist;
pub mod resource;
pub mod validate;

pub use document::{
    ChainDocument, EntryDocument, EntryFilter, EntryRecord, EvidenceCodeOntologyDocument,
    ResidueDocument, SiteDataDocument, SiteDocument,
};
pub use error::{ConfigError, DepositionError, FunpdbeError, FunpdbeResult, StorageError};
pub use gate::AuthorizationGate;
pub use hydrate::{
    hydrate, ChainRow, EntryRow, EvidenceCodeRow, ResidueRow, SiteDataRow, SiteRow, TreeRows,
};
pub use identity::{validate_pdb_id, EntryPk, PdbId, PrincipalId, RowId};
pub use membership::MembershipDirectory;
pub use persist::{persist_document, TreeWriter};
pub use resource::{PartnerInfo, ResourceRegistry, DEFAULT_RESOURCES};
pub use validate::{
    check_entry_path, check_field_limits, check_path, check_payload, check_principal,
    check_same_pdb, has_resource_field, parse_document,
};
