//! Identity types for deposited entries

use crate::error::DepositionError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-assigned row identifier (BIGSERIAL in Postgres).
pub type RowId = i64;

/// Primary key of an Entry row.
pub type EntryPk = RowId;

/// Opaque identifier of an authenticated principal (JWT `sub` or API-key owner).
pub type PrincipalId = String;

/// Digit, letter, then two alphanumerics. Matching is case-insensitive.
static PDB_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9][A-Za-z][A-Za-z0-9]{2}$").expect("Invalid PDB id regex"));

/// Check whether `id` has the shape of a PDB identifier.
pub fn validate_pdb_id(id: &str) -> bool {
    PDB_ID_PATTERN.is_match(id)
}

/// A validated PDB identifier, always stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PdbId(String);

impl PdbId {
    /// Validate and normalize a raw identifier.
    pub fn parse(raw: &str) -> Result<Self, DepositionError> {
        if validate_pdb_id(raw) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(DepositionError::InvalidPdbPattern {
                pdb_id: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PdbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PdbId {
    type Err = DepositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PdbId {
    type Error = DepositionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PdbId> for String {
    fn from(id: PdbId) -> Self {
        id.0
    }
}

impl AsRef<str> for PdbId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
