//! Resource whitelist
//!
//! The set of contributing resources is fixed by configuration. Each name is
//! both a valid `data_resource` value and the name of the group whose members
//! may write that resource.

use crate::error::{ConfigError, DepositionError};
use serde::{Deserialize, Serialize};

/// Resources accepted when `FUNPDBE_RESOURCES` is unset.
pub const DEFAULT_RESOURCES: &[&str] = &["funsites", "nod"];

/// Partner metadata attached to a whitelisted resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PartnerInfo {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub work_package: Option<i32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl PartnerInfo {
    /// Metadata for a resource with no partner record.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            contact: None,
            work_package: None,
            active: true,
        }
    }
}

/// Ordered whitelist of resource identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRegistry {
    resources: Vec<PartnerInfo>,
}

impl ResourceRegistry {
    /// Build a registry from names. Blank names and repeats are dropped,
    /// first occurrence wins.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resources: Vec<PartnerInfo> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || resources.iter().any(|r| r.name == name) {
                continue;
            }
            resources.push(PartnerInfo::bare(name));
        }
        Self { resources }
    }

    /// Parse a comma-separated list such as `"funsites,nod"`.
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Load from `FUNPDBE_RESOURCES` and the optional `FUNPDBE_PARTNERS_FILE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let registry = match std::env::var("FUNPDBE_RESOURCES") {
            Ok(list) => Self::from_list(&list),
            Err(_) => Self::new(DEFAULT_RESOURCES),
        };

        if registry.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "FUNPDBE_RESOURCES".to_string(),
                value: String::new(),
                reason: "at least one resource is required".to_string(),
            });
        }

        match std::env::var("FUNPDBE_PARTNERS_FILE") {
            Ok(path) if !path.trim().is_empty() => {
                let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::InvalidValue {
                    field: "FUNPDBE_PARTNERS_FILE".to_string(),
                    value: path.clone(),
                    reason: e.to_string(),
                })?;
                registry.with_partners_json(&raw).map_err(|reason| ConfigError::InvalidValue {
                    field: "FUNPDBE_PARTNERS_FILE".to_string(),
                    value: path,
                    reason,
                })
            }
            _ => Ok(registry),
        }
    }

    /// Attach partner metadata from a JSON array of partner records.
    ///
    /// Records for names outside the whitelist are ignored; a partner file
    /// never widens the set of writable resources.
    pub fn with_partners_json(self, raw: &str) -> Result<Self, String> {
        let partners: Vec<PartnerInfo> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        Ok(self.with_partners(partners))
    }

    pub fn with_partners(mut self, partners: Vec<PartnerInfo>) -> Self {
        for partner in partners {
            if let Some(slot) = self.resources.iter_mut().find(|r| r.name == partner.name) {
                *slot = partner;
            }
        }
        self
    }

    /// True iff `name` is whitelisted. Matching is exact.
    pub fn resource_valid(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name == name)
    }

    /// Like [`resource_valid`](Self::resource_valid) but as a pipeline step.
    pub fn require(&self, name: &str) -> Result<(), DepositionError> {
        if self.resource_valid(name) {
            Ok(())
        } else {
            Err(DepositionError::InvalidResource {
                resource: name.to_string(),
            })
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name.as_str())
    }

    pub fn partners(&self) -> &[PartnerInfo] {
        &self.resources
    }

    pub fn partner(&self, name: &str) -> Option<&PartnerInfo> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_whitelist() {
        let registry = ResourceRegistry::default();
        assert!(registry.resource_valid("funsites"));
        assert!(registry.resource_valid("nod"));
        assert!(!registry.resource_valid("Funsites"));
        assert!(!registry.resource_valid(""));
        assert!(!registry.resource_valid("invalid"));
    }

    #[test]
    fn test_from_list_keeps_order_and_dedups() {
        let registry = ResourceRegistry::from_list(" nod, funsites ,,nod");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["nod", "funsites"]);
    }

    #[test]
    fn test_require_reports_name() {
        let registry = ResourceRegistry::default();
        assert!(registry.require("nod").is_ok());
        assert_eq!(
            registry.require("cath"),
            Err(DepositionError::InvalidResource {
                resource: "cath".to_string()
            })
        );
    }

    #[test]
    fn test_partner_metadata_does_not_widen_whitelist() {
        let raw = r#"[
            {"name": "funsites", "owner": "Funsites team", "contact": "funsites@example.org", "work_package": 2},
            {"name": "intruder", "owner": "nobody"}
        ]"#;
        let registry = ResourceRegistry::default()
            .with_partners_json(raw)
            .expect("valid partners json");

        assert!(!registry.resource_valid("intruder"));
        let partner = registry.partner("funsites").expect("funsites present");
        assert_eq!(partner.work_package, Some(2));
        assert!(partner.active);
        assert_eq!(registry.partner("nod"), Some(&PartnerInfo::bare("nod")));
    }

    #[test]
    fn test_partner_json_errors_surface() {
        assert!(ResourceRegistry::default().with_partners_json("{").is_err());
    }

    proptest! {
        #[test]
        fn prop_only_whitelisted_names_valid(name in "[a-z_]{0,12}") {
            let registry = ResourceRegistry::default();
            let expected = DEFAULT_RESOURCES.contains(&name.as_str());
            prop_assert_eq!(registry.resource_valid(&name), expected);
        }
    }
}
