//! Static group membership
//!
//! Memberships come from configuration in the form
//! `group=alice,bob;other=carol`.

use async_trait::async_trait;
use funpdbe_core::{ConfigError, FunpdbeResult, MembershipDirectory};
use std::collections::{BTreeMap, BTreeSet};

const MEMBERS_VAR: &str = "FUNPDBE_GROUP_MEMBERS";

/// Group membership fixed at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDirectory {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `principal` to `group`.
    pub fn with_member(mut self, group: impl Into<String>, principal: impl Into<String>) -> Self {
        self.groups
            .entry(group.into())
            .or_default()
            .insert(principal.into());
        self
    }

    /// Parse `group=alice,bob;other=carol`. Whitespace around names is
    /// ignored; empty segments are skipped.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let mut directory = Self::new();
        for segment in spec.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (group, members) = segment.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                field: MEMBERS_VAR.to_string(),
                value: segment.to_string(),
                reason: "expected group=member[,member...]".to_string(),
            })?;
            let group = group.trim();
            if group.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: MEMBERS_VAR.to_string(),
                    value: segment.to_string(),
                    reason: "group name is empty".to_string(),
                });
            }
            for member in members.split(',').map(str::trim).filter(|m| !m.is_empty()) {
                directory = directory.with_member(group, member);
            }
        }
        Ok(directory)
    }

    /// Load from `FUNPDBE_GROUP_MEMBERS`; unset means no memberships.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(MEMBERS_VAR) {
            Ok(spec) => Self::parse(&spec),
            Err(_) => Ok(Self::new()),
        }
    }

    /// Every (principal, group) pair, ordered by group then principal.
    pub fn memberships(&self) -> Vec<(String, String)> {
        self.groups
            .iter()
            .flat_map(|(group, members)| {
                members
                    .iter()
                    .map(move |principal| (principal.clone(), group.clone()))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(BTreeSet::is_empty)
    }
}

#[async_trait]
impl MembershipDirectory for StaticDirectory {
    async fn is_member(&self, principal: &str, group: &str) -> FunpdbeResult<bool> {
        Ok(self
            .groups
            .get(group)
            .is_some_and(|members| members.contains(principal)))
    }

    async fn groups_of(&self, principal: &str) -> FunpdbeResult<Vec<String>> {
        Ok(self
            .groups
            .iter()
            .filter(|(_, members)| members.contains(principal))
            .map(|(group, _)| group.clone())
            .collect())
    }

    async fn principals(&self) -> FunpdbeResult<Vec<String>> {
        let all: BTreeSet<&String> = self.groups.values().flatten().collect();
        Ok(all.into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memberships() {
        let directory = StaticDirectory::parse(" funsites = alice, bob ; nod=bob;;").expect("parse");
        assert_eq!(
            directory.memberships(),
            vec![
                ("alice".to_string(), "funsites".to_string()),
                ("bob".to_string(), "funsites".to_string()),
                ("bob".to_string(), "nod".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_segments() {
        assert!(StaticDirectory::parse("funsites").is_err());
        assert!(StaticDirectory::parse("=alice").is_err());
        assert!(StaticDirectory::parse("").expect("empty is fine").is_empty());
    }

    #[tokio::test]
    async fn test_membership_queries() {
        let directory = StaticDirectory::new()
            .with_member("funsites", "alice")
            .with_member("nod", "alice")
            .with_member("nod", "bob");

        assert!(directory.is_member("alice", "funsites").await.expect("lookup"));
        assert!(!directory.is_member("bob", "funsites").await.expect("lookup"));
        assert!(!directory.is_member("alice", "cath").await.expect("lookup"));
        assert_eq!(
            directory.groups_of("alice").await.expect("groups"),
            vec!["funsites".to_string(), "nod".to_string()]
        );
        assert!(directory.groups_of("carol").await.expect("groups").is_empty());
        assert_eq!(
            directory.principals().await.expect("principals"),
            vec!["alice".to_string(), "bob".to_string()]
        );
    }
}
