//! Group membership lookup

use crate::error::FunpdbeResult;
use async_trait::async_trait;

/// Source of truth for which principals belong to which groups.
///
/// Group names share the resource namespace: membership of group `nod`
/// grants write access to resource `nod`.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn is_member(&self, principal: &str, group: &str) -> FunpdbeResult<bool>;

    /// Groups of `principal`, sorted by name.
    async fn groups_of(&self, principal: &str) -> FunpdbeResult<Vec<String>>;

    /// Every principal holding at least one membership, sorted.
    async fn principals(&self) -> FunpdbeResult<Vec<String>>;
}
