//! Resource authorization gate
//!
//! Reads are open to everyone. A write to resource `r` is allowed iff `r` is
//! whitelisted and the caller belongs to the group named `r`.

use crate::error::{DepositionError, FunpdbeResult};
use crate::membership::MembershipDirectory;
use crate::resource::ResourceRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthorizationGate {
    registry: Arc<ResourceRegistry>,
    directory: Arc<dyn MembershipDirectory>,
}

impl AuthorizationGate {
    pub fn new(registry: Arc<ResourceRegistry>, directory: Arc<dyn MembershipDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<dyn MembershipDirectory> {
        &self.directory
    }

    /// True iff `principal` is a member of the group named `resource`.
    pub async fn authorized(&self, principal: &str, resource: &str) -> FunpdbeResult<bool> {
        self.directory.is_member(principal, resource).await
    }

    /// Gate a mutation. Anonymous callers are never authorized.
    pub async fn check_write(&self, principal: Option<&str>, resource: &str) -> FunpdbeResult<()> {
        self.registry.require(resource)?;

        let allowed = match principal {
            Some(p) => self.authorized(p, resource).await?,
            None => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(DepositionError::NoPermission {
                principal: principal.map(str::to_string),
                resource: resource.to_string(),
            }
            .into())
        }
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FunpdbeError;
    use async_trait::async_trait;

    struct OneMember;

    #[async_trait]
    impl MembershipDirectory for OneMember {
        async fn is_member(&self, principal: &str, group: &str) -> FunpdbeResult<bool> {
            Ok(principal == "alice" && group == "funsites")
        }

        async fn groups_of(&self, principal: &str) -> FunpdbeResult<Vec<String>> {
            Ok(if principal == "alice" {
                vec!["funsites".to_string()]
            } else {
                Vec::new()
            })
        }

        async fn principals(&self) -> FunpdbeResult<Vec<String>> {
            Ok(vec!["alice".to_string()])
        }
    }

    fn gate() -> AuthorizationGate {
        AuthorizationGate::new(Arc::new(ResourceRegistry::default()), Arc::new(OneMember))
    }

    #[tokio::test]
    async fn test_member_may_write() {
        assert!(gate().check_write(Some("alice"), "funsites").await.is_ok());
    }

    #[tokio::test]
    async fn test_non_member_and_anonymous_denied() {
        for principal in [Some("bob"), None] {
            let err = gate().check_write(principal, "funsites").await.unwrap_err();
            assert!(matches!(
                err,
                FunpdbeError::Deposition(DepositionError::NoPermission { .. })
            ));
        }
        let err = gate().check_write(Some("alice"), "nod").await.unwrap_err();
        assert!(matches!(
            err,
            FunpdbeError::Deposition(DepositionError::NoPermission { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_resource_is_invalid_not_forbidden() {
        let err = gate().check_write(Some("alice"), "cath").await.unwrap_err();
        assert!(matches!(
            err,
            FunpdbeError::Deposition(DepositionError::InvalidResource { .. })
        ));
    }
}
