//! User Service
//!
//! Principals known to the membership directory, with their groups and the
//! entries they own.

use funpdbe_core::{EntryPk, MembershipDirectory, PrincipalId};
use funpdbe_storage::DepositionStore;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserSummary {
    pub principal: PrincipalId,
    /// Groups, and so resources, the principal may write.
    pub groups: Vec<String>,
    /// Keys of the entries the principal deposited, ascending.
    pub entries: Vec<EntryPk>,
}

async fn summarize(
    directory: &dyn MembershipDirectory,
    store: &dyn DepositionStore,
    principal: &str,
) -> ApiResult<UserSummary> {
    Ok(UserSummary {
        principal: principal.to_string(),
        groups: directory.groups_of(principal).await?,
        entries: store.entry_ids_by_owner(principal).await?,
    })
}

/// Every principal holding a membership, sorted.
pub async fn list_users(
    directory: &dyn MembershipDirectory,
    store: &dyn DepositionStore,
) -> ApiResult<Vec<UserSummary>> {
    let mut users = Vec::new();
    for principal in directory.principals().await? {
        users.push(summarize(directory, store, &principal).await?);
    }
    Ok(users)
}

/// One principal. Unknown when it has neither memberships nor entries.
pub async fn get_user(
    directory: &dyn MembershipDirectory,
    store: &dyn DepositionStore,
    principal: &str,
) -> ApiResult<UserSummary> {
    let user = summarize(directory, store, principal).await?;
    if user.groups.is_empty() && user.entries.is_empty() {
        return Err(ApiError::entity_not_found("User", principal));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use funpdbe_core::{EntryDocument, PdbId};
    use funpdbe_storage::{InMemoryStore, StaticDirectory};

    #[tokio::test]
    async fn test_users_with_groups_and_entries() -> ApiResult<()> {
        let directory = StaticDirectory::new()
            .with_member("funsites", "alice")
            .with_member("nod", "alice")
            .with_member("nod", "bob");
        let store = InMemoryStore::new();
        let pdb = PdbId::parse("1abc")?;
        let record = store
            .create_entry(&EntryDocument::new(pdb, "nod"), "bob")
            .await?;

        let users = list_users(&directory, &store).await?;
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].principal, "alice");
        assert_eq!(users[0].groups, vec!["funsites".to_string(), "nod".to_string()]);
        assert!(users[0].entries.is_empty());
        assert_eq!(users[1].entries, vec![record.pk]);

        let bob = get_user(&directory, &store, "bob").await?;
        assert_eq!(bob, users[1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let directory = StaticDirectory::new();
        let store = InMemoryStore::new();
        let err = get_user(&directory, &store, "mallory").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }
}
