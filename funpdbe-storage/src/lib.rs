//! FunPDBe Storage - Storage Trait and In-Memory Implementation
//!
//! Defines the storage seam for deposition trees. The Postgres
//! implementation lives in funpdbe-api next to its connection pool.

pub mod directory;
pub mod memory;

pub use directory::StaticDirectory;
pub use memory::{InMemoryStore, TableCounts};

use async_trait::async_trait;
use funpdbe_core::{EntryDocument, EntryFilter, EntryPk, EntryRecord, FunpdbeResult, PdbId};

/// Async storage for entry trees.
///
/// Every mutating method is all-or-nothing: on error the store is left
/// exactly as it was before the call.
#[async_trait]
pub trait DepositionStore: Send + Sync {
    /// Persist a new tree owned by `owner`.
    ///
    /// Fails with `DuplicateEntry` when an entry with the same
    /// (pdb_id, data_resource) pair exists.
    async fn create_entry(&self, document: &EntryDocument, owner: &str)
        -> FunpdbeResult<EntryRecord>;

    /// Entries matching `filter`, fully hydrated, in primary-key order.
    async fn find_entries(&self, filter: &EntryFilter) -> FunpdbeResult<Vec<EntryRecord>>;

    /// Remove every entry tree for (resource, pdb_id). Returns the number of
    /// entries removed, which may be zero.
    async fn delete_entries(&self, resource: &str, pdb_id: &PdbId) -> FunpdbeResult<u64>;

    /// Delete the existing tree(s) for (resource, pdb_id) and persist
    /// `document` in the same unit of work.
    ///
    /// Fails with `NoEntries` when there is nothing to replace. Any failure
    /// leaves the previous tree in place.
    async fn replace_entry(
        &self,
        resource: &str,
        pdb_id: &PdbId,
        document: &EntryDocument,
        owner: &str,
    ) -> FunpdbeResult<EntryRecord>;

    /// Keys of entries owned by `owner`, ascending.
    async fn entry_ids_by_owner(&self, owner: &str) -> FunpdbeResult<Vec<EntryPk>>;

    /// Verify the backing store is reachable.
    async fn health_check(&self) -> FunpdbeResult<()>;
}
