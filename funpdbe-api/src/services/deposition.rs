//! Deposition Service
//!
//! Resolves queries and orchestrates writes. Every write runs the same
//! pipeline: path checks, the authorization gate, body decoding, payload
//! checks, then one store call. Writes to the same (resource, pdb_id) key
//! are serialized in-process.

use dashmap::DashMap;
use funpdbe_core::{
    check_entry_path, check_path, check_payload, check_same_pdb, AuthorizationGate,
    DepositionError, EntryFilter, EntryRecord, PdbId, ResourceRegistry,
};
use funpdbe_storage::DepositionStore;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics::record_deposition;

type LockKey = (String, PdbId);

/// Decode a request body as JSON. Anything that is not JSON is a malformed
/// document.
fn parse_body(body: &[u8]) -> Result<Value, DepositionError> {
    serde_json::from_slice(body).map_err(|e| DepositionError::MalformedDocument {
        reason: format!("request body is not valid JSON: {}", e),
    })
}

fn no_entries(resource: Option<&str>, pdb_id: Option<&PdbId>) -> DepositionError {
    DepositionError::NoEntries {
        resource: resource.map(str::to_string),
        pdb_id: pdb_id.map(PdbId::to_string),
    }
}

fn observe<T>(operation: &str, result: &ApiResult<T>) {
    match result {
        Ok(_) => record_deposition(operation, "ok"),
        Err(e) => record_deposition(operation, &e.code.to_string()),
    }
}

pub struct DepositionService {
    store: Arc<dyn DepositionStore>,
    gate: AuthorizationGate,
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for DepositionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepositionService")
            .field("gate", &self.gate)
            .field("held_locks", &self.locks.len())
            .finish()
    }
}

impl DepositionService {
    pub fn new(store: Arc<dyn DepositionStore>, gate: AuthorizationGate) -> Self {
        Self {
            store,
            gate,
            locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        self.gate.registry()
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn store(&self) -> &Arc<dyn DepositionStore> {
        &self.store
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    async fn find_some(&self, filter: EntryFilter) -> ApiResult<Vec<EntryRecord>> {
        let entries = self.store.find_entries(&filter).await?;
        if entries.is_empty() {
            return Err(no_entries(filter.resource.as_deref(), filter.pdb_id.as_ref()).into());
        }
        tracing::debug!(
            resource = ?filter.resource,
            pdb_id = ?filter.pdb_id.as_ref().map(PdbId::as_str),
            entry_count = entries.len(),
            "Resolved entries"
        );
        Ok(entries)
    }

    /// Every entry of every resource.
    pub async fn list_all(&self) -> ApiResult<Vec<EntryRecord>> {
        self.find_some(EntryFilter::all()).await
    }

    pub async fn by_resource(&self, resource: &str) -> ApiResult<Vec<EntryRecord>> {
        check_path(self.registry(), Some(resource), None)?;
        self.find_some(EntryFilter::by_resource(resource)).await
    }

    /// Entries for one structure, across resources.
    pub async fn by_pdb(&self, pdb_id: &str) -> ApiResult<Vec<EntryRecord>> {
        let pdb_id = PdbId::parse(pdb_id)?;
        self.find_some(EntryFilter::by_pdb(pdb_id)).await
    }

    pub async fn by_resource_and_pdb(
        &self,
        resource: &str,
        pdb_id: &str,
    ) -> ApiResult<Vec<EntryRecord>> {
        let pdb_id = check_entry_path(self.registry(), resource, pdb_id)?;
        self.find_some(EntryFilter::by_resource_and_pdb(resource, pdb_id))
            .await
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Gate the write and return the principal it will be attributed to.
    async fn authorize<'c>(&self, caller: Option<&'c str>, resource: &str) -> ApiResult<&'c str> {
        self.gate.check_write(caller, resource).await?;
        caller.ok_or_else(|| {
            ApiError::from(DepositionError::NoPermission {
                principal: None,
                resource: resource.to_string(),
            })
        })
    }

    /// Run `op` while holding the lock for (resource, pdb_id).
    async fn with_key_lock<T, F, Fut>(&self, resource: &str, pdb_id: &PdbId, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key: LockKey = (resource.to_string(), pdb_id.clone());
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());

        let result = {
            let _guard = lock.lock().await;
            op().await
        };

        drop(lock);
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Validate and persist a new entry tree for `resource`.
    pub async fn create(
        &self,
        caller: Option<&str>,
        resource: &str,
        body: &[u8],
    ) -> ApiResult<EntryRecord> {
        let result = self.create_inner(caller, resource, body).await;
        observe("create", &result);
        result
    }

    async fn create_inner(
        &self,
        caller: Option<&str>,
        resource: &str,
        body: &[u8],
    ) -> ApiResult<EntryRecord> {
        check_path(self.registry(), Some(resource), None)?;
        let principal = self.authorize(caller, resource).await?;

        let payload = parse_body(body)?;
        let document = check_payload(resource, &payload)?;

        let record = self
            .with_key_lock(resource, &document.pdb_id, || {
                self.store.create_entry(&document, principal)
            })
            .await?;

        tracing::info!(
            resource = %resource,
            pdb_id = %record.document.pdb_id,
            principal = %principal,
            pk = record.pk,
            rows = record.document.row_count(),
            "Entry created"
        );
        Ok(record)
    }

    /// Remove every tree for (resource, pdb_id). Returns how many entries
    /// were removed, never zero.
    pub async fn delete(&self, caller: Option<&str>, resource: &str, pdb_id: &str) -> ApiResult<u64> {
        let result = self.delete_inner(caller, resource, pdb_id).await;
        observe("delete", &result);
        result
    }

    async fn delete_inner(
        &self,
        caller: Option<&str>,
        resource: &str,
        pdb_id: &str,
    ) -> ApiResult<u64> {
        let pdb_id = check_entry_path(self.registry(), resource, pdb_id)?;
        let principal = self.authorize(caller, resource).await?;

        let deleted = self
            .with_key_lock(resource, &pdb_id, || {
                self.store.delete_entries(resource, &pdb_id)
            })
            .await?;

        if deleted == 0 {
            return Err(no_entries(Some(resource), Some(&pdb_id)).into());
        }

        tracing::info!(
            resource = %resource,
            pdb_id = %pdb_id,
            principal = %principal,
            entry_count = deleted,
            "Entries deleted"
        );
        Ok(deleted)
    }

    /// Swap the tree for (resource, pdb_id) for the one in `body`.
    ///
    /// Fails with `NoEntries` before the body is examined when there is
    /// nothing to replace. Any later failure keeps the previous tree.
    pub async fn replace(
        &self,
        caller: Option<&str>,
        resource: &str,
        pdb_id: &str,
        body: &[u8],
    ) -> ApiResult<EntryRecord> {
        let result = self.replace_inner(caller, resource, pdb_id, body).await;
        observe("replace", &result);
        result
    }

    async fn replace_inner(
        &self,
        caller: Option<&str>,
        resource: &str,
        pdb_id: &str,
        body: &[u8],
    ) -> ApiResult<EntryRecord> {
        let pdb_id = check_entry_path(self.registry(), resource, pdb_id)?;
        let principal = self.authorize(caller, resource).await?;

        let record = self
            .with_key_lock(resource, &pdb_id, || async {
                let existing = self
                    .store
                    .find_entries(&EntryFilter::by_resource_and_pdb(resource, pdb_id.clone()))
                    .await?;
                if existing.is_empty() {
                    return Err(ApiError::from(no_entries(Some(resource), Some(&pdb_id))));
                }

                let payload = parse_body(body)?;
                let document = check_payload(resource, &payload)?;
                check_same_pdb(&pdb_id, &document)?;

                let record = self
                    .store
                    .replace_entry(resource, &pdb_id, &document, principal)
                    .await?;
                Ok::<_, ApiError>(record)
            })
            .await?;

        tracing::info!(
            resource = %resource,
            pdb_id = %pdb_id,
            principal = %principal,
            pk = record.pk,
            "Entry replaced"
        );
        Ok(record)
    }
}
