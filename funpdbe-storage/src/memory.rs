//! In-memory deposition store
//!
//! All six tables live behind one async `RwLock`. A write clones the tables,
//! runs the persister walk against the clone and swaps it in only when the
//! walk succeeds.

use crate::DepositionStore;
use async_trait::async_trait;
use funpdbe_core::{
    hydrate, persist_document, ChainDocument, ChainRow, DepositionError, EntryDocument,
    EntryFilter, EntryPk, EntryRecord, EntryRow, EvidenceCodeOntologyDocument, EvidenceCodeRow,
    FunpdbeResult, PdbId, ResidueDocument, ResidueRow, RowId, SiteDataDocument, SiteDataRow,
    SiteDocument, SiteRow, TreeRows, TreeWriter,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: TreeRows,
    last_id: RowId,
}

impl Tables {
    fn next_id(&mut self) -> RowId {
        self.last_id += 1;
        self.last_id
    }

    fn entry_ids(&self, filter: &EntryFilter) -> HashSet<RowId> {
        self.rows
            .entries
            .iter()
            .filter(|e| filter.matches(&e.data_resource, &e.pdb_id))
            .map(|e| e.id)
            .collect()
    }

    /// Copy out the trees rooted at `entries`.
    fn select(&self, entries: &HashSet<RowId>) -> TreeRows {
        let chains: Vec<ChainRow> = self
            .rows
            .chains
            .iter()
            .filter(|c| entries.contains(&c.entry_id))
            .cloned()
            .collect();
        let chain_ids: HashSet<RowId> = chains.iter().map(|c| c.id).collect();
        let residues: Vec<ResidueRow> = self
            .rows
            .residues
            .iter()
            .filter(|r| chain_ids.contains(&r.chain_id))
            .cloned()
            .collect();
        let residue_ids: HashSet<RowId> = residues.iter().map(|r| r.id).collect();

        TreeRows {
            entries: self
                .rows
                .entries
                .iter()
                .filter(|e| entries.contains(&e.id))
                .cloned()
                .collect(),
            sites: self
                .rows
                .sites
                .iter()
                .filter(|s| entries.contains(&s.entry_id))
                .cloned()
                .collect(),
            evidence_codes: self
                .rows
                .evidence_codes
                .iter()
                .filter(|e| entries.contains(&e.entry_id))
                .cloned()
                .collect(),
            site_data: self
                .rows
                .site_data
                .iter()
                .filter(|d| residue_ids.contains(&d.residue_id))
                .cloned()
                .collect(),
            chains,
            residues,
        }
    }

    /// Remove the trees rooted at `entries`, descendants included.
    fn cascade_delete(&mut self, entries: &HashSet<RowId>) {
        let rows = &mut self.rows;
        let chain_ids: HashSet<RowId> = rows
            .chains
            .iter()
            .filter(|c| entries.contains(&c.entry_id))
            .map(|c| c.id)
            .collect();
        let residue_ids: HashSet<RowId> = rows
            .residues
            .iter()
            .filter(|r| chain_ids.contains(&r.chain_id))
            .map(|r| r.id)
            .collect();

        rows.site_data.retain(|d| !residue_ids.contains(&d.residue_id));
        rows.residues.retain(|r| !chain_ids.contains(&r.chain_id));
        rows.chains.retain(|c| !entries.contains(&c.entry_id));
        rows.sites.retain(|s| !entries.contains(&s.entry_id));
        rows.evidence_codes.retain(|e| !entries.contains(&e.entry_id));
        rows.entries.retain(|e| !entries.contains(&e.id));
    }
}

/// Persister target over a scratch copy of the tables.
struct StagedWriter {
    tables: Tables,
}

#[async_trait]
impl TreeWriter for StagedWriter {
    async fn insert_entry(&mut self, entry: &EntryDocument, owner: &str) -> FunpdbeResult<RowId> {
        let taken = self.tables.rows.entries.iter().any(|e| {
            e.pdb_id == entry.pdb_id.as_str() && e.data_resource == entry.data_resource
        });
        if taken {
            return Err(DepositionError::DuplicateEntry {
                resource: entry.data_resource.clone(),
                pdb_id: entry.pdb_id.to_string(),
            }
            .into());
        }
        let id = self.tables.next_id();
        self.tables.rows.entries.push(EntryRow::new(id, entry, owner));
        Ok(id)
    }

    async fn insert_site(&mut self, entry: RowId, site: &SiteDocument) -> FunpdbeResult<RowId> {
        let id = self.tables.next_id();
        self.tables.rows.sites.push(SiteRow::new(id, entry, site));
        Ok(id)
    }

    async fn insert_evidence_code(
        &mut self,
        entry: RowId,
        eco: &EvidenceCodeOntologyDocument,
    ) -> FunpdbeResult<RowId> {
        let id = self.tables.next_id();
        self.tables
            .rows
            .evidence_codes
            .push(EvidenceCodeRow::new(id, entry, eco));
        Ok(id)
    }

    async fn insert_chain(&mut self, entry: RowId, chain: &ChainDocument) -> FunpdbeResult<RowId> {
        let id = self.tables.next_id();
        self.tables.rows.chains.push(ChainRow::new(id, entry, chain));
        Ok(id)
    }

    async fn insert_residue(
        &mut self,
        chain: RowId,
        residue: &ResidueDocument,
    ) -> FunpdbeResult<RowId> {
        let id = self.tables.next_id();
        self.tables
            .rows
            .residues
            .push(ResidueRow::new(id, chain, residue));
        Ok(id)
    }

    async fn insert_site_data(
        &mut self,
        residue: RowId,
        site_data: &SiteDataDocument,
    ) -> FunpdbeResult<RowId> {
        let id = self.tables.next_id();
        self.tables
            .rows
            .site_data
            .push(SiteDataRow::new(id, residue, site_data));
        Ok(id)
    }
}

/// Row counts per table, used to observe cascades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub entries: usize,
    pub sites: usize,
    pub evidence_codes: usize,
    pub chains: usize,
    pub residues: usize,
    pub site_data: usize,
}

impl TableCounts {
    pub fn total(&self) -> usize {
        self.entries + self.sites + self.evidence_codes + self.chains + self.residues + self.site_data
    }
}

/// Process-local store for tests and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counts(&self) -> TableCounts {
        let tables = self.tables.read().await;
        TableCounts {
            entries: tables.rows.entries.len(),
            sites: tables.rows.sites.len(),
            evidence_codes: tables.rows.evidence_codes.len(),
            chains: tables.rows.chains.len(),
            residues: tables.rows.residues.len(),
            site_data: tables.rows.site_data.len(),
        }
    }

    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

fn record(pk: EntryPk, document: &EntryDocument, owner: &str) -> EntryRecord {
    EntryRecord {
        pk,
        document: document.clone(),
        owner: owner.to_string(),
    }
}

#[async_trait]
impl DepositionStore for InMemoryStore {
    async fn create_entry(
        &self,
        document: &EntryDocument,
        owner: &str,
    ) -> FunpdbeResult<EntryRecord> {
        let mut tables = self.tables.write().await;
        let mut writer = StagedWriter {
            tables: tables.clone(),
        };
        let pk = persist_document(&mut writer, document, owner).await?;
        *tables = writer.tables;
        Ok(record(pk, document, owner))
    }

    async fn find_entries(&self, filter: &EntryFilter) -> FunpdbeResult<Vec<EntryRecord>> {
        let tables = self.tables.read().await;
        let ids = tables.entry_ids(filter);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = tables.select(&ids);
        drop(tables);
        hydrate(rows)
    }

    async fn delete_entries(&self, resource: &str, pdb_id: &PdbId) -> FunpdbeResult<u64> {
        let mut tables = self.tables.write().await;
        let ids = tables.entry_ids(&EntryFilter::by_resource_and_pdb(resource, pdb_id.clone()));
        tables.cascade_delete(&ids);
        Ok(ids.len() as u64)
    }

    async fn replace_entry(
        &self,
        resource: &str,
        pdb_id: &PdbId,
        document: &EntryDocument,
        owner: &str,
    ) -> FunpdbeResult<EntryRecord> {
        let mut tables = self.tables.write().await;
        let ids = tables.entry_ids(&EntryFilter::by_resource_and_pdb(resource, pdb_id.clone()));
        if ids.is_empty() {
            return Err(DepositionError::NoEntries {
                resource: Some(resource.to_string()),
                pdb_id: Some(pdb_id.to_string()),
            }
            .into());
        }

        let mut staged = tables.clone();
        staged.cascade_delete(&ids);
        let mut writer = StagedWriter { tables: staged };
        let pk = persist_document(&mut writer, document, owner).await?;
        *tables = writer.tables;
        Ok(record(pk, document, owner))
    }

    async fn entry_ids_by_owner(&self, owner: &str) -> FunpdbeResult<Vec<EntryPk>> {
        let tables = self.tables.read().await;
        let mut ids: Vec<EntryPk> = tables
            .rows
            .entries
            .iter()
            .filter(|e| e.owner == owner)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn health_check(&self) -> FunpdbeResult<()> {
        Ok(())
    }
}
