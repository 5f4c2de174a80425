//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, plus the Postgres
//! implementations of [`DepositionStore`] and [`MembershipDirectory`].
//!
//! Every write runs in one transaction. The persister walk is driven through
//! [`PgTreeWriter`], which owns the transaction and is committed only after
//! the walk succeeds; dropping it on any error path rolls everything back.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Transaction,
};
use funpdbe_core::{
    hydrate, persist_document, ChainDocument, ChainRow, DepositionError, EntryDocument,
    EntryFilter, EntryPk, EntryRecord, EntryRow, EvidenceCodeOntologyDocument, EvidenceCodeRow,
    FunpdbeError, FunpdbeResult, MembershipDirectory, PdbId, ResidueDocument, ResidueRow, RowId,
    SiteDataDocument, SiteDataRow, SiteDocument, SiteRow, StorageError, TreeRows, TreeWriter,
};
use funpdbe_storage::{DepositionStore, StaticDirectory};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{IsolationLevel, NoTls, Row};

/// Schema for the deposition tables and group memberships. Idempotent.
pub const SCHEMA_SQL: &str = include_str!("../migrations/0001_deposition.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// How long a request waits for a free connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "funpdbe".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("FUNPDBE_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("FUNPDBE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("FUNPDBE_DB_NAME").unwrap_or_else(|_| "funpdbe".to_string()),
            user: std::env::var("FUNPDBE_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("FUNPDBE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("FUNPDBE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("FUNPDBE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// ERROR TRANSLATION
// ============================================================================

fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .is_some_and(|db_error| db_error.code() == &SqlState::UNIQUE_VIOLATION)
}

/// SQLSTATE class 22: a value the column cannot hold.
fn is_data_exception(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .is_some_and(|db_error| db_error.code().code().starts_with("22"))
}

/// Insert failures that describe the document rather than the database.
fn insert_failed(err: tokio_postgres::Error) -> FunpdbeError {
    if is_data_exception(&err) {
        tracing::warn!("Rejected document value: {:?}", err);
        let reason = err
            .as_db_error()
            .map(|db_error| db_error.message().to_string())
            .unwrap_or_else(|| err.to_string());
        return DepositionError::MalformedDocument { reason }.into();
    }
    query_failed(err)
}

fn query_failed(err: tokio_postgres::Error) -> FunpdbeError {
    tracing::error!("Database error: {:?}", err);
    StorageError::QueryFailed {
        reason: err.to_string(),
    }
    .into()
}

fn transaction_failed(err: tokio_postgres::Error) -> FunpdbeError {
    tracing::error!("Transaction error: {:?}", err);
    StorageError::TransactionFailed {
        reason: err.to_string(),
    }
    .into()
}

fn pool_unavailable(err: PoolError) -> FunpdbeError {
    tracing::error!("Connection pool error: {:?}", err);
    StorageError::Unavailable {
        reason: err.to_string(),
    }
    .into()
}

// ============================================================================
// TREE WRITER
// ============================================================================

/// Persister sink bound to one open transaction.
pub struct PgTreeWriter<'a> {
    tx: Transaction<'a>,
}

impl<'a> PgTreeWriter<'a> {
    pub fn new(tx: Transaction<'a>) -> Self {
        Self { tx }
    }

    pub async fn commit(self) -> FunpdbeResult<()> {
        self.tx.commit().await.map_err(transaction_failed)
    }

    async fn insert_returning_id(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> FunpdbeResult<RowId> {
        let stmt = self.tx.prepare_cached(sql).await.map_err(query_failed)?;
        let row = self.tx.query_one(&stmt, params).await.map_err(insert_failed)?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl TreeWriter for PgTreeWriter<'_> {
    async fn insert_entry(&mut self, entry: &EntryDocument, owner: &str) -> FunpdbeResult<RowId> {
        let stmt = self
            .tx
            .prepare_cached(
                "INSERT INTO entries (pdb_id, data_resource, resource_version, software_version, \
                 resource_entry_url, release_date, owner) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            )
            .await
            .map_err(query_failed)?;

        let result = self
            .tx
            .query_one(
                &stmt,
                &[
                    &entry.pdb_id.as_str(),
                    &entry.data_resource,
                    &entry.resource_version,
                    &entry.software_version,
                    &entry.resource_entry_url,
                    &entry.release_date,
                    &owner,
                ],
            )
            .await;

        match result {
            Ok(row) => Ok(row.get(0)),
            Err(e) if is_unique_violation(&e) => Err(DepositionError::DuplicateEntry {
                resource: entry.data_resource.clone(),
                pdb_id: entry.pdb_id.to_string(),
            }
            .into()),
            Err(e) => Err(insert_failed(e)),
        }
    }

    async fn insert_site(&mut self, entry: RowId, site: &SiteDocument) -> FunpdbeResult<RowId> {
        self.insert_returning_id(
            "INSERT INTO sites (entry_id, site_id, label, source_database, source_accession, \
             source_release_date) VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            &[
                &entry,
                &site.site_id,
                &site.label,
                &site.source_database,
                &site.source_accession,
                &site.source_release_date,
            ],
        )
        .await
    }

    async fn insert_evidence_code(
        &mut self,
        entry: RowId,
        eco: &EvidenceCodeOntologyDocument,
    ) -> FunpdbeResult<RowId> {
        self.insert_returning_id(
            "INSERT INTO evidence_code_ontology (entry_id, eco_term, eco_code) \
             VALUES ($1, $2, $3) RETURNING id",
            &[&entry, &eco.eco_term, &eco.eco_code],
        )
        .await
    }

    async fn insert_chain(&mut self, entry: RowId, chain: &ChainDocument) -> FunpdbeResult<RowId> {
        self.insert_returning_id(
            "INSERT INTO chains (entry_id, chain_label, chain_annotation) \
             VALUES ($1, $2, $3) RETURNING id",
            &[&entry, &chain.chain_label, &chain.chain_annotation],
        )
        .await
    }

    async fn insert_residue(
        &mut self,
        chain: RowId,
        residue: &ResidueDocument,
    ) -> FunpdbeResult<RowId> {
        self.insert_returning_id(
            "INSERT INTO residues (chain_id, pdb_res_label, aa_type) \
             VALUES ($1, $2, $3) RETURNING id",
            &[&chain, &residue.pdb_res_label, &residue.aa_type],
        )
        .await
    }

    async fn insert_site_data(
        &mut self,
        residue: RowId,
        site_data: &SiteDataDocument,
    ) -> FunpdbeResult<RowId> {
        self.insert_returning_id(
            "INSERT INTO site_data (residue_id, site_id_ref, raw_score, confidence_score, \
             confidence_classification) VALUES ($1, $2, $3, $4, $5) RETURNING id",
            &[
                &residue,
                &site_data.site_id_ref,
                &site_data.raw_score,
                &site_data.confidence_score,
                &site_data.confidence_classification,
            ],
        )
        .await
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const ENTRY_COLUMNS: &str = "id, pdb_id, data_resource, resource_version, software_version, \
                             resource_entry_url, release_date, owner";

fn entry_row(row: &Row) -> EntryRow {
    EntryRow {
        id: row.get("id"),
        pdb_id: row.get("pdb_id"),
        data_resource: row.get("data_resource"),
        resource_version: row.get("resource_version"),
        software_version: row.get("software_version"),
        resource_entry_url: row.get("resource_entry_url"),
        release_date: row.get("release_date"),
        owner: row.get("owner"),
    }
}

fn site_row(row: &Row) -> SiteRow {
    SiteRow {
        id: row.get("id"),
        entry_id: row.get("entry_id"),
        site_id: row.get("site_id"),
        label: row.get("label"),
        source_database: row.get("source_database"),
        source_accession: row.get("source_accession"),
        source_release_date: row.get("source_release_date"),
    }
}

fn evidence_code_row(row: &Row) -> EvidenceCodeRow {
    EvidenceCodeRow {
        id: row.get("id"),
        entry_id: row.get("entry_id"),
        eco_term: row.get("eco_term"),
        eco_code: row.get("eco_code"),
    }
}

fn chain_row(row: &Row) -> ChainRow {
    ChainRow {
        id: row.get("id"),
        entry_id: row.get("entry_id"),
        chain_label: row.get("chain_label"),
        chain_annotation: row.get("chain_annotation"),
    }
}

fn residue_row(row: &Row) -> ResidueRow {
    ResidueRow {
        id: row.get("id"),
        chain_id: row.get("chain_id"),
        pdb_res_label: row.get("pdb_res_label"),
        aa_type: row.get("aa_type"),
    }
}

fn site_data_row(row: &Row) -> SiteDataRow {
    SiteDataRow {
        id: row.get("id"),
        residue_id: row.get("residue_id"),
        site_id_ref: row.get("site_id_ref"),
        raw_score: row.get("raw_score"),
        confidence_score: row.get("confidence_score"),
        confidence_classification: row.get("confidence_classification"),
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client that wraps a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        let status = self.pool.status();
        status.size
    }

    async fn get_conn(&self) -> FunpdbeResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_unavailable)
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> FunpdbeResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL).await.map_err(query_failed)?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    /// Copy static memberships into `group_memberships`. Existing rows are
    /// kept; nothing is removed.
    pub async fn seed_memberships(&self, directory: &StaticDirectory) -> FunpdbeResult<u64> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(transaction_failed)?;
        let stmt = tx
            .prepare_cached(
                "INSERT INTO group_memberships (principal, group_name) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .await
            .map_err(query_failed)?;

        let mut inserted = 0;
        for (principal, group) in directory.memberships() {
            inserted += tx
                .execute(&stmt, &[&principal, &group])
                .await
                .map_err(query_failed)?;
        }
        tx.commit().await.map_err(transaction_failed)?;

        tracing::info!(inserted, "Seeded group memberships");
        Ok(inserted)
    }

    /// Load the full trees rooted at the entries matching `filter`, from one
    /// consistent snapshot.
    async fn load_rows(&self, filter: &EntryFilter) -> FunpdbeResult<TreeRows> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(transaction_failed)?;

        let resource = filter.resource.as_deref();
        let pdb_id = filter.pdb_id.as_ref().map(PdbId::as_str);
        let sql = format!(
            "SELECT {} FROM entries \
             WHERE ($1::TEXT IS NULL OR data_resource = $1) \
               AND ($2::TEXT IS NULL OR pdb_id = $2) \
             ORDER BY id",
            ENTRY_COLUMNS
        );
        let entries: Vec<EntryRow> = tx
            .query(sql.as_str(), &[&resource, &pdb_id])
            .await
            .map_err(query_failed)?
            .iter()
            .map(entry_row)
            .collect();

        if entries.is_empty() {
            tx.commit().await.map_err(transaction_failed)?;
            return Ok(TreeRows::default());
        }

        let entry_ids: Vec<RowId> = entries.iter().map(|e| e.id).collect();

        let sites: Vec<SiteRow> = tx
            .query(
                "SELECT id, entry_id, site_id, label, source_database, source_accession, \
                 source_release_date FROM sites WHERE entry_id = ANY($1)",
                &[&entry_ids],
            )
            .await
            .map_err(query_failed)?
            .iter()
            .map(site_row)
            .collect();

        let evidence_codes: Vec<EvidenceCodeRow> = tx
            .query(
                "SELECT id, entry_id, eco_term, eco_code FROM evidence_code_ontology \
                 WHERE entry_id = ANY($1)",
                &[&entry_ids],
            )
            .await
            .map_err(query_failed)?
            .iter()
            .map(evidence_code_row)
            .collect();

        let chains: Vec<ChainRow> = tx
            .query(
                "SELECT id, entry_id, chain_label, chain_annotation FROM chains \
                 WHERE entry_id = ANY($1)",
                &[&entry_ids],
            )
            .await
            .map_err(query_failed)?
            .iter()
            .map(chain_row)
            .collect();

        let chain_ids: Vec<RowId> = chains.iter().map(|c| c.id).collect();
        let residues: Vec<ResidueRow> = tx
            .query(
                "SELECT id, chain_id, pdb_res_label, aa_type FROM residues \
                 WHERE chain_id = ANY($1)",
                &[&chain_ids],
            )
            .await
            .map_err(query_failed)?
            .iter()
            .map(residue_row)
            .collect();

        let residue_ids: Vec<RowId> = residues.iter().map(|r| r.id).collect();
        let site_data: Vec<SiteDataRow> = tx
            .query(
                "SELECT id, residue_id, site_id_ref, raw_score, confidence_score, \
                 confidence_classification FROM site_data WHERE residue_id = ANY($1)",
                &[&residue_ids],
            )
            .await
            .map_err(query_failed)?
            .iter()
            .map(site_data_row)
            .collect();

        tx.commit().await.map_err(transaction_failed)?;

        Ok(TreeRows {
            entries,
            sites,
            evidence_codes,
            chains,
            residues,
            site_data,
        })
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
impl DepositionStore for DbClient {
    async fn create_entry(
        &self,
        document: &EntryDocument,
        owner: &str,
    ) -> FunpdbeResult<EntryRecord> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(transaction_failed)?;

        let mut writer = PgTreeWriter::new(tx);
        let pk = persist_document(&mut writer, document, owner).await?;
        writer.commit().await?;

        Ok(record(pk, document, owner))
    }

    async fn find_entries(&self, filter: &EntryFilter) -> FunpdbeResult<Vec<EntryRecord>> {
        let rows = self.load_rows(filter).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        hydrate(rows)
    }

    async fn delete_entries(&self, resource: &str, pdb_id: &PdbId) -> FunpdbeResult<u64> {
        let conn = self.get_conn().await?;
        conn.execute(
            "DELETE FROM entries WHERE data_resource = $1 AND pdb_id = $2",
            &[&resource, &pdb_id.as_str()],
        )
        .await
        .map_err(query_failed)
    }

    async fn replace_entry(
        &self,
        resource: &str,
        pdb_id: &PdbId,
        document: &EntryDocument,
        owner: &str,
    ) -> FunpdbeResult<EntryRecord> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(transaction_failed)?;

        let existing: Vec<RowId> = tx
            .query(
                "SELECT id FROM entries WHERE data_resource = $1 AND pdb_id = $2 FOR UPDATE",
                &[&resource, &pdb_id.as_str()],
            )
            .await
            .map_err(query_failed)?
            .iter()
            .map(|row| row.get(0))
            .collect();

        if existing.is_empty() {
            return Err(DepositionError::NoEntries {
                resource: Some(resource.to_string()),
                pdb_id: Some(pdb_id.to_string()),
            }
            .into());
        }

        tx.execute("DELETE FROM entries WHERE id = ANY($1)", &[&existing])
            .await
            .map_err(query_failed)?;

        let mut writer = PgTreeWriter::new(tx);
        let pk = persist_document(&mut writer, document, owner).await?;
        writer.commit().await?;

        tracing::debug!(
            resource = %resource,
            pdb_id = %pdb_id,
            replaced = existing.len(),
            pk,
            "Replaced entry tree"
        );
        Ok(record(pk, document, owner))
    }

    async fn entry_ids_by_owner(&self, owner: &str) -> FunpdbeResult<Vec<EntryPk>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query("SELECT id FROM entries WHERE owner = $1 ORDER BY id", &[&owner])
            .await
            .map_err(query_failed)?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn health_check(&self) -> FunpdbeResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(query_failed)?;
        Ok(())
    }
}

#[async_trait]
impl MembershipDirectory for DbClient {
    async fn is_member(&self, principal: &str, group: &str) -> FunpdbeResult<bool> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM group_memberships \
                 WHERE principal = $1 AND group_name = $2)",
                &[&principal, &group],
            )
            .await
            .map_err(query_failed)?;
        Ok(row.get(0))
    }

    async fn groups_of(&self, principal: &str) -> FunpdbeResult<Vec<String>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT group_name FROM group_memberships WHERE principal = $1 \
                 ORDER BY group_name",
                &[&principal],
            )
            .await
            .map_err(query_failed)?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn principals(&self) -> FunpdbeResult<Vec<String>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT DISTINCT principal FROM group_memberships ORDER BY principal",
                &[],
            )
            .await
            .map_err(query_failed)?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }
}
