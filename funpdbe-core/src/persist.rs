//! Cascading persister
//!
//! A document is written top-down: the Entry row first, then its sites,
//! evidence codes and chains, each chain followed by its residues and each
//! residue by its site data. Sibling order follows the input arrays.
//!
//! Atomicity belongs to the writer. Every store hands the walk a writer bound
//! to one transaction and discards it when the walk returns an error.

use crate::document::{
    ChainDocument, EntryDocument, EvidenceCodeOntologyDocument, ResidueDocument, SiteDataDocument,
    SiteDocument,
};
use crate::error::FunpdbeResult;
use crate::identity::RowId;
use crate::validate::{check_field_limits, check_principal};
use async_trait::async_trait;

/// One insert per tree level. Each call receives the full level record but
/// persists only its scalar fields; children arrive through later calls.
#[async_trait]
pub trait TreeWriter: Send {
    /// Insert the root row. Must report `DuplicateEntry` when the
    /// (pdb_id, data_resource) pair already exists.
    async fn insert_entry(&mut self, entry: &EntryDocument, owner: &str) -> FunpdbeResult<RowId>;

    async fn insert_site(&mut self, entry: RowId, site: &SiteDocument) -> FunpdbeResult<RowId>;

    async fn insert_evidence_code(
        &mut self,
        entry: RowId,
        eco: &EvidenceCodeOntologyDocument,
    ) -> FunpdbeResult<RowId>;

    async fn insert_chain(&mut self, entry: RowId, chain: &ChainDocument) -> FunpdbeResult<RowId>;

    async fn insert_residue(
        &mut self,
        chain: RowId,
        residue: &ResidueDocument,
    ) -> FunpdbeResult<RowId>;

    async fn insert_site_data(
        &mut self,
        residue: RowId,
        site_data: &SiteDataDocument,
    ) -> FunpdbeResult<RowId>;
}

/// Materialize `document` through `writer`, returning the new entry key.
///
/// Text the schema cannot hold is rejected before the first insert. Stops at
/// the first failing insert; the caller must then abandon the writer's
/// transaction.
pub async fn persist_document<W>(
    writer: &mut W,
    document: &EntryDocument,
    owner: &str,
) -> FunpdbeResult<RowId>
where
    W: TreeWriter + ?Sized,
{
    check_field_limits(document)?;
    check_principal(owner)?;

    let entry = writer.insert_entry(document, owner).await?;

    for site in &document.sites {
        writer.insert_site(entry, site).await?;
    }

    for eco in &document.evidence_code_ontology {
        writer.insert_evidence_code(entry, eco).await?;
    }

    for chain in &document.chains {
        let chain_id = writer.insert_chain(entry, chain).await?;
        for residue in &chain.residues {
            let residue_id = writer.insert_residue(chain_id, residue).await?;
            for site_data in &residue.site_data {
                writer.insert_site_data(residue_id, site_data).await?;
            }
        }
    }

    Ok(entry)
}
