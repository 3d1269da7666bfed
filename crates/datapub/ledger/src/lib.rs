//! Datapub identifier ledger - the durable record of minted DOIs.
//!
//! The ledger is the source of truth for "already minted" checks: one row
//! per reserved identifier, appended at reservation time and never updated
//! or deleted. [`IdentifierLedger`] is the workflow-facing facade; it owns
//! the configured suffix minter and delegates persistence to a
//! [`LedgerStore`] adapter (in-memory for tests, PostgreSQL in production).

#![deny(unsafe_code)]

mod error;
pub mod memory;
mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{ConflictScope, LedgerError, LedgerResult, StoreError, StoreResult};
pub use model::{LedgerRecord, ReserveRequest};
pub use traits::LedgerStore;

use chrono::Utc;
use datapub_minter::SuffixMinter;
use datapub_types::{Doi, EntityKind};
use std::sync::Arc;

/// Workflow-facing ledger facade.
///
/// Guarantees a DOI is minted at most once per entity and that a suffix is
/// never reused within a prefix. The early read checks give precise errors;
/// the store's own uniqueness enforcement closes the concurrent race.
pub struct IdentifierLedger {
    store: Arc<dyn LedgerStore>,
    minter: Arc<dyn SuffixMinter>,
    site_id: String,
}

impl IdentifierLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        minter: Arc<dyn SuffixMinter>,
        site_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            minter,
            site_id: site_id.into(),
        }
    }

    /// Reserve a DOI for an entity, inserting exactly one ledger row.
    ///
    /// With an explicit suffix (admin custom-DOI path) the pair must be
    /// unused; without one the minter allocates a suffix. An entity that
    /// already has a record is rejected with its existing DOI.
    pub async fn reserve(&self, req: ReserveRequest) -> LedgerResult<Doi> {
        if let Some(existing) = self
            .store
            .find_by_entity(&self.site_id, req.entity_kind, &req.entity_id)
            .await?
        {
            let doi = Doi::new(existing.prefix, existing.suffix);
            return Err(LedgerError::AlreadyPublished(doi.to_string()));
        }

        if let Some(ref suffix) = req.suffix {
            if self
                .store
                .find_by_identifier(&req.prefix, suffix)
                .await?
                .is_some()
            {
                return Err(LedgerError::AlreadyExists(format!(
                    "{}/{}",
                    req.prefix, suffix
                )));
            }
        }

        let suffix = match req.suffix {
            Some(suffix) => suffix,
            None => self.minter.allocate(&req.prefix),
        };

        let record = LedgerRecord {
            prefix: req.prefix.clone(),
            suffix: suffix.clone(),
            entity_id: req.entity_id.clone(),
            entity_kind: req.entity_kind,
            entity_name: req.entity_name,
            owner_user: req.owner_user,
            site_id: self.site_id.clone(),
            metadata: req
                .metadata
                .unwrap_or_else(|| serde_json::Value::String("pending".to_string())),
            created_at: Utc::now(),
        };
        if let Err(err) = self.store.insert(record).await {
            // A reservation that lost the entity race gets the same answer
            // the early check gives: the winner's DOI.
            if matches!(
                err,
                StoreError::Conflict {
                    scope: ConflictScope::Entity,
                    ..
                }
            ) {
                if let Some(winner) = self
                    .store
                    .find_by_entity(&self.site_id, req.entity_kind, &req.entity_id)
                    .await?
                {
                    let doi = Doi::new(winner.prefix, winner.suffix);
                    return Err(LedgerError::AlreadyPublished(doi.to_string()));
                }
            }
            return Err(err.into());
        }

        let doi = Doi::new(req.prefix, suffix);
        tracing::info!(
            entity_id = %req.entity_id,
            entity_kind = %req.entity_kind,
            doi = %doi,
            "DOI reserved"
        );
        Ok(doi)
    }

    /// Whether an entity already has a minted DOI, and which one.
    pub async fn is_registered(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
    ) -> LedgerResult<Option<Doi>> {
        let record = self
            .store
            .find_by_entity(&self.site_id, entity_kind, entity_id)
            .await?;
        Ok(record.map(|r| Doi::new(r.prefix, r.suffix)))
    }

    /// Whether an arbitrary (prefix, suffix) pair is already taken. Used to
    /// vet admin-supplied custom identifiers.
    pub async fn identifier_exists(&self, prefix: &str, suffix: &str) -> LedgerResult<bool> {
        Ok(self
            .store
            .find_by_identifier(prefix, suffix)
            .await?
            .is_some())
    }
}
