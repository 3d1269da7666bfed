//! In-memory ledger adapter.
//!
//! Deterministic and test-friendly. Both uniqueness checks and the insert
//! happen under one write lock, giving the same at-most-once semantics the
//! postgres adapter gets from its UNIQUE constraints.

use crate::model::LedgerRecord;
use crate::traits::LedgerStore;
use crate::{ConflictScope, StoreError, StoreResult};
use async_trait::async_trait;
use datapub_types::EntityKind;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory ledger adapter.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    // keyed by (prefix, suffix)
    records: RwLock<HashMap<(String, String), LedgerRecord>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows held, for test assertions.
    pub fn len(&self) -> usize {
        self.records.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert(&self, record: LedgerRecord) -> StoreResult<()> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::Backend("ledger lock poisoned".to_string()))?;

        let key = (record.prefix.clone(), record.suffix.clone());
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict {
                scope: ConflictScope::Identifier,
                detail: format!(
                    "identifier {}/{} already minted",
                    record.prefix, record.suffix
                ),
            });
        }

        let entity_taken = guard.values().any(|r| {
            r.site_id == record.site_id
                && r.entity_kind == record.entity_kind
                && r.entity_id == record.entity_id
        });
        if entity_taken {
            return Err(StoreError::Conflict {
                scope: ConflictScope::Entity,
                detail: format!(
                    "{} {} already has a ledger record",
                    record.entity_kind, record.entity_id
                ),
            });
        }

        guard.insert(key, record);
        Ok(())
    }

    async fn find_by_entity(
        &self,
        site_id: &str,
        entity_kind: EntityKind,
        entity_id: &str,
    ) -> StoreResult<Option<LedgerRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("ledger lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .find(|r| {
                r.site_id == site_id && r.entity_kind == entity_kind && r.entity_id == entity_id
            })
            .cloned())
    }

    async fn find_by_identifier(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> StoreResult<Option<LedgerRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("ledger lock poisoned".to_string()))?;
        Ok(guard.get(&(prefix.to_string(), suffix.to_string())).cloned())
    }
}
