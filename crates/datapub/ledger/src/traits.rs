use crate::model::LedgerRecord;
use crate::StoreResult;
use async_trait::async_trait;
use datapub_types::EntityKind;

/// Storage interface for the append-only identifier ledger.
///
/// Adapters must enforce two uniqueness invariants on insert, atomically
/// with respect to concurrent inserts:
/// - `(prefix, suffix)` is globally unique;
/// - `(site_id, entity_kind, entity_id)` maps to at most one record.
///
/// A violated invariant surfaces as [`crate::StoreError::Conflict`]. The
/// facade's read-before-insert checks are an early exit, not the guarantee;
/// the race between check and insert is closed here.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert one ledger row.
    async fn insert(&self, record: LedgerRecord) -> StoreResult<()>;

    /// Look up the record for an entity, if any.
    async fn find_by_entity(
        &self,
        site_id: &str,
        entity_kind: EntityKind,
        entity_id: &str,
    ) -> StoreResult<Option<LedgerRecord>>;

    /// Look up a record by its identifier pair.
    async fn find_by_identifier(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> StoreResult<Option<LedgerRecord>>;
}
