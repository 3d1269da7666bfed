use chrono::{DateTime, Utc};
use datapub_types::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the identifier ledger. Rows are inserted at reservation time
/// and never updated or deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub prefix: String,
    pub suffix: String,
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub entity_name: String,
    pub owner_user: String,
    pub site_id: String,
    /// Metadata snapshot captured at minting time. Reservations store the
    /// placeholder `"pending"` until registration supplies the real record.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Parameters for reserving a DOI.
#[derive(Clone, Debug)]
pub struct ReserveRequest {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub entity_name: String,
    pub owner_user: String,
    pub prefix: String,
    /// Explicit suffix for the admin custom-DOI path; `None` lets the
    /// configured minter allocate one.
    pub suffix: Option<String>,
    pub metadata: Option<Value>,
}
