use async_trait::async_trait;
use datapub_types::EntityKind;
use thiserror::Error;

/// Failure inside the host platform's metadata converter.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MetadataError(pub String);

/// The host platform's metadata export/validate facility, consumed as a
/// black box. Export produces a DataCite XML record for an entity;
/// validation is a pass/fail check against the schema.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn export(&self, entity_id: &str, kind: EntityKind) -> Result<String, MetadataError>;

    async fn validate(&self, record: &str) -> Result<bool, MetadataError>;
}
