use thiserror::Error;

/// Result type for raw store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Which uniqueness invariant a losing insert violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictScope {
    /// The `(prefix, suffix)` pair is already minted.
    Identifier,
    /// The entity already has a ledger record.
    Entity,
}

/// Storage-adapter errors, below the ledger facade.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {detail}")]
    Conflict {
        scope: ConflictScope,
        detail: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for ledger-facade operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-facade errors, as seen by the publication workflow.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The entity already has a ledger record; carries the existing DOI.
    #[error("entity already has a DOI: {0}")]
    AlreadyPublished(String),

    /// The requested (prefix, suffix) pair is already taken.
    #[error("identifier already exists: {0}")]
    AlreadyExists(String),

    #[error("ledger backend error: {0}")]
    Backend(String),
}

impl From<LedgerError> for datapub_types::PublicationError {
    fn from(value: LedgerError) -> Self {
        use datapub_types::PublicationError;
        match value {
            LedgerError::AlreadyPublished(doi) => PublicationError::AlreadyPublished(doi),
            LedgerError::AlreadyExists(id) => PublicationError::AlreadyExists(id),
            LedgerError::Backend(msg) => PublicationError::Internal(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict {
                scope: ConflictScope::Identifier,
                detail,
            } => LedgerError::AlreadyExists(detail),
            // The facade resolves the existing DOI before this fallback.
            StoreError::Conflict {
                scope: ConflictScope::Entity,
                detail,
            } => LedgerError::AlreadyPublished(detail),
            StoreError::NotFound(msg)
            | StoreError::Serialization(msg)
            | StoreError::Backend(msg) => LedgerError::Backend(msg),
        }
    }
}
