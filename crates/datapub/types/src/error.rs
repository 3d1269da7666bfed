use thiserror::Error;

/// Result type for workflow operations.
pub type PublicationResult<T> = Result<T, PublicationError>;

/// Everything that can go wrong across the publication workflow.
///
/// All lower layers (ledger, registrar, host platform) are mapped into this
/// taxonomy at the state-machine boundary; nothing below it escapes to the
/// transport layer as a raw error.
#[derive(Debug, Error)]
pub enum PublicationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authorized")]
    NotAuthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("entity already has a DOI: {0}")]
    AlreadyPublished(String),

    #[error("identifier already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("registration failed with status {status}: {body}")]
    Registration { status: u16, body: String },

    #[error("metadata validation failed: {0}")]
    MetadataValidation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PublicationError {
    /// The caller-visible rendering of this error.
    ///
    /// Internal errors collapse to a generic message; everything else is
    /// stripped of storage-engine diagnostics before leaving the core. Full
    /// detail stays in the server-side logs.
    pub fn external_message(&self) -> String {
        match self {
            PublicationError::Internal(_) => {
                "Internal error, please contact the portal administrator".to_string()
            }
            PublicationError::NotAuthorized => "Not authorized".to_string(),
            other => sanitize_backend_detail(&other.to_string()),
        }
    }
}

/// Truncate a message at the storage engine's own diagnostic marker.
///
/// Postgres appends a `DETAIL:` section naming constraint internals; that
/// never belongs in an end-user message.
pub fn sanitize_backend_detail(message: &str) -> String {
    match message.find("DETAIL") {
        Some(idx) => message[..idx].trim_end().to_string(),
        None => message.to_string(),
    }
}
