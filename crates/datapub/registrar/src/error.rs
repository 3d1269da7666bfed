use thiserror::Error;

/// Result type for registrar operations.
pub type RegistrarResult<T> = Result<T, RegistrarError>;

/// Registration-client errors.
///
/// No variant is retried here; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum RegistrarError {
    /// The DOI is registered, but not to this entity.
    #[error("DOI is registered to a different entity: {0}")]
    OwnershipMismatch(String),

    /// Exported metadata failed schema validation; no network call was made.
    #[error("metadata validation failed: {0}")]
    MetadataValidation(String),

    /// The metadata converter itself failed.
    #[error("metadata export failed: {0}")]
    Metadata(String),

    /// The registration service answered with a non-success status.
    #[error("registration service returned {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-level failure (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered 2xx but the body was not what we expect.
    #[error("unexpected response payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for RegistrarError {
    fn from(err: reqwest::Error) -> Self {
        RegistrarError::Transport(err.to_string())
    }
}

impl From<RegistrarError> for datapub_types::PublicationError {
    fn from(value: RegistrarError) -> Self {
        use datapub_types::PublicationError;
        match value {
            RegistrarError::OwnershipMismatch(msg) => PublicationError::InvalidDoi(msg),
            RegistrarError::MetadataValidation(msg) => {
                PublicationError::MetadataValidation(msg)
            }
            RegistrarError::Http { status, body } => {
                PublicationError::Registration { status, body }
            }
            // No HTTP response was received; status 0 marks a transport-level
            // registration failure.
            RegistrarError::Transport(msg) => PublicationError::Registration {
                status: 0,
                body: msg,
            },
            RegistrarError::Metadata(msg) | RegistrarError::Payload(msg) => {
                PublicationError::Internal(msg)
            }
        }
    }
}
