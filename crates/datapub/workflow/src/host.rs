//! Contracts against the host platform.
//!
//! The content-management platform owns entity storage, the permission
//! engine, the activity log and mail delivery. This module defines the
//! narrow slices the workflow consumes; nothing here is reimplemented.

use crate::notify::Recipient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datapub_types::{Actor, Entity};
use thiserror::Error;

/// Failure inside a host-platform facility.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("host platform error: {0}")]
    Backend(String),
}

/// What a change-history event meant to the workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// The entity's publication was requested (DOI reservation).
    PublicationRequested,
    /// Anything else the platform logged.
    Other,
}

/// One entry of the entity's change history, as recorded by the platform's
/// activity log.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub actor: Actor,
    pub kind: ChangeKind,
    pub at: DateTime<Utc>,
}

/// The platform's entity record store and activity log.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch the entity by id or slug.
    async fn show(&self, id: &str) -> Result<Entity, HostError>;

    /// Persist the entity record. Called exactly once per transition.
    async fn update(&self, entity: &Entity) -> Result<(), HostError>;

    /// The entity's change history, newest first.
    async fn change_history(&self, entity_id: &str) -> Result<Vec<ChangeEvent>, HostError>;

    /// Resolve a platform user for notification purposes.
    async fn user(&self, user_id: &str) -> Result<Option<Actor>, HostError>;
}

/// The platform's permission engine.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether `actor` holds update permission on the entity.
    async fn can_update(&self, actor: &Actor, entity_id: &str) -> Result<bool, HostError>;
}

/// Failure to hand a message to the platform's mail facility.
#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// The platform's outbound mail facility. Delivery mechanics (SMTP, queues)
/// stay on the platform side.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &Recipient, subject: &str, body: &str)
        -> Result<(), MailError>;
}
