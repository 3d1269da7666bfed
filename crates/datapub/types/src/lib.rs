//! Datapub core types - the shared vocabulary of the publication workflow.
//!
//! Everything that crosses a crate boundary lives here: the DOI identifier,
//! the host-platform entity snapshot, the publication lifecycle states, the
//! acting-user context, and the error taxonomy with its internal/external
//! message boundary.

#![deny(unsafe_code)]

mod error;

pub use error::{sanitize_backend_detail, PublicationError, PublicationResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A persistent identifier of the form `prefix/suffix`.
///
/// The prefix identifies the registrant (e.g. `10.5678`), the suffix the
/// individual record. Both halves are opaque beyond being non-empty; the
/// split happens at the first `/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Doi {
    pub prefix: String,
    pub suffix: String,
}

impl Doi {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.suffix)
    }
}

/// Failure to parse a DOI string.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DoiParseError {
    #[error("identifier has no suffix: {0}")]
    MissingSuffix(String),

    #[error("identifier has an empty prefix")]
    EmptyPrefix,

    #[error("identifier has an empty suffix")]
    EmptySuffix,
}

impl FromStr for Doi {
    type Err = DoiParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((prefix, suffix)) = s.split_once('/') else {
            return Err(DoiParseError::MissingSuffix(s.to_string()));
        };
        if prefix.trim().is_empty() {
            return Err(DoiParseError::EmptyPrefix);
        }
        if suffix.trim().is_empty() {
            return Err(DoiParseError::EmptySuffix);
        }
        Ok(Doi::new(prefix, suffix))
    }
}

/// Kind of publishable entity. A dataset and each of its resources carry
/// independent lifecycles and independent DOIs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Dataset,
    Resource,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Dataset => "dataset",
            EntityKind::Resource => "resource",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publication lifecycle state. An entity with no workflow started carries
/// no state at all (`Option<PublicationState>` on [`Entity`]).
///
/// Transitions only move forward: `Pending → Approved → Published`, with the
/// manual-finish bypass jumping straight to `Published`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    /// DOI reserved in the ledger, awaiting admin approval.
    Pending,
    /// Approved by an admin, eligible for external registration.
    Approved,
    /// Registered (or manually finished) with the external service.
    Published,
}

impl PublicationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationState::Pending => "pending",
            PublicationState::Approved => "approved",
            PublicationState::Published => "published",
        }
    }
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-platform record of a dataset or resource, reduced to the fields the
/// workflow reads and writes. The platform owns the full record; the state
/// machine mutates `doi`, `publication_state` and `private` only as part of
/// a single persisted transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    /// Raw DOI field as stored by the host platform. Admins may type a
    /// custom identifier here, so it is validated (not trusted) on every
    /// workflow transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_state: Option<PublicationState>,
    pub private: bool,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    /// Owning dataset slug, present for resources only. Resource landing
    /// pages live under their dataset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_dataset: Option<String>,
}

impl Entity {
    /// Whether `actor` may still edit the DOI field by hand: sysadmins
    /// always, everyone else only while no workflow has started.
    pub fn doi_editable(&self, actor: &Actor) -> bool {
        actor.sysadmin || self.publication_state.is_none()
    }
}

/// The acting user, resolved by the host platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub sysadmin: bool,
}

/// Explicit per-request context threaded through every workflow operation.
/// There is no ambient user identity anywhere in this system.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub actor: Actor,
}

impl RequestContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }
}

/// The set of DOI prefixes this installation may mint or approve: the
/// configured default plus admin-approved custom prefixes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrefixAllowList {
    pub default_prefix: String,
    #[serde(default)]
    pub custom_prefixes: Vec<String>,
}

impl PrefixAllowList {
    pub fn new(default_prefix: impl Into<String>, custom_prefixes: Vec<String>) -> Self {
        Self {
            default_prefix: default_prefix.into(),
            custom_prefixes,
        }
    }

    pub fn allows(&self, prefix: &str) -> bool {
        self.default_prefix == prefix || self.custom_prefixes.iter().any(|p| p == prefix)
    }
}

/// Uniform result of an action-surface call, serialized back to the host
/// platform. Raw errors never cross this boundary; `error` carries the
/// sanitized external message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<PublicationResult<()>> for ActionOutcome {
    fn from(result: PublicationResult<()>) -> Self {
        match result {
            Ok(()) => ActionOutcome::ok(),
            Err(err) => ActionOutcome::failed(err.external_message()),
        }
    }
}
