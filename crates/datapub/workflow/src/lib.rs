//! Datapub publication workflow.
//!
//! Orchestrates the DOI lifecycle for datasets and resources: reserving an
//! identifier through the ledger, walking the entity through the
//! pending/approved/published states, registering metadata with DataCite,
//! and notifying the people involved at each transition. The host platform
//! is abstracted behind the traits in [`host`]; in-memory doubles for all
//! of them live in [`memory`].

#![deny(unsafe_code)]

mod actions;
pub mod config;
pub mod host;
mod machine;
pub mod memory;
pub mod notify;

pub use actions::PublicationActions;
pub use config::WorkflowConfig;
pub use host::{Authorizer, ChangeEvent, ChangeKind, EntityStore, HostError, MailError, Mailer};
pub use machine::PublicationWorkflow;
pub use notify::{NotificationDispatcher, Recipient, Transition};
