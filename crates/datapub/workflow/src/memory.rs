//! In-memory host-platform adapters.
//!
//! Deterministic stand-ins for the platform's entity store, permission
//! engine and mailer. They back the workflow tests and any embedding that
//! wants to run the lifecycle without a live platform. Every lock access,
//! helper and trait impl alike, recovers a poisoned lock instead of
//! panicking or erroring; a test that panicked mid-write must not wedge
//! the assertions that follow.

use crate::host::{Authorizer, ChangeEvent, EntityStore, HostError, MailError, Mailer};
use crate::notify::Recipient;
use async_trait::async_trait;
use datapub_types::{Actor, Entity};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory entity store with an explicit change history.
#[derive(Default)]
pub struct InMemoryEntityStore {
    entities: RwLock<HashMap<String, Entity>>,
    history: RwLock<HashMap<String, Vec<ChangeEvent>>>,
    users: RwLock<HashMap<String, Actor>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_entity(&self, entity: Entity) {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity.id.clone(), entity);
    }

    pub fn insert_user(&self, actor: Actor) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(actor.user_id.clone(), actor);
    }

    /// Append a change event, newest first.
    pub fn record_change(&self, entity_id: &str, event: ChangeEvent) {
        self.history
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity_id.to_string())
            .or_default()
            .insert(0, event);
    }

    /// Current snapshot of an entity, for assertions.
    pub fn get(&self, id: &str) -> Option<Entity> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn show(&self, id: &str) -> Result<Entity, HostError> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| HostError::NotFound(id.to_string()))
    }

    async fn update(&self, entity: &Entity) -> Result<(), HostError> {
        let mut guard = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        if !guard.contains_key(&entity.id) {
            return Err(HostError::NotFound(entity.id.clone()));
        }
        guard.insert(entity.id.clone(), entity.clone());
        Ok(())
    }

    async fn change_history(&self, entity_id: &str) -> Result<Vec<ChangeEvent>, HostError> {
        Ok(self
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn user(&self, user_id: &str) -> Result<Option<Actor>, HostError> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned())
    }
}

/// Permission engine double with a fixed answer.
pub struct StaticAuthorizer {
    allow: bool,
}

impl StaticAuthorizer {
    pub fn allow_all() -> Self {
        Self { allow: true }
    }

    pub fn deny_all() -> Self {
        Self { allow: false }
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn can_update(&self, _actor: &Actor, _entity_id: &str) -> Result<bool, HostError> {
        Ok(self.allow)
    }
}

/// A message handed to the recording mailer.
#[derive(Clone, Debug)]
pub struct SentMail {
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
}

/// Mailer double that records every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: RwLock<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        self.sent
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMail {
                recipient: recipient.clone(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapub_types::EntityKind;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn entity(id: &str) -> Entity {
        Entity {
            id: id.to_string(),
            name: format!("{id}-name"),
            kind: EntityKind::Dataset,
            doi: None,
            publication_state: None,
            private: true,
            owner_id: "owner-1".to_string(),
            contact_email: None,
            parent_dataset: None,
        }
    }

    #[tokio::test]
    async fn entity_store_survives_a_poisoned_lock() {
        let store = InMemoryEntityStore::new();
        store.insert_entity(entity("abc"));

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.entities.write().unwrap_or_else(PoisonError::into_inner);
            panic!("holder panics mid-write");
        }));
        assert!(result.is_err());

        assert!(store.get("abc").is_some());
        store.insert_entity(entity("def"));
        assert!(store.show("def").await.is_ok());
    }

    #[tokio::test]
    async fn mailer_survives_a_poisoned_lock() {
        let mailer = RecordingMailer::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = mailer.sent.write().unwrap_or_else(PoisonError::into_inner);
            panic!("holder panics mid-write");
        }));
        assert!(result.is_err());

        mailer
            .send(
                &Recipient::new("Someone", "someone@example.org"),
                "subject",
                "body",
            )
            .await
            .unwrap();
        assert_eq!(mailer.sent().len(), 1);
    }
}
