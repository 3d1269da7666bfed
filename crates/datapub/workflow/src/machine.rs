//! The publication state machine.
//!
//! Every transition loads the entity, validates authorization and the
//! current state, talks to the ledger or the registration client in the
//! right order, persists the new state in a single update, and finally
//! fires notifications. A transition that fails at any step leaves the
//! entity untouched.

use crate::config::WorkflowConfig;
use crate::host::{Authorizer, ChangeKind, EntityStore, HostError, Mailer};
use crate::notify::{NotificationDispatcher, Recipient, Transition};
use datapub_ledger::{IdentifierLedger, LedgerStore, ReserveRequest};
use datapub_minter::MinterRegistry;
use datapub_registrar::{RegistrationApi, RegistrationRequest};
use datapub_types::{
    Doi, DoiParseError, Entity, PublicationError, PublicationResult, PublicationState,
    RequestContext,
};
use std::sync::Arc;

/// Orchestrator for the DOI publication lifecycle.
///
/// Dataset and resource lifecycles are fully independent; approving a
/// dataset never cascades to its resources.
pub struct PublicationWorkflow {
    store: Arc<dyn EntityStore>,
    authorizer: Arc<dyn Authorizer>,
    ledger: IdentifierLedger,
    registrar: Arc<dyn RegistrationApi>,
    notifier: NotificationDispatcher,
    config: WorkflowConfig,
}

impl PublicationWorkflow {
    /// Wire the workflow with the built-in minter strategies.
    pub fn new(
        store: Arc<dyn EntityStore>,
        authorizer: Arc<dyn Authorizer>,
        ledger_store: Arc<dyn LedgerStore>,
        registrar: Arc<dyn RegistrationApi>,
        mailer: Arc<dyn Mailer>,
        config: WorkflowConfig,
    ) -> PublicationResult<Self> {
        let minters = MinterRegistry::with_defaults();
        Self::with_minters(store, authorizer, ledger_store, registrar, mailer, config, &minters)
    }

    /// Wire the workflow against an explicit minter registry. The configured
    /// strategy is resolved here, once, at startup.
    pub fn with_minters(
        store: Arc<dyn EntityStore>,
        authorizer: Arc<dyn Authorizer>,
        ledger_store: Arc<dyn LedgerStore>,
        registrar: Arc<dyn RegistrationApi>,
        mailer: Arc<dyn Mailer>,
        config: WorkflowConfig,
        minters: &MinterRegistry,
    ) -> PublicationResult<Self> {
        let minter = minters
            .resolve(&config.minter)
            .map_err(|e| PublicationError::Validation(e.to_string()))?;
        let ledger = IdentifierLedger::new(ledger_store, minter, config.site_id.clone());
        let notifier = NotificationDispatcher::new(mailer, config.site_url.clone());
        Ok(Self {
            store,
            authorizer,
            ledger,
            registrar,
            notifier,
            config,
        })
    }

    /// Make an entity public without starting the DOI workflow.
    pub async fn make_public(
        &self,
        entity_id: &str,
        ctx: &RequestContext,
    ) -> PublicationResult<()> {
        let id = validated_id(entity_id)?;
        let mut entity = self.load(id).await?;
        self.require_update_permission(ctx, &entity.id).await?;

        if entity.publication_state.is_some() {
            return Err(PublicationError::Validation(
                "publication workflow already started".to_string(),
            ));
        }

        entity.private = false;
        self.persist(&entity).await?;
        tracing::info!(entity_id = %entity.id, "entity made public");
        Ok(())
    }

    /// Start the publication workflow: reserve a DOI and enter `Pending`.
    ///
    /// The standard path mints a fresh suffix under the configured prefix.
    /// A sysadmin may instead supply a pre-chosen identifier through the
    /// entity's DOI field; it must carry a suffix and an allow-listed
    /// prefix.
    pub async fn request_publication(
        &self,
        entity_id: &str,
        ctx: &RequestContext,
    ) -> PublicationResult<()> {
        let id = validated_id(entity_id)?;
        let mut entity = self.load(id).await?;
        self.require_update_permission(ctx, &entity.id).await?;

        if entity.publication_state.is_some() {
            return Err(PublicationError::Validation(
                "publication has already been requested".to_string(),
            ));
        }

        let existing_doi = entity.doi.as_deref().map(str::trim).filter(|d| !d.is_empty());
        let request = match existing_doi {
            None => ReserveRequest {
                entity_id: entity.id.clone(),
                entity_kind: entity.kind,
                entity_name: entity.name.clone(),
                owner_user: ctx.actor.user_id.clone(),
                prefix: self.config.doi_prefix.clone(),
                suffix: None,
                metadata: None,
            },
            Some(raw) => {
                if !ctx.actor.sysadmin {
                    return Err(PublicationError::AlreadyPublished(raw.to_string()));
                }
                let doi = parse_custom_doi(raw)?;
                if !self.config.allow_list().allows(&doi.prefix) {
                    return Err(PublicationError::Validation(
                        "custom prefix not allowed".to_string(),
                    ));
                }
                ReserveRequest {
                    entity_id: entity.id.clone(),
                    entity_kind: entity.kind,
                    entity_name: entity.name.clone(),
                    owner_user: ctx.actor.user_id.clone(),
                    prefix: doi.prefix,
                    suffix: Some(doi.suffix),
                    metadata: None,
                }
            }
        };

        let doi = self.ledger.reserve(request).await?;

        entity.doi = Some(doi.to_string());
        entity.private = false;
        entity.publication_state = Some(PublicationState::Pending);
        self.persist(&entity).await?;
        tracing::info!(entity_id = %entity.id, doi = %doi, "publication requested");

        let recipients = vec![
            self.admin_recipient(),
            Recipient::new(ctx.actor.display_name.clone(), ctx.actor.email.clone()),
        ];
        self.notifier
            .notify(Transition::Requested, &entity, &ctx.actor, recipients)
            .await;
        Ok(())
    }

    /// Admin approval: `Pending → Approved`.
    pub async fn approve(&self, entity_id: &str, ctx: &RequestContext) -> PublicationResult<()> {
        let id = validated_id(entity_id)?;
        let mut entity = self.load(id).await?;
        self.allow_listed_doi(&entity)?;
        self.require_update_permission(ctx, &entity.id).await?;
        require_sysadmin(ctx)?;

        if entity.publication_state != Some(PublicationState::Pending) {
            return Err(PublicationError::Validation(
                "publication is not awaiting approval".to_string(),
            ));
        }

        entity.publication_state = Some(PublicationState::Approved);
        entity.private = false;
        self.persist(&entity).await?;
        tracing::info!(entity_id = %entity.id, "publication approved");

        let recipients = self.stakeholder_recipients(&entity).await;
        self.notifier
            .notify(Transition::Approved, &entity, &ctx.actor, recipients)
            .await;
        Ok(())
    }

    /// Admin bypass: mark the publication finished without touching the
    /// registration service. The DOI only needs to be present, not
    /// prefix-gated (it may have been registered out of band).
    pub async fn finish_manually(
        &self,
        entity_id: &str,
        ctx: &RequestContext,
    ) -> PublicationResult<()> {
        let id = validated_id(entity_id)?;
        let mut entity = self.load(id).await?;
        self.require_update_permission(ctx, &entity.id).await?;
        require_sysadmin(ctx)?;

        if entity.doi.as_deref().map(str::trim).filter(|d| !d.is_empty()).is_none() {
            return Err(PublicationError::InvalidDoi(format!(
                "{} has no DOI",
                entity.id
            )));
        }

        entity.publication_state = Some(PublicationState::Published);
        entity.private = false;
        self.persist(&entity).await?;
        tracing::info!(entity_id = %entity.id, "publication finished manually");

        let recipients = self.stakeholder_recipients(&entity).await;
        self.notifier
            .notify(Transition::Finished, &entity, &ctx.actor, recipients)
            .await;
        Ok(())
    }

    /// Register the DOI with the external service: `Approved → Published`.
    pub async fn finish_via_registration(
        &self,
        entity_id: &str,
        ctx: &RequestContext,
    ) -> PublicationResult<()> {
        let id = validated_id(entity_id)?;
        let mut entity = self.load(id).await?;

        if entity.publication_state != Some(PublicationState::Approved) {
            return Err(PublicationError::Validation(
                "publication has not been approved".to_string(),
            ));
        }
        let doi = self.allow_listed_doi(&entity)?;
        require_sysadmin(ctx)?;

        let confirmed = self
            .registrar
            .register(&RegistrationRequest {
                doi: doi.clone(),
                entity: entity.clone(),
                update: false,
            })
            .await?;

        entity.publication_state = Some(PublicationState::Published);
        self.persist(&entity).await?;
        tracing::info!(entity_id = %entity.id, doi = %confirmed, "publication registered");

        let recipients = self.stakeholder_recipients(&entity).await;
        self.notifier
            .notify(Transition::Finished, &entity, &ctx.actor, recipients)
            .await;
        Ok(())
    }

    /// Push refreshed metadata for an already-published DOI. Never changes
    /// the publication state and sends no notification.
    pub async fn update_registration(
        &self,
        entity_id: &str,
        ctx: &RequestContext,
    ) -> PublicationResult<()> {
        let id = validated_id(entity_id)?;
        let entity = self.load(id).await?;

        if entity.publication_state != Some(PublicationState::Published) {
            return Err(PublicationError::Validation(
                "publication is not finished".to_string(),
            ));
        }
        let doi = self.allow_listed_doi(&entity)?;
        require_sysadmin(ctx)?;

        let confirmed = self
            .registrar
            .register(&RegistrationRequest {
                doi,
                entity: entity.clone(),
                update: true,
            })
            .await?;
        tracing::info!(entity_id = %entity.id, doi = %confirmed, "registration metadata updated");
        Ok(())
    }

    async fn load(&self, id: &str) -> PublicationResult<Entity> {
        self.store.show(id).await.map_err(host_error)
    }

    async fn persist(&self, entity: &Entity) -> PublicationResult<()> {
        self.store.update(entity).await.map_err(host_error)
    }

    async fn require_update_permission(
        &self,
        ctx: &RequestContext,
        entity_id: &str,
    ) -> PublicationResult<()> {
        let allowed = self
            .authorizer
            .can_update(&ctx.actor, entity_id)
            .await
            .map_err(host_error)?;
        if allowed {
            Ok(())
        } else {
            Err(PublicationError::NotAuthorized)
        }
    }

    /// The entity's DOI, parsed and vetted against the prefix allow-list.
    fn allow_listed_doi(&self, entity: &Entity) -> PublicationResult<Doi> {
        let raw = entity
            .doi
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| PublicationError::InvalidDoi(format!("{} has no DOI", entity.id)))?;
        let doi: Doi = raw
            .parse()
            .map_err(|e: DoiParseError| PublicationError::InvalidDoi(e.to_string()))?;
        if !self.config.allow_list().allows(&doi.prefix) {
            return Err(PublicationError::InvalidDoi(format!(
                "prefix {} is not allow-listed",
                doi.prefix
            )));
        }
        Ok(doi)
    }

    fn admin_recipient(&self) -> Recipient {
        Recipient::new("Portal Administrator", self.config.admin_email.clone())
    }

    /// Recipients for approval/finish fan-out: admin, the user who made the
    /// publication request (from the change history), the entity owner, and
    /// the contact point. Deduplication happens in the dispatcher.
    async fn stakeholder_recipients(&self, entity: &Entity) -> Vec<Recipient> {
        let mut recipients = vec![self.admin_recipient()];

        match self.store.change_history(&entity.id).await {
            Ok(history) => {
                if let Some(event) = history
                    .iter()
                    .find(|e| e.kind == ChangeKind::PublicationRequested)
                {
                    recipients.push(Recipient::new(
                        event.actor.display_name.clone(),
                        event.actor.email.clone(),
                    ));
                }
            }
            Err(err) => {
                tracing::warn!(entity_id = %entity.id, error = %err, "change history unavailable");
            }
        }

        match self.store.user(&entity.owner_id).await {
            Ok(Some(owner)) => {
                recipients.push(Recipient::new(owner.display_name, owner.email));
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(owner_id = %entity.owner_id, error = %err, "owner lookup failed");
            }
        }

        if let Some(contact) = &entity.contact_email {
            recipients.push(Recipient::new("Contact point", contact.clone()));
        }

        recipients
    }
}

fn validated_id(id: &str) -> PublicationResult<&str> {
    if id.trim().is_empty() {
        Err(PublicationError::Validation("missing entity id".to_string()))
    } else {
        Ok(id)
    }
}

fn require_sysadmin(ctx: &RequestContext) -> PublicationResult<()> {
    if ctx.actor.sysadmin {
        Ok(())
    } else {
        Err(PublicationError::NotAuthorized)
    }
}

fn host_error(err: HostError) -> PublicationError {
    match err {
        HostError::NotFound(id) => PublicationError::NotFound(id),
        HostError::Backend(msg) => PublicationError::Internal(msg),
    }
}

/// Parse an admin-supplied custom identifier. A missing suffix is a
/// validation failure of the custom-DOI path, not a malformed DOI.
fn parse_custom_doi(raw: &str) -> PublicationResult<Doi> {
    match raw.parse::<Doi>() {
        Ok(doi) => Ok(doi),
        Err(DoiParseError::MissingSuffix(_)) | Err(DoiParseError::EmptySuffix) => Err(
            PublicationError::Validation("custom DOI has no suffix".to_string()),
        ),
        Err(err) => Err(PublicationError::InvalidDoi(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ChangeEvent;
    use crate::memory::{InMemoryEntityStore, RecordingMailer, StaticAuthorizer};
    use async_trait::async_trait;
    use chrono::Utc;
    use datapub_ledger::memory::InMemoryLedgerStore;
    use datapub_registrar::{DataCiteConfig, RegistrarError, RegistrarResult};
    use datapub_types::{Actor, EntityKind};
    use std::sync::RwLock;

    /// Registration-service double recording every call.
    #[derive(Default)]
    struct RecordingRegistrar {
        calls: RwLock<Vec<RegistrationRequest>>,
        fail_status: Option<u16>,
    }

    impl RecordingRegistrar {
        fn failing(status: u16) -> Self {
            Self {
                calls: RwLock::new(Vec::new()),
                fail_status: Some(status),
            }
        }

        fn calls(&self) -> Vec<RegistrationRequest> {
            self.calls.read().unwrap().clone()
        }
    }

    #[async_trait]
    impl RegistrationApi for RecordingRegistrar {
        async fn register(&self, req: &RegistrationRequest) -> RegistrarResult<String> {
            self.calls.write().unwrap().push(req.clone());
            if let Some(status) = self.fail_status {
                return Err(RegistrarError::Http {
                    status,
                    body: "registration rejected".to_string(),
                });
            }
            Ok(req.doi.to_string())
        }
    }

    struct Harness {
        store: Arc<InMemoryEntityStore>,
        ledger_store: Arc<InMemoryLedgerStore>,
        registrar: Arc<RecordingRegistrar>,
        mailer: Arc<RecordingMailer>,
        workflow: PublicationWorkflow,
    }

    fn config() -> WorkflowConfig {
        WorkflowConfig {
            site_id: "site-1".to_string(),
            site_url: "https://data.example.org".to_string(),
            doi_prefix: "10.1111".to_string(),
            custom_prefixes: vec!["10.2222".to_string()],
            minter: "uuid".to_string(),
            admin_email: "admin@example.org".to_string(),
            datacite: DataCiteConfig {
                api_url: "https://api.test.datacite.org".to_string(),
                username: "USER.ACCOUNT".to_string(),
                password: "secret".to_string(),
                site_url: "https://data.example.org".to_string(),
                url_prefix: None,
                timeout_secs: 30,
            },
        }
    }

    fn harness_with(authorizer: StaticAuthorizer, registrar: RecordingRegistrar) -> Harness {
        let store = Arc::new(InMemoryEntityStore::new());
        let ledger_store = Arc::new(InMemoryLedgerStore::new());
        let registrar = Arc::new(registrar);
        let mailer = Arc::new(RecordingMailer::new());
        let workflow = PublicationWorkflow::new(
            store.clone(),
            Arc::new(authorizer),
            ledger_store.clone(),
            registrar.clone(),
            mailer.clone(),
            config(),
        )
        .unwrap();
        Harness {
            store,
            ledger_store,
            registrar,
            mailer,
            workflow,
        }
    }

    fn harness() -> Harness {
        harness_with(StaticAuthorizer::allow_all(), RecordingRegistrar::default())
    }

    fn entity(id: &str, doi: Option<&str>, state: Option<PublicationState>) -> Entity {
        Entity {
            id: id.to_string(),
            name: format!("{id}-name"),
            kind: EntityKind::Dataset,
            doi: doi.map(String::from),
            publication_state: state,
            private: true,
            owner_id: "owner-1".to_string(),
            contact_email: None,
            parent_dataset: None,
        }
    }

    fn user(email: &str, sysadmin: bool) -> Actor {
        Actor {
            user_id: format!("uid-{email}"),
            display_name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            sysadmin,
        }
    }

    fn ctx(email: &str, sysadmin: bool) -> RequestContext {
        RequestContext::new(user(email, sysadmin))
    }

    #[tokio::test]
    async fn request_publication_reserves_doi_and_notifies() {
        let h = harness();
        h.store.insert_entity(entity("abc", None, None));

        h.workflow
            .request_publication("abc", &ctx("requester@example.org", false))
            .await
            .unwrap();

        let updated = h.store.get("abc").unwrap();
        let doi = updated.doi.unwrap();
        assert!(doi.starts_with("10.1111/"));
        assert!(!updated.private);
        assert_eq!(updated.publication_state, Some(PublicationState::Pending));
        assert_eq!(h.ledger_store.len(), 1);

        // admin + requester
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 2);
        let mut addresses: Vec<_> = sent.iter().map(|m| m.recipient.email.clone()).collect();
        addresses.sort();
        assert_eq!(addresses, vec!["admin@example.org", "requester@example.org"]);
    }

    #[tokio::test]
    async fn request_publication_rejects_started_workflow_without_mutation() {
        let h = harness();
        h.store.insert_entity(entity(
            "abc",
            Some("10.1111/existing"),
            Some(PublicationState::Pending),
        ));

        let err = h
            .workflow
            .request_publication("abc", &ctx("requester@example.org", false))
            .await
            .unwrap_err();

        assert!(matches!(err, PublicationError::Validation(_)));
        let unchanged = h.store.get("abc").unwrap();
        assert!(unchanged.private);
        assert_eq!(h.ledger_store.len(), 0);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn existing_doi_requires_sysadmin() {
        let h = harness();
        h.store.insert_entity(entity("abc", Some("10.2222/mine"), None));

        let err = h
            .workflow
            .request_publication("abc", &ctx("requester@example.org", false))
            .await
            .unwrap_err();

        assert!(matches!(err, PublicationError::AlreadyPublished(doi) if doi == "10.2222/mine"));
        assert_eq!(h.ledger_store.len(), 0);
    }

    #[tokio::test]
    async fn admin_custom_doi_is_reserved_verbatim() {
        let h = harness();
        h.store.insert_entity(entity("abc", Some("10.2222/my-suffix"), None));

        h.workflow
            .request_publication("abc", &ctx("admin@example.org", true))
            .await
            .unwrap();

        let updated = h.store.get("abc").unwrap();
        assert_eq!(updated.doi.as_deref(), Some("10.2222/my-suffix"));
        assert_eq!(h.ledger_store.len(), 1);
    }

    #[tokio::test]
    async fn custom_prefix_outside_allow_list_is_rejected() {
        let h = harness();
        h.store.insert_entity(entity("abc", Some("10.9999/my-suffix"), None));

        let err = h
            .workflow
            .request_publication("abc", &ctx("admin@example.org", true))
            .await
            .unwrap_err();

        assert!(
            matches!(&err, PublicationError::Validation(msg) if msg.contains("custom prefix not allowed"))
        );
        assert_eq!(h.ledger_store.len(), 0);
        let unchanged = h.store.get("abc").unwrap();
        assert_eq!(unchanged.publication_state, None);
    }

    #[tokio::test]
    async fn custom_doi_without_suffix_is_rejected() {
        let h = harness();
        h.store.insert_entity(entity("abc", Some("10.2222"), None));

        let err = h
            .workflow
            .request_publication("abc", &ctx("admin@example.org", true))
            .await
            .unwrap_err();

        assert!(matches!(&err, PublicationError::Validation(msg) if msg.contains("suffix")));
        assert_eq!(h.ledger_store.len(), 0);
    }

    #[tokio::test]
    async fn approve_transitions_and_fans_out_deduplicated() {
        let h = harness();
        let mut e = entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Pending));
        e.contact_email = Some("contact@example.org".to_string());
        h.store.insert_entity(e);
        h.store.insert_user(Actor {
            user_id: "owner-1".to_string(),
            display_name: "Owner".to_string(),
            email: "owner@example.org".to_string(),
            sysadmin: false,
        });
        h.store.record_change(
            "abc",
            ChangeEvent {
                actor: user("requester@example.org", false),
                kind: ChangeKind::PublicationRequested,
                at: Utc::now(),
            },
        );

        h.workflow
            .approve("abc", &ctx("admin@example.org", true))
            .await
            .unwrap();

        let updated = h.store.get("abc").unwrap();
        assert_eq!(updated.publication_state, Some(PublicationState::Approved));
        assert!(!updated.private);

        // admin, requester, owner, contact - all distinct here
        assert_eq!(h.mailer.sent().len(), 4);
    }

    #[tokio::test]
    async fn approve_deduplicates_overlapping_addresses() {
        let h = harness();
        let mut e = entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Pending));
        // contact point is also the owner
        e.contact_email = Some("owner@example.org".to_string());
        h.store.insert_entity(e);
        h.store.insert_user(Actor {
            user_id: "owner-1".to_string(),
            display_name: "Owner".to_string(),
            email: "owner@example.org".to_string(),
            sysadmin: false,
        });

        h.workflow
            .approve("abc", &ctx("admin@example.org", true))
            .await
            .unwrap();

        // admin + owner (contact collapses into owner)
        assert_eq!(h.mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn approve_requires_sysadmin_and_update_permission() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Pending)));

        let err = h
            .workflow
            .approve("abc", &ctx("user@example.org", false))
            .await
            .unwrap_err();
        assert!(matches!(err, PublicationError::NotAuthorized));

        let denied = harness_with(StaticAuthorizer::deny_all(), RecordingRegistrar::default());
        denied
            .store
            .insert_entity(entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Pending)));
        let err = denied
            .workflow
            .approve("abc", &ctx("admin@example.org", true))
            .await
            .unwrap_err();
        assert!(matches!(err, PublicationError::NotAuthorized));
    }

    #[tokio::test]
    async fn approve_rejects_non_allow_listed_prefix() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.9999/abc-doi"), Some(PublicationState::Pending)));

        let err = h
            .workflow
            .approve("abc", &ctx("admin@example.org", true))
            .await
            .unwrap_err();
        assert!(matches!(err, PublicationError::InvalidDoi(_)));
    }

    #[tokio::test]
    async fn second_approve_is_rejected() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Pending)));
        let admin = ctx("admin@example.org", true);

        h.workflow.approve("abc", &admin).await.unwrap();
        let err = h.workflow.approve("abc", &admin).await.unwrap_err();

        assert!(matches!(err, PublicationError::Validation(_)));
        let state = h.store.get("abc").unwrap().publication_state;
        assert_eq!(state, Some(PublicationState::Approved));
        assert_eq!(h.ledger_store.len(), 0);
    }

    #[tokio::test]
    async fn finish_manually_skips_prefix_gate() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.9999/external"), Some(PublicationState::Pending)));

        h.workflow
            .finish_manually("abc", &ctx("admin@example.org", true))
            .await
            .unwrap();

        let updated = h.store.get("abc").unwrap();
        assert_eq!(updated.publication_state, Some(PublicationState::Published));
        assert!(!h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn finish_manually_requires_a_doi() {
        let h = harness();
        h.store.insert_entity(entity("abc", None, None));

        let err = h
            .workflow
            .finish_manually("abc", &ctx("admin@example.org", true))
            .await
            .unwrap_err();
        assert!(matches!(err, PublicationError::InvalidDoi(_)));
    }

    #[tokio::test]
    async fn finish_via_registration_requires_approved_state() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Pending)));

        let err = h
            .workflow
            .finish_via_registration("abc", &ctx("admin@example.org", true))
            .await
            .unwrap_err();

        assert!(matches!(err, PublicationError::Validation(_)));
        // precondition failed before any network interaction
        assert!(h.registrar.calls().is_empty());
    }

    #[tokio::test]
    async fn finish_via_registration_publishes() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Approved)));

        h.workflow
            .finish_via_registration("abc", &ctx("admin@example.org", true))
            .await
            .unwrap();

        let calls = h.registrar.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].update);
        assert_eq!(calls[0].doi.to_string(), "10.1111/abc-doi");

        let updated = h.store.get("abc").unwrap();
        assert_eq!(updated.publication_state, Some(PublicationState::Published));
        assert!(!h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn registration_failure_leaves_state_untouched() {
        let h = harness_with(StaticAuthorizer::allow_all(), RecordingRegistrar::failing(422));
        h.store
            .insert_entity(entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Approved)));

        let err = h
            .workflow
            .finish_via_registration("abc", &ctx("admin@example.org", true))
            .await
            .unwrap_err();

        assert!(matches!(err, PublicationError::Registration { status: 422, .. }));
        let state = h.store.get("abc").unwrap().publication_state;
        assert_eq!(state, Some(PublicationState::Approved));
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn update_registration_is_repeatable_and_stateless() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Published)));
        let admin = ctx("admin@example.org", true);

        h.workflow.update_registration("abc", &admin).await.unwrap();
        h.workflow.update_registration("abc", &admin).await.unwrap();

        let calls = h.registrar.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.update));

        let state = h.store.get("abc").unwrap().publication_state;
        assert_eq!(state, Some(PublicationState::Published));
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn update_registration_requires_published_state() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.1111/abc-doi"), Some(PublicationState::Approved)));

        let err = h
            .workflow
            .update_registration("abc", &ctx("admin@example.org", true))
            .await
            .unwrap_err();
        assert!(matches!(err, PublicationError::Validation(_)));
        assert!(h.registrar.calls().is_empty());
    }

    #[tokio::test]
    async fn make_public_clears_private_without_minting() {
        let h = harness();
        h.store.insert_entity(entity("abc", None, None));

        h.workflow
            .make_public("abc", &ctx("user@example.org", false))
            .await
            .unwrap();

        let updated = h.store.get("abc").unwrap();
        assert!(!updated.private);
        assert_eq!(updated.publication_state, None);
        assert_eq!(h.ledger_store.len(), 0);
    }

    #[tokio::test]
    async fn make_public_rejects_started_workflow() {
        let h = harness();
        h.store
            .insert_entity(entity("abc", Some("10.1111/x"), Some(PublicationState::Pending)));

        let err = h
            .workflow
            .make_public("abc", &ctx("user@example.org", false))
            .await
            .unwrap_err();
        assert!(matches!(err, PublicationError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_entity_surfaces_not_found() {
        let h = harness();
        let err = h
            .workflow
            .make_public("ghost", &ctx("user@example.org", false))
            .await
            .unwrap_err();
        assert!(matches!(err, PublicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_entity_id_is_a_validation_error() {
        let h = harness();
        let err = h
            .workflow
            .request_publication("  ", &ctx("user@example.org", false))
            .await
            .unwrap_err();
        assert!(matches!(err, PublicationError::Validation(_)));
    }

    #[test]
    fn unknown_minter_strategy_fails_wiring() {
        let mut cfg = config();
        cfg.minter = "sequential".to_string();
        let result = PublicationWorkflow::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(StaticAuthorizer::allow_all()),
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(RecordingRegistrar::default()),
            Arc::new(RecordingMailer::new()),
            cfg,
        );
        assert!(matches!(result, Err(PublicationError::Validation(_))));
    }
}
