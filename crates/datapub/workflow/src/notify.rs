//! Notification fan-out per lifecycle transition.
//!
//! The dispatcher decides who hears about a transition and what the message
//! says; the host platform's [`Mailer`] does the delivery. Recipients are
//! deduplicated by normalized email address, and a failed send is logged and
//! swallowed - notifications never fail the transition that triggered them.

use crate::host::Mailer;
use datapub_types::{Actor, Entity, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A notification target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Which lifecycle transition fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Requested,
    Approved,
    Finished,
}

impl Transition {
    fn subject_verb(&self) -> &'static str {
        match self {
            Transition::Requested => "Publication Request",
            Transition::Approved => "Publication Approved",
            Transition::Finished => "Publication Finished",
        }
    }

    fn body_lead(&self) -> &'static str {
        match self {
            Transition::Requested => "Notifying publication request:",
            Transition::Approved => "The publication request has been approved:",
            Transition::Finished => "The DOI publication has been finished:",
        }
    }
}

/// Decides recipients and content per transition and hands delivery to the
/// platform mailer.
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    site_url: String,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, site_url: impl Into<String>) -> Self {
        Self {
            mailer,
            site_url: site_url.into(),
        }
    }

    /// Send one message per distinct recipient address. Returns how many
    /// sends succeeded; failures are logged and never propagated.
    pub async fn notify(
        &self,
        transition: Transition,
        entity: &Entity,
        acting_user: &Actor,
        recipients: Vec<Recipient>,
    ) -> usize {
        let subject = format!("{} {}", transition.subject_verb(), entity.name);
        let body = self.render_body(transition, entity, acting_user);

        let mut sent = 0;
        for recipient in dedup_by_email(recipients) {
            match self.mailer.send(&recipient, &subject, &body).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    tracing::warn!(
                        recipient = %recipient.email,
                        entity_id = %entity.id,
                        error = %err,
                        "notification send failed"
                    );
                }
            }
        }
        sent
    }

    fn render_body(&self, transition: Transition, entity: &Entity, acting_user: &Actor) -> String {
        let mut body = String::new();
        body.push_str(transition.body_lead());
        body.push('\n');
        body.push_str(&format!(
            "\t - User: {} ({})\n",
            acting_user.display_name, acting_user.email
        ));
        body.push_str(&format!("\t - Entity: {} ({})\n", entity.name, entity.kind));
        if let Some(doi) = &entity.doi {
            body.push_str(&format!("\t - DOI: {doi}\n"));
        }
        body.push_str(&format!("\t - URL: {}", entity_url(&self.site_url, entity)));
        body
    }
}

/// Portal URL of the entity's page, used inside notification bodies.
pub(crate) fn entity_url(site_url: &str, entity: &Entity) -> String {
    let base = site_url.trim_end_matches('/');
    match entity.kind {
        EntityKind::Dataset => format!("{}/dataset/{}", base, entity.id),
        EntityKind::Resource => match &entity.parent_dataset {
            Some(parent) => format!("{}/dataset/{}/resource/{}", base, parent, entity.id),
            None => format!("{}/resource/{}", base, entity.id),
        },
    }
}

/// Keep one recipient per normalized (trimmed, lowercased) address, in a
/// stable order. Empty addresses are dropped.
fn dedup_by_email(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut unique: BTreeMap<String, Recipient> = BTreeMap::new();
    for recipient in recipients {
        let key = recipient.email.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        unique.entry(key).or_insert(recipient);
    }
    unique.into_values().collect()
}
