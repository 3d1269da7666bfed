//! Action-layer facade over the publication workflow.
//!
//! Callers embedding the workflow in a portal surface get a flat set of
//! verbs that never return `Err`: every failure is folded into an
//! [`ActionOutcome`] whose message has already been stripped of backend
//! detail. Internal errors are logged here with their full cause before
//! the sanitized outcome is handed out.

use crate::machine::PublicationWorkflow;
use datapub_types::{ActionOutcome, PublicationError, PublicationResult, RequestContext};

/// Portal-facing entry points for the DOI publication workflow.
pub struct PublicationActions {
    workflow: PublicationWorkflow,
}

impl PublicationActions {
    pub fn new(workflow: PublicationWorkflow) -> Self {
        Self { workflow }
    }

    pub async fn make_public(&self, entity_id: &str, ctx: &RequestContext) -> ActionOutcome {
        outcome("make_public", self.workflow.make_public(entity_id, ctx).await)
    }

    pub async fn request_publication(
        &self,
        entity_id: &str,
        ctx: &RequestContext,
    ) -> ActionOutcome {
        outcome(
            "request_publication",
            self.workflow.request_publication(entity_id, ctx).await,
        )
    }

    pub async fn approve(&self, entity_id: &str, ctx: &RequestContext) -> ActionOutcome {
        outcome("approve", self.workflow.approve(entity_id, ctx).await)
    }

    pub async fn finish_manually(&self, entity_id: &str, ctx: &RequestContext) -> ActionOutcome {
        outcome(
            "finish_manually",
            self.workflow.finish_manually(entity_id, ctx).await,
        )
    }

    pub async fn finish_via_registration(
        &self,
        entity_id: &str,
        ctx: &RequestContext,
    ) -> ActionOutcome {
        outcome(
            "finish_via_registration",
            self.workflow.finish_via_registration(entity_id, ctx).await,
        )
    }

    pub async fn update_registration(
        &self,
        entity_id: &str,
        ctx: &RequestContext,
    ) -> ActionOutcome {
        outcome(
            "update_registration",
            self.workflow.update_registration(entity_id, ctx).await,
        )
    }
}

fn outcome(action: &str, result: PublicationResult<()>) -> ActionOutcome {
    if let Err(ref err) = result {
        log_failure(action, err);
    }
    result.into()
}

fn log_failure(action: &str, err: &PublicationError) {
    match err {
        PublicationError::Internal(_) | PublicationError::Registration { .. } => {
            tracing::error!(action, error = %err, "publication action failed");
        }
        _ => {
            tracing::debug!(action, error = %err, "publication action rejected");
        }
    }
}
