//! Orgflow Engine - approval request lifecycle
//!
//! Owns [`ApprovalRequest`] entities. A request is created by resolving the
//! approval chain exactly once and freezing the result; from then on the
//! request is a state machine driven purely by decision submissions against
//! that snapshot. `Pending` is the only live state; `Approved`, `Rejected`,
//! `Cancelled`, and `Expired` are all terminal.
//!
//! Quorum races are settled at the store: the count of approvals returned by
//! a decision append is computed under the same serialization as level
//! advancement, and advancement itself is compare-and-swap, so a lost race
//! surfaces as `Conflict` instead of a double advance.

#![deny(unsafe_code)]

mod model;
mod notify;
mod store;

pub use model::{
    ApprovalDecision, ApprovalRequest, DecisionOutcome, NewRequest, RequestFilter, RequestStatus,
};
pub use notify::{Notifier, NullNotifier};
pub use store::{InMemoryRequestStore, RequestStore};

use orgflow_audit::{AuditEvent, AuditSink};
use orgflow_resolver::ChainResolver;
use orgflow_types::{Clock, CoreError, CoreResult, DecisionId, PersonId, RequestId};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The approval request state machine.
pub struct ApprovalRequestEngine {
    resolver: ChainResolver,
    store: Arc<dyn RequestStore>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl ApprovalRequestEngine {
    pub fn new(
        resolver: ChainResolver,
        store: Arc<dyn RequestStore>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            store,
            audit,
            notifier: Arc::new(NullNotifier),
            clock,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Create a request, resolving and freezing its chain.
    ///
    /// An empty resolved chain means the subject needs no approval: the
    /// request row is still created, already `Approved` with
    /// `current_level = 0`, so the audit trail is uniform across both paths.
    pub async fn create_request(&self, input: NewRequest) -> CoreResult<ApprovalRequest> {
        if input.subject_id.trim().is_empty() {
            return Err(CoreError::validation("subject id must not be empty"));
        }
        let now = self.clock.now();
        if let Some(expires_at) = input.expires_at {
            if expires_at <= now {
                return Err(CoreError::validation("expiry must lie in the future"));
            }
        }

        let scope = input.subject_type.scope();
        let chain = self.resolver.resolve(&input.org_node_id, scope, now)?;
        let (status, current_level, resolved_at) = if chain.is_empty() {
            (RequestStatus::Approved, 0, Some(now))
        } else {
            (RequestStatus::Pending, 1, None)
        };

        let request = ApprovalRequest {
            id: RequestId::generate(),
            scope,
            subject_type: input.subject_type,
            subject_id: input.subject_id,
            org_node_id: input.org_node_id,
            requester_id: input.requester_id,
            status,
            snapshot_chain: chain,
            snapshot_context: input.context,
            current_level,
            expires_at: input.expires_at,
            resolved_at,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(request.clone()).await?;

        info!(
            request_id = %request.id,
            scope = ?request.scope,
            status = request.status.as_str(),
            levels = request.snapshot_chain.len(),
            "approval request created"
        );
        self.record_audit(
            request.requester_id.as_str(),
            "approval_request",
            request.id.as_str(),
            "request.created",
            AuditEvent::transition_payload(
                request.status.as_str(),
                request.status.as_str(),
                request.current_level,
                request.current_level,
            ),
        )
        .await;
        if request.status == RequestStatus::Pending {
            self.notifier.decision_requested(&request).await;
        }
        Ok(request)
    }

    /// Record one decision and advance the state machine.
    ///
    /// A rejection terminates the request immediately, regardless of how many
    /// approvals the level already holds. An approval accrues toward the
    /// level quorum; meeting it either advances the level or, at the last
    /// level, approves the request.
    pub async fn submit_decision(
        &self,
        request_id: &RequestId,
        decider_id: &PersonId,
        outcome: DecisionOutcome,
        comments: Option<String>,
    ) -> CoreResult<ApprovalRequest> {
        let request = self.store.get(request_id).await?;
        if request.status != RequestStatus::Pending {
            return Err(CoreError::validation(format!(
                "request {} is {} and accepts no further decisions",
                request.id,
                request.status.as_str()
            )));
        }
        let step = request.current_step().ok_or_else(|| {
            CoreError::configuration(format!(
                "request {} has no chain step at level {}",
                request.id, request.current_level
            ))
        })?;
        if !step.has_approver(decider_id) {
            return Err(CoreError::validation(format!(
                "{} is not an approver at level {} of request {}",
                decider_id, request.current_level, request.id
            )));
        }

        let now = self.clock.now();
        let level = request.current_level;
        let quorum = step.effective_quorum();
        let at_last_level = request.at_last_level();

        let decision = ApprovalDecision {
            id: DecisionId::generate(),
            request_id: request_id.clone(),
            level,
            decider_id: decider_id.clone(),
            outcome,
            comments,
            decided_at: now,
        };
        let decision_id = decision.id.clone();
        let approvals = self.store.append_decision(decision).await?;

        info!(
            request_id = %request_id,
            decider = %decider_id,
            level,
            ?outcome,
            approvals,
            "decision recorded"
        );
        self.record_audit(
            decider_id.as_str(),
            "approval_decision",
            decision_id.as_str(),
            "decision.submitted",
            serde_json::json!({
                "request_id": request_id.as_str(),
                "level": level,
                "outcome": outcome,
            }),
        )
        .await;

        match outcome {
            DecisionOutcome::Rejected => {
                let updated = self
                    .store
                    .transition_status(
                        request_id,
                        RequestStatus::Pending,
                        RequestStatus::Rejected,
                        Some(now),
                        now,
                    )
                    .await?;
                self.record_transition(decider_id.as_str(), &updated, "request.rejected", level)
                    .await;
                self.notifier.request_resolved(&updated).await;
                Ok(updated)
            }
            DecisionOutcome::Approved if approvals >= quorum => {
                if at_last_level {
                    let updated = self
                        .store
                        .transition_status(
                            request_id,
                            RequestStatus::Pending,
                            RequestStatus::Approved,
                            Some(now),
                            now,
                        )
                        .await?;
                    self.record_transition(decider_id.as_str(), &updated, "request.approved", level)
                        .await;
                    self.notifier.request_resolved(&updated).await;
                    Ok(updated)
                } else {
                    let updated = self.store.advance_level(request_id, level, now).await?;
                    self.record_transition(
                        decider_id.as_str(),
                        &updated,
                        "request.level_advanced",
                        level,
                    )
                    .await;
                    self.notifier.decision_requested(&updated).await;
                    Ok(updated)
                }
            }
            // Partial quorum: the request stays where it is.
            DecisionOutcome::Approved => self.store.get(request_id).await,
        }
    }

    /// Cancel a pending request. Authorization of `by` is the caller's
    /// concern.
    pub async fn cancel(&self, request_id: &RequestId, by: &PersonId) -> CoreResult<ApprovalRequest> {
        let request = self.store.get(request_id).await?;
        if request.status != RequestStatus::Pending {
            return Err(CoreError::validation(format!(
                "request {} is {} and cannot be cancelled",
                request.id,
                request.status.as_str()
            )));
        }
        let now = self.clock.now();
        let updated = self
            .store
            .transition_status(
                request_id,
                RequestStatus::Pending,
                RequestStatus::Cancelled,
                Some(now),
                now,
            )
            .await?;
        info!(request_id = %request_id, by = %by, "request cancelled");
        self.record_transition(by.as_str(), &updated, "request.cancelled", updated.current_level)
            .await;
        self.notifier.request_resolved(&updated).await;
        Ok(updated)
    }

    /// Expire one request if it is pending past its deadline. Terminal and
    /// not-yet-due requests are returned unchanged, so re-running the
    /// external scheduler is always safe.
    pub async fn expire(&self, request_id: &RequestId) -> CoreResult<ApprovalRequest> {
        let request = self.store.get(request_id).await?;
        let now = self.clock.now();
        let due = matches!(request.expires_at, Some(expires_at) if expires_at <= now);
        if request.status != RequestStatus::Pending || !due {
            return Ok(request);
        }
        let updated = self
            .store
            .transition_status(
                request_id,
                RequestStatus::Pending,
                RequestStatus::Expired,
                Some(now),
                now,
            )
            .await?;
        self.record_transition("system", &updated, "request.expired", updated.current_level)
            .await;
        self.notifier.request_resolved(&updated).await;
        Ok(updated)
    }

    /// Expire every pending request whose deadline has passed. Requests that
    /// reached a terminal state since listing are skipped, which makes
    /// repeated sweeps no-ops.
    pub async fn expire_due(&self) -> CoreResult<Vec<ApprovalRequest>> {
        let now = self.clock.now();
        let due = self
            .store
            .list(&RequestFilter {
                status: Some(RequestStatus::Pending),
                expiring_by: Some(now),
                ..Default::default()
            })
            .await?;

        let mut expired = Vec::new();
        for request in due {
            match self
                .store
                .transition_status(
                    &request.id,
                    RequestStatus::Pending,
                    RequestStatus::Expired,
                    Some(now),
                    now,
                )
                .await
            {
                Ok(updated) => {
                    self.record_transition(
                        "system",
                        &updated,
                        "request.expired",
                        updated.current_level,
                    )
                    .await;
                    self.notifier.request_resolved(&updated).await;
                    expired.push(updated);
                }
                // Lost to a concurrent decision or cancel; nothing to expire.
                Err(CoreError::Conflict(_)) => {
                    warn!(request_id = %request.id, "request resolved during expiry sweep");
                }
                Err(error) => return Err(error),
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expiry sweep completed");
        }
        Ok(expired)
    }

    pub async fn get_request(&self, id: &RequestId) -> CoreResult<ApprovalRequest> {
        self.store.get(id).await
    }

    pub async fn list_requests(&self, filter: &RequestFilter) -> CoreResult<Vec<ApprovalRequest>> {
        self.store.list(filter).await
    }

    pub async fn decisions(&self, id: &RequestId) -> CoreResult<Vec<ApprovalDecision>> {
        self.store.decisions(id).await
    }

    async fn record_transition(
        &self,
        actor: &str,
        request: &ApprovalRequest,
        action: &str,
        before_level: u32,
    ) {
        self.record_audit(
            actor,
            "approval_request",
            request.id.as_str(),
            action,
            AuditEvent::transition_payload(
                RequestStatus::Pending.as_str(),
                request.status.as_str(),
                before_level,
                request.current_level,
            ),
        )
        .await;
    }

    // Audit appends never fail the primary operation.
    async fn record_audit(
        &self,
        actor: &str,
        entity_type: &str,
        entity_id: &str,
        action: &str,
        payload: serde_json::Value,
    ) {
        let event = AuditEvent {
            actor_id: actor.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            payload,
            timestamp: self.clock.now(),
        };
        if let Err(audit_error) = self.audit.record(event).await {
            error!(action, error = %audit_error, "audit append failed");
        }
    }
}
