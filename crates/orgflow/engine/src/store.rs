use crate::model::{
    ApprovalDecision, ApprovalRequest, DecisionOutcome, RequestFilter, RequestStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgflow_types::{CoreError, CoreResult, RequestId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence contract for requests and their decisions.
///
/// Mutating operations are compare-and-swap shaped: the caller states the
/// status or level it computed against, and the store fails with `Conflict`
/// when the row has moved. Decision appends and the quorum count they return
/// are serialized against level advancement, so two racing approvals cannot
/// both observe the quorum as unmet at the same count.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: ApprovalRequest) -> CoreResult<()>;

    async fn get(&self, id: &RequestId) -> CoreResult<ApprovalRequest>;

    /// Requests matching the filter, ordered by creation time.
    async fn list(&self, filter: &RequestFilter) -> CoreResult<Vec<ApprovalRequest>>;

    /// Decisions of one request in submission order.
    async fn decisions(&self, request_id: &RequestId) -> CoreResult<Vec<ApprovalDecision>>;

    /// Append a decision for the request's current level and return how many
    /// `Approved` decisions that level now holds, the appended one included.
    ///
    /// Fails with `Validation` when the request is not pending or the decider
    /// already decided this level, and with `Conflict` when the request has
    /// advanced past `decision.level`.
    async fn append_decision(&self, decision: ApprovalDecision) -> CoreResult<u32>;

    /// Move `current_level` from `expected_level` to the next level.
    async fn advance_level(
        &self,
        id: &RequestId,
        expected_level: u32,
        now: DateTime<Utc>,
    ) -> CoreResult<ApprovalRequest>;

    /// Move `status` from `expected` to `to`, stamping `resolved_at` when
    /// given.
    async fn transition_status(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        to: RequestStatus,
        resolved_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<ApprovalRequest>;
}

#[derive(Default)]
struct RequestState {
    requests: HashMap<RequestId, ApprovalRequest>,
    decisions: HashMap<RequestId, Vec<ApprovalDecision>>,
}

/// In-memory store. One lock guards requests and decisions together so the
/// append-and-count of a decision is atomic with respect to advancement.
#[derive(Default)]
pub struct InMemoryRequestStore {
    state: RwLock<RequestState>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: ApprovalRequest) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.requests.contains_key(&request.id) {
            return Err(CoreError::conflict(format!(
                "request {} already exists",
                request.id
            )));
        }
        state.decisions.insert(request.id.clone(), Vec::new());
        state.requests.insert(request.id.clone(), request);
        Ok(())
    }

    async fn get(&self, id: &RequestId) -> CoreResult<ApprovalRequest> {
        let state = self.state.read().await;
        state
            .requests
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("approval request", id))
    }

    async fn list(&self, filter: &RequestFilter) -> CoreResult<Vec<ApprovalRequest>> {
        let state = self.state.read().await;
        let mut requests: Vec<ApprovalRequest> = state
            .requests
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect();
        requests.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(requests)
    }

    async fn decisions(&self, request_id: &RequestId) -> CoreResult<Vec<ApprovalDecision>> {
        let state = self.state.read().await;
        state
            .decisions
            .get(request_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("approval request", request_id))
    }

    async fn append_decision(&self, decision: ApprovalDecision) -> CoreResult<u32> {
        let mut state = self.state.write().await;
        let request = state
            .requests
            .get(&decision.request_id)
            .ok_or_else(|| CoreError::not_found("approval request", &decision.request_id))?;

        if request.status != RequestStatus::Pending {
            return Err(CoreError::validation(format!(
                "request {} is {} and accepts no further decisions",
                request.id,
                request.status.as_str()
            )));
        }
        if request.current_level != decision.level {
            return Err(CoreError::conflict(format!(
                "request {} moved to level {} while the decision targeted level {}",
                request.id, request.current_level, decision.level
            )));
        }

        let request_id = decision.request_id.clone();
        let level = decision.level;
        let recorded = state
            .decisions
            .get_mut(&request_id)
            .ok_or_else(|| CoreError::not_found("approval request", &request_id))?;
        if recorded
            .iter()
            .any(|existing| existing.level == level && existing.decider_id == decision.decider_id)
        {
            return Err(CoreError::validation(format!(
                "decider {} already decided level {} of request {}",
                decision.decider_id, level, request_id
            )));
        }
        recorded.push(decision);

        Ok(recorded
            .iter()
            .filter(|existing| {
                existing.level == level && existing.outcome == DecisionOutcome::Approved
            })
            .count() as u32)
    }

    async fn advance_level(
        &self,
        id: &RequestId,
        expected_level: u32,
        now: DateTime<Utc>,
    ) -> CoreResult<ApprovalRequest> {
        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("approval request", id))?;
        if request.status != RequestStatus::Pending || request.current_level != expected_level {
            return Err(CoreError::conflict(format!(
                "request {} is {} at level {}, expected pending at level {}",
                id,
                request.status.as_str(),
                request.current_level,
                expected_level
            )));
        }
        request.current_level += 1;
        request.updated_at = now;
        Ok(request.clone())
    }

    async fn transition_status(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        to: RequestStatus,
        resolved_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<ApprovalRequest> {
        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("approval request", id))?;
        if request.status != expected {
            return Err(CoreError::conflict(format!(
                "request {} is {}, expected {}",
                id,
                request.status.as_str(),
                expected.as_str()
            )));
        }
        request.status = to;
        if resolved_at.is_some() {
            request.resolved_at = resolved_at;
        }
        request.updated_at = now;
        Ok(request.clone())
    }
}
