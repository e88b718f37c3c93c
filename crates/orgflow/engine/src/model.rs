use chrono::{DateTime, Utc};
use orgflow_types::{ChainStep, DecisionId, NodeId, PersonId, RequestId, Scope, SubjectType};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an approval request. `Pending` is the only non-terminal
/// state; there are no transitions out of a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Cancelled => "CANCELLED",
            RequestStatus::Expired => "EXPIRED",
        }
    }
}

/// Verdict a decider submits for one level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
}

/// An approval request with its frozen chain snapshot.
///
/// `snapshot_chain` is a fully materialized copy taken at creation time; it
/// never changes afterwards, even as the live tree, policies, or delegations
/// evolve. `current_level` is a 1-based pointer into it (0 only for requests
/// born approved because their chain was empty).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub scope: Scope,
    pub subject_type: SubjectType,
    pub subject_id: String,
    /// Node the subject lives under; the anchor of chain resolution.
    pub org_node_id: NodeId,
    pub requester_id: PersonId,
    pub status: RequestStatus,
    pub snapshot_chain: Vec<ChainStep>,
    /// Opaque caller payload carried for display and audit.
    pub snapshot_context: serde_json::Value,
    pub current_level: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// The chain step decisions are currently being collected for.
    pub fn current_step(&self) -> Option<&ChainStep> {
        if self.current_level == 0 {
            return None;
        }
        self.snapshot_chain.get(self.current_level as usize - 1)
    }

    /// Whether passing the current level completes the whole chain.
    pub fn at_last_level(&self) -> bool {
        self.current_level as usize >= self.snapshot_chain.len()
    }
}

/// Input for creating a request.
#[derive(Clone, Debug)]
pub struct NewRequest {
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub org_node_id: NodeId,
    pub requester_id: PersonId,
    pub context: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewRequest {
    pub fn new(
        subject_type: SubjectType,
        subject_id: &str,
        org_node_id: NodeId,
        requester_id: PersonId,
    ) -> Self {
        Self {
            subject_type,
            subject_id: subject_id.to_string(),
            org_node_id,
            requester_id,
            context: serde_json::Value::Null,
            expires_at: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// One recorded decision. At most one exists per
/// `(request, level, decider)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub id: DecisionId,
    pub request_id: RequestId,
    pub level: u32,
    pub decider_id: PersonId,
    pub outcome: DecisionOutcome,
    pub comments: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Conjunctive filter for request listing. `None` fields match everything.
#[derive(Clone, Debug, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub scope: Option<Scope>,
    pub requester_id: Option<PersonId>,
    pub subject_id: Option<String>,
    /// Requests whose `expires_at` is set and at or before this instant.
    pub expiring_by: Option<DateTime<Utc>>,
}

impl RequestFilter {
    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        if let Some(status) = self.status {
            if request.status != status {
                return false;
            }
        }
        if let Some(scope) = self.scope {
            if request.scope != scope {
                return false;
            }
        }
        if let Some(requester) = &self.requester_id {
            if &request.requester_id != requester {
                return false;
            }
        }
        if let Some(subject) = &self.subject_id {
            if &request.subject_id != subject {
                return false;
            }
        }
        if let Some(deadline) = self.expiring_by {
            match request.expires_at {
                Some(expires_at) if expires_at <= deadline => {}
                _ => return false,
            }
        }
        true
    }
}
