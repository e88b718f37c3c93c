//! Orgflow Delegation - time-bounded decider substitution
//!
//! A delegation hands a delegator's approval seat to a delegate for a
//! half-open time window `[effective_start, effective_end)`, optionally
//! narrowed to one scope and/or one org node. Delegations become inert once
//! the window passes; revocation is modeled by pulling `effective_end`
//! forward to now, never by a separate state.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use orgflow_types::{CoreError, CoreResult, DelegationId, NodeId, PersonId, Scope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// A delegator-to-delegate substitution window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalDelegation {
    pub id: DelegationId,
    pub delegator_id: PersonId,
    pub delegate_id: PersonId,
    /// `None` means all scopes.
    pub scope: Option<Scope>,
    /// `None` means all org nodes.
    pub org_node_id: Option<NodeId>,
    pub effective_start: DateTime<Utc>,
    pub effective_end: DateTime<Utc>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl ApprovalDelegation {
    fn covers(&self, scope: Scope, org_node_id: &NodeId, as_of: DateTime<Utc>) -> bool {
        self.effective_start <= as_of
            && as_of < self.effective_end
            && self.scope.map_or(true, |s| s == scope)
            && self
                .org_node_id
                .as_ref()
                .map_or(true, |node| node == org_node_id)
    }

    /// Precedence key: most specific first (scope over node), then latest
    /// window start, then latest creation.
    fn specificity(&self) -> (bool, bool, DateTime<Utc>, DateTime<Utc>) {
        (
            self.scope.is_some(),
            self.org_node_id.is_some(),
            self.effective_start,
            self.created_at,
        )
    }
}

/// Input for [`DelegationStore::create`].
#[derive(Clone, Debug)]
pub struct NewDelegation {
    pub delegator_id: PersonId,
    pub delegate_id: PersonId,
    pub scope: Option<Scope>,
    pub org_node_id: Option<NodeId>,
    pub effective_start: DateTime<Utc>,
    pub effective_end: DateTime<Utc>,
    pub reason: String,
}

/// Store owning [`ApprovalDelegation`] entities.
#[derive(Default)]
pub struct DelegationStore {
    delegations: RwLock<HashMap<DelegationId, ApprovalDelegation>>,
}

impl DelegationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a delegation. Overlapping windows from the same delegator are
    /// permitted; resolution picks the most specific, most recent match.
    pub fn create(
        &self,
        input: NewDelegation,
        now: DateTime<Utc>,
    ) -> CoreResult<ApprovalDelegation> {
        if input.effective_start >= input.effective_end {
            return Err(CoreError::validation(
                "delegation window start must precede its end",
            ));
        }
        if input.delegator_id == input.delegate_id {
            return Err(CoreError::validation(
                "a delegator cannot delegate to themselves",
            ));
        }

        let delegation = ApprovalDelegation {
            id: DelegationId::generate(),
            delegator_id: input.delegator_id,
            delegate_id: input.delegate_id,
            scope: input.scope,
            org_node_id: input.org_node_id,
            effective_start: input.effective_start,
            effective_end: input.effective_end,
            reason: input.reason,
            created_at: now,
        };
        info!(
            delegation_id = %delegation.id,
            delegator = %delegation.delegator_id,
            delegate = %delegation.delegate_id,
            "delegation created"
        );
        let mut guard = self.write_guard()?;
        guard.insert(delegation.id.clone(), delegation.clone());
        Ok(delegation)
    }

    /// Revoke by pulling the window end to now. A window that already ended
    /// is left untouched.
    pub fn revoke(&self, id: &DelegationId, now: DateTime<Utc>) -> CoreResult<ApprovalDelegation> {
        let mut guard = self.write_guard()?;
        let delegation = guard
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("delegation", id))?;
        if now < delegation.effective_end {
            delegation.effective_end = now.max(delegation.effective_start);
            info!(delegation_id = %id, "delegation revoked");
        }
        Ok(delegation.clone())
    }

    pub fn get(&self, id: &DelegationId) -> CoreResult<ApprovalDelegation> {
        let guard = self.read_guard()?;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("delegation", id))
    }

    /// The delegation substituting for `delegator` at `(scope, org node)` as
    /// of the given instant, if any. Non-null scope beats null scope, then
    /// non-null node beats null node; remaining ties go to the latest
    /// `effective_start`, then the latest creation.
    pub fn find_active(
        &self,
        delegator: &PersonId,
        scope: Scope,
        org_node_id: &NodeId,
        as_of: DateTime<Utc>,
    ) -> CoreResult<Option<ApprovalDelegation>> {
        let guard = self.read_guard()?;
        Ok(guard
            .values()
            .filter(|delegation| {
                &delegation.delegator_id == delegator
                    && delegation.covers(scope, org_node_id, as_of)
            })
            .max_by_key(|delegation| delegation.specificity())
            .cloned())
    }

    fn read_guard(
        &self,
    ) -> CoreResult<std::sync::RwLockReadGuard<'_, HashMap<DelegationId, ApprovalDelegation>>> {
        self.delegations
            .read()
            .map_err(|_| CoreError::conflict("delegation lock poisoned"))
    }

    fn write_guard(
        &self,
    ) -> CoreResult<std::sync::RwLockWriteGuard<'_, HashMap<DelegationId, ApprovalDelegation>>>
    {
        self.delegations
            .write()
            .map_err(|_| CoreError::conflict("delegation lock poisoned"))
    }
}
