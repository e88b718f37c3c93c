//! Orgflow Policy - approval policy definitions attached to org nodes
//!
//! Policies are keyed by `(org node, scope)` and carry a 1-based level. The
//! levels of the active policies in one group always form a dense ascending
//! sequence starting at 1; chain resolution depends on that contiguity, so it
//! is enforced on every write. Policies are deactivated, never hard-deleted.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use orgflow_types::{
    CoreError, CoreResult, CrossBuStrategy, NodeId, PersonId, PolicyId, RuleType, Scope,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

/// Rule-specific approver selection, a closed tagged union.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalRule {
    /// The owning node's manager is the sole approver.
    NodeManager,
    /// A fixed person.
    SpecificPerson { person_id: PersonId },
    /// Everyone holding a directory role; quorum defaults to 1.
    RoleBased { role: String, quorum: Option<u32> },
    /// The manager of the nearest ancestor above the owning node.
    AncestorManager,
    /// A fixed member set with an explicit quorum.
    Committee { members: Vec<PersonId>, quorum: u32 },
    /// All platform administrators, any one of whom can decide.
    FallbackAdmin,
}

impl ApprovalRule {
    pub fn rule_type(&self) -> RuleType {
        match self {
            ApprovalRule::NodeManager => RuleType::NodeManager,
            ApprovalRule::SpecificPerson { .. } => RuleType::SpecificPerson,
            ApprovalRule::RoleBased { .. } => RuleType::RoleBased,
            ApprovalRule::AncestorManager => RuleType::AncestorManager,
            ApprovalRule::Committee { .. } => RuleType::Committee,
            ApprovalRule::FallbackAdmin => RuleType::FallbackAdmin,
        }
    }

    fn validate(&self) -> CoreResult<()> {
        match self {
            ApprovalRule::RoleBased { role, quorum } => {
                if role.trim().is_empty() {
                    return Err(CoreError::validation("role name must not be empty"));
                }
                if let Some(0) = quorum {
                    return Err(CoreError::validation("role quorum must be at least 1"));
                }
                Ok(())
            }
            ApprovalRule::Committee { members, quorum } => {
                if members.is_empty() {
                    return Err(CoreError::validation("committee must have members"));
                }
                if *quorum == 0 || *quorum as usize > members.len() {
                    return Err(CoreError::validation(format!(
                        "committee quorum {} must be between 1 and {}",
                        quorum,
                        members.len()
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// An approval policy attached to one org node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub id: PolicyId,
    pub org_node_id: NodeId,
    pub scope: Scope,
    /// 1-based level, unique per active `(org node, scope)` group.
    pub level: u32,
    pub rule: ApprovalRule,
    pub cross_bu_strategy: CrossBuStrategy,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`PolicyStore::create`].
#[derive(Clone, Debug)]
pub struct NewPolicy {
    pub org_node_id: NodeId,
    pub scope: Scope,
    pub level: u32,
    pub rule: ApprovalRule,
    pub cross_bu_strategy: CrossBuStrategy,
}

/// Mutable fields of an active policy.
#[derive(Clone, Debug, Default)]
pub struct PolicyUpdate {
    pub rule: Option<ApprovalRule>,
    pub cross_bu_strategy: Option<CrossBuStrategy>,
}

/// Store owning [`ApprovalPolicy`] entities.
#[derive(Default)]
pub struct PolicyStore {
    policies: RwLock<HashMap<PolicyId, ApprovalPolicy>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy. The new level must extend the active group densely:
    /// exactly one more than the current highest active level (or 1 for an
    /// empty group).
    pub fn create(&self, input: NewPolicy, now: DateTime<Utc>) -> CoreResult<ApprovalPolicy> {
        if input.level == 0 {
            return Err(CoreError::validation("policy level must be at least 1"));
        }
        input.rule.validate()?;

        let mut guard = self.write_guard()?;
        let active_count = guard
            .values()
            .filter(|policy| {
                policy.is_active
                    && policy.org_node_id == input.org_node_id
                    && policy.scope == input.scope
            })
            .count() as u32;
        if input.level != active_count + 1 {
            return Err(CoreError::validation(format!(
                "policy level {} breaks the dense sequence; next level for node {} scope {:?} is {}",
                input.level,
                input.org_node_id,
                input.scope,
                active_count + 1
            )));
        }

        let policy = ApprovalPolicy {
            id: PolicyId::generate(),
            org_node_id: input.org_node_id,
            scope: input.scope,
            level: input.level,
            rule: input.rule,
            cross_bu_strategy: input.cross_bu_strategy,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        info!(
            policy_id = %policy.id,
            node = %policy.org_node_id,
            scope = ?policy.scope,
            level = policy.level,
            "approval policy created"
        );
        guard.insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    /// Update the rule or strategy of an active policy. The level and owning
    /// node never change; supersede by deactivating and re-creating.
    pub fn update(
        &self,
        id: &PolicyId,
        patch: PolicyUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<ApprovalPolicy> {
        if let Some(rule) = &patch.rule {
            rule.validate()?;
        }

        let mut guard = self.write_guard()?;
        let policy = guard
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("approval policy", id))?;
        if !policy.is_active {
            return Err(CoreError::validation(format!(
                "policy {id} is inactive and cannot be updated"
            )));
        }

        if let Some(rule) = patch.rule {
            policy.rule = rule;
        }
        if let Some(strategy) = patch.cross_bu_strategy {
            policy.cross_bu_strategy = strategy;
        }
        policy.updated_at = now;
        Ok(policy.clone())
    }

    /// Deactivate one policy. Only the highest active level of its group may
    /// be deactivated, otherwise the remaining levels would no longer be
    /// dense.
    pub fn deactivate(&self, id: &PolicyId, now: DateTime<Utc>) -> CoreResult<ApprovalPolicy> {
        let mut guard = self.write_guard()?;
        let (org_node_id, scope, level, is_active) = {
            let policy = guard
                .get(id)
                .ok_or_else(|| CoreError::not_found("approval policy", id))?;
            (
                policy.org_node_id.clone(),
                policy.scope,
                policy.level,
                policy.is_active,
            )
        };
        if !is_active {
            return Err(CoreError::validation(format!(
                "policy {id} is already inactive"
            )));
        }

        let highest = guard
            .values()
            .filter(|policy| {
                policy.is_active && policy.org_node_id == org_node_id && policy.scope == scope
            })
            .map(|policy| policy.level)
            .max()
            .unwrap_or(0);
        if level != highest {
            return Err(CoreError::validation(format!(
                "cannot deactivate level {level} while level {highest} is active; deactivate from the top"
            )));
        }

        let policy = guard
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("approval policy", id))?;
        policy.is_active = false;
        policy.updated_at = now;
        info!(policy_id = %id, "approval policy deactivated");
        Ok(policy.clone())
    }

    /// Deactivate every active policy attached to the given nodes, any scope.
    /// Used when a subtree is moved or soft-deleted.
    pub fn deactivate_for_nodes(&self, nodes: &[NodeId], now: DateTime<Utc>) -> CoreResult<usize> {
        let mut guard = self.write_guard()?;
        let mut deactivated = 0;
        for policy in guard.values_mut() {
            if policy.is_active && nodes.contains(&policy.org_node_id) {
                policy.is_active = false;
                policy.updated_at = now;
                deactivated += 1;
            }
        }
        if deactivated > 0 {
            debug!(count = deactivated, "cascaded policy deactivation");
        }
        Ok(deactivated)
    }

    /// Active policies for one `(org node, scope)` group, ordered by level.
    pub fn list_active(&self, org_node_id: &NodeId, scope: Scope) -> CoreResult<Vec<ApprovalPolicy>> {
        let guard = self.read_guard()?;
        let mut policies: Vec<ApprovalPolicy> = guard
            .values()
            .filter(|policy| {
                policy.is_active && &policy.org_node_id == org_node_id && policy.scope == scope
            })
            .cloned()
            .collect();
        policies.sort_by_key(|policy| policy.level);
        Ok(policies)
    }

    /// Whether the node carries any active policy in any scope.
    pub fn has_active_for_node(&self, org_node_id: &NodeId) -> CoreResult<bool> {
        let guard = self.read_guard()?;
        Ok(guard
            .values()
            .any(|policy| policy.is_active && &policy.org_node_id == org_node_id))
    }

    pub fn get(&self, id: &PolicyId) -> CoreResult<ApprovalPolicy> {
        let guard = self.read_guard()?;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("approval policy", id))
    }

    fn read_guard(
        &self,
    ) -> CoreResult<std::sync::RwLockReadGuard<'_, HashMap<PolicyId, ApprovalPolicy>>> {
        self.policies
            .read()
            .map_err(|_| CoreError::conflict("policy lock poisoned"))
    }

    fn write_guard(
        &self,
    ) -> CoreResult<std::sync::RwLockWriteGuard<'_, HashMap<PolicyId, ApprovalPolicy>>> {
        self.policies
            .write()
            .map_err(|_| CoreError::conflict("policy lock poisoned"))
    }
}
