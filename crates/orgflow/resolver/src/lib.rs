//! Orgflow Resolver - deterministic approval chain resolution
//!
//! A pure, read-only computation: `(subject node, scope, as-of time)` to an
//! ordered list of [`ChainStep`]s. Given identical tree, policy, and
//! delegation contents and the same as-of time, repeated calls produce
//! field-identical chains; the result is frozen into a request snapshot and
//! must be reproducible for audit replay.
//!
//! Resolution walks the subject's ancestry, selects contributing policy sets
//! per the cross-BU strategy, resolves approvers per rule variant, and
//! finally applies delegation substitution to each approver individually.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use orgflow_delegation::DelegationStore;
use orgflow_policy::{ApprovalPolicy, ApprovalRule, PolicyStore};
use orgflow_tree::{OrgNode, OrgTree};
use orgflow_types::{
    ChainStep, CoreError, CoreResult, CrossBuStrategy, NodeId, Person, PersonDirectory, PersonId,
    ResolvedApprover, Scope,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Resolves approval chains against live tree, policy, and delegation state.
///
/// Read-only and side-effect-free; safe to run concurrently with writers
/// because its output is only meaningful once frozen into a snapshot.
#[derive(Clone)]
pub struct ChainResolver {
    tree: Arc<OrgTree>,
    policies: Arc<PolicyStore>,
    delegations: Arc<DelegationStore>,
    directory: Arc<dyn PersonDirectory>,
}

impl ChainResolver {
    pub fn new(
        tree: Arc<OrgTree>,
        policies: Arc<PolicyStore>,
        delegations: Arc<DelegationStore>,
        directory: Arc<dyn PersonDirectory>,
    ) -> Self {
        Self {
            tree,
            policies,
            delegations,
            directory,
        }
    }

    /// Resolve the chain for a subject node and scope as of the given time.
    ///
    /// Returns an empty chain when no node on the walked path carries an
    /// active policy for the scope: the subject requires no approval.
    pub fn resolve(
        &self,
        subject: &NodeId,
        scope: Scope,
        as_of: DateTime<Utc>,
    ) -> CoreResult<Vec<ChainStep>> {
        let subject_node = self.tree.get_node(subject)?;
        if !subject_node.is_active {
            return Err(CoreError::not_found("org node", subject));
        }

        // Walk order: subject first, then ancestors up to the root.
        let mut walk = vec![subject_node];
        for ancestor in self.tree.get_ancestors(subject)?.into_iter().rev() {
            walk.push(ancestor);
        }

        let mut contributing: Vec<(OrgNode, Vec<ApprovalPolicy>)> = Vec::new();
        for node in walk {
            let set = self.policies.list_active(&node.id, scope)?;
            if !set.is_empty() {
                contributing.push((node, set));
            }
        }
        if contributing.is_empty() {
            debug!(subject = %subject, ?scope, "no active policies on path; empty chain");
            return Ok(Vec::new());
        }

        // Cross-BU strategy: if any contributing policy asks for all
        // branches, every intermediate level gates approval; otherwise only
        // the nearest contributing node does.
        let all_branches = contributing.iter().any(|(_, set)| {
            set.iter()
                .any(|policy| policy.cross_bu_strategy == CrossBuStrategy::AllBranches)
        });
        if !all_branches {
            contributing.truncate(1);
        }

        let mut steps = Vec::new();
        for (node, set) in &contributing {
            for policy in set {
                let (resolved, quorum) = self.resolve_rule(node, policy)?;

                let mut substituted = Vec::with_capacity(resolved.len());
                for approver in resolved {
                    substituted.push(self.substitute(approver, scope, &node.id, as_of)?);
                }
                let mut seen = HashSet::new();
                let approvers: Vec<ResolvedApprover> = substituted
                    .into_iter()
                    .filter(|approver| seen.insert(approver.person_id.clone()))
                    .collect();

                if approvers.is_empty() {
                    return Err(CoreError::configuration(format!(
                        "no approvers resolvable for node {} policy level {} ({:?})",
                        node.id,
                        policy.level,
                        policy.rule.rule_type()
                    )));
                }
                // Delegation can collapse several seats onto one person; a
                // step whose distinct approvers cannot meet its quorum would
                // freeze into a request no decision sequence can approve.
                if let Some(required) = quorum {
                    if (approvers.len() as u32) < required {
                        return Err(CoreError::configuration(format!(
                            "node {} policy level {} resolves {} distinct approver(s), below its quorum of {}",
                            node.id,
                            policy.level,
                            approvers.len(),
                            required
                        )));
                    }
                }

                steps.push(ChainStep {
                    level: steps.len() as u32 + 1,
                    org_node_id: node.id.clone(),
                    org_node_name: node.name.clone(),
                    rule_type: policy.rule.rule_type(),
                    resolved_approvers: approvers,
                    quorum,
                });
            }
        }

        debug!(subject = %subject, ?scope, levels = steps.len(), "chain resolved");
        Ok(steps)
    }

    /// Resolve one rule variant into approvers and the level quorum.
    fn resolve_rule(
        &self,
        node: &OrgNode,
        policy: &ApprovalPolicy,
    ) -> CoreResult<(Vec<ResolvedApprover>, Option<u32>)> {
        match &policy.rule {
            ApprovalRule::NodeManager => {
                match node
                    .manager_id
                    .as_ref()
                    .and_then(|manager| self.active_person(manager))
                {
                    Some(manager) => Ok((vec![to_approver(manager)], None)),
                    // Unmanaged node: fail upward to the administrators
                    // rather than abort resolution.
                    None => Ok((self.administrators(), Some(1))),
                }
            }
            ApprovalRule::SpecificPerson { person_id } => {
                let approvers = self
                    .active_person(person_id)
                    .map(|person| vec![to_approver(person)])
                    .unwrap_or_default();
                Ok((approvers, None))
            }
            ApprovalRule::RoleBased { role, quorum } => {
                let approvers = self
                    .directory
                    .people_with_role(role)
                    .into_iter()
                    .map(to_approver)
                    .collect();
                Ok((approvers, Some(quorum.unwrap_or(1))))
            }
            ApprovalRule::AncestorManager => {
                // Beyond the node's own manager: the nearest managed
                // ancestor decides.
                let ancestors = self.tree.get_ancestors(&node.id)?;
                let manager = ancestors.iter().rev().find_map(|ancestor| {
                    ancestor
                        .manager_id
                        .as_ref()
                        .and_then(|manager| self.active_person(manager))
                });
                match manager {
                    Some(manager) => Ok((vec![to_approver(manager)], None)),
                    None => Ok((self.administrators(), Some(1))),
                }
            }
            ApprovalRule::Committee { members, quorum } => {
                let approvers: Vec<ResolvedApprover> = members
                    .iter()
                    .filter_map(|member| self.active_person(member))
                    .map(to_approver)
                    .collect();
                if (approvers.len() as u32) < *quorum {
                    return Err(CoreError::configuration(format!(
                        "committee on node {} resolves {} member(s), below its quorum of {}",
                        node.id,
                        approvers.len(),
                        quorum
                    )));
                }
                Ok((approvers, Some(*quorum)))
            }
            ApprovalRule::FallbackAdmin => Ok((self.administrators(), Some(1))),
        }
    }

    /// Apply delegation substitution to one resolved approver. The delegate
    /// replaces the delegator outright and decides on their own behalf; a
    /// delegation whose delegate cannot be resolved to an active person
    /// leaves the original approver in place.
    fn substitute(
        &self,
        approver: ResolvedApprover,
        scope: Scope,
        org_node_id: &NodeId,
        as_of: DateTime<Utc>,
    ) -> CoreResult<ResolvedApprover> {
        let delegation =
            self.delegations
                .find_active(&approver.person_id, scope, org_node_id, as_of)?;
        if let Some(delegation) = delegation {
            if let Some(delegate) = self.active_person(&delegation.delegate_id) {
                debug!(
                    delegator = %approver.person_id,
                    delegate = %delegate.id,
                    delegation = %delegation.id,
                    "approver substituted by delegation"
                );
                return Ok(to_approver(delegate));
            }
        }
        Ok(approver)
    }

    fn active_person(&self, id: &PersonId) -> Option<Person> {
        self.directory.get(id).filter(|person| person.is_active)
    }

    fn administrators(&self) -> Vec<ResolvedApprover> {
        self.directory
            .administrators()
            .into_iter()
            .map(to_approver)
            .collect()
    }
}

fn to_approver(person: Person) -> ResolvedApprover {
    ResolvedApprover {
        person_id: person.id,
        name: person.name,
        email: person.email,
    }
}
