//! Shared test helpers for orgflow integration tests.
//!
//! Provides a fully wired deployment with an in-memory directory, request
//! store, and audit sink, plus shorthand for building orgs and policies.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use orgflow_audit::InMemoryAuditSink;
use orgflow_delegation::{DelegationStore, NewDelegation};
use orgflow_engine::{ApprovalRequestEngine, InMemoryRequestStore, NewRequest};
use orgflow_policy::{ApprovalRule, NewPolicy, PolicyStore};
use orgflow_resolver::ChainResolver;
use orgflow_tree::{NewNode, OrgTree};
use orgflow_types::{
    CrossBuStrategy, DelegationId, FixedClock, InMemoryDirectory, NodeId, NodeType, PersonId,
    Scope, SubjectType,
};

/// A fully wired orgflow deployment for integration testing.
pub struct TestDeployment {
    pub directory: Arc<InMemoryDirectory>,
    pub tree: Arc<OrgTree>,
    pub policies: Arc<PolicyStore>,
    pub delegations: Arc<DelegationStore>,
    pub audit: Arc<InMemoryAuditSink>,
    pub clock: Arc<FixedClock>,
    pub engine: ApprovalRequestEngine,
}

/// The pinned start instant of every deployment.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

impl TestDeployment {
    pub fn new() -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let tree = Arc::new(OrgTree::new(directory.clone()));
        let policies = Arc::new(PolicyStore::new());
        let delegations = Arc::new(DelegationStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let clock = Arc::new(FixedClock::new(start()));

        let resolver = ChainResolver::new(
            tree.clone(),
            policies.clone(),
            delegations.clone(),
            directory.clone(),
        );
        let engine = ApprovalRequestEngine::new(
            resolver,
            Arc::new(InMemoryRequestStore::new()),
            audit.clone(),
            clock.clone(),
        );

        Self {
            directory,
            tree,
            policies,
            delegations,
            audit,
            clock,
            engine,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use orgflow_types::Clock;
        self.clock.now()
    }

    pub fn person(&self, id: &str, name: &str, role: &str) -> PersonId {
        self.directory.insert_active(id, name, role)
    }

    pub fn node(
        &self,
        name: &str,
        code: &str,
        node_type: NodeType,
        parent: Option<&NodeId>,
        manager: Option<&str>,
    ) -> NodeId {
        let mut input = NewNode::new(name, code, node_type, parent.cloned());
        if let Some(manager) = manager {
            input = input.with_manager(PersonId::new(manager));
        }
        self.tree
            .create_node(input, self.now())
            .expect("node creation")
            .id
    }

    pub fn policy(
        &self,
        node: &NodeId,
        scope: Scope,
        level: u32,
        rule: ApprovalRule,
        strategy: CrossBuStrategy,
    ) {
        self.policies
            .create(
                NewPolicy {
                    org_node_id: node.clone(),
                    scope,
                    level,
                    rule,
                    cross_bu_strategy: strategy,
                },
                self.now(),
            )
            .expect("policy creation");
    }

    pub fn delegation(
        &self,
        delegator: &str,
        delegate: &str,
        scope: Option<Scope>,
        window: (DateTime<Utc>, DateTime<Utc>),
    ) -> DelegationId {
        self.delegations
            .create(
                NewDelegation {
                    delegator_id: PersonId::new(delegator),
                    delegate_id: PersonId::new(delegate),
                    scope,
                    org_node_id: None,
                    effective_start: window.0,
                    effective_end: window.1,
                    reason: "integration scenario".to_string(),
                },
                self.now(),
            )
            .expect("delegation creation")
            .id
    }

    /// Standard request input: an initiative raised under `node`.
    pub fn initiative(&self, subject: &str, node: &NodeId, requester: &str) -> NewRequest {
        NewRequest::new(
            SubjectType::Initiative,
            subject,
            node.clone(),
            PersonId::new(requester),
        )
    }
}

impl Default for TestDeployment {
    fn default() -> Self {
        Self::new()
    }
}

/// The canonical three-level org: ROOT → DIVISION "D" (managed by `mgr-1`)
/// → TEAM "T".
pub struct ThreeLevelOrg {
    pub deployment: TestDeployment,
    pub root: NodeId,
    pub division: NodeId,
    pub team: NodeId,
}

impl ThreeLevelOrg {
    pub fn build() -> Self {
        let deployment = TestDeployment::new();
        deployment.person("mgr-1", "Dana", "manager");
        let root = deployment.node("Acme", "acme", NodeType::Root, None, None);
        let division = deployment.node(
            "Division D",
            "d",
            NodeType::Division,
            Some(&root),
            Some("mgr-1"),
        );
        let team = deployment.node("Team T", "t", NodeType::Team, Some(&division), None);
        Self {
            deployment,
            root,
            division,
            team,
        }
    }
}
