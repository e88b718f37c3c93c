//! The canonical single-step flow: a division-level NODE_MANAGER policy
//! governs an initiative raised under a grandchild team.

use orgflow_engine::{DecisionOutcome, RequestStatus};
use orgflow_policy::{ApprovalRule, PolicyUpdate};
use orgflow_types::{CrossBuStrategy, PersonId, RuleType, Scope};

use crate::helpers::ThreeLevelOrg;

#[tokio::test]
async fn division_manager_approves_a_team_initiative() {
    let org = ThreeLevelOrg::build();
    let d = &org.deployment;
    d.policy(
        &org.division,
        Scope::Initiative,
        1,
        ApprovalRule::NodeManager,
        CrossBuStrategy::CommonAncestor,
    );

    let request = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();

    // One step, owned by the division, with the manager as sole approver.
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.snapshot_chain.len(), 1);
    let step = &request.snapshot_chain[0];
    assert_eq!(step.org_node_id, org.division);
    assert_eq!(step.rule_type, RuleType::NodeManager);
    assert_eq!(step.resolved_approvers.len(), 1);
    assert_eq!(step.resolved_approvers[0].person_id, PersonId::new("mgr-1"));

    let approved = d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("mgr-1"),
            DecisionOutcome::Approved,
            Some("within budget".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(approved.resolved_at.is_some());

    let actions: Vec<String> = d
        .audit
        .records()
        .iter()
        .map(|record| record.event.action.clone())
        .collect();
    assert_eq!(
        actions,
        vec!["request.created", "decision.submitted", "request.approved"]
    );
}

#[tokio::test]
async fn frozen_snapshots_outlive_policy_and_manager_changes() {
    let org = ThreeLevelOrg::build();
    let d = &org.deployment;
    d.person("mgr-9", "Noor", "manager");
    d.policy(
        &org.division,
        Scope::Initiative,
        1,
        ApprovalRule::NodeManager,
        CrossBuStrategy::CommonAncestor,
    );

    let request = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();

    // Rewire the live configuration under the pending request.
    let policy = d
        .policies
        .list_active(&org.division, Scope::Initiative)
        .unwrap()
        .remove(0);
    d.policies
        .update(
            &policy.id,
            PolicyUpdate {
                rule: Some(ApprovalRule::SpecificPerson {
                    person_id: PersonId::new("mgr-9"),
                }),
                ..Default::default()
            },
            d.now(),
        )
        .unwrap();

    // The snapshot still names the original manager, who remains the only
    // valid decider.
    let frozen = d.engine.get_request(&request.id).await.unwrap();
    assert_eq!(
        frozen.snapshot_chain[0].resolved_approvers[0].person_id,
        PersonId::new("mgr-1")
    );
    assert!(d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("mgr-9"),
            DecisionOutcome::Approved,
            None,
        )
        .await
        .is_err());

    let approved = d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("mgr-1"),
            DecisionOutcome::Approved,
            None,
        )
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);

    // A request raised now resolves against the updated rule.
    let fresh = d
        .engine
        .create_request(d.initiative("init-2", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(
        fresh.snapshot_chain[0].resolved_approvers[0].person_id,
        PersonId::new("mgr-9")
    );
}

#[tokio::test]
async fn subjects_without_governing_policies_auto_approve() {
    let org = ThreeLevelOrg::build();
    let d = &org.deployment;

    let request = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(request.current_level, 0);
    assert!(request.snapshot_chain.is_empty());
}
