//! Reorganizations: moving and soft-deleting subtrees cascades policy
//! deactivation, while requests frozen before the reorg stay decidable.

use orgflow_engine::{DecisionOutcome, RequestStatus};
use orgflow_policy::ApprovalRule;
use orgflow_types::{CoreError, CrossBuStrategy, NodeType, PersonId, RuleType, Scope};

use crate::helpers::ThreeLevelOrg;

#[tokio::test]
async fn moving_a_team_rehomes_future_requests() {
    let org = ThreeLevelOrg::build();
    let d = &org.deployment;
    d.person("lead-1", "Lee", "team-lead");
    d.person("mgr-2", "Remy", "manager");
    let division_e = d.node(
        "Division E",
        "e",
        NodeType::Division,
        Some(&org.root),
        Some("mgr-2"),
    );
    d.policy(
        &org.team,
        Scope::Initiative,
        1,
        ApprovalRule::RoleBased {
            role: "team-lead".to_string(),
            quorum: None,
        },
        CrossBuStrategy::CommonAncestor,
    );
    d.policy(
        &org.division,
        Scope::Initiative,
        1,
        ApprovalRule::NodeManager,
        CrossBuStrategy::CommonAncestor,
    );
    d.policy(
        &division_e,
        Scope::Initiative,
        1,
        ApprovalRule::NodeManager,
        CrossBuStrategy::CommonAncestor,
    );

    let before = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(before.snapshot_chain[0].rule_type, RuleType::RoleBased);

    let rewritten = d
        .tree
        .move_node(&org.team, &division_e, &d.policies, d.now())
        .unwrap();
    assert_eq!(rewritten, 1);
    assert!(!d.policies.has_active_for_node(&org.team).unwrap());

    // The moved team sits under Division E now.
    let ancestors = d.tree.get_ancestors(&org.team).unwrap();
    assert!(ancestors.iter().any(|node| node.id == division_e));
    assert!(ancestors.iter().all(|node| node.id != org.division));

    // Its own policy died in the move, so Division E's manager governs new
    // requests.
    let after = d
        .engine
        .create_request(d.initiative("init-2", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(after.snapshot_chain[0].org_node_id, division_e);
    assert_eq!(
        after.snapshot_chain[0].resolved_approvers[0].person_id,
        PersonId::new("mgr-2")
    );

    // The pre-move request keeps its frozen team-lead gate.
    let resolved = d
        .engine
        .submit_decision(
            &before.id,
            &PersonId::new("lead-1"),
            DecisionOutcome::Approved,
            None,
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, RequestStatus::Approved);
}

#[tokio::test]
async fn soft_delete_guards_and_cascades() {
    let org = ThreeLevelOrg::build();
    let d = &org.deployment;
    d.person("lead-1", "Lee", "team-lead");
    d.policy(
        &org.team,
        Scope::Initiative,
        1,
        ApprovalRule::RoleBased {
            role: "team-lead".to_string(),
            quorum: None,
        },
        CrossBuStrategy::CommonAncestor,
    );

    // A division with an active child refuses deletion.
    let guarded = d.tree.delete_node(&org.division, &d.policies, d.now());
    assert!(matches!(guarded, Err(CoreError::Validation(_))));

    d.tree.delete_node(&org.team, &d.policies, d.now()).unwrap();
    assert!(!d.policies.has_active_for_node(&org.team).unwrap());

    // No requests can be raised under a deleted node.
    let orphaned = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await;
    assert!(matches!(orphaned, Err(CoreError::NotFound { .. })));

    // With the team gone, the division is a leaf again and deletable.
    d.tree
        .delete_node(&org.division, &d.policies, d.now())
        .unwrap();
}
