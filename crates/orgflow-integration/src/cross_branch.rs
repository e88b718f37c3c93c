//! ALL_BRANCHES resolution: every node on the path with an active policy
//! contributes levels, subject side first.

use orgflow_engine::{DecisionOutcome, RequestStatus};
use orgflow_policy::ApprovalRule;
use orgflow_types::{CoreError, CrossBuStrategy, PersonId, RuleType, Scope};

use crate::helpers::ThreeLevelOrg;

fn two_branch_org() -> ThreeLevelOrg {
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
    d.policy(
        &org.division,
        Scope::Initiative,
        1,
        ApprovalRule::NodeManager,
        CrossBuStrategy::AllBranches,
    );
    org
}

#[tokio::test]
async fn team_gate_comes_before_the_division_gate() {
    let org = two_branch_org();
    let d = &org.deployment;

    let request = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(request.snapshot_chain.len(), 2);
    assert_eq!(request.snapshot_chain[0].org_node_id, org.team);
    assert_eq!(request.snapshot_chain[0].rule_type, RuleType::RoleBased);
    assert_eq!(request.snapshot_chain[1].org_node_id, org.division);
    assert_eq!(request.snapshot_chain[1].rule_type, RuleType::NodeManager);

    // The division manager holds no seat until the team level passes.
    let premature = d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("mgr-1"),
            DecisionOutcome::Approved,
            None,
        )
        .await;
    assert!(matches!(premature, Err(CoreError::Validation(_))));

    let after_team = d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("lead-1"),
            DecisionOutcome::Approved,
            None,
        )
        .await
        .unwrap();
    assert_eq!(after_team.status, RequestStatus::Pending);
    assert_eq!(after_team.current_level, 2);

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
}

#[tokio::test]
async fn rejection_at_the_first_gate_never_reaches_the_second() {
    let org = two_branch_org();
    let d = &org.deployment;

    let request = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();

    let rejected = d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("lead-1"),
            DecisionOutcome::Rejected,
            Some("not staffed".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(rejected.current_level, 1);

    // The division manager never gets to decide.
    let late = d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("mgr-1"),
            DecisionOutcome::Approved,
            None,
        )
        .await;
    assert!(matches!(late, Err(CoreError::Validation(_))));

    // Resubmission is a new request with a fresh chain.
    let retry = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(retry.status, RequestStatus::Pending);
    assert_eq!(retry.current_level, 1);
}
