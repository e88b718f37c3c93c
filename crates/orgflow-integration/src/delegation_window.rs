//! Delegation substitution at resolution time: the delegate takes the
//! delegator's seat for requests created inside the window, and snapshots
//! keep that seat even after the window closes.

use chrono::Duration;
use orgflow_engine::{DecisionOutcome, RequestStatus};
use orgflow_policy::ApprovalRule;
use orgflow_types::{CrossBuStrategy, PersonId, Scope};

use crate::helpers::{start, ThreeLevelOrg};

fn delegating_org() -> ThreeLevelOrg {
    let org = ThreeLevelOrg::build();
    let d = &org.deployment;
    d.person("mgr-2", "Remy", "manager");
    d.policy(
        &org.division,
        Scope::Initiative,
        1,
        ApprovalRule::NodeManager,
        CrossBuStrategy::CommonAncestor,
    );
    d.delegation(
        "mgr-1",
        "mgr-2",
        Some(Scope::Initiative),
        (start(), start() + Duration::days(7)),
    );
    org
}

#[tokio::test]
async fn delegate_replaces_the_manager_inside_the_window() {
    let org = delegating_org();
    let d = &org.deployment;
    d.clock.advance(Duration::days(1));

    let request = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(
        request.snapshot_chain[0].resolved_approvers[0].person_id,
        PersonId::new("mgr-2")
    );

    // The delegator gave the seat away outright.
    assert!(d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("mgr-1"),
            DecisionOutcome::Approved,
            None,
        )
        .await
        .is_err());

    let approved = d
        .engine
        .submit_decision(
            &request.id,
            &PersonId::new("mgr-2"),
            DecisionOutcome::Approved,
            None,
        )
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);

    let decisions = d.engine.decisions(&request.id).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decider_id, PersonId::new("mgr-2"));
}

#[tokio::test]
async fn requests_created_after_the_window_revert_to_the_manager() {
    let org = delegating_org();
    let d = &org.deployment;
    d.clock.advance(Duration::days(8));

    let request = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(
        request.snapshot_chain[0].resolved_approvers[0].person_id,
        PersonId::new("mgr-1")
    );
}

#[tokio::test]
async fn revocation_affects_new_requests_but_not_frozen_seats() {
    let org = ThreeLevelOrg::build();
    let d = &org.deployment;
    d.person("mgr-2", "Remy", "manager");
    d.policy(
        &org.division,
        Scope::Initiative,
        1,
        ApprovalRule::NodeManager,
        CrossBuStrategy::CommonAncestor,
    );
    let delegation = d.delegation(
        "mgr-1",
        "mgr-2",
        None,
        (start(), start() + Duration::days(30)),
    );

    d.clock.advance(Duration::days(1));
    let during = d
        .engine
        .create_request(d.initiative("init-1", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(
        during.snapshot_chain[0].resolved_approvers[0].person_id,
        PersonId::new("mgr-2")
    );

    d.clock.advance(Duration::days(1));
    d.delegations.revoke(&delegation, d.now()).unwrap();

    // New resolutions go back to the delegator immediately.
    let after = d
        .engine
        .create_request(d.initiative("init-2", &org.team, "req-er"))
        .await
        .unwrap();
    assert_eq!(
        after.snapshot_chain[0].resolved_approvers[0].person_id,
        PersonId::new("mgr-1")
    );

    // The request frozen during the window keeps the delegate's seat.
    let resolved = d
        .engine
        .submit_decision(
            &during.id,
            &PersonId::new("mgr-2"),
            DecisionOutcome::Approved,
            None,
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, RequestStatus::Approved);
}
