use crate::{NodeId, PersonId};
use serde::{Deserialize, Serialize};

/// How approvers at a level are chosen.
///
/// The variant set is closed; chain resolution matches it exhaustively, so a
/// new rule kind is a compile-time-checked extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    NodeManager,
    SpecificPerson,
    RoleBased,
    AncestorManager,
    Committee,
    FallbackAdmin,
}

/// How many ancestor levels contribute to a chain when several ancestors of
/// the subject carry active policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossBuStrategy {
    /// Only the nearest ancestor (subject included) with an active policy set
    /// contributes levels.
    CommonAncestor,
    /// Every ancestor with an active policy set contributes, subject-first.
    AllBranches,
}

/// An approver resolved into the frozen chain snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedApprover {
    pub person_id: PersonId,
    pub name: String,
    pub email: String,
}

/// One level of a resolved approval chain.
///
/// Chain steps are value types: they are deep-copied into the request
/// snapshot at creation time and never mutate afterwards, even when the live
/// tree or policies change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStep {
    /// 1-based position in the chain after dense renumbering.
    pub level: u32,
    pub org_node_id: NodeId,
    pub org_node_name: String,
    pub rule_type: RuleType,
    pub resolved_approvers: Vec<ResolvedApprover>,
    /// Minimum count of approvals required to pass this level. `None` means
    /// every resolved approver must approve.
    pub quorum: Option<u32>,
}

impl ChainStep {
    /// Quorum with the `None` = "all approvers" default applied.
    pub fn effective_quorum(&self) -> u32 {
        self.quorum
            .unwrap_or(self.resolved_approvers.len() as u32)
            .max(1)
    }

    pub fn has_approver(&self, person: &PersonId) -> bool {
        self.resolved_approvers
            .iter()
            .any(|approver| &approver.person_id == person)
    }
}
