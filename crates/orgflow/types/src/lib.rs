//! Orgflow Types - shared vocabulary of the approval engine
//!
//! Identifier newtypes, approval scopes, the frozen [`ChainStep`] value type,
//! the error taxonomy, and the injectable [`Clock`] and [`PersonDirectory`]
//! contracts consumed by every other orgflow crate.

#![deny(unsafe_code)]

mod chain;
mod clock;
mod directory;
mod error;
mod ids;

pub use chain::{ChainStep, CrossBuStrategy, ResolvedApprover, RuleType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use directory::{InMemoryDirectory, Person, PersonDirectory, PLATFORM_ADMIN_ROLE};
pub use error::{CoreError, CoreResult};
pub use ids::{DecisionId, DelegationId, MembershipId, NodeId, PersonId, PolicyId, RequestId};

use serde::{Deserialize, Serialize};

/// Approval scope a policy or request applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    ResourceAllocation,
    Initiative,
    Scenario,
}

/// Kind of entity an approval request is raised for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Allocation,
    Initiative,
    Scenario,
}

impl SubjectType {
    /// The approval scope this subject kind is governed by.
    pub fn scope(&self) -> Scope {
        match self {
            SubjectType::Allocation => Scope::ResourceAllocation,
            SubjectType::Initiative => Scope::Initiative,
            SubjectType::Scenario => Scope::Scenario,
        }
    }
}

/// Kind of node in the organization tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Root,
    Division,
    Department,
    Team,
    Virtual,
    Product,
    Platform,
    Functional,
    Chapter,
}
