//! Orgflow End-to-End Integration Tests
//!
//! Cross-crate scenarios exercising the tree, policies, delegations, chain
//! resolution, and the request state machine together.
//!
//! Run with: `cargo test -p orgflow-integration`

/// Shared test helpers — deployment wiring, org construction, etc.
pub mod helpers;

#[cfg(test)]
mod cross_branch;
#[cfg(test)]
mod delegation_window;
#[cfg(test)]
mod manager_approval;
#[cfg(test)]
mod reorg;
