use crate::model::ApprovalRequest;
use async_trait::async_trait;

/// Post-transition hook. The engine announces, delivery is someone else's
/// problem; a hook must not fail the operation that triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A pending request is waiting on the approvers of its current level.
    /// Fired at creation and again after each level advancement.
    async fn decision_requested(&self, request: &ApprovalRequest);

    /// The request reached a terminal state.
    async fn request_resolved(&self, request: &ApprovalRequest);
}

/// Default hook that announces nothing.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn decision_requested(&self, _request: &ApprovalRequest) {}

    async fn request_resolved(&self, _request: &ApprovalRequest) {}
}
