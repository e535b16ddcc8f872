//! Public API trait for the access decision engine.

use async_trait::async_trait;

use crate::models::{AccessDecision, AccessRequest};

/// Public API trait for the access decision engine.
///
/// Consumed by policy enforcement points:
///
/// ```ignore
/// let decision = engine.evaluate_access_request(request).await;
/// ```
#[async_trait]
pub trait AccessDecisionClient: Send + Sync {
    /// Evaluate an access request.
    ///
    /// Never fails: collaborator faults are reported as a denial with
    /// [`DecisionReason::InternalError`](crate::DecisionReason::InternalError).
    async fn evaluate_access_request(&self, request: AccessRequest) -> AccessDecision;
}
