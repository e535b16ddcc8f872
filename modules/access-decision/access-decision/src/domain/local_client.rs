//! Local (in-process) client for the access decision service.

use std::sync::Arc;

use access_decision_sdk::{AccessDecision, AccessDecisionClient, AccessRequest};
use async_trait::async_trait;

use super::Service;

/// Local client wrapping the decision service.
pub struct AccessDecisionLocalClient {
    svc: Arc<Service>,
}

impl AccessDecisionLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl AccessDecisionClient for AccessDecisionLocalClient {
    async fn evaluate_access_request(&self, request: AccessRequest) -> AccessDecision {
        self.svc.evaluate_access_request(&request).await
    }
}
