//! Session lifetime as a function of risk.

use access_decision_sdk::RiskScore;

use crate::config::{SessionTier, SessionTimeoutConfig};

/// Piecewise, monotonically non-increasing risk-to-minutes mapping.
#[derive(Debug, Clone)]
pub struct SessionTimeoutPolicy {
    tiers: Vec<SessionTier>,
    floor_minutes: u32,
}

impl SessionTimeoutPolicy {
    /// `config` must already have passed [`SessionTimeoutConfig::validate`].
    #[must_use]
    pub fn new(config: &SessionTimeoutConfig) -> Self {
        Self {
            tiers: config.tiers.clone(),
            floor_minutes: config.floor_minutes,
        }
    }

    #[must_use]
    pub fn timeout_minutes(&self, risk: RiskScore) -> u32 {
        self.tiers
            .iter()
            .find(|tier| risk.value() < tier.below)
            .map_or(self.floor_minutes, |tier| tier.minutes)
    }
}
