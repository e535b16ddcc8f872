//! Risk aggregation.

use access_decision_sdk::RiskScore;

use crate::config::RiskWeights;

/// Collapses user, device, network and resource-sensitivity risk into one
/// score:
///
/// ```text
/// clamp(w_u*u + w_d*d + w_n*n + w_s*s*max(u, d, n), 0, 1)
/// ```
///
/// Sensitivity scales the strongest of the other signals rather than adding
/// on its own. With non-negative weights the result is monotone in every
/// input.
#[derive(Debug, Clone, Copy)]
pub struct RiskAggregator {
    weights: RiskWeights,
}

impl RiskAggregator {
    /// `weights` must already have passed [`RiskWeights::validate`].
    #[must_use]
    pub fn new(weights: RiskWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub fn aggregate(
        &self,
        user: RiskScore,
        device: RiskScore,
        network: RiskScore,
        sensitivity: RiskScore,
    ) -> RiskScore {
        let (u, d, n, s) = (
            user.value(),
            device.value(),
            network.value(),
            sensitivity.value(),
        );
        let peak = u.max(d).max(n);
        let w = &self.weights;

        RiskScore::new(w.user * u + w.device * d + w.network * n + w.sensitivity * s * peak)
    }
}
