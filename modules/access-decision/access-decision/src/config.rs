//! Configuration for the access decision module.

use std::collections::BTreeMap;
use std::time::Duration;

use access_decision_sdk::AccessLevel;
use serde::Deserialize;
use thiserror::Error;

/// Module configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessDecisionConfig {
    /// Device risk strictly above this value denies the request.
    pub device_risk_threshold: f64,

    /// Network risk strictly above this value denies the request.
    pub network_risk_threshold: f64,

    /// Weights of the risk aggregation formula.
    pub risk_weights: RiskWeights,

    /// Risk-to-session-lifetime mapping.
    pub session_timeouts: SessionTimeoutConfig,

    /// Minimum access level per permission name, used when a resource policy
    /// does not list the permission itself.
    pub default_permission_levels: BTreeMap<String, AccessLevel>,

    /// Upper bound for each collaborator call. `None` disables the bound.
    pub lookup_timeout_ms: Option<u64>,
}

impl Default for AccessDecisionConfig {
    fn default() -> Self {
        Self {
            device_risk_threshold: 0.7,
            network_risk_threshold: 0.7,
            risk_weights: RiskWeights::default(),
            session_timeouts: SessionTimeoutConfig::default(),
            default_permission_levels: default_permission_levels(),
            lookup_timeout_ms: Some(5_000),
        }
    }
}

fn default_permission_levels() -> BTreeMap<String, AccessLevel> {
    [
        ("read", AccessLevel::ReadOnly),
        ("list", AccessLevel::ReadOnly),
        ("write", AccessLevel::Standard),
        ("create", AccessLevel::Standard),
        ("update", AccessLevel::Standard),
        ("delete", AccessLevel::Elevated),
        ("admin", AccessLevel::Elevated),
    ]
    .into_iter()
    .map(|(name, level)| (name.to_owned(), level))
    .collect()
}

/// Weights of
/// `user*u + device*d + network*n + sensitivity*s*max(u, d, n)`.
///
/// Weights need not sum to 1; the result is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskWeights {
    pub user: f64,
    pub device: f64,
    pub network: f64,
    pub sensitivity: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            user: 0.25,
            device: 0.25,
            network: 0.2,
            sensitivity: 0.5,
        }
    }
}

/// Piecewise session lifetime: the first tier whose `below` exceeds the risk
/// wins, otherwise `floor_minutes`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionTimeoutConfig {
    pub tiers: Vec<SessionTier>,
    pub floor_minutes: u32,
}

impl Default for SessionTimeoutConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                SessionTier {
                    below: 0.3,
                    minutes: 480,
                },
                SessionTier {
                    below: 0.6,
                    minutes: 120,
                },
            ],
            floor_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionTier {
    /// Exclusive upper risk bound of this tier.
    pub below: f64,
    pub minutes: u32,
}

/// Configuration rejected by [`AccessDecisionConfig::validate`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("risk weight '{name}' must be finite and non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("invalid session timeouts: {0}")]
    SessionTimeouts(String),

    #[error("lookup_timeout_ms must be positive")]
    ZeroLookupTimeout,
}

impl AccessDecisionConfig {
    /// Check value ranges and monotonicity requirements.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("device_risk_threshold", self.device_risk_threshold)?;
        check_unit("network_risk_threshold", self.network_risk_threshold)?;
        self.risk_weights.validate()?;
        self.session_timeouts.validate()?;
        if self.lookup_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroLookupTimeout);
        }
        Ok(())
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout_ms.map(Duration::from_millis)
    }
}

impl RiskWeights {
    /// Non-negative weights keep the aggregate monotone in every input.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidWeight`] for a negative, infinite or `NaN` weight.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("user", self.user),
            ("device", self.device),
            ("network", self.network),
            ("sensitivity", self.sensitivity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

impl SessionTimeoutConfig {
    /// # Errors
    ///
    /// [`ConfigError::SessionTimeouts`] unless bounds ascend within `(0, 1]`
    /// and minutes are positive and never increase with risk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floor_minutes == 0 {
            return Err(ConfigError::SessionTimeouts(
                "floor_minutes must be positive".to_owned(),
            ));
        }

        let mut previous: Option<&SessionTier> = None;
        for tier in &self.tiers {
            if !(tier.below > 0.0 && tier.below <= 1.0) {
                return Err(ConfigError::SessionTimeouts(format!(
                    "tier bound {} is outside (0, 1]",
                    tier.below
                )));
            }
            if tier.minutes == 0 {
                return Err(ConfigError::SessionTimeouts(
                    "tier minutes must be positive".to_owned(),
                ));
            }
            if let Some(prev) = previous {
                if tier.below <= prev.below {
                    return Err(ConfigError::SessionTimeouts(
                        "tier bounds must be strictly ascending".to_owned(),
                    ));
                }
                if tier.minutes > prev.minutes {
                    return Err(ConfigError::SessionTimeouts(
                        "tier minutes must not increase with risk".to_owned(),
                    ));
                }
            }
            previous = Some(tier);
        }

        match previous {
            Some(last) if self.floor_minutes > last.minutes => Err(ConfigError::SessionTimeouts(
                "floor_minutes must not exceed the last tier".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}
