//! Domain models for the access decision engine.
//!
//! Request side: [`AccessRequest`] with its opaque [`NetworkInfo`].
//! Collaborator side: [`UserContext`], [`DeviceContext`], [`NetworkContext`],
//! [`ResourcePolicy`]. Result side: [`AccessDecision`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::net::IpAddr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::PolicyValidationError;

/// Normalized risk estimate, always within `[0, 1]`.
///
/// Construction clamps out-of-range input; `NaN` becomes `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct RiskScore(f64);

impl RiskScore {
    pub const MIN: Self = Self(0.0);
    pub const MAX: Self = Self(1.0);

    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::MAX
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for RiskScore {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<RiskScore> for f64 {
    fn from(score: RiskScore) -> Self {
        score.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// Coarse privilege tier, ordered from least to most privileged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Denied,
    ReadOnly,
    Standard,
    Elevated,
}

impl AccessLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Denied => "denied",
            Self::ReadOnly => "read_only",
            Self::Standard => "standard",
            Self::Elevated => "elevated",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation token the subject must satisfy.
///
/// Tokens not known to the engine (e.g. produced by a device-trust evaluator)
/// are carried verbatim in [`RequiredAction::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequiredAction {
    Reauthenticate,
    UseVpn,
    MfaVerification,
    SessionRecording,
    ContactAdmin,
    Other(String),
}

impl RequiredAction {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reauthenticate => "reauthenticate",
            Self::UseVpn => "use_vpn",
            Self::MfaVerification => "mfa_verification",
            Self::SessionRecording => "session_recording",
            Self::ContactAdmin => "contact_admin",
            Self::Other(token) => token,
        }
    }

    fn known(token: &str) -> Option<Self> {
        match token {
            "reauthenticate" => Some(Self::Reauthenticate),
            "use_vpn" => Some(Self::UseVpn),
            "mfa_verification" => Some(Self::MfaVerification),
            "session_recording" => Some(Self::SessionRecording),
            "contact_admin" => Some(Self::ContactAdmin),
            _ => None,
        }
    }
}

impl From<&str> for RequiredAction {
    fn from(token: &str) -> Self {
        Self::known(token).unwrap_or_else(|| Self::Other(token.to_owned()))
    }
}

impl From<String> for RequiredAction {
    fn from(token: String) -> Self {
        Self::known(&token).unwrap_or(Self::Other(token))
    }
}

impl From<RequiredAction> for String {
    fn from(action: RequiredAction) -> Self {
        match action {
            RequiredAction::Other(token) => token,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for RequiredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a decision. Serialized as the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionReason {
    AccessGranted,
    AuthenticationFailed,
    DeviceRiskExceeded,
    NetworkRiskExceeded,
    PolicyNotFound,
    InsufficientEntitlement,
    RiskThresholdExceeded,
    InternalError,
}

impl DecisionReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessGranted => "AccessGranted",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::DeviceRiskExceeded => "DeviceRiskExceeded",
            Self::NetworkRiskExceeded => "NetworkRiskExceeded",
            Self::PolicyNotFound => "PolicyNotFound",
            Self::InsufficientEntitlement => "InsufficientEntitlement",
            Self::RiskThresholdExceeded => "RiskThresholdExceeded",
            Self::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw network signal attached to a request. Opaque to the engine; only the
/// [`NetworkContextEvaluator`](crate::NetworkContextEvaluator) interprets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Source address of the request, if known.
    pub source_ip: Option<IpAddr>,
    /// Additional evaluator-specific signals.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl NetworkInfo {
    #[must_use]
    pub fn from_ip(ip: IpAddr) -> Self {
        Self {
            source_ip: Some(ip),
            properties: HashMap::new(),
        }
    }
}

/// A single access request. Built once per call and consumed by evaluation.
///
/// # Examples
///
/// ```ignore
/// let request = AccessRequest::new("alice", "payroll", "laptop-7")
///     .auth_token(token)
///     .network_info(NetworkInfo::from_ip(ip))
///     .permissions(["read", "write"]);
/// ```
#[derive(Debug)]
pub struct AccessRequest {
    pub user_id: String,
    pub resource_id: String,
    pub device_id: String,
    pub auth_token: SecretString,
    pub network_info: NetworkInfo,
    pub requested_permissions: BTreeSet<String>,
}

impl AccessRequest {
    /// Create a request with no token, no network signal and no permissions.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        resource_id: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            resource_id: resource_id.into(),
            device_id: device_id.into(),
            auth_token: SecretString::from(String::new()),
            network_info: NetworkInfo::default(),
            requested_permissions: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = SecretString::from(token.into());
        self
    }

    #[must_use]
    pub fn network_info(mut self, info: NetworkInfo) -> Self {
        self.network_info = info;
        self
    }

    /// Add one requested permission.
    #[must_use]
    pub fn permission(mut self, name: impl Into<String>) -> Self {
        self.requested_permissions.insert(name.into());
        self
    }

    /// Add several requested permissions.
    #[must_use]
    pub fn permissions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_permissions
            .extend(names.into_iter().map(Into::into));
        self
    }
}

/// Identity-side risk and baseline entitlements of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub risk_score: RiskScore,
    /// Resource class -> highest access level the user may ever hold on it.
    #[serde(default)]
    pub entitlements: BTreeMap<String, AccessLevel>,
}

impl UserContext {
    /// Entitlement for a resource class; `Denied` when the user has none.
    #[must_use]
    pub fn entitlement_for(&self, resource_class: &str) -> AccessLevel {
        self.entitlements
            .get(resource_class)
            .copied()
            .unwrap_or(AccessLevel::Denied)
    }
}

/// Point-in-time device trust snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceContext {
    pub device_id: String,
    pub risk_score: RiskScore,
    #[serde(default)]
    pub required_actions: Vec<RequiredAction>,
}

/// Per-request network trust estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkContext {
    pub risk_score: RiskScore,
    /// Name of the matched network segment, if any.
    #[serde(default)]
    pub segment: Option<String>,
}

/// Governing policy for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub resource_id: String,
    /// Category matched against [`UserContext::entitlements`].
    pub resource_class: String,
    pub sensitivity: RiskScore,
    pub max_acceptable_risk: RiskScore,
    pub enhanced_controls_threshold: RiskScore,
    /// Permission name -> minimum access level that entails it.
    #[serde(default)]
    pub permissions: BTreeMap<String, AccessLevel>,
}

impl ResourcePolicy {
    /// Check the policy's own invariants.
    ///
    /// # Errors
    ///
    /// - [`PolicyValidationError::EmptyResourceClass`] if `resource_class` is blank
    /// - [`PolicyValidationError::EnhancedAboveMaximum`] if
    ///   `enhanced_controls_threshold > max_acceptable_risk`
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.resource_class.trim().is_empty() {
            return Err(PolicyValidationError::EmptyResourceClass {
                resource_id: self.resource_id.clone(),
            });
        }
        if self.enhanced_controls_threshold > self.max_acceptable_risk {
            return Err(PolicyValidationError::EnhancedAboveMaximum {
                resource_id: self.resource_id.clone(),
                enhanced: self.enhanced_controls_threshold.to_string(),
                max: self.max_acceptable_risk.to_string(),
            });
        }
        Ok(())
    }
}

/// The engine's sole output. Always fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub risk_score: RiskScore,
    /// Ordered, without duplicates.
    pub required_actions: Vec<RequiredAction>,
    /// Subset of the requested permissions; empty when denied.
    pub granted_permissions: BTreeSet<String>,
    pub session_timeout_minutes: u32,
}
