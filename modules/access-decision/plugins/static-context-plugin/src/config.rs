//! Configuration for the static context plugin.

use std::collections::BTreeMap;

use access_decision_sdk::{AccessLevel, RequiredAction};
use secrecy::SecretString;
use serde::Deserialize;

/// Plugin configuration.
///
/// Risk scores are kept as raw numbers here so that out-of-range values are
/// rejected at load time instead of being silently clamped.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticContextPluginConfig {
    /// Known users with their baseline risk and entitlements.
    pub users: Vec<UserEntry>,

    /// Known devices with their posture risk.
    pub devices: Vec<DeviceEntry>,

    /// Posture reported for devices not listed in `devices`.
    pub unknown_device: UnknownDeviceConfig,

    /// Network segments; the longest matching prefix wins.
    pub network_segments: Vec<NetworkSegmentConfig>,

    /// Risk for requests with no source address or no matching segment.
    pub default_network_risk: f64,

    /// Resource policies.
    pub policies: Vec<PolicyEntry>,

    /// HMAC keyring. The first key signs; every key verifies.
    pub credential_keys: Vec<CredentialKeyConfig>,
}

impl Default for StaticContextPluginConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            devices: Vec::new(),
            unknown_device: UnknownDeviceConfig::default(),
            network_segments: Vec::new(),
            default_network_risk: 0.5,
            policies: Vec::new(),
            credential_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    pub user_id: String,
    pub risk_score: f64,
    /// Resource class → highest access level.
    #[serde(default)]
    pub entitlements: BTreeMap<String, AccessLevel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceEntry {
    pub device_id: String,
    pub risk_score: f64,
    #[serde(default)]
    pub required_actions: Vec<RequiredAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnknownDeviceConfig {
    pub risk_score: f64,
    pub required_actions: Vec<RequiredAction>,
}

impl Default for UnknownDeviceConfig {
    fn default() -> Self {
        Self {
            risk_score: 1.0,
            required_actions: vec![RequiredAction::Reauthenticate],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSegmentConfig {
    pub name: String,
    /// Address block in `addr/prefix` form, e.g. `10.0.0.0/8`.
    pub cidr: String,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEntry {
    pub resource_id: String,
    pub resource_class: String,
    pub sensitivity: f64,
    pub max_acceptable_risk: f64,
    pub enhanced_controls_threshold: f64,
    /// Per-resource permission levels, overriding the engine defaults.
    #[serde(default)]
    pub permissions: BTreeMap<String, AccessLevel>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialKeyConfig {
    pub key_id: String,
    pub secret: SecretString,
}
