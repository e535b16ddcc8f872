//! Service implementation for the static context plugin.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use access_decision_sdk::{
    DeviceContext, NetworkContext, NetworkInfo, ResourcePolicy, RiskScore, UserContext,
};
use anyhow::{Context, bail};
use arc_swap::ArcSwap;

use super::credential::Keyring;
use super::network::Cidr;
use crate::config::{StaticContextPluginConfig, UnknownDeviceConfig};

struct Segment {
    name: String,
    cidr: Cidr,
    risk_score: RiskScore,
}

/// Immutable view of one configuration generation.
struct Snapshot {
    users: HashMap<String, UserContext>,
    devices: HashMap<String, DeviceContext>,
    unknown_device: UnknownDeviceConfig,
    segments: Vec<Segment>,
    default_network_risk: RiskScore,
    policies: HashMap<String, ResourcePolicy>,
    keyring: Keyring,
}

/// Static context service.
///
/// Serves user, device, network, policy and credential lookups from an
/// in-memory snapshot. Readers never block; [`Service::reload`] swaps the
/// whole snapshot atomically so a lookup sees either the old or the new
/// generation, never a mix.
pub struct Service {
    snapshot: ArcSwap<Snapshot>,
}

impl Service {
    /// Create a service from plugin configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid entry.
    pub fn from_config(cfg: &StaticContextPluginConfig) -> anyhow::Result<Self> {
        let snapshot = build_snapshot(cfg)?;
        log_loaded("static context loaded", &snapshot);
        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        })
    }

    /// Replace the served data with `cfg`. On error the previous data stays
    /// in effect.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid entry.
    pub fn reload(&self, cfg: &StaticContextPluginConfig) -> anyhow::Result<()> {
        let snapshot = build_snapshot(cfg).inspect_err(|e| {
            tracing::warn!(error = %e, "static context reload rejected");
        })?;
        log_loaded("static context reloaded", &snapshot);
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    /// Issue a credential for `user_id` with the current signing key.
    ///
    /// # Errors
    ///
    /// Fails when no credential key is configured.
    pub fn issue_token(&self, user_id: &str) -> anyhow::Result<String> {
        self.snapshot.load().keyring.sign(user_id)
    }

    pub(crate) fn user(&self, user_id: &str) -> Option<UserContext> {
        self.snapshot.load().users.get(user_id).cloned()
    }

    pub(crate) fn device(&self, device_id: &str) -> DeviceContext {
        let snapshot = self.snapshot.load();
        snapshot.devices.get(device_id).cloned().unwrap_or_else(|| {
            tracing::debug!(device_id, "unknown device");
            DeviceContext {
                device_id: device_id.to_owned(),
                risk_score: RiskScore::new(snapshot.unknown_device.risk_score),
                required_actions: snapshot.unknown_device.required_actions.clone(),
            }
        })
    }

    pub(crate) fn network(&self, info: &NetworkInfo) -> NetworkContext {
        let snapshot = self.snapshot.load();
        let segment = info.source_ip.and_then(|ip| longest_match(&snapshot.segments, ip));
        match segment {
            Some(segment) => NetworkContext {
                risk_score: segment.risk_score,
                segment: Some(segment.name.clone()),
            },
            None => NetworkContext {
                risk_score: snapshot.default_network_risk,
                segment: None,
            },
        }
    }

    pub(crate) fn policy(&self, resource_id: &str) -> Option<ResourcePolicy> {
        self.snapshot.load().policies.get(resource_id).cloned()
    }

    pub(crate) fn verify(&self, user_id: &str, token: &str) -> anyhow::Result<bool> {
        self.snapshot.load().keyring.verify(user_id, token)
    }
}

fn longest_match(segments: &[Segment], ip: IpAddr) -> Option<&Segment> {
    segments
        .iter()
        .filter(|s| s.cidr.contains(ip))
        .max_by_key(|s| s.cidr.prefix())
}

fn log_loaded(message: &str, snapshot: &Snapshot) {
    tracing::info!(
        users = snapshot.users.len(),
        devices = snapshot.devices.len(),
        segments = snapshot.segments.len(),
        policies = snapshot.policies.len(),
        keys = snapshot.keyring.len(),
        "{message}"
    );
}

fn score(value: f64, what: impl FnOnce() -> String) -> anyhow::Result<RiskScore> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{} risk score {value} outside [0, 1]", what());
    }
    Ok(RiskScore::new(value))
}

fn build_snapshot(cfg: &StaticContextPluginConfig) -> anyhow::Result<Snapshot> {
    let mut users = HashMap::with_capacity(cfg.users.len());
    for entry in &cfg.users {
        let ctx = UserContext {
            user_id: entry.user_id.clone(),
            risk_score: score(entry.risk_score, || format!("user '{}'", entry.user_id))?,
            entitlements: entry.entitlements.clone(),
        };
        if users.insert(entry.user_id.clone(), ctx).is_some() {
            bail!("duplicate user '{}'", entry.user_id);
        }
    }

    let mut devices = HashMap::with_capacity(cfg.devices.len());
    for entry in &cfg.devices {
        let ctx = DeviceContext {
            device_id: entry.device_id.clone(),
            risk_score: score(entry.risk_score, || format!("device '{}'", entry.device_id))?,
            required_actions: entry.required_actions.clone(),
        };
        if devices.insert(entry.device_id.clone(), ctx).is_some() {
            bail!("duplicate device '{}'", entry.device_id);
        }
    }
    score(cfg.unknown_device.risk_score, || "unknown device".to_owned())?;

    let mut segments: Vec<Segment> = Vec::with_capacity(cfg.network_segments.len());
    for entry in &cfg.network_segments {
        if segments.iter().any(|s| s.name == entry.name) {
            bail!("duplicate network segment '{}'", entry.name);
        }
        segments.push(Segment {
            name: entry.name.clone(),
            cidr: Cidr::parse(&entry.cidr)
                .with_context(|| format!("network segment '{}'", entry.name))?,
            risk_score: score(entry.risk_score, || format!("network segment '{}'", entry.name))?,
        });
    }
    let default_network_risk = score(cfg.default_network_risk, || "default network".to_owned())?;

    let mut policies = HashMap::with_capacity(cfg.policies.len());
    for entry in &cfg.policies {
        let what = || format!("policy '{}'", entry.resource_id);
        let policy = ResourcePolicy {
            resource_id: entry.resource_id.clone(),
            resource_class: entry.resource_class.clone(),
            sensitivity: score(entry.sensitivity, what)?,
            max_acceptable_risk: score(entry.max_acceptable_risk, what)?,
            enhanced_controls_threshold: score(entry.enhanced_controls_threshold, what)?,
            permissions: entry.permissions.clone(),
        };
        policy.validate().with_context(what)?;
        if policies.insert(entry.resource_id.clone(), policy).is_some() {
            bail!("duplicate policy '{}'", entry.resource_id);
        }
    }

    let keyring = Keyring::from_config(&cfg.credential_keys)?;
    if keyring.is_empty() {
        tracing::warn!("no credential keys configured; every credential will be rejected");
    }

    Ok(Snapshot {
        users,
        devices,
        unknown_device: cfg.unknown_device.clone(),
        segments,
        default_network_risk,
        policies,
        keyring,
    })
}
