//! In-memory collaborators and fixtures shared by the module's tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use access_decision_sdk::{
    AccessLevel, AccessRequest, CredentialVerifier, DeviceContext, DeviceContextProvider,
    NetworkContext, NetworkContextEvaluator, NetworkInfo, PolicyStore, ProviderError,
    RequiredAction, ResourcePolicy, RiskScore, UserContext, UserContextProvider,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{AccessDecisionConfig, RiskWeights};
use crate::domain::{ContextProviders, Service};

/// Credential the mock verifier accepts for `user_id`.
pub fn token_for(user_id: &str) -> String {
    format!("signed:{user_id}")
}

#[derive(Default)]
pub struct CallCounters {
    users: AtomicUsize,
    credentials: AtomicUsize,
    devices: AtomicUsize,
    network: AtomicUsize,
    policies: AtomicUsize,
}

impl CallCounters {
    pub fn users(&self) -> usize {
        self.users.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> usize {
        self.credentials.load(Ordering::SeqCst)
    }

    pub fn devices(&self) -> usize {
        self.devices.load(Ordering::SeqCst)
    }

    pub fn network(&self) -> usize {
        self.network.load(Ordering::SeqCst)
    }

    pub fn policies(&self) -> usize {
        self.policies.load(Ordering::SeqCst)
    }
}

/// In-memory collaborators with switchable failure modes.
///
/// Fixture users: `alice` (0.1, finance/standard), `bob` (0.75,
/// finance/elevated), `carol` (0.1, hr only), `dave` (0.85, finance/standard).
/// Devices: `trusted` (0.1), `borderline` (0.7), `compromised` (0.9).
/// Policies: `payroll` (finance, max 0.8, enhanced 0.5) and `broken`
/// (enhanced above max).
pub struct MockProviders {
    pub users: HashMap<String, UserContext>,
    pub devices: HashMap<String, DeviceContext>,
    pub network_risk: RiskScore,
    pub policies: HashMap<String, ResourcePolicy>,
    pub fail_credentials: bool,
    pub fail_devices: bool,
    pub panic_on_policy: bool,
    pub hang_network: bool,
    pub calls: CallCounters,
}

fn user(id: &str, risk: f64, class: &str, level: AccessLevel) -> (String, UserContext) {
    (
        id.to_owned(),
        UserContext {
            user_id: id.to_owned(),
            risk_score: RiskScore::new(risk),
            entitlements: BTreeMap::from([(class.to_owned(), level)]),
        },
    )
}

fn device(id: &str, risk: f64, actions: &[&str]) -> (String, DeviceContext) {
    (
        id.to_owned(),
        DeviceContext {
            device_id: id.to_owned(),
            risk_score: RiskScore::new(risk),
            required_actions: actions.iter().map(|a| RequiredAction::from(*a)).collect(),
        },
    )
}

fn policy(id: &str, enhanced: f64, max: f64) -> (String, ResourcePolicy) {
    (
        id.to_owned(),
        ResourcePolicy {
            resource_id: id.to_owned(),
            resource_class: "finance".to_owned(),
            sensitivity: RiskScore::new(0.5),
            max_acceptable_risk: RiskScore::new(max),
            enhanced_controls_threshold: RiskScore::new(enhanced),
            permissions: BTreeMap::from([
                ("write".to_owned(), AccessLevel::Standard),
                ("approve".to_owned(), AccessLevel::Elevated),
            ]),
        },
    )
}

impl MockProviders {
    pub fn new() -> Self {
        Self {
            users: HashMap::from([
                user("alice", 0.1, "finance", AccessLevel::Standard),
                user("bob", 0.75, "finance", AccessLevel::Elevated),
                user("carol", 0.1, "hr", AccessLevel::Standard),
                user("dave", 0.85, "finance", AccessLevel::Standard),
            ]),
            devices: HashMap::from([
                device("trusted", 0.1, &[]),
                device("borderline", 0.7, &[]),
                device(
                    "compromised",
                    0.9,
                    &["patch_os", "reauthenticate", "patch_os"],
                ),
            ]),
            network_risk: RiskScore::new(0.1),
            policies: HashMap::from([policy("payroll", 0.5, 0.8), policy("broken", 0.9, 0.8)]),
            fail_credentials: false,
            fail_devices: false,
            panic_on_policy: false,
            hang_network: false,
            calls: CallCounters::default(),
        }
    }
}

#[async_trait]
impl UserContextProvider for MockProviders {
    async fn lookup_user_context(
        &self,
        user_id: &str,
    ) -> Result<Option<UserContext>, ProviderError> {
        self.calls.users.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.get(user_id).cloned())
    }
}

#[async_trait]
impl CredentialVerifier for MockProviders {
    async fn verify_credential(
        &self,
        user_id: &str,
        token: &SecretString,
    ) -> Result<bool, ProviderError> {
        self.calls.credentials.fetch_add(1, Ordering::SeqCst);
        if self.fail_credentials {
            return Err(ProviderError::unavailable("identity provider down"));
        }
        Ok(token.expose_secret() == token_for(user_id))
    }
}

#[async_trait]
impl DeviceContextProvider for MockProviders {
    async fn lookup_device_context(&self, device_id: &str) -> Result<DeviceContext, ProviderError> {
        self.calls.devices.fetch_add(1, Ordering::SeqCst);
        if self.fail_devices {
            return Err(ProviderError::unavailable("device store down"));
        }
        Ok(self
            .devices
            .get(device_id)
            .cloned()
            .unwrap_or_else(|| DeviceContext {
                device_id: device_id.to_owned(),
                risk_score: RiskScore::MAX,
                required_actions: vec![RequiredAction::Reauthenticate],
            }))
    }
}

#[async_trait]
impl NetworkContextEvaluator for MockProviders {
    async fn evaluate_network_context(
        &self,
        _network_info: &NetworkInfo,
    ) -> Result<NetworkContext, ProviderError> {
        self.calls.network.fetch_add(1, Ordering::SeqCst);
        if self.hang_network {
            std::future::pending::<()>().await;
        }
        Ok(NetworkContext {
            risk_score: self.network_risk,
            segment: None,
        })
    }
}

#[async_trait]
impl PolicyStore for MockProviders {
    async fn lookup_resource_policy(
        &self,
        resource_id: &str,
    ) -> Result<Option<ResourcePolicy>, ProviderError> {
        self.calls.policies.fetch_add(1, Ordering::SeqCst);
        assert!(!self.panic_on_policy, "policy store exploded");
        Ok(self.policies.get(resource_id).cloned())
    }
}

/// Default config with the aggregate equal to the user's own risk.
pub fn user_weighted_config() -> AccessDecisionConfig {
    AccessDecisionConfig {
        risk_weights: RiskWeights {
            user: 1.0,
            device: 0.0,
            network: 0.0,
            sensitivity: 0.0,
        },
        ..AccessDecisionConfig::default()
    }
}

pub fn service(config: &AccessDecisionConfig, mock: &Arc<MockProviders>) -> Service {
    Service::new(config, ContextProviders::from_shared(mock.clone())).unwrap()
}

pub fn request(user_id: &str, resource_id: &str, device_id: &str) -> AccessRequest {
    AccessRequest::new(user_id, resource_id, device_id)
        .auth_token(token_for(user_id))
        .permissions(["read", "write", "approve"])
}
