//! Decision composer.
//!
//! Guard stages run in order and the first failing stage answers:
//!
//! 1. authentication → `AuthenticationFailed`
//! 2. device trust → `DeviceRiskExceeded`
//! 3. network trust → `NetworkRiskExceeded`
//! 4. policy resolution → `PolicyNotFound`
//! 5. access level + aggregated risk → `InsufficientEntitlement` /
//!    `RiskThresholdExceeded` / `AccessGranted`
//! 6. compensating controls above the policy's enhanced-controls threshold
//! 7. granted permissions and session lifetime
//!
//! Collaborator errors, lookup timeouts, invalid policies and panics are
//! caught at [`Service::evaluate_access_request`] and downgraded to an
//! `InternalError` denial.

use std::any::Any;
use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use access_decision_sdk::{
    AccessDecision, AccessLevel, AccessRequest, CredentialVerifier, DecisionReason, DeviceContext,
    DeviceContextProvider, NetworkContext, NetworkContextEvaluator, PolicyStore, ProviderError,
    RequiredAction, ResourcePolicy, RiskScore, UserContext, UserContextProvider,
};
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use super::access_level::AccessLevelResolver;
use super::authentication::AuthenticationValidator;
use super::error::{DomainError, Stage};
use super::risk::RiskAggregator;
use super::session::SessionTimeoutPolicy;
use crate::config::{AccessDecisionConfig, ConfigError};

/// Risk reported when no policy governs the resource.
const POLICY_NOT_FOUND_RISK: f64 = 0.5;

/// Collaborators the engine reads from.
#[derive(Clone)]
pub struct ContextProviders {
    pub users: Arc<dyn UserContextProvider>,
    pub devices: Arc<dyn DeviceContextProvider>,
    pub network: Arc<dyn NetworkContextEvaluator>,
    pub policies: Arc<dyn PolicyStore>,
    pub credentials: Arc<dyn CredentialVerifier>,
}

impl ContextProviders {
    /// Use one object for every collaborator role.
    pub fn from_shared<P>(provider: Arc<P>) -> Self
    where
        P: UserContextProvider
            + DeviceContextProvider
            + NetworkContextEvaluator
            + PolicyStore
            + CredentialVerifier
            + 'static,
    {
        Self {
            users: provider.clone(),
            devices: provider.clone(),
            network: provider.clone(),
            policies: provider.clone(),
            credentials: provider,
        }
    }
}

impl std::fmt::Debug for ContextProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextProviders").finish_non_exhaustive()
    }
}

/// Access decision service.
///
/// Stateless across requests; share it behind an `Arc` and evaluate
/// concurrently. Dropping an evaluation future cancels it between
/// collaborator calls.
pub struct Service {
    authenticator: AuthenticationValidator,
    devices: Arc<dyn DeviceContextProvider>,
    network: Arc<dyn NetworkContextEvaluator>,
    policies: Arc<dyn PolicyStore>,
    aggregator: RiskAggregator,
    resolver: AccessLevelResolver,
    sessions: SessionTimeoutPolicy,
    device_risk_threshold: RiskScore,
    network_risk_threshold: RiskScore,
    lookup_timeout: Option<Duration>,
}

impl Service {
    /// Build the service from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(
        config: &AccessDecisionConfig,
        providers: ContextProviders,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            authenticator: AuthenticationValidator::new(providers.users, providers.credentials),
            devices: providers.devices,
            network: providers.network,
            policies: providers.policies,
            aggregator: RiskAggregator::new(config.risk_weights),
            resolver: AccessLevelResolver::new(config.default_permission_levels.clone()),
            sessions: SessionTimeoutPolicy::new(&config.session_timeouts),
            device_risk_threshold: RiskScore::new(config.device_risk_threshold),
            network_risk_threshold: RiskScore::new(config.network_risk_threshold),
            lookup_timeout: config.lookup_timeout(),
        })
    }

    /// Evaluate an access request. Always returns a complete decision.
    #[instrument(
        skip_all,
        fields(
            user_id = %request.user_id,
            resource_id = %request.resource_id,
            device_id = %request.device_id,
        )
    )]
    pub async fn evaluate_access_request(&self, request: &AccessRequest) -> AccessDecision {
        let outcome = AssertUnwindSafe(self.run_pipeline(request))
            .catch_unwind()
            .await;

        let decision = match outcome {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => self.log_and_downgrade(&e),
            Err(payload) => self.log_and_downgrade(&DomainError::Panicked(panic_message(&*payload))),
        };

        info!(
            allowed = decision.allowed,
            reason = %decision.reason,
            risk_score = %decision.risk_score,
            granted = decision.granted_permissions.len(),
            "access decision"
        );
        decision
    }

    async fn run_pipeline(&self, request: &AccessRequest) -> Result<AccessDecision, DomainError> {
        let authenticated = self
            .bounded(
                Stage::Authentication,
                self.authenticator
                    .authenticate(&request.user_id, &request.auth_token),
            )
            .await?;
        let Some(user) = authenticated else {
            warn!("authentication failed");
            return Ok(self.deny(
                DecisionReason::AuthenticationFailed,
                RiskScore::MAX,
                vec![RequiredAction::Reauthenticate],
            ));
        };

        let device = self
            .bounded(
                Stage::Device,
                self.devices.lookup_device_context(&request.device_id),
            )
            .await?;
        if device.risk_score > self.device_risk_threshold {
            warn!(device_risk = %device.risk_score, "device risk above threshold");
            return Ok(self.deny(
                DecisionReason::DeviceRiskExceeded,
                device.risk_score,
                device.required_actions,
            ));
        }

        let network = self
            .bounded(
                Stage::Network,
                self.network.evaluate_network_context(&request.network_info),
            )
            .await?;
        if network.risk_score > self.network_risk_threshold {
            warn!(
                network_risk = %network.risk_score,
                segment = network.segment.as_deref().unwrap_or("-"),
                "network risk above threshold"
            );
            return Ok(self.deny(
                DecisionReason::NetworkRiskExceeded,
                network.risk_score,
                vec![RequiredAction::UseVpn],
            ));
        }

        let policy = self
            .bounded(
                Stage::Policy,
                self.policies.lookup_resource_policy(&request.resource_id),
            )
            .await?;
        let Some(policy) = policy else {
            warn!("no policy governs resource");
            return Ok(self.deny(
                DecisionReason::PolicyNotFound,
                RiskScore::new(POLICY_NOT_FOUND_RISK),
                Vec::new(),
            ));
        };
        policy.validate()?;

        Ok(self.compose(&user, &device, &network, &policy, &request.requested_permissions))
    }

    /// Final stages once every guard has passed.
    fn compose(
        &self,
        user: &UserContext,
        device: &DeviceContext,
        network: &NetworkContext,
        policy: &ResourcePolicy,
        requested: &BTreeSet<String>,
    ) -> AccessDecision {
        let access_level = self.resolver.resolve(user, policy, requested);
        let overall_risk = self.aggregator.aggregate(
            user.risk_score,
            device.risk_score,
            network.risk_score,
            policy.sensitivity,
        );
        debug!(%access_level, %overall_risk, "scored request");

        let allowed =
            access_level != AccessLevel::Denied && overall_risk < policy.max_acceptable_risk;

        let reason = if allowed {
            DecisionReason::AccessGranted
        } else if access_level == AccessLevel::Denied {
            DecisionReason::InsufficientEntitlement
        } else {
            DecisionReason::RiskThresholdExceeded
        };

        let mut required_actions = Vec::new();
        if allowed && overall_risk > policy.enhanced_controls_threshold {
            required_actions.push(RequiredAction::MfaVerification);
            required_actions.push(RequiredAction::SessionRecording);
        }

        let granted_permissions = if allowed {
            self.resolver
                .entailed_permissions(access_level, policy, requested)
        } else {
            BTreeSet::new()
        };

        AccessDecision {
            allowed,
            reason,
            risk_score: overall_risk,
            required_actions,
            granted_permissions,
            session_timeout_minutes: self.sessions.timeout_minutes(overall_risk),
        }
    }

    /// Await a collaborator call within the configured lookup timeout.
    async fn bounded<T>(
        &self,
        stage: Stage,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, DomainError> {
        debug!(%stage, "collaborator call");
        let result = match self.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                DomainError::LookupTimeout {
                    stage,
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
            })?,
            None => call.await,
        };
        result.map_err(|source| DomainError::provider(stage, source))
    }

    fn deny(
        &self,
        reason: DecisionReason,
        risk_score: RiskScore,
        required_actions: Vec<RequiredAction>,
    ) -> AccessDecision {
        AccessDecision {
            allowed: false,
            reason,
            risk_score,
            required_actions: dedup_preserving_order(required_actions),
            granted_permissions: BTreeSet::new(),
            session_timeout_minutes: self.sessions.timeout_minutes(risk_score),
        }
    }

    fn log_and_downgrade(&self, e: &DomainError) -> AccessDecision {
        error!(error = %e, "access evaluation failed");
        self.deny(
            DecisionReason::InternalError,
            RiskScore::MAX,
            vec![RequiredAction::ContactAdmin],
        )
    }
}

fn dedup_preserving_order(actions: Vec<RequiredAction>) -> Vec<RequiredAction> {
    let mut unique = Vec::with_capacity(actions.len());
    for action in actions {
        if !unique.contains(&action) {
            unique.push(action);
        }
    }
    unique
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::{MockProviders, request, service, user_weighted_config};
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn actions(tokens: &[&str]) -> Vec<RequiredAction> {
        tokens.iter().map(|t| RequiredAction::from(*t)).collect()
    }

    fn perms(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[tokio::test]
    async fn empty_token_fails_authentication_without_later_stages() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let req = AccessRequest::new("alice", "payroll", "compromised").permission("read");
        let decision = svc.evaluate_access_request(&req).await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::AuthenticationFailed);
        assert_eq!(decision.risk_score, RiskScore::MAX);
        assert_eq!(decision.required_actions, actions(&["reauthenticate"]));
        assert!(decision.granted_permissions.is_empty());
        assert_eq!(decision.session_timeout_minutes, 15);

        assert_eq!(mock.calls.devices(), 0);
        assert_eq!(mock.calls.network(), 0);
        assert_eq!(mock.calls.policies(), 0);
    }

    #[tokio::test]
    async fn forged_token_and_unknown_user_fail_authentication() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let forged = AccessRequest::new("alice", "payroll", "trusted").auth_token("signed:bob");
        let unknown = request("mallory", "payroll", "trusted");

        for req in [forged, unknown] {
            let decision = svc.evaluate_access_request(&req).await;
            assert_eq!(decision.reason, DecisionReason::AuthenticationFailed);
        }
        assert_eq!(mock.calls.devices(), 0);
    }

    #[tokio::test]
    async fn high_device_risk_denies_with_device_actions() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "compromised"))
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::DeviceRiskExceeded);
        assert_eq!(decision.risk_score, RiskScore::new(0.9));
        assert_eq!(
            decision.required_actions,
            actions(&["patch_os", "reauthenticate"])
        );
        assert_eq!(mock.calls.network(), 0);
        assert_eq!(mock.calls.policies(), 0);
    }

    #[tokio::test]
    async fn unknown_device_gets_conservative_default() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "stolen-phone"))
            .await;
        assert_eq!(decision.reason, DecisionReason::DeviceRiskExceeded);
        assert_eq!(decision.risk_score, RiskScore::MAX);
    }

    #[tokio::test]
    async fn device_risk_at_threshold_passes() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "borderline"))
            .await;
        assert_ne!(decision.reason, DecisionReason::DeviceRiskExceeded);
        assert_eq!(mock.calls.network(), 1);
    }

    #[tokio::test]
    async fn network_risk_at_threshold_passes() {
        let mock = Arc::new(MockProviders {
            network_risk: RiskScore::new(0.7),
            ..MockProviders::new()
        });
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;
        assert_eq!(decision.reason, DecisionReason::AccessGranted);
        assert_eq!(mock.calls.policies(), 1);
    }

    fn with_alice_risk(risk: f64) -> Arc<MockProviders> {
        let mut mock = MockProviders::new();
        if let Some(alice) = mock.users.get_mut("alice") {
            alice.risk_score = RiskScore::new(risk);
        }
        Arc::new(mock)
    }

    #[tokio::test]
    async fn aggregated_risk_equal_to_maximum_is_denied() {
        let mock = with_alice_risk(0.8);
        let svc = service(&user_weighted_config(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::RiskThresholdExceeded);
        assert_eq!(decision.risk_score, RiskScore::new(0.8));
        assert!(decision.granted_permissions.is_empty());
    }

    #[tokio::test]
    async fn aggregated_risk_equal_to_enhanced_threshold_needs_no_controls() {
        let mock = with_alice_risk(0.5);
        let svc = service(&user_weighted_config(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;

        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::AccessGranted);
        assert_eq!(decision.risk_score, RiskScore::new(0.5));
        assert!(decision.required_actions.is_empty());
        assert_eq!(decision.granted_permissions, perms(&["read", "write"]));
    }

    #[tokio::test]
    async fn high_network_risk_denies_with_vpn_action() {
        let mock = Arc::new(MockProviders {
            network_risk: RiskScore::new(0.8),
            ..MockProviders::new()
        });
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::NetworkRiskExceeded);
        assert_eq!(decision.risk_score, RiskScore::new(0.8));
        assert_eq!(decision.required_actions, actions(&["use_vpn"]));
        assert_eq!(mock.calls.policies(), 0);
    }

    #[tokio::test]
    async fn missing_policy_denies_with_moderate_risk() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "unlisted", "trusted"))
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::PolicyNotFound);
        assert_eq!(decision.risk_score, RiskScore::new(0.5));
        assert!(decision.required_actions.is_empty());
        assert_eq!(decision.session_timeout_minutes, 120);
    }

    #[tokio::test]
    async fn low_risk_request_is_granted_entitled_permissions() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;

        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::AccessGranted);
        assert!(decision.risk_score.value() < 0.3);
        assert!(decision.required_actions.is_empty());
        assert_eq!(decision.granted_permissions, perms(&["read", "write"]));
        assert_eq!(decision.session_timeout_minutes, 480);
    }

    #[tokio::test]
    async fn elevated_risk_below_maximum_requires_compensating_controls() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&user_weighted_config(), &mock);

        let decision = svc
            .evaluate_access_request(&request("bob", "payroll", "trusted"))
            .await;

        assert!(decision.allowed);
        assert!((decision.risk_score.value() - 0.75).abs() < f64::EPSILON);
        assert_eq!(
            decision.required_actions,
            actions(&["mfa_verification", "session_recording"])
        );
        assert_eq!(
            decision.granted_permissions,
            perms(&["read", "write", "approve"])
        );
        assert_eq!(decision.session_timeout_minutes, 15);
    }

    #[tokio::test]
    async fn aggregated_risk_above_maximum_is_denied() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&user_weighted_config(), &mock);

        let decision = svc
            .evaluate_access_request(&request("dave", "payroll", "trusted"))
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::RiskThresholdExceeded);
        assert!((decision.risk_score.value() - 0.85).abs() < f64::EPSILON);
        assert!(decision.required_actions.is_empty());
        assert!(decision.granted_permissions.is_empty());
    }

    #[tokio::test]
    async fn user_without_entitlement_is_denied() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("carol", "payroll", "trusted"))
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::InsufficientEntitlement);
        assert!(decision.granted_permissions.is_empty());
    }

    fn assert_internal_error(decision: &AccessDecision) {
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::InternalError);
        assert_eq!(decision.risk_score, RiskScore::MAX);
        assert_eq!(decision.required_actions, actions(&["contact_admin"]));
        assert!(decision.granted_permissions.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_becomes_internal_error() {
        let mock = Arc::new(MockProviders {
            fail_devices: true,
            ..MockProviders::new()
        });
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;
        assert_internal_error(&decision);
        assert_eq!(mock.calls.network(), 0);
    }

    #[tokio::test]
    async fn verifier_failure_becomes_internal_error() {
        let mock = Arc::new(MockProviders {
            fail_credentials: true,
            ..MockProviders::new()
        });
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;
        assert_internal_error(&decision);
    }

    #[tokio::test]
    async fn panicking_provider_becomes_internal_error() {
        let mock = Arc::new(MockProviders {
            panic_on_policy: true,
            ..MockProviders::new()
        });
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;
        assert_internal_error(&decision);
    }

    #[tokio::test]
    async fn invalid_policy_becomes_internal_error() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "broken", "trusted"))
            .await;
        assert_internal_error(&decision);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_lookup_times_out_as_internal_error() {
        let mock = Arc::new(MockProviders {
            hang_network: true,
            ..MockProviders::new()
        });
        let config = AccessDecisionConfig {
            lookup_timeout_ms: Some(250),
            ..AccessDecisionConfig::default()
        };
        let svc = service(&config, &mock);

        let decision = svc
            .evaluate_access_request(&request("alice", "payroll", "trusted"))
            .await;
        assert_internal_error(&decision);
        assert_eq!(mock.calls.policies(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mock = Arc::new(MockProviders::new());
        let config = AccessDecisionConfig {
            device_risk_threshold: -1.0,
            ..AccessDecisionConfig::default()
        };
        let result = Service::new(&config, ContextProviders::from_shared(mock));
        assert!(result.is_err());
    }

    #[tokio::test]
    #[traced_test]
    async fn decision_is_logged_without_credentials() {
        let mock = Arc::new(MockProviders::new());
        let svc = service(&AccessDecisionConfig::default(), &mock);

        let _ = svc
            .evaluate_access_request(&request("alice", "payroll", "compromised"))
            .await;

        assert!(logs_contain("access decision"));
        assert!(logs_contain("DeviceRiskExceeded"));
        assert!(!logs_contain("signed:alice"));
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let deduped = dedup_preserving_order(actions(&["b", "a", "b", "c", "a"]));
        assert_eq!(deduped, actions(&["b", "a", "c"]));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn decisions_respect_pipeline_invariants(
            user_risk in 0.0f64..=1.0,
            device_risk in 0.0f64..=1.0,
            network_risk in 0.0f64..=1.0,
            requested in proptest::sample::subsequence(
                vec!["read", "write", "approve", "delete", "teleport"], 0..=5,
            ),
        ) {
            let mut mock = MockProviders::new();
            if let Some(alice) = mock.users.get_mut("alice") {
                alice.risk_score = RiskScore::new(user_risk);
            }
            if let Some(trusted) = mock.devices.get_mut("trusted") {
                trusted.risk_score = RiskScore::new(device_risk);
            }
            mock.network_risk = RiskScore::new(network_risk);
            let mock = Arc::new(mock);
            let svc = service(&AccessDecisionConfig::default(), &mock);

            let req = AccessRequest::new("alice", "payroll", "trusted")
                .auth_token(crate::test_support::token_for("alice"))
                .permissions(requested);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let decision = runtime.block_on(svc.evaluate_access_request(&req));

            prop_assert!((0.0..=1.0).contains(&decision.risk_score.value()));
            prop_assert!(decision.session_timeout_minutes > 0);
            prop_assert!(decision.granted_permissions.is_subset(&req.requested_permissions));
            if !decision.allowed {
                prop_assert!(decision.granted_permissions.is_empty());
            }
        }
    }
}
