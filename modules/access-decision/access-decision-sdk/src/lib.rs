//! Access Decision SDK
//!
//! This crate provides the public API for the `access_decision` module:
//!
//! - [`AccessDecisionClient`] - Public API trait for consumers (PEPs)
//! - [`UserContextProvider`], [`DeviceContextProvider`], [`NetworkContextEvaluator`],
//!   [`PolicyStore`], [`CredentialVerifier`] - Collaborator traits the engine consumes
//! - [`AccessRequest`], [`AccessDecision`] - Evaluation models
//! - [`ProviderError`] - Error type for collaborator calls
//!
//! ## Usage
//!
//! ```ignore
//! use access_decision_sdk::{AccessDecisionClient, AccessRequest};
//!
//! let decision = client.evaluate_access_request(request).await;
//! if decision.allowed {
//!     // enforce decision.granted_permissions and decision.required_actions
//! }
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;
pub mod plugin_api;

// Re-export main types at crate root
pub use api::AccessDecisionClient;
pub use error::{PolicyValidationError, ProviderError};
pub use models::{
    AccessDecision, AccessLevel, AccessRequest, DecisionReason, DeviceContext, NetworkContext,
    NetworkInfo, RequiredAction, ResourcePolicy, RiskScore, UserContext,
};
pub use plugin_api::{
    CredentialVerifier, DeviceContextProvider, NetworkContextEvaluator, PolicyStore,
    UserContextProvider,
};
