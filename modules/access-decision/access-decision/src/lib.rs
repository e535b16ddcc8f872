//! Access Decision Module
//!
//! Request-time zero-trust access decisions. The [`Service`] runs an ordered
//! sequence of guard stages (authentication, device trust, network trust,
//! policy resolution), then aggregates identity, device, network and resource
//! risk into one score and composes a structured
//! [`AccessDecision`](access_decision_sdk::AccessDecision).
//!
//! All state lives in the collaborators injected through
//! [`ContextProviders`]; the engine itself holds no locks and no per-request
//! state. [`AccessDecisionLocalClient`] exposes the service as an
//! [`AccessDecisionClient`](access_decision_sdk::AccessDecisionClient).
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

#[cfg(test)]
mod test_support;

pub use config::{
    AccessDecisionConfig, ConfigError, RiskWeights, SessionTier, SessionTimeoutConfig,
};
pub use domain::{AccessDecisionLocalClient, ContextProviders, DomainError, Service, Stage};
