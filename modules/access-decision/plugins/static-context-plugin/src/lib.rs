//! Static Context Plugin
//!
//! Reference collaborator for the access decision engine. Serves users,
//! devices, network segments and resource policies from configuration, and
//! verifies HMAC-SHA256 credentials against a rotatable keyring. One
//! [`Service`] implements every collaborator trait; wire it into the engine
//! with `ContextProviders::from_shared`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

pub use config::StaticContextPluginConfig;
pub use domain::credential::Keyring;
pub use domain::service::Service;
