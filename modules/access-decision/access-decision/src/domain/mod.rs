//! Domain layer for the access decision module.

pub mod access_level;
pub mod authentication;
pub mod error;
pub mod local_client;
pub mod risk;
pub mod service;
pub mod session;

pub use access_level::AccessLevelResolver;
pub use authentication::AuthenticationValidator;
pub use error::{DomainError, Stage};
pub use local_client::AccessDecisionLocalClient;
pub use risk::RiskAggregator;
pub use service::{ContextProviders, Service};
pub use session::SessionTimeoutPolicy;
