//! Error types for the access decision SDK.

use thiserror::Error;

/// Failure reported by a collaborator (context provider, policy store,
/// credential verifier).
///
/// The engine never surfaces these to its caller; they are downgraded to an
/// `InternalError` decision.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The backing store or service could not be reached.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider returned data it could not interpret.
    #[error("invalid provider data: {0}")]
    InvalidData(String),

    /// Any other provider-side failure.
    #[error("provider internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    #[must_use]
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// A [`ResourcePolicy`](crate::ResourcePolicy) that violates its own invariants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyValidationError {
    #[error("policy for resource '{resource_id}' has empty resource class")]
    EmptyResourceClass { resource_id: String },

    #[error(
        "policy for resource '{resource_id}': enhanced controls threshold {enhanced} exceeds max acceptable risk {max}"
    )]
    EnhancedAboveMaximum {
        resource_id: String,
        enhanced: String,
        max: String,
    },
}
