//! Internal faults of the decision pipeline.
//!
//! None of these reach the caller: the composer logs them and answers with an
//! `InternalError` denial.

use std::fmt;

use access_decision_sdk::{PolicyValidationError, ProviderError};
use thiserror::Error;

/// Pipeline stage that issued a collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authentication,
    Device,
    Network,
    Policy,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Device => "device",
            Self::Network => "network",
            Self::Policy => "policy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{stage} lookup failed: {source}")]
    Provider {
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    #[error("{stage} lookup timed out after {timeout_ms} ms")]
    LookupTimeout { stage: Stage, timeout_ms: u64 },

    #[error("invalid resource policy: {0}")]
    InvalidPolicy(#[from] PolicyValidationError),

    #[error("evaluation panicked: {0}")]
    Panicked(String),
}

impl DomainError {
    #[must_use]
    pub fn provider(stage: Stage, source: ProviderError) -> Self {
        Self::Provider { stage, source }
    }
}
