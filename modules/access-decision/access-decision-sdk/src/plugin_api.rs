//! Collaborator traits consumed by the access decision engine.
//!
//! Implementations own their storage and must tolerate concurrent reads while
//! being updated out-of-band; the engine never mutates what it reads.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::ProviderError;
use crate::models::{DeviceContext, NetworkContext, NetworkInfo, ResourcePolicy, UserContext};

/// Identity-side context lookup.
#[async_trait]
pub trait UserContextProvider: Send + Sync {
    /// Returns `None` when the user is unknown.
    async fn lookup_user_context(&self, user_id: &str)
    -> Result<Option<UserContext>, ProviderError>;
}

/// Device trust lookup.
#[async_trait]
pub trait DeviceContextProvider: Send + Sync {
    /// Always returns a context; unknown devices must map to a conservative
    /// high-risk default rather than absence.
    async fn lookup_device_context(&self, device_id: &str) -> Result<DeviceContext, ProviderError>;
}

/// Network trust evaluation from the raw request signal.
#[async_trait]
pub trait NetworkContextEvaluator: Send + Sync {
    async fn evaluate_network_context(
        &self,
        network_info: &NetworkInfo,
    ) -> Result<NetworkContext, ProviderError>;
}

/// Resource policy lookup.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Returns `None` when no policy governs the resource.
    async fn lookup_resource_policy(
        &self,
        resource_id: &str,
    ) -> Result<Option<ResourcePolicy>, ProviderError>;
}

/// Verifies that a presented credential is bound to the claimed user.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Returns `false` for any credential that does not verify for `user_id`.
    async fn verify_credential(
        &self,
        user_id: &str,
        token: &SecretString,
    ) -> Result<bool, ProviderError>;
}
