//! Collaborator trait implementations for the static context plugin.

use access_decision_sdk::{
    CredentialVerifier, DeviceContext, DeviceContextProvider, NetworkContext,
    NetworkContextEvaluator, NetworkInfo, PolicyStore, ProviderError, ResourcePolicy, UserContext,
    UserContextProvider,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::service::Service;

#[async_trait]
impl UserContextProvider for Service {
    async fn lookup_user_context(
        &self,
        user_id: &str,
    ) -> Result<Option<UserContext>, ProviderError> {
        Ok(self.user(user_id))
    }
}

#[async_trait]
impl DeviceContextProvider for Service {
    async fn lookup_device_context(&self, device_id: &str) -> Result<DeviceContext, ProviderError> {
        Ok(self.device(device_id))
    }
}

#[async_trait]
impl NetworkContextEvaluator for Service {
    async fn evaluate_network_context(
        &self,
        network_info: &NetworkInfo,
    ) -> Result<NetworkContext, ProviderError> {
        Ok(self.network(network_info))
    }
}

#[async_trait]
impl PolicyStore for Service {
    async fn lookup_resource_policy(
        &self,
        resource_id: &str,
    ) -> Result<Option<ResourcePolicy>, ProviderError> {
        Ok(self.policy(resource_id))
    }
}

#[async_trait]
impl CredentialVerifier for Service {
    async fn verify_credential(
        &self,
        user_id: &str,
        token: &SecretString,
    ) -> Result<bool, ProviderError> {
        self.verify(user_id, token.expose_secret())
            .map_err(|e| ProviderError::internal(format!("{e:#}")))
    }
}
