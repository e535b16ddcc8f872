//! Authentication stage.

use std::sync::Arc;

use access_decision_sdk::{CredentialVerifier, ProviderError, UserContext, UserContextProvider};
use secrecy::{ExposeSecret, SecretString};

/// Confirms the claimed identity against the presented credential.
///
/// Fails closed: an empty token, an unknown user, or a credential that does
/// not verify all yield `None`. The empty-token check issues no collaborator
/// call.
pub struct AuthenticationValidator {
    users: Arc<dyn UserContextProvider>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AuthenticationValidator {
    #[must_use]
    pub fn new(users: Arc<dyn UserContextProvider>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { users, verifier }
    }

    /// Returns the verified subject's context.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures unchanged.
    pub async fn authenticate(
        &self,
        user_id: &str,
        token: &SecretString,
    ) -> Result<Option<UserContext>, ProviderError> {
        if token.expose_secret().is_empty() {
            tracing::debug!("empty credential");
            return Ok(None);
        }

        let Some(user) = self.users.lookup_user_context(user_id).await? else {
            tracing::debug!("unknown user");
            return Ok(None);
        };

        if self.verifier.verify_credential(user_id, token).await? {
            Ok(Some(user))
        } else {
            tracing::debug!("credential rejected");
            Ok(None)
        }
    }
}
