//! HMAC-SHA256 credential keyring.
//!
//! Token format: `<key_id>.<base64url(HMAC-SHA256(secret, user_id))>`.
//! The first configured key signs new tokens; any configured key verifies,
//! so a key can be rotated out by listing its successor first and removing
//! it once issued tokens have expired.

use anyhow::{Context, bail};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::CredentialKeyConfig;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_SECRET_LEN: usize = 32;

struct SigningKey {
    key_id: String,
    secret: SecretSlice<u8>,
}

/// Set of HMAC keys accepted for credential verification.
pub struct Keyring {
    keys: Vec<SigningKey>,
}

impl Keyring {
    /// # Errors
    ///
    /// Fails on an empty or duplicate key id, or a secret shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn from_config(keys: &[CredentialKeyConfig]) -> anyhow::Result<Self> {
        let mut parsed: Vec<SigningKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if key.key_id.is_empty() || key.key_id.contains('.') {
                bail!("credential key id '{}' must be non-empty and contain no '.'", key.key_id);
            }
            if parsed.iter().any(|k| k.key_id == key.key_id) {
                bail!("duplicate credential key id '{}'", key.key_id);
            }
            let secret = key.secret.expose_secret().as_bytes();
            if secret.len() < MIN_SECRET_LEN {
                bail!(
                    "credential key '{}' is shorter than {MIN_SECRET_LEN} bytes",
                    key.key_id
                );
            }
            parsed.push(SigningKey {
                key_id: key.key_id.clone(),
                secret: SecretSlice::from(secret.to_vec()),
            });
        }
        Ok(Self { keys: parsed })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Issue a token for `user_id` with the current signing key.
    ///
    /// # Errors
    ///
    /// Fails when the keyring is empty.
    pub fn sign(&self, user_id: &str) -> anyhow::Result<String> {
        let key = self.keys.first().context("no credential signing key configured")?;
        let tag = compute_tag(key, user_id)?;
        Ok(format!("{}.{}", key.key_id, URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Whether `token` is a valid credential for `user_id`. Malformed tokens
    /// and unknown key ids verify as `false`.
    ///
    /// # Errors
    ///
    /// Fails only if the MAC cannot be keyed.
    pub fn verify(&self, user_id: &str, token: &str) -> anyhow::Result<bool> {
        let Some((key_id, encoded)) = token.split_once('.') else {
            return Ok(false);
        };
        let Some(key) = self.keys.iter().find(|k| k.key_id == key_id) else {
            tracing::debug!(key_id, "credential signed with unknown key");
            return Ok(false);
        };
        let Ok(presented) = URL_SAFE_NO_PAD.decode(encoded) else {
            return Ok(false);
        };
        let expected = compute_tag(key, user_id)?;
        Ok(bool::from(expected.as_slice().ct_eq(presented.as_slice())))
    }
}

fn compute_tag(key: &SigningKey, user_id: &str) -> anyhow::Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key.secret.expose_secret())
        .context("invalid HMAC key length")?;
    mac.update(user_id.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}
