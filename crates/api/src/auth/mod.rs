//! Credential verification.
//!
//! - [`jwt`] -- HS256 access tokens presented by owners.
//! - [`Authenticator`] -- the capability the HTTP and WebSocket layers call
//!   to turn a credential into a user id.
//! - [`StaticAuthenticator`] -- JWT validation plus a fixed table of device
//!   API keys, the default implementation.

pub mod jwt;

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tether_core::error::CoreError;
use tether_core::types::DbId;

use self::jwt::{validate_token, JwtConfig};

/// Maps a request credential to the user it acts for.
pub trait Authenticator: Send + Sync + 'static {
    /// Verify an owner bearer token.
    fn verify_bearer(&self, token: &str) -> Result<DbId, CoreError>;

    /// Verify a device API key.
    fn verify_api_key(&self, key: &str) -> Result<DbId, CoreError>;
}

/// Compute the SHA-256 hex digest of an API key.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// [`Authenticator`] backed by a JWT secret and configured device keys.
///
/// Only the SHA-256 hash of each API key is held after construction.
pub struct StaticAuthenticator {
    jwt: JwtConfig,
    key_hashes: HashMap<String, DbId>,
}

impl StaticAuthenticator {
    pub fn new(jwt: JwtConfig, api_keys: &HashMap<String, DbId>) -> Self {
        let key_hashes = api_keys
            .iter()
            .map(|(key, user_id)| (hash_api_key(key), *user_id))
            .collect();
        Self { jwt, key_hashes }
    }
}

impl Authenticator for StaticAuthenticator {
    fn verify_bearer(&self, token: &str) -> Result<DbId, CoreError> {
        validate_token(token, &self.jwt)
            .map(|claims| claims.sub)
            .map_err(|_| CoreError::Unauthorized("Invalid or expired token".into()))
    }

    fn verify_api_key(&self, key: &str) -> Result<DbId, CoreError> {
        self.key_hashes
            .get(&hash_api_key(key))
            .copied()
            .ok_or_else(|| CoreError::Unauthorized("Invalid API key".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn authenticator() -> StaticAuthenticator {
        let jwt = JwtConfig {
            secret: "unit-test-secret".into(),
            access_token_expiry_mins: 5,
        };
        let keys = HashMap::from([("device-key".to_string(), 7)]);
        StaticAuthenticator::new(jwt, &keys)
    }

    #[test]
    fn api_key_resolves_to_user() {
        let auth = authenticator();
        assert_eq!(auth.verify_api_key("device-key").unwrap(), 7);
        assert_matches!(
            auth.verify_api_key("other"),
            Err(CoreError::Unauthorized(_))
        );
    }

    #[test]
    fn plaintext_keys_are_not_retained() {
        let auth = authenticator();
        assert!(!auth.key_hashes.contains_key("device-key"));
        assert!(auth.key_hashes.contains_key(&hash_api_key("device-key")));
        assert_eq!(hash_api_key("device-key").len(), 64);
    }

    #[test]
    fn bearer_token_resolves_to_subject() {
        let auth = authenticator();
        let token = jwt::generate_access_token(3, &auth.jwt).unwrap();
        assert_eq!(auth.verify_bearer(&token).unwrap(), 3);
        assert_matches!(
            auth.verify_bearer("not-a-jwt"),
            Err(CoreError::Unauthorized(_))
        );
    }
}
