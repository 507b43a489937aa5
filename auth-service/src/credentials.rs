use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use common_auth::{AuthError, AuthResult, UserClaims};
use rand_core::OsRng;

/// Proves an email/password pair and yields the identity to sign in.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Unknown emails and wrong passwords both yield
    /// [`AuthError::InvalidCredentials`].
    async fn verify(&self, email: &str, password: &str) -> AuthResult<UserClaims>;
}

pub fn hash_password(password: &str) -> Result<String> {
    if password.trim().is_empty() {
        bail!("Password must not be empty");
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("Failed to hash password: {err}"))
}

/// Checks `password` against a stored argon2 PHC string. Stored values that
/// do not parse as a hash never match.
pub fn password_matches(stored_hash: &str, password: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

struct StoredCredential {
    password_hash: String,
    user: UserClaims,
}

/// Fixed set of accounts, used when the service runs without Postgres.
#[derive(Default)]
pub struct InMemoryCredentialVerifier {
    users: HashMap<String, StoredCredential>,
}

impl InMemoryCredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, email: &str, password: &str, user: UserClaims) -> Result<Self> {
        let password_hash = hash_password(password)?;
        self.users.insert(
            email.trim().to_ascii_lowercase(),
            StoredCredential {
                password_hash,
                user,
            },
        );
        Ok(self)
    }
}

#[async_trait]
impl CredentialVerifier for InMemoryCredentialVerifier {
    async fn verify(&self, email: &str, password: &str) -> AuthResult<UserClaims> {
        let stored = self
            .users
            .get(&email.trim().to_ascii_lowercase())
            .ok_or(AuthError::InvalidCredentials)?;
        if password_matches(&stored.password_hash, password) {
            Ok(stored.user.clone())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}
