use std::fmt;

use crate::kind::KeyDomain;

pub const DEFAULT_ACCESS_EXPIRES_SECONDS: i64 = 86_400;
pub const DEFAULT_REFRESH_EXPIRES_SECONDS: i64 = 604_800;
pub const DEFAULT_API_KEY_EXPIRES_SECONDS: i64 = 31_560_000;

/// Signing secrets and lifetimes shared by the signer and the verifier.
///
/// Loaded once at process start and treated as read-only afterwards.
#[derive(Clone)]
pub struct JwtConfig {
    customer_secret: Vec<u8>,
    admin_secret: Vec<u8>,
    api_key_secret: Vec<u8>,
    /// Lifetime of access tokens in seconds.
    pub access_expires_seconds: i64,
    /// Lifetime of refresh tokens in seconds.
    pub refresh_expires_seconds: i64,
    /// Lifetime of API keys in seconds.
    pub api_key_expires_seconds: i64,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    pub fn new(
        customer_secret: impl Into<Vec<u8>>,
        admin_secret: impl Into<Vec<u8>>,
        api_key_secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            customer_secret: customer_secret.into(),
            admin_secret: admin_secret.into(),
            api_key_secret: api_key_secret.into(),
            access_expires_seconds: DEFAULT_ACCESS_EXPIRES_SECONDS,
            refresh_expires_seconds: DEFAULT_REFRESH_EXPIRES_SECONDS,
            api_key_expires_seconds: DEFAULT_API_KEY_EXPIRES_SECONDS,
            leeway_seconds: 0,
        }
    }

    pub fn with_expiry(mut self, access_seconds: i64, refresh_seconds: i64) -> Self {
        self.access_expires_seconds = access_seconds;
        self.refresh_expires_seconds = refresh_seconds;
        self
    }

    pub fn with_api_key_expiry(mut self, seconds: i64) -> Self {
        self.api_key_expires_seconds = seconds;
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn secret(&self, domain: KeyDomain) -> &[u8] {
        match domain {
            KeyDomain::Customer => &self.customer_secret,
            KeyDomain::Admin => &self.admin_secret,
            KeyDomain::ApiKey => &self.api_key_secret,
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("customer_secret", &"<redacted>")
            .field("admin_secret", &"<redacted>")
            .field("api_key_secret", &"<redacted>")
            .field("access_expires_seconds", &self.access_expires_seconds)
            .field("refresh_expires_seconds", &self.refresh_expires_seconds)
            .field("api_key_expires_seconds", &self.api_key_expires_seconds)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}
