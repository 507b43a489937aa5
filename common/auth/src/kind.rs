use std::fmt;
use std::str::FromStr;

use crate::config::JwtConfig;
use crate::error::AuthError;

pub const ISSUER: &str = "storefront-api";
pub const ADMIN_TOKEN_TTL_SECONDS: i64 = 300;

pub const AUDIENCE_CUSTOMER: &str = "customer";
pub const AUDIENCE_ADMIN: &str = "admin";

/// Which configured secret signs and verifies a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDomain {
    Customer,
    Admin,
    /// API keys get their own secret (`JWT_API_KEY`) instead of sharing the
    /// admin one, so leaking a long-lived key never yields admin tokens.
    ApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
    Admin,
    ApiKey,
}

impl TokenKind {
    pub const ALL: [TokenKind; 4] = [
        TokenKind::Access,
        TokenKind::Refresh,
        TokenKind::Admin,
        TokenKind::ApiKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Admin => "admin",
            TokenKind::ApiKey => "apikey",
        }
    }

    pub fn key_domain(&self) -> KeyDomain {
        match self {
            TokenKind::Access | TokenKind::Refresh => KeyDomain::Customer,
            TokenKind::Admin => KeyDomain::Admin,
            TokenKind::ApiKey => KeyDomain::ApiKey,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            TokenKind::Access => "access-token",
            TokenKind::Refresh => "refresh-token",
            TokenKind::Admin => "admin-token",
            TokenKind::ApiKey => "api-key",
        }
    }

    pub fn audience(&self) -> &'static [&'static str] {
        match self {
            TokenKind::Admin => &[AUDIENCE_ADMIN],
            _ => &[AUDIENCE_CUSTOMER, AUDIENCE_ADMIN],
        }
    }

    /// Access and refresh tokens identify a user; admin and API-key tokens
    /// authenticate a capability and carry `claims: null`.
    pub fn carries_user_claims(&self) -> bool {
        matches!(self, TokenKind::Access | TokenKind::Refresh)
    }

    /// Lifetime applied when a token is minted relative to "now".
    pub fn ttl_seconds(&self, config: &JwtConfig) -> i64 {
        match self {
            TokenKind::Access => config.access_expires_seconds,
            TokenKind::Refresh => config.refresh_expires_seconds,
            TokenKind::Admin => ADMIN_TOKEN_TTL_SECONDS,
            TokenKind::ApiKey => config.api_key_expires_seconds,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            "admin" => Ok(TokenKind::Admin),
            "apikey" | "api_key" | "api-key" => Ok(TokenKind::ApiKey),
            _ => Err(AuthError::UnknownTokenKind(value.to_string())),
        }
    }
}
