use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::kind::TokenKind;

/// Identity embedded in customer-facing tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub id: String,
    pub role_id: i64,
}

impl UserClaims {
    pub fn new(id: impl Into<String>, role_id: i64) -> Self {
        Self {
            id: id.into(),
            role_id,
        }
    }
}

/// Wire payload of every token minted by [`crate::TokenSigner`].
///
/// `claims` is populated for access and refresh tokens and `null` for the
/// capability kinds (admin, API key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub claims: Option<UserClaims>,
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub exp: i64,
    pub nbf: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub jti: Option<String>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> AuthResult<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or_else(|| AuthError::ClaimsTypeInvalid(format!("exp '{}' out of range", self.exp)))
    }

    /// Returns the embedded user claims, rejecting capability tokens.
    pub fn user(&self) -> AuthResult<&UserClaims> {
        self.claims
            .as_ref()
            .ok_or_else(|| AuthError::ClaimsTypeInvalid("token carries no user claims".into()))
    }

    pub fn into_user(self) -> AuthResult<UserClaims> {
        self.claims
            .ok_or_else(|| AuthError::ClaimsTypeInvalid("token carries no user claims".into()))
    }

    /// Checks that the claims-presence policy of `kind` holds for this payload.
    pub(crate) fn ensure_shape(&self, kind: TokenKind) -> AuthResult<()> {
        match (kind.carries_user_claims(), self.claims.is_some()) {
            (true, false) => Err(AuthError::ClaimsTypeInvalid(format!(
                "{kind} token is missing user claims"
            ))),
            (false, true) => Err(AuthError::ClaimsTypeInvalid(format!(
                "{kind} token must not carry user claims"
            ))),
            _ => Ok(()),
        }
    }
}

impl TryFrom<serde_json::Value> for TokenClaims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        serde_json::from_value(value).map_err(|err| AuthError::ClaimsTypeInvalid(err.to_string()))
    }
}
