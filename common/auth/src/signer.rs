use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tracing::debug;
use uuid::Uuid;

use crate::claims::{TokenClaims, UserClaims};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::kind::{KeyDomain, TokenKind, ISSUER};

/// A freshly minted token together with the absolute expiry it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    pub token: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn into_string(self) -> String {
        self.token
    }
}

struct SigningKeys {
    customer: EncodingKey,
    admin: EncodingKey,
    api_key: EncodingKey,
}

impl SigningKeys {
    fn from_config(config: &JwtConfig) -> Self {
        Self {
            customer: EncodingKey::from_secret(config.secret(KeyDomain::Customer)),
            admin: EncodingKey::from_secret(config.secret(KeyDomain::Admin)),
            api_key: EncodingKey::from_secret(config.secret(KeyDomain::ApiKey)),
        }
    }

    fn get(&self, domain: KeyDomain) -> &EncodingKey {
        match domain {
            KeyDomain::Customer => &self.customer,
            KeyDomain::Admin => &self.admin,
            KeyDomain::ApiKey => &self.api_key,
        }
    }
}

/// Mints HS256 tokens for every [`TokenKind`].
///
/// Signing has no side effects: registering an access token as live is the
/// caller's job (see [`crate::SessionManager`]).
pub struct TokenSigner {
    config: Arc<JwtConfig>,
    keys: SigningKeys,
}

impl TokenSigner {
    pub fn new(config: Arc<JwtConfig>) -> Self {
        let keys = SigningKeys::from_config(&config);
        Self { config, keys }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Signs a token of `kind` expiring `now + ttl(kind)`.
    pub fn issue(&self, kind: TokenKind, claims: Option<&UserClaims>) -> AuthResult<SignedToken> {
        let now = Utc::now();
        let exp = now.timestamp() + kind.ttl_seconds(&self.config);
        self.sign(kind, claims, now, exp)
    }

    /// String-keyed variant of [`TokenSigner::issue`] for callers that carry
    /// the kind as text.
    pub fn issue_named(&self, kind: &str, claims: Option<&UserClaims>) -> AuthResult<SignedToken> {
        let kind: TokenKind = kind.parse()?;
        self.issue(kind, claims)
    }

    /// Signs a claim-bearing token with an explicit absolute expiry so a
    /// renewed token inherits the lifetime of the session it replaces.
    pub fn reissue(
        &self,
        kind: TokenKind,
        claims: &UserClaims,
        expires_at_unix: i64,
    ) -> AuthResult<SignedToken> {
        if !kind.carries_user_claims() {
            return Err(AuthError::ClaimsTypeInvalid(format!(
                "{kind} tokens carry no user claims and cannot be reissued"
            )));
        }

        let now = Utc::now();
        if expires_at_unix <= now.timestamp() {
            return Err(AuthError::ExpiredToken);
        }

        self.sign(kind, Some(claims), now, expires_at_unix)
    }

    fn sign(
        &self,
        kind: TokenKind,
        claims: Option<&UserClaims>,
        now: DateTime<Utc>,
        exp: i64,
    ) -> AuthResult<SignedToken> {
        let claims = match (kind.carries_user_claims(), claims) {
            (true, Some(claims)) => Some(claims.clone()),
            (true, None) => {
                return Err(AuthError::ClaimsTypeInvalid(format!(
                    "{kind} tokens require user claims"
                )))
            }
            (false, Some(_)) => {
                debug!(%kind, "dropping user claims from capability token");
                None
            }
            (false, None) => None,
        };

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| AuthError::Signing(format!("expiry {exp} out of range")))?;

        let payload = TokenClaims {
            claims,
            iss: ISSUER.to_string(),
            sub: kind.subject().to_string(),
            aud: kind.audience().iter().map(|aud| aud.to_string()).collect(),
            exp,
            nbf: now.timestamp(),
            iat: Some(now.timestamp()),
            jti: Some(Uuid::new_v4().to_string()),
        };

        let header = Header::new(Algorithm::HS256);
        let token = encode(&header, &payload, self.keys.get(kind.key_domain()))
            .map_err(|err| AuthError::Signing(err.to_string()))?;

        debug!(%kind, exp, "signed token");
        Ok(SignedToken {
            token,
            kind,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn signer() -> TokenSigner {
        let config = JwtConfig::new("customer-secret", "admin-secret", "api-secret")
            .with_expiry(600, 3_600);
        TokenSigner::new(Arc::new(config))
    }

    fn payload_of(token: &str) -> TokenClaims {
        let segment = token.split('.').nth(1).expect("payload segment");
        let bytes = URL_SAFE_NO_PAD.decode(segment).expect("base64 payload");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    #[test]
    fn access_token_embeds_claims_and_policy() {
        let claims = UserClaims::new("user-1", 1);
        let before = Utc::now().timestamp();
        let issued = signer()
            .issue(TokenKind::Access, Some(&claims))
            .expect("access token");

        let payload = payload_of(issued.as_str());
        assert_eq!(payload.claims, Some(claims));
        assert_eq!(payload.iss, ISSUER);
        assert_eq!(payload.sub, "access-token");
        assert_eq!(payload.aud, vec!["customer".to_string(), "admin".to_string()]);
        assert!(payload.exp >= before + 600 && payload.exp <= Utc::now().timestamp() + 600);
        assert_eq!(issued.expires_at.timestamp(), payload.exp);
    }

    #[test]
    fn admin_token_has_no_claims_and_short_expiry() {
        let before = Utc::now().timestamp();
        let issued = signer()
            .issue(TokenKind::Admin, Some(&UserClaims::new("ignored", 2)))
            .expect("admin token");

        let payload = payload_of(issued.as_str());
        assert!(payload.claims.is_none());
        assert_eq!(payload.sub, "admin-token");
        assert_eq!(payload.aud, vec!["admin".to_string()]);
        assert!(payload.exp - before <= 301 && payload.exp - before >= 300);
    }

    #[test]
    fn claim_bearing_kinds_require_claims() {
        let err = signer()
            .issue(TokenKind::Refresh, None)
            .expect_err("refresh without claims");
        assert!(matches!(err, AuthError::ClaimsTypeInvalid(_)));
    }

    #[test]
    fn issue_named_rejects_unknown_kind() {
        let err = signer()
            .issue_named("bogus", None)
            .expect_err("unknown kind");
        assert!(matches!(err, AuthError::UnknownTokenKind(_)));

        let issued = signer().issue_named("apikey", None).expect("api key");
        assert_eq!(issued.kind, TokenKind::ApiKey);
    }

    #[test]
    fn tokens_minted_together_are_distinct() {
        let claims = UserClaims::new("user-1", 1);
        let signer = signer();
        let first = signer.issue(TokenKind::Access, Some(&claims)).expect("first");
        let second = signer.issue(TokenKind::Access, Some(&claims)).expect("second");
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn repeated_reissue_keeps_the_absolute_expiry() {
        let claims = UserClaims::new("user-1", 1);
        let signer = signer();
        let deadline = Utc::now().timestamp() + 120;

        let mut current = signer
            .reissue(TokenKind::Refresh, &claims, deadline)
            .expect("first reissue");
        for _ in 0..3 {
            let exp = payload_of(current.as_str()).exp;
            current = signer
                .reissue(TokenKind::Refresh, &claims, exp)
                .expect("chained reissue");
        }

        assert_eq!(payload_of(current.as_str()).exp, deadline);
        assert_eq!(current.expires_at.timestamp(), deadline);
    }

    #[test]
    fn reissue_rejects_past_deadline_and_capability_kinds() {
        let claims = UserClaims::new("user-1", 1);
        let signer = signer();
        let past = Utc::now().timestamp() - 1;
        assert!(matches!(
            signer.reissue(TokenKind::Access, &claims, past),
            Err(AuthError::ExpiredToken)
        ));
        assert!(matches!(
            signer.reissue(TokenKind::Admin, &claims, past + 1_000),
            Err(AuthError::ClaimsTypeInvalid(_))
        ));
    }
}
