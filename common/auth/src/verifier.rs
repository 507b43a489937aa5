use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::{TokenClaims, UserClaims};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::kind::{KeyDomain, TokenKind, ISSUER};

/// HMAC algorithms accepted in the token header. Anything else, `none`
/// included, is refused before the signature is looked at.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512"];

const REQUIRED_CLAIMS: &[&str] = &["exp", "nbf", "iss", "sub", "aud"];

#[derive(Clone)]
struct VerificationKeys {
    customer: DecodingKey,
    admin: DecodingKey,
    api_key: DecodingKey,
}

impl VerificationKeys {
    fn from_config(config: &JwtConfig) -> Self {
        Self {
            customer: DecodingKey::from_secret(config.secret(KeyDomain::Customer)),
            admin: DecodingKey::from_secret(config.secret(KeyDomain::Admin)),
            api_key: DecodingKey::from_secret(config.secret(KeyDomain::ApiKey)),
        }
    }

    fn get(&self, domain: KeyDomain) -> &DecodingKey {
        match domain {
            KeyDomain::Customer => &self.customer,
            KeyDomain::Admin => &self.admin,
            KeyDomain::ApiKey => &self.api_key,
        }
    }
}

/// Verifies tokens against the key domain of the kind the caller expects.
#[derive(Clone)]
pub struct JwtVerifier {
    config: Arc<JwtConfig>,
    keys: VerificationKeys,
}

impl JwtVerifier {
    pub fn new(config: Arc<JwtConfig>) -> Self {
        let keys = VerificationKeys::from_config(&config);
        Self { config, keys }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Parses and verifies `token` as a token of `kind`.
    ///
    /// Checks run cheapest first: segment structure, header algorithm,
    /// signature, registered claims, and finally the claims-presence policy
    /// of `kind`.
    pub fn parse(&self, kind: TokenKind, token: &str) -> AuthResult<TokenClaims> {
        inspect_structure(token)?;

        let validation = self.validation(kind);
        let token_data = decode::<Value>(token, self.keys.get(kind.key_domain()), &validation)?;
        let claims = TokenClaims::try_from(token_data.claims)?;
        claims.ensure_shape(kind)?;

        debug!(%kind, exp = claims.exp, "verified token");
        Ok(claims)
    }

    pub fn parse_named(&self, kind: &str, token: &str) -> AuthResult<TokenClaims> {
        let kind: TokenKind = kind.parse()?;
        self.parse(kind, token)
    }

    /// Parses a claim-bearing token and returns only the user claims.
    pub fn parse_user(&self, kind: TokenKind, token: &str) -> AuthResult<UserClaims> {
        self.parse(kind, token)?.into_user()
    }

    fn validation(&self, kind: TokenKind) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = self.config.leeway_seconds.into();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(kind.audience());
        validation.sub = Some(kind.subject().to_string());
        validation.set_required_spec_claims(REQUIRED_CLAIMS);
        validation
    }
}

/// Rejects anything that is not `header.payload.signature` with JSON-object
/// header and payload and an HMAC `alg`.
fn inspect_structure(token: &str) -> AuthResult<()> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken(
            "expected three dot-separated segments".into(),
        ));
    };

    let header = decode_json_segment("header", header)?;
    let alg = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::InvalidSigningMethod("header has no alg".into()))?;
    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::InvalidSigningMethod(format!(
            "algorithm '{alg}' is not accepted"
        )));
    }

    decode_json_segment("payload", payload)?;

    if signature.is_empty() {
        return Err(AuthError::MalformedToken("signature segment is empty".into()));
    }
    URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|err| AuthError::MalformedToken(format!("signature: {err}")))?;

    Ok(())
}

fn decode_json_segment(name: &str, segment: &str) -> AuthResult<Value> {
    if segment.is_empty() {
        return Err(AuthError::MalformedToken(format!("{name} segment is empty")));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|err| AuthError::MalformedToken(format!("{name}: {err}")))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|err| AuthError::MalformedToken(format!("{name}: {err}")))?;
    if !value.is_object() {
        return Err(AuthError::MalformedToken(format!("{name} is not a JSON object")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::TokenSigner;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const CUSTOMER_SECRET: &str = "customer-secret";

    fn config() -> Arc<JwtConfig> {
        Arc::new(JwtConfig::new(CUSTOMER_SECRET, "admin-secret", "api-secret").with_expiry(600, 3_600))
    }

    fn pair() -> (TokenSigner, JwtVerifier) {
        let config = config();
        (TokenSigner::new(config.clone()), JwtVerifier::new(config))
    }

    fn craft(header: Value, payload: Value, signature: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload.to_string()),
            signature
        )
    }

    fn access_payload(exp: i64) -> Value {
        json!({
            "claims": {"id": "user-1", "role_id": 1},
            "iss": ISSUER,
            "sub": "access-token",
            "aud": ["customer", "admin"],
            "exp": exp,
            "nbf": Utc::now().timestamp() - 7_200,
        })
    }

    #[test]
    fn access_token_round_trips_claims() {
        let (signer, verifier) = pair();
        let claims = UserClaims::new("user-1", 2);
        let issued = signer.issue(TokenKind::Access, Some(&claims)).expect("issue");

        let parsed = verifier
            .parse_user(TokenKind::Access, issued.as_str())
            .expect("parse");
        assert_eq!(parsed, claims);
    }

    #[test]
    fn admin_and_customer_keys_are_isolated() {
        let (signer, verifier) = pair();
        let admin = signer.issue(TokenKind::Admin, None).expect("admin");
        let access = signer
            .issue(TokenKind::Access, Some(&UserClaims::new("user-1", 1)))
            .expect("access");

        let err = verifier
            .parse(TokenKind::Access, admin.as_str())
            .expect_err("admin token under customer key");
        assert!(matches!(err, AuthError::SignatureInvalid(_)), "got {err:?}");

        let err = verifier
            .parse(TokenKind::Admin, access.as_str())
            .expect_err("access token under admin key");
        assert!(matches!(err, AuthError::SignatureInvalid(_)), "got {err:?}");
    }

    #[test]
    fn api_key_and_admin_keys_are_isolated() {
        let (signer, verifier) = pair();
        let api_key = signer.issue(TokenKind::ApiKey, None).expect("api key");
        let admin = signer.issue(TokenKind::Admin, None).expect("admin");

        assert!(verifier.parse(TokenKind::ApiKey, api_key.as_str()).is_ok());
        assert!(matches!(
            verifier.parse(TokenKind::Admin, api_key.as_str()),
            Err(AuthError::SignatureInvalid(_))
        ));
        assert!(matches!(
            verifier.parse(TokenKind::ApiKey, admin.as_str()),
            Err(AuthError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn expired_token_with_valid_signature_is_expired() {
        let verifier = JwtVerifier::new(config());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &access_payload(Utc::now().timestamp() - 3_600),
            &EncodingKey::from_secret(CUSTOMER_SECRET.as_bytes()),
        )
        .expect("encode");

        let err = verifier
            .parse(TokenKind::Access, &token)
            .expect_err("expired");
        assert!(matches!(err, AuthError::ExpiredToken));
    }

    #[test]
    fn expired_token_with_foreign_signature_is_a_signature_failure() {
        let verifier = JwtVerifier::new(config());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &access_payload(Utc::now().timestamp() - 3_600),
            &EncodingKey::from_secret(b"someone-else"),
        )
        .expect("encode");

        assert!(matches!(
            verifier.parse(TokenKind::Access, &token),
            Err(AuthError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn malformed_tokens_are_rejected_structurally() {
        let (signer, verifier) = pair();
        let issued = signer
            .issue(TokenKind::Access, Some(&UserClaims::new("user-1", 1)))
            .expect("issue");
        let token = issued.as_str();
        let without_signature = &token[..token.rfind('.').expect("dot")];
        let half = &token[..token.len() / 2];

        let cases = [
            "",
            "not-a-token",
            without_signature,
            half,
            "abc.$$$.def",
            "e30.e30.e30.e30",
            "bnVsbA.bnVsbA.c2ln",
        ];
        for case in cases {
            let err = verifier
                .parse(TokenKind::Access, case)
                .expect_err("malformed token must fail");
            assert!(matches!(err, AuthError::MalformedToken(_)), "{case:?} gave {err:?}");
        }
    }

    #[test]
    fn non_hmac_algorithms_are_refused() {
        let verifier = JwtVerifier::new(config());
        let payload = access_payload(Utc::now().timestamp() + 600);

        let none = craft(json!({"alg": "none", "typ": "JWT"}), payload.clone(), "");
        assert!(matches!(
            verifier.parse(TokenKind::Access, &none),
            Err(AuthError::InvalidSigningMethod(_))
        ));

        let rs256 = craft(json!({"alg": "RS256", "typ": "JWT"}), payload, "c2lnbmF0dXJl");
        assert!(matches!(
            verifier.parse(TokenKind::Access, &rs256),
            Err(AuthError::InvalidSigningMethod(_))
        ));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let (signer, verifier) = pair();
        let refresh = signer
            .issue(TokenKind::Refresh, Some(&UserClaims::new("user-1", 1)))
            .expect("refresh");

        assert!(verifier.parse(TokenKind::Refresh, refresh.as_str()).is_ok());
        assert!(matches!(
            verifier.parse(TokenKind::Access, refresh.as_str()),
            Err(AuthError::ClaimsTypeInvalid(_))
        ));
    }

    #[test]
    fn access_token_without_user_claims_fails_shape_check() {
        let verifier = JwtVerifier::new(config());
        let mut payload = access_payload(Utc::now().timestamp() + 600);
        payload["claims"] = Value::Null;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(CUSTOMER_SECRET.as_bytes()),
        )
        .expect("encode");

        assert!(matches!(
            verifier.parse(TokenKind::Access, &token),
            Err(AuthError::ClaimsTypeInvalid(_))
        ));
    }

    #[test]
    fn parse_named_rejects_unknown_kind() {
        let verifier = JwtVerifier::new(config());
        assert!(matches!(
            verifier.parse_named("cookie", "a.b.c"),
            Err(AuthError::UnknownTokenKind(_))
        ));
    }
}
