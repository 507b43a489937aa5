use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown token type '{0}'")]
    UnknownTokenKind(String),
    #[error("signing method is invalid: {0}")]
    InvalidSigningMethod(String),
    #[error("token format is invalid: {0}")]
    MalformedToken(String),
    #[error("token had expired")]
    ExpiredToken,
    #[error("parse token failed: {0}")]
    SignatureInvalid(String),
    #[error("claims type is invalid: {0}")]
    ClaimsTypeInvalid(String),
    #[error("no permission to access")]
    RevokedToken,
    #[error("user role id is not a valid role: {0}")]
    InvalidRoleType(String),
    #[error("role lookup failed: {0}")]
    RoleLookupFailed(String),
    #[error("token registry unavailable: {0}")]
    RegistryUnavailable(String),
    #[error("authorization header missing")]
    MissingCredentials,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("no permission to access")]
    Forbidden,
    #[error("email or password is invalid")]
    InvalidCredentials,
    #[error("credential lookup failed: {0}")]
    CredentialLookupFailed(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Stable machine-readable code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UnknownTokenKind(_) => "AUTH_TOKEN_KIND",
            AuthError::InvalidSigningMethod(_) => "AUTH_SIGNING_METHOD",
            AuthError::MalformedToken(_) => "AUTH_TOKEN_MALFORMED",
            AuthError::ExpiredToken => "AUTH_TOKEN_EXPIRED",
            AuthError::SignatureInvalid(_) => "AUTH_TOKEN_SIGNATURE",
            AuthError::ClaimsTypeInvalid(_) => "AUTH_CLAIMS",
            AuthError::RevokedToken => "AUTH_TOKEN_REVOKED",
            AuthError::InvalidRoleType(_) => "AUTH_ROLE_TYPE",
            AuthError::RoleLookupFailed(_) => "AUTH_ROLE_LOOKUP",
            AuthError::RegistryUnavailable(_) => "AUTH_REGISTRY",
            AuthError::MissingCredentials | AuthError::InvalidAuthorization => "AUTH_HEADER",
            AuthError::Forbidden => "AUTH_FORBIDDEN",
            AuthError::InvalidCredentials => "AUTH_CREDENTIALS",
            AuthError::CredentialLookupFailed(_) => "AUTH_CREDENTIAL_LOOKUP",
            AuthError::Signing(_) => "AUTH_SIGNING",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidRoleType(_) | AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::RoleLookupFailed(_) => StatusCode::FORBIDDEN,
            AuthError::UnknownTokenKind(_) | AuthError::Signing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AuthError::CredentialLookupFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match value.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::MalformedToken(value.to_string()),
            ErrorKind::ExpiredSignature => Self::ExpiredToken,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::InvalidSigningMethod(value.to_string())
            }
            ErrorKind::InvalidSubject
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::MissingRequiredClaim(_) => Self::ClaimsTypeInvalid(value.to_string()),
            _ => Self::SignatureInvalid(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        response
            .headers_mut()
            .insert("X-Error-Code", HeaderValue::from_static(code));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use jsonwebtoken::errors::ErrorKind;

    #[test]
    fn jsonwebtoken_kinds_map_to_taxonomy() {
        let expired: AuthError = jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature).into();
        assert!(matches!(expired, AuthError::ExpiredToken));

        let signature: AuthError =
            jsonwebtoken::errors::Error::from(ErrorKind::InvalidSignature).into();
        assert!(matches!(signature, AuthError::SignatureInvalid(_)));

        let algorithm: AuthError =
            jsonwebtoken::errors::Error::from(ErrorKind::InvalidAlgorithm).into();
        assert!(matches!(algorithm, AuthError::InvalidSigningMethod(_)));

        let subject: AuthError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidSubject).into();
        assert!(matches!(subject, AuthError::ClaimsTypeInvalid(_)));

        let structure: AuthError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken).into();
        assert!(matches!(structure, AuthError::MalformedToken(_)));
    }

    #[test]
    fn messages_are_distinct_per_failure_class() {
        assert_eq!(AuthError::ExpiredToken.to_string(), "token had expired");
        assert!(AuthError::MalformedToken("x".into())
            .to_string()
            .starts_with("token format is invalid"));
        assert!(AuthError::SignatureInvalid("x".into())
            .to_string()
            .starts_with("parse token failed"));
    }

    #[tokio::test]
    async fn response_carries_code_header_and_body() {
        let response = AuthError::RevokedToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("X-Error-Code").expect("code header"),
            "AUTH_TOKEN_REVOKED"
        );

        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["code"], "AUTH_TOKEN_REVOKED");
        assert_eq!(body["message"], "no permission to access");
    }

    #[test]
    fn credential_failures_are_distinguished() {
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidCredentials.code(), "AUTH_CREDENTIALS");
        assert_eq!(
            AuthError::CredentialLookupFailed("db down".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn role_failures_are_forbidden_not_unauthorized() {
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::RoleLookupFailed("down".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AuthError::ExpiredToken.status(), StatusCode::UNAUTHORIZED);
    }
}
