use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};

use crate::authenticator::Authenticator;
use crate::claims::{TokenClaims, UserClaims};
use crate::error::{AuthError, AuthResult};

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Verified, registry-checked access token presented as a bearer token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: UserClaims,
    pub token: String,
}

impl AuthContext {
    pub fn user_id(&self) -> &str {
        &self.claims.id
    }

    pub fn role_id(&self) -> i64 {
        self.claims.role_id
    }

    pub fn into_claims(self) -> UserClaims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Arc::<Authenticator>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?;

        let token = parse_bearer(header_value)?;
        let claims = authenticator.authenticate_access(&token).await?;

        Ok(Self { claims, token })
    }
}

/// Client application identified by a valid API key.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub claims: TokenClaims,
}

#[async_trait]
impl<S> FromRequestParts<S> for ApiKeyContext
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Arc::<Authenticator>::from_ref(state);
        let token = header_token(parts, API_KEY_HEADER)?;
        let claims = authenticator.authenticate_api_key(&token).await?;
        Ok(Self { claims })
    }
}

/// Holder of a short-lived admin capability token.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub claims: TokenClaims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Arc::<Authenticator>::from_ref(state);
        let token = header_token(parts, ADMIN_TOKEN_HEADER)?;
        let claims = authenticator.authenticate_admin(&token).await?;
        Ok(Self { claims })
    }
}

fn header_token(parts: &Parts, name: &str) -> AuthResult<String> {
    let raw = parts
        .headers
        .get(name)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    if raw.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(raw.to_owned())
}

fn parse_bearer(value: &HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
