use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::routing::{get, post};
use axum::Router;
use common_auth::{
    AccessTokenRegistry, AuthResult, Authenticator, JwtConfig, JwtVerifier, RoleAuthorizer,
    SessionManager, TokenKind, TokenSigner,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::credentials::CredentialVerifier;
use crate::metrics::AuthMetrics;
use crate::session_handlers::{
    admin_capability, admin_secret, generate_api_key, get_profile, health, metrics_endpoint,
    refresh_passport, sign_in, sign_out,
};

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub sessions: Arc<SessionManager>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub metrics: Arc<AuthMetrics>,
}

impl FromRef<AppState> for Arc<Authenticator> {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

impl FromRef<AppState> for Arc<AuthMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

impl AppState {
    /// Wires the signer, verifier and authenticator over one shared config
    /// and registry.
    pub fn new(
        jwt: JwtConfig,
        registry: Arc<dyn AccessTokenRegistry>,
        credentials: Arc<dyn CredentialVerifier>,
        authorizer: RoleAuthorizer,
        registry_timeout: Duration,
    ) -> Result<Self> {
        let jwt = Arc::new(jwt);
        let verifier = JwtVerifier::new(jwt.clone());
        let authenticator = Authenticator::new(verifier.clone(), registry.clone(), authorizer)
            .with_registry_timeout(registry_timeout);
        let sessions = SessionManager::new(Arc::new(TokenSigner::new(jwt)), verifier, registry);
        let metrics = AuthMetrics::new().context("Failed to register auth metrics")?;

        Ok(Self {
            authenticator: Arc::new(authenticator),
            sessions: Arc::new(sessions),
            credentials,
            metrics: Arc::new(metrics),
        })
    }

    /// Counts the outcome of a token check and hands the result back.
    pub fn observe<T>(&self, kind: TokenKind, result: AuthResult<T>) -> AuthResult<T> {
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.code(),
        };
        self.metrics.token_check(kind.as_str(), outcome);
        result
    }

    pub fn record_decision(&self, result: AuthResult<()>) -> AuthResult<()> {
        let outcome = match &result {
            Ok(()) => "granted",
            Err(err) => err.code(),
        };
        self.metrics.authorization_decision(outcome);
        result
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/v1/users/signin", post(sign_in))
        .route("/v1/users/refresh", post(refresh_passport))
        .route("/v1/users/signout", post(sign_out))
        .route("/v1/users/admin/secret", get(admin_secret))
        .route("/v1/users/:user_id", get(get_profile))
        .route("/v1/admin/capability", get(admin_capability))
        .route("/v1/admin/api-key", get(generate_api_key))
        .with_state(state)
}

pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-admin-token"),
        ]))
}
