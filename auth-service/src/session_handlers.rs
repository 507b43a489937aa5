use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::{
    ensure_role, ensure_self_or_admin, AdminContext, ApiKeyContext, AuthContext, AuthError,
    PassportBody, SignedToken, TokenKind, ROLE_ADMIN,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::metrics::AuthMetrics;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct IssuedTokenBody {
    pub token: String,
    pub kind: &'static str,
    pub expires_at: String,
}

impl From<SignedToken> for IssuedTokenBody {
    fn from(value: SignedToken) -> Self {
        Self {
            kind: value.kind.as_str(),
            expires_at: value.expires_at.to_rfc3339(),
            token: value.token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileBody {
    pub id: String,
    pub viewed_by: String,
}

#[derive(Debug, Serialize)]
pub struct CapabilityBody {
    pub subject: String,
    pub audience: Vec<String>,
    pub expires_at: String,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics_endpoint(State(metrics): State<Arc<AuthMetrics>>) -> Response {
    match metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(?err, "Unable to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<PassportBody>, AuthError> {
    let SignInRequest { email, password } = request;

    let user = match state.credentials.verify(&email, &password).await {
        Ok(user) => user,
        Err(err) => {
            state.metrics.session_event("sign_in_rejected");
            return Err(err);
        }
    };
    let passport = state.sessions.sign_in(user).await?;
    state.metrics.session_event("sign_in");

    Ok(Json(PassportBody::from(&passport)))
}

pub async fn refresh_passport(
    State(state): State<AppState>,
    api_key: Result<ApiKeyContext, AuthError>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<PassportBody>, AuthError> {
    state.observe(TokenKind::ApiKey, api_key)?;

    let passport = state.sessions.refresh(&request.refresh_token).await;
    let passport = state.observe(TokenKind::Refresh, passport)?;
    state.metrics.session_event("refresh");

    Ok(Json(PassportBody::from(&passport)))
}

pub async fn sign_out(
    State(state): State<AppState>,
    api_key: Result<ApiKeyContext, AuthError>,
    auth: Result<AuthContext, AuthError>,
) -> Result<StatusCode, AuthError> {
    state.observe(TokenKind::ApiKey, api_key)?;
    let auth = state.observe(TokenKind::Access, auth)?;

    let removed = state.sessions.sign_out(auth.user_id(), &auth.token).await?;
    if !removed {
        info!(user_id = %auth.user_id(), "sign out raced with another revocation");
    }
    state.metrics.session_event("sign_out");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_secret(
    State(state): State<AppState>,
    auth: Result<AuthContext, AuthError>,
) -> Result<Json<IssuedTokenBody>, AuthError> {
    let auth = state.observe(TokenKind::Access, auth)?;
    state.record_decision(ensure_role(
        state.authenticator.authorizer(),
        &auth,
        &[ROLE_ADMIN],
    ))?;

    let token = state.sessions.admin_token()?;
    state.metrics.session_event("admin_token_issued");
    info!(user_id = %auth.user_id(), "admin token issued");

    Ok(Json(IssuedTokenBody::from(token)))
}

pub async fn generate_api_key(
    State(state): State<AppState>,
    auth: Result<AuthContext, AuthError>,
) -> Result<Json<IssuedTokenBody>, AuthError> {
    let auth = state.observe(TokenKind::Access, auth)?;
    state.record_decision(ensure_role(
        state.authenticator.authorizer(),
        &auth,
        &[ROLE_ADMIN],
    ))?;

    let key = state.sessions.api_key()?;
    state.metrics.session_event("api_key_issued");
    info!(user_id = %auth.user_id(), "api key issued");

    Ok(Json(IssuedTokenBody::from(key)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    auth: Result<AuthContext, AuthError>,
) -> Result<Json<ProfileBody>, AuthError> {
    let auth = state.observe(TokenKind::Access, auth)?;
    state.record_decision(ensure_self_or_admin(
        state.authenticator.authorizer(),
        &auth,
        &user_id,
    ))?;

    Ok(Json(ProfileBody {
        id: user_id,
        viewed_by: auth.user_id().to_string(),
    }))
}

pub async fn admin_capability(
    State(state): State<AppState>,
    admin: Result<AdminContext, AuthError>,
) -> Result<Json<CapabilityBody>, AuthError> {
    let admin = state.observe(TokenKind::Admin, admin)?;
    let expires_at = admin.claims.expires_at()?;

    Ok(Json(CapabilityBody {
        subject: admin.claims.sub,
        audience: admin.claims.aud,
        expires_at: expires_at.to_rfc3339(),
    }))
}
