use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use common_auth::{
    ensure_role, ensure_self_or_admin, AuthContext, AuthError, Authenticator, JwtConfig,
    JwtVerifier, RoleAuthorizer, SessionManager, TokenSigner, UserClaims, ROLE_ADMIN,
    ROLE_CUSTOMER,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

#[derive(Clone)]
struct TestState {
    authenticator: Arc<Authenticator>,
}

impl axum::extract::FromRef<TestState> for Arc<Authenticator> {
    fn from_ref(state: &TestState) -> Self {
        state.authenticator.clone()
    }
}

async fn admin_only(
    State(state): State<TestState>,
    auth: AuthContext,
) -> Result<Json<Value>, AuthError> {
    ensure_role(state.authenticator.authorizer(), &auth, &[ROLE_ADMIN])?;
    Ok(Json(json!({ "user_id": auth.user_id() })))
}

async fn profile(
    State(state): State<TestState>,
    Path(user_id): Path<String>,
    auth: AuthContext,
) -> Result<Json<Value>, AuthError> {
    ensure_self_or_admin(state.authenticator.authorizer(), &auth, &user_id)?;
    Ok(Json(json!({ "id": user_id })))
}

fn harness() -> (Router, SessionManager) {
    let config = Arc::new(
        JwtConfig::new("customer-secret", "admin-secret", "api-secret").with_expiry(600, 3_600),
    );
    let registry = Arc::new(common_auth::InMemoryAccessTokenRegistry::new());
    let verifier = JwtVerifier::new(config.clone());
    let authenticator = Authenticator::new(
        verifier.clone(),
        registry.clone(),
        RoleAuthorizer::new(2).expect("width"),
    );
    let sessions = SessionManager::new(Arc::new(TokenSigner::new(config)), verifier, registry);

    let app = Router::new()
        .route("/admin", get(admin_only))
        .route("/users/:user_id", get(profile))
        .with_state(TestState {
            authenticator: Arc::new(authenticator),
        });
    (app, sessions)
}

async fn call(app: &Router, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn admin_route_admits_admins_and_rejects_customers() {
    let (app, sessions) = harness();
    let admin = sessions
        .sign_in(UserClaims::new("admin-1", ROLE_ADMIN))
        .await
        .expect("admin sign in");
    let customer = sessions
        .sign_in(UserClaims::new("cust-1", ROLE_CUSTOMER))
        .await
        .expect("customer sign in");

    let (status, body) = call(&app, "/admin", Some(admin.access_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "admin-1");

    let (status, body) = call(&app, "/admin", Some(customer.access_token.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "AUTH_FORBIDDEN");
}

#[tokio::test]
async fn sign_out_revokes_on_the_next_request() {
    let (app, sessions) = harness();
    let passport = sessions
        .sign_in(UserClaims::new("cust-1", ROLE_CUSTOMER))
        .await
        .expect("sign in");
    let token = passport.access_token.as_str();

    let (status, _) = call(&app, "/users/cust-1", Some(token)).await;
    assert_eq!(status, StatusCode::OK);

    sessions.sign_out("cust-1", token).await.expect("sign out");

    let (status, body) = call(&app, "/users/cust-1", Some(token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_TOKEN_REVOKED");
}

#[tokio::test]
async fn profile_is_limited_to_owner_or_admin() {
    let (app, sessions) = harness();
    let other = sessions
        .sign_in(UserClaims::new("cust-2", ROLE_CUSTOMER))
        .await
        .expect("sign in");
    let admin = sessions
        .sign_in(UserClaims::new("admin-1", ROLE_ADMIN))
        .await
        .expect("sign in");

    let (status, _) = call(&app, "/users/cust-1", Some(other.access_token.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, "/users/cust-1", Some(admin.access_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "cust-1");
}

#[tokio::test]
async fn forged_and_missing_credentials_are_unauthorized() {
    let (app, sessions) = harness();

    let (status, body) = call(&app, "/admin", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_HEADER");

    let (status, body) = call(&app, "/admin", Some("not.a-real.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_TOKEN_MALFORMED");

    let admin_capability = sessions.admin_token().expect("admin token");
    let (status, body) = call(&app, "/admin", Some(admin_capability.as_str())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_TOKEN_SIGNATURE");
}
