//! Postgres-backed session registry, role directory and credential store.
//!
//! Expects the storefront schema: `oauth (user_id TEXT, access_token TEXT,
//! refresh_token TEXT)` with one row per session, `roles`, and
//! `users (id TEXT, email TEXT, password TEXT, role_id BIGINT)` where
//! `password` holds an argon2 PHC string.

use async_trait::async_trait;
use common_auth::{AccessTokenRegistry, AuthError, AuthResult, RoleDirectory, UserClaims};
use sqlx::{PgPool, Row};
use tracing::{error, warn};

use crate::credentials::{password_matches, CredentialVerifier};

#[derive(Clone)]
pub struct PgAccessTokenRegistry {
    pool: PgPool,
}

impl PgAccessTokenRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(operation: &'static str, err: sqlx::Error) -> AuthError {
    error!(?err, operation, "token registry query failed");
    AuthError::RegistryUnavailable(err.to_string())
}

#[async_trait]
impl AccessTokenRegistry for PgAccessTokenRegistry {
    async fn exists(&self, user_id: &str, access_token: &str) -> AuthResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM oauth WHERE user_id = $1 AND access_token = $2)",
        )
        .bind(user_id)
        .bind(access_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| unavailable("exists", err))
    }

    async fn insert(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> AuthResult<()> {
        sqlx::query("INSERT INTO oauth (user_id, access_token, refresh_token) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(access_token)
            .bind(refresh_token)
            .execute(&self.pool)
            .await
            .map_err(|err| unavailable("insert", err))?;
        Ok(())
    }

    async fn rotate(
        &self,
        user_id: &str,
        refresh_token: &str,
        next_access_token: &str,
        next_refresh_token: &str,
    ) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE oauth SET access_token = $3, refresh_token = $4 WHERE user_id = $1 AND refresh_token = $2",
        )
        .bind(user_id)
        .bind(refresh_token)
        .bind(next_access_token)
        .bind(next_refresh_token)
        .execute(&self.pool)
        .await
        .map_err(|err| unavailable("rotate", err))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: &str, access_token: &str) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM oauth WHERE user_id = $1 AND access_token = $2")
            .bind(user_id)
            .bind(access_token)
            .execute(&self.pool)
            .await
            .map_err(|err| unavailable("delete", err))?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgRoleDirectory {
    pool: PgPool,
}

impl PgRoleDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleDirectory for PgRoleDirectory {
    async fn role_count(&self) -> AuthResult<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await
            .map_err(|err| AuthError::RoleLookupFailed(err.to_string()))?;
        usize::try_from(count)
            .map_err(|_| AuthError::RoleLookupFailed(format!("invalid role count {count}")))
    }
}

#[derive(Clone)]
pub struct PgCredentialVerifier {
    pool: PgPool,
}

impl PgCredentialVerifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialVerifier for PgCredentialVerifier {
    async fn verify(&self, email: &str, password: &str) -> AuthResult<UserClaims> {
        let row = sqlx::query("SELECT id, password, role_id FROM users WHERE email = $1")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                error!(?err, "credential lookup failed");
                AuthError::CredentialLookupFailed(err.to_string())
            })?;

        let Some(row) = row else {
            return Err(AuthError::InvalidCredentials);
        };
        let decode = |err: sqlx::Error| AuthError::CredentialLookupFailed(err.to_string());
        let id: String = row.try_get("id").map_err(decode)?;
        let password_hash: String = row.try_get("password").map_err(decode)?;
        let role_id: i64 = row.try_get("role_id").map_err(decode)?;

        if !password_matches(&password_hash, password) {
            warn!(user_id = %id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(UserClaims::new(id, role_id))
    }
}
