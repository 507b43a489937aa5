use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{AuthError, AuthResult};

/// Store of live sessions. Each sign-in opens one record holding the
/// session's current access token and refresh token.
///
/// An access token absent from the registry is revoked even while its
/// signature and expiry are still valid, and a refresh token absent from
/// the registry can no longer renew its session. Implementations must make
/// a `delete` or `rotate` visible to the next `exists` for the same user.
#[async_trait]
pub trait AccessTokenRegistry: Send + Sync {
    /// Whether `access_token` is the current access token of one of the
    /// user's sessions.
    async fn exists(&self, user_id: &str, access_token: &str) -> AuthResult<bool>;

    /// Opens a session.
    async fn insert(&self, user_id: &str, access_token: &str, refresh_token: &str)
        -> AuthResult<()>;

    /// Replaces both tokens of the session whose current refresh token is
    /// `refresh_token`. Returns `false` when no such session exists, which
    /// includes a refresh token that was already rotated away.
    async fn rotate(
        &self,
        user_id: &str,
        refresh_token: &str,
        next_access_token: &str,
        next_refresh_token: &str,
    ) -> AuthResult<bool>;

    /// Removes the whole session holding `access_token`, returning whether
    /// one existed.
    async fn delete(&self, user_id: &str, access_token: &str) -> AuthResult<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionTokens {
    access_token: String,
    refresh_token: String,
}

#[derive(Clone, Default)]
pub struct InMemoryAccessTokenRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<SessionTokens>>>>,
}

impl InMemoryAccessTokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open sessions for `user_id`.
    pub fn live_count(&self, user_id: &str) -> usize {
        self.inner
            .read()
            .map(|guard| guard.get(user_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::RegistryUnavailable("registry lock poisoned".into())
}

#[async_trait]
impl AccessTokenRegistry for InMemoryAccessTokenRegistry {
    async fn exists(&self, user_id: &str, access_token: &str) -> AuthResult<bool> {
        let guard = self.inner.read().map_err(poisoned)?;
        Ok(guard.get(user_id).is_some_and(|sessions| {
            sessions
                .iter()
                .any(|session| session.access_token == access_token)
        }))
    }

    async fn insert(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> AuthResult<()> {
        let mut guard = self.inner.write().map_err(poisoned)?;
        guard
            .entry(user_id.to_string())
            .or_default()
            .push(SessionTokens {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
            });
        Ok(())
    }

    async fn rotate(
        &self,
        user_id: &str,
        refresh_token: &str,
        next_access_token: &str,
        next_refresh_token: &str,
    ) -> AuthResult<bool> {
        let mut guard = self.inner.write().map_err(poisoned)?;
        let Some(session) = guard.get_mut(user_id).and_then(|sessions| {
            sessions
                .iter_mut()
                .find(|session| session.refresh_token == refresh_token)
        }) else {
            return Ok(false);
        };
        session.access_token = next_access_token.to_string();
        session.refresh_token = next_refresh_token.to_string();
        Ok(true)
    }

    async fn delete(&self, user_id: &str, access_token: &str) -> AuthResult<bool> {
        let mut guard = self.inner.write().map_err(poisoned)?;
        let Some(sessions) = guard.get_mut(user_id) else {
            return Ok(false);
        };
        let before = sessions.len();
        sessions.retain(|session| session.access_token != access_token);
        let removed = sessions.len() < before;
        if sessions.is_empty() {
            guard.remove(user_id);
        }
        Ok(removed)
    }
}
