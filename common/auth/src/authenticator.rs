use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::claims::{TokenClaims, UserClaims};
use crate::error::{AuthError, AuthResult};
use crate::kind::TokenKind;
use crate::registry::AccessTokenRegistry;
use crate::roles::RoleAuthorizer;
use crate::verifier::JwtVerifier;

pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(2);

/// Request-path entry point: verifies a presented token and, for access
/// tokens, confirms it is still registered as live.
///
/// Registry answers are never cached; every call asks the registry.
#[derive(Clone)]
pub struct Authenticator {
    verifier: JwtVerifier,
    registry: Arc<dyn AccessTokenRegistry>,
    authorizer: RoleAuthorizer,
    registry_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        verifier: JwtVerifier,
        registry: Arc<dyn AccessTokenRegistry>,
        authorizer: RoleAuthorizer,
    ) -> Self {
        Self {
            verifier,
            registry,
            authorizer,
            registry_timeout: DEFAULT_REGISTRY_TIMEOUT,
        }
    }

    pub fn with_registry_timeout(mut self, registry_timeout: Duration) -> Self {
        self.registry_timeout = registry_timeout;
        self
    }

    pub fn verifier(&self) -> &JwtVerifier {
        &self.verifier
    }

    pub fn authorizer(&self) -> &RoleAuthorizer {
        &self.authorizer
    }

    pub fn registry(&self) -> &Arc<dyn AccessTokenRegistry> {
        &self.registry
    }

    /// Verifies an access token and checks it against the registry.
    pub async fn authenticate_access(&self, token: &str) -> AuthResult<UserClaims> {
        let claims = self
            .verifier
            .parse_user(TokenKind::Access, token)
            .inspect_err(|err| warn!(kind = "access", error = %err, "token rejected"))?;

        if !self.is_live(&claims.id, token).await? {
            warn!(user_id = %claims.id, "access token not registered");
            return Err(AuthError::RevokedToken);
        }

        debug!(user_id = %claims.id, role_id = claims.role_id, "access token accepted");
        Ok(claims)
    }

    pub async fn authenticate_admin(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verifier
            .parse(TokenKind::Admin, token)
            .inspect_err(|err| warn!(kind = "admin", error = %err, "token rejected"))
    }

    pub async fn authenticate_api_key(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verifier
            .parse(TokenKind::ApiKey, token)
            .inspect_err(|err| warn!(kind = "apikey", error = %err, "token rejected"))
    }

    /// Asks the registry whether `(user_id, token)` is live. A registry
    /// error or a lookup exceeding the configured timeout is a denial.
    pub async fn is_live(&self, user_id: &str, token: &str) -> AuthResult<bool> {
        match timeout(self.registry_timeout, self.registry.exists(user_id, token)).await {
            Ok(Ok(live)) => Ok(live),
            Ok(Err(err)) => {
                warn!(user_id, error = %err, "token registry lookup failed");
                Err(match err {
                    AuthError::RegistryUnavailable(_) => err,
                    other => AuthError::RegistryUnavailable(other.to_string()),
                })
            }
            Err(_) => {
                warn!(
                    user_id,
                    timeout_ms = self.registry_timeout.as_millis() as u64,
                    "token registry lookup timed out"
                );
                Err(AuthError::RegistryUnavailable("lookup timed out".into()))
            }
        }
    }
}
