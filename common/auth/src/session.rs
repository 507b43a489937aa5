use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::claims::UserClaims;
use crate::error::{AuthError, AuthResult};
use crate::kind::TokenKind;
use crate::registry::AccessTokenRegistry;
use crate::signer::{SignedToken, TokenSigner};
use crate::verifier::JwtVerifier;

/// Token pair handed to a client after sign-in or refresh.
#[derive(Debug, Clone)]
pub struct Passport {
    pub user: UserClaims,
    pub access_token: SignedToken,
    pub refresh_token: SignedToken,
}

#[derive(Debug, Serialize)]
pub struct PassportBody {
    pub user_id: String,
    pub role_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: String,
    pub refresh_expires_at: String,
    pub token_type: &'static str,
}

impl From<&Passport> for PassportBody {
    fn from(value: &Passport) -> Self {
        Self {
            user_id: value.user.id.clone(),
            role_id: value.user.role_id,
            access_token: value.access_token.token.clone(),
            refresh_token: value.refresh_token.token.clone(),
            access_expires_at: value.access_token.expires_at.to_rfc3339(),
            refresh_expires_at: value.refresh_token.expires_at.to_rfc3339(),
            token_type: "Bearer",
        }
    }
}

/// Session lifecycle on top of the signer and the registry: the only code
/// that creates or removes registry records.
#[derive(Clone)]
pub struct SessionManager {
    signer: Arc<TokenSigner>,
    verifier: JwtVerifier,
    registry: Arc<dyn AccessTokenRegistry>,
}

impl SessionManager {
    pub fn new(
        signer: Arc<TokenSigner>,
        verifier: JwtVerifier,
        registry: Arc<dyn AccessTokenRegistry>,
    ) -> Self {
        Self {
            signer,
            verifier,
            registry,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Issues a passport for an identity the caller has already proven and
    /// opens a session holding both tokens.
    pub async fn sign_in(&self, user: UserClaims) -> AuthResult<Passport> {
        let access_token = self.signer.issue(TokenKind::Access, Some(&user))?;
        let refresh_token = self.signer.issue(TokenKind::Refresh, Some(&user))?;
        self.registry
            .insert(&user.id, access_token.as_str(), refresh_token.as_str())
            .await?;

        info!(user_id = %user.id, role_id = user.role_id, "session opened");
        Ok(Passport {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Trades a refresh token for a new passport. The new refresh token
    /// keeps the presented one's expiry, so refreshing never lengthens the
    /// session. Both tokens of the session are replaced: the previous
    /// access token is revoked and the presented refresh token cannot be
    /// used again. A refresh token whose session was signed out yields
    /// [`AuthError::RevokedToken`].
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<Passport> {
        let presented = self
            .verifier
            .parse(TokenKind::Refresh, refresh_token)
            .inspect_err(|err| warn!(error = %err, "refresh token rejected"))?;
        let exp = presented.exp;
        let user = presented.into_user()?;

        let access_token = self.signer.issue(TokenKind::Access, Some(&user))?;
        let next_refresh_token = self.signer.reissue(TokenKind::Refresh, &user, exp)?;
        let rotated = self
            .registry
            .rotate(
                &user.id,
                refresh_token,
                access_token.as_str(),
                next_refresh_token.as_str(),
            )
            .await?;
        if !rotated {
            warn!(user_id = %user.id, "refresh token has no live session");
            return Err(AuthError::RevokedToken);
        }

        info!(user_id = %user.id, exp, "session refreshed");
        Ok(Passport {
            user,
            access_token,
            refresh_token: next_refresh_token,
        })
    }

    /// Ends the session holding `access_token`, revoking its refresh token
    /// too. Returns whether a live session was removed.
    pub async fn sign_out(&self, user_id: &str, access_token: &str) -> AuthResult<bool> {
        let removed = self.registry.delete(user_id, access_token).await?;
        info!(user_id, removed, "session closed");
        Ok(removed)
    }

    pub fn admin_token(&self) -> AuthResult<SignedToken> {
        self.signer.issue(TokenKind::Admin, None)
    }

    pub fn api_key(&self) -> AuthResult<SignedToken> {
        self.signer.issue(TokenKind::ApiKey, None)
    }
}
