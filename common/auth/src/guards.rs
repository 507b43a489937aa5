use tracing::warn;

use crate::error::{AuthError, AuthResult};
use crate::extractors::AuthContext;
use crate::roles::{RoleAuthorizer, ROLE_ADMIN};

/// Gates a route on the caller's role. An empty `allowed` list means the
/// route carries no role requirement.
pub fn ensure_role(
    authorizer: &RoleAuthorizer,
    auth: &AuthContext,
    allowed: &[i64],
) -> AuthResult<()> {
    if allowed.is_empty() {
        return Ok(());
    }

    if authorizer.authorize(auth.claims.role_id, allowed)? {
        Ok(())
    } else {
        warn!(
            user_id = %auth.claims.id,
            role_id = auth.claims.role_id,
            ?allowed,
            "role_check_failed"
        );
        Err(AuthError::Forbidden)
    }
}

/// Lets a caller act on `path_user_id` only when it is their own id or they
/// hold the admin role.
pub fn ensure_self_or_admin(
    authorizer: &RoleAuthorizer,
    auth: &AuthContext,
    path_user_id: &str,
) -> AuthResult<()> {
    if auth.claims.id == path_user_id {
        return Ok(());
    }
    if authorizer.authorize(auth.claims.role_id, &[ROLE_ADMIN])? {
        return Ok(());
    }

    warn!(
        user_id = %auth.claims.id,
        path_user_id,
        "owner_check_failed"
    );
    Err(AuthError::Forbidden)
}
