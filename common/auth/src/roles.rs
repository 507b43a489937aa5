//! Bitmask role model.
//!
//! Role ids are small non-negative integers (`1` customer, `2` admin in the
//! default catalogue). The number of roles `N` is supplied once when the
//! [`RoleAuthorizer`] is built and fixes the width of the bit vectors used
//! for every decision.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

pub const ROLE_CUSTOMER: i64 = 1;
pub const ROLE_ADMIN: i64 = 2;

/// Widest supported role vector; keeps every mask inside a `u64`.
pub const MAX_ROLE_COUNT: usize = 63;

/// How an acceptable-role list is compared with the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleMatch {
    /// Sum the acceptable ids, render sum and caller id as `N`-digit binary
    /// and grant when any digit is set in both. Matches set membership only
    /// while role ids are distinct powers of two. Fail-closed on overflow: a
    /// sum or caller id wider than `N` bits denies instead of keeping the low
    /// `N` bits.
    #[default]
    Summation,
    /// Role `r` occupies bit `r`; grant iff the caller's bit is in the OR of
    /// the acceptable bits, i.e. the caller's role is in the list.
    Membership,
}

impl fmt::Display for RoleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleMatch::Summation => f.write_str("summation"),
            RoleMatch::Membership => f.write_str("membership"),
        }
    }
}

impl FromStr for RoleMatch {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "summation" | "sum" => Ok(RoleMatch::Summation),
            "membership" | "set" => Ok(RoleMatch::Membership),
            other => Err(AuthError::RoleLookupFailed(format!(
                "unsupported role match mode '{other}'"
            ))),
        }
    }
}

/// Source of the total number of roles, consulted once at construction.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role_count(&self) -> AuthResult<usize>;
}

#[derive(Debug, Clone)]
pub struct RoleAuthorizer {
    role_count: usize,
    mode: RoleMatch,
}

impl RoleAuthorizer {
    pub fn new(role_count: usize) -> AuthResult<Self> {
        if role_count == 0 || role_count > MAX_ROLE_COUNT {
            return Err(AuthError::RoleLookupFailed(format!(
                "role count {role_count} outside 1..={MAX_ROLE_COUNT}"
            )));
        }
        Ok(Self {
            role_count,
            mode: RoleMatch::default(),
        })
    }

    pub fn with_mode(mut self, mode: RoleMatch) -> Self {
        self.mode = mode;
        self
    }

    /// Builds an authorizer from a directory lookup; any failure is reported
    /// as [`AuthError::RoleLookupFailed`].
    pub async fn load(directory: &dyn RoleDirectory, mode: RoleMatch) -> AuthResult<Self> {
        let count = directory.role_count().await.map_err(|err| match err {
            AuthError::RoleLookupFailed(_) => err,
            other => AuthError::RoleLookupFailed(other.to_string()),
        })?;
        Ok(Self::new(count)?.with_mode(mode))
    }

    pub fn role_count(&self) -> usize {
        self.role_count
    }

    pub fn mode(&self) -> RoleMatch {
        self.mode
    }

    /// Decides whether `caller_role_id` satisfies any of `acceptable`.
    ///
    /// An empty list denies. Values that do not fit the configured width deny.
    pub fn authorize(&self, caller_role_id: i64, acceptable: &[i64]) -> AuthResult<bool> {
        let caller = role_value(caller_role_id)?;
        let acceptable = acceptable
            .iter()
            .map(|role| role_value(*role))
            .collect::<AuthResult<Vec<u64>>>()?;
        if acceptable.is_empty() {
            return Ok(false);
        }

        let granted = match self.mode {
            RoleMatch::Summation => self.summation(caller, &acceptable),
            RoleMatch::Membership => self.membership(caller, &acceptable),
        };
        debug!(
            caller_role_id,
            ?acceptable,
            mode = %self.mode,
            granted,
            "role decision"
        );
        Ok(granted)
    }

    fn summation(&self, caller: u64, acceptable: &[u64]) -> bool {
        let Some(expect) = acceptable
            .iter()
            .try_fold(0u64, |sum, role| sum.checked_add(*role))
        else {
            return false;
        };

        let (Some(user_bits), Some(expect_bits)) = (
            binary_digits(caller, self.role_count),
            binary_digits(expect, self.role_count),
        ) else {
            return false;
        };

        user_bits
            .iter()
            .zip(expect_bits.iter())
            .any(|(user, expect)| user & expect == 1)
    }

    fn membership(&self, caller: u64, acceptable: &[u64]) -> bool {
        let Some(caller_mask) = self.role_bit(caller) else {
            return false;
        };
        let expect_mask = acceptable
            .iter()
            .filter_map(|role| self.role_bit(*role))
            .fold(0u64, |mask, bit| mask | bit);
        caller_mask & expect_mask != 0
    }

    fn role_bit(&self, role: u64) -> Option<u64> {
        if role > self.role_count as u64 {
            return None;
        }
        1u64.checked_shl(role as u32)
    }
}

fn role_value(role_id: i64) -> AuthResult<u64> {
    u64::try_from(role_id).map_err(|_| AuthError::InvalidRoleType(role_id.to_string()))
}

/// Renders `value` as `width` binary digits, most significant first and
/// zero-padded. Returns `None` when `value` needs more than `width` digits.
pub fn binary_digits(value: u64, width: usize) -> Option<Vec<u8>> {
    if width < 64 && value >> width != 0 {
        return None;
    }
    Some(
        (0..width)
            .rev()
            .map(|bit| ((value >> bit) & 1) as u8)
            .collect(),
    )
}
