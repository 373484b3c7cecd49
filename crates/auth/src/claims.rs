use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forgewms_core::{TenantId, UserId};

use crate::{Capability, Role, UserIdentity};

/// JWT claims model (transport-agnostic).
///
/// The minimal set of claims forgewms expects once a token has been decoded
/// and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Tenant (company database) context for the token.
    pub tenant_id: TenantId,

    pub username: String,

    /// RBAC roles granted within the tenant context.
    pub roles: Vec<Role>,

    /// Explicit capability grants on top of the role defaults.
    #[serde(default)]
    pub grants: Vec<Capability>,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl JwtClaims {
    pub fn for_identity(identity: &UserIdentity, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: identity.user_id,
            tenant_id: identity.tenant_id,
            username: identity.username.clone(),
            roles: identity.roles.clone(),
            grants: identity.grants.clone(),
            active: identity.active,
            issued_at,
            expires_at,
        }
    }

    pub fn into_identity(self) -> UserIdentity {
        UserIdentity {
            user_id: self.sub,
            tenant_id: self.tenant_id,
            username: self.username,
            roles: self.roles,
            grants: self.grants,
            active: self.active,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// [`crate::Hs256IdentityProvider`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> JwtClaims {
        let identity = UserIdentity::new(TenantId::new(), "jdoe", vec![Role::USER]);
        JwtClaims::for_identity(&identity, issued_at, expires_at)
    }

    #[test]
    fn window_checks() {
        let now = Utc::now();
        assert!(validate_claims(&claims(now - Duration::minutes(1), now + Duration::minutes(1)), now).is_ok());
        assert_eq!(
            validate_claims(&claims(now - Duration::minutes(2), now - Duration::minutes(1)), now),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(now + Duration::minutes(1), now + Duration::minutes(2)), now),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims(now, now), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn identity_survives_claims() {
        let identity = UserIdentity::new(TenantId::new(), "ops", vec![Role::WAREHOUSE_OPERATOR])
            .with_grants(vec![Capability::QC_DASHBOARD]);
        let now = Utc::now();
        let back = JwtClaims::for_identity(&identity, now, now + Duration::hours(1)).into_identity();
        assert_eq!(back, identity);
    }
}
