//! Identity provider: turns credentials into a [`UserIdentity`].

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::{Capability, JwtClaims, TokenValidationError, UserIdentity, validate_claims};

/// Credentials presented by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("account is inactive")]
    Inactive,
}

/// Identity collaborator consumed by the services and the API.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<UserIdentity, AuthError>;

    fn authorize(&self, user: &UserIdentity, capability: &Capability) -> bool {
        crate::authorize(user, capability)
    }
}

/// HS256-signed JWT identity provider.
#[derive(Clone)]
pub struct Hs256IdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl core::fmt::Debug for Hs256IdentityProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256IdentityProvider").finish_non_exhaustive()
    }
}

impl Hs256IdentityProvider {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Mint a token for `identity`, valid for `ttl` from `now`.
    pub fn issue(&self, identity: &UserIdentity, now: DateTime<Utc>, ttl: Duration) -> Result<String, AuthError> {
        let claims = JwtClaims::for_identity(identity, now, now + ttl);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserIdentity, AuthError> {
        // Time-window checks are done on our own claim fields, not `exp`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        validate_claims(&data.claims, now)?;

        if !data.claims.active {
            return Err(AuthError::Inactive);
        }
        Ok(data.claims.into_identity())
    }
}

impl IdentityProvider for Hs256IdentityProvider {
    fn authenticate(&self, credentials: &Credentials) -> Result<UserIdentity, AuthError> {
        match credentials {
            Credentials::Bearer(token) => {
                let result = self.decode_at(token.trim(), Utc::now());
                if let Err(err) = &result {
                    tracing::debug!(error = %err, "authentication failed");
                }
                result
            }
        }
    }
}
