//! `forgewms-auth`: authentication and authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod capability;
pub mod claims;
pub mod identity;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, require};
pub use capability::{Capability, default_capabilities};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use identity::{AuthError, Credentials, Hs256IdentityProvider, IdentityProvider};
pub use principal::UserIdentity;
pub use roles::Role;
