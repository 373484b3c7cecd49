use std::collections::HashSet;

use thiserror::Error;

use crate::{Capability, UserIdentity, default_capabilities};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("account is inactive")]
    Inactive,

    #[error("forbidden: missing capability '{0}'")]
    Forbidden(String),
}

/// Effective capabilities: role defaults plus explicit grants.
fn effective_capabilities(user: &UserIdentity) -> HashSet<Capability> {
    user.roles
        .iter()
        .flat_map(default_capabilities)
        .chain(user.grants.iter().cloned())
        .collect()
}

/// Single capability check used by every gate in the system.
///
/// - No IO
/// - No panics
/// - Inactive users hold no capabilities
pub fn authorize(user: &UserIdentity, capability: &Capability) -> bool {
    if !user.active {
        return false;
    }
    let caps = effective_capabilities(user);
    caps.contains(&Capability::ALL) || caps.contains(capability)
}

/// Like [`authorize`], but with an error that says what was missing.
pub fn require(user: &UserIdentity, capability: &Capability) -> Result<(), AuthzError> {
    if !user.active {
        return Err(AuthzError::Inactive);
    }
    if authorize(user, capability) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(capability.as_str().to_string()))
    }
}
