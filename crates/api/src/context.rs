use forgewms_auth::UserIdentity;
use forgewms_core::{TenantId, UserId};

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware; every tenant-scoped handler reads the
/// tenant from here, never from the request body or path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(UserIdentity);

impl CurrentUser {
    pub fn new(identity: UserIdentity) -> Self {
        Self(identity)
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.0
    }

    pub fn tenant_id(&self) -> TenantId {
        self.0.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.0.user_id
    }
}
