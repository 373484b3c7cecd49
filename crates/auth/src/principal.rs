use serde::{Deserialize, Serialize};

use forgewms_core::{TenantId, UserId};

use crate::{Capability, Role};

/// An authenticated user acting within one tenant.
///
/// `grants` are explicit per-user capabilities on top of the role defaults
/// (the per-screen permission overrides an administrator can set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub username: String,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub grants: Vec<Capability>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl UserIdentity {
    pub fn new(tenant_id: TenantId, username: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            user_id: UserId::new(),
            tenant_id,
            username: username.into(),
            roles,
            grants: Vec::new(),
            active: true,
        }
    }

    pub fn with_grants(mut self, grants: Vec<Capability>) -> Self {
        self.grants = grants;
        self
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Admins and managers may act on other users' documents.
    pub fn is_supervisor(&self) -> bool {
        self.has_role(&Role::ADMIN) || self.has_role(&Role::MANAGER)
    }
}
