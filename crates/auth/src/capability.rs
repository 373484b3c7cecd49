use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Capability identifier (what a user may do or which screen they may open).
///
/// The wildcard capability `"*"` grants everything and is what the admin role
/// receives by default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const ALL: Capability = Capability(Cow::Borrowed("*"));
    /// Allocate quantities against receipt, transfer and pick lines.
    pub const WAREHOUSE_OPERATOR: Capability = Capability(Cow::Borrowed("warehouse-operator"));
    pub const DASHBOARD: Capability = Capability(Cow::Borrowed("dashboard"));
    pub const SERIAL_TRANSFER: Capability = Capability(Cow::Borrowed("serial_transfer"));
    pub const QC_DASHBOARD: Capability = Capability(Cow::Borrowed("qc_dashboard"));
    pub const USER_MANAGEMENT: Capability = Capability(Cow::Borrowed("user_management"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities a role grants when the user has no explicit grants for them.
pub fn default_capabilities(role: &Role) -> Vec<Capability> {
    match role.as_str() {
        "admin" => vec![Capability::ALL],
        "manager" => vec![
            Capability::DASHBOARD,
            Capability::SERIAL_TRANSFER,
            Capability::USER_MANAGEMENT,
            Capability::QC_DASHBOARD,
        ],
        "warehouse-operator" => vec![
            Capability::DASHBOARD,
            Capability::SERIAL_TRANSFER,
            Capability::WAREHOUSE_OPERATOR,
        ],
        "user" => vec![Capability::DASHBOARD, Capability::SERIAL_TRANSFER],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_the_wildcard() {
        let caps = default_capabilities(&Role::ADMIN);
        assert_eq!(caps, vec![Capability::ALL]);
        assert!(caps[0].is_wildcard());
    }

    #[test]
    fn plain_users_cannot_manage_users() {
        let caps = default_capabilities(&Role::USER);
        assert!(caps.contains(&Capability::SERIAL_TRANSFER));
        assert!(!caps.contains(&Capability::USER_MANAGEMENT));
        assert!(!caps.contains(&Capability::WAREHOUSE_OPERATOR));
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        assert!(default_capabilities(&Role::new("auditor")).is_empty());
    }
}
