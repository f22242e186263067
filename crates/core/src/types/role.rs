//! User roles and the permissions they grant.

use serde::{Deserialize, Serialize};

/// Account role. Every account has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Everything, including granting `ADMIN`.
    SuperAdmin,
    /// Store management: catalog, orders, content, users below admin.
    Admin,
    /// Blog posts, CMS blocks, catalog copy.
    ContentManager,
    /// Review moderation.
    Moderator,
    /// Support chat and order lookup.
    Support,
    /// External partner account.
    Partner,
    /// Customer.
    #[default]
    User,
}

impl Role {
    pub const ALL: [Self; 7] = [
        Self::SuperAdmin,
        Self::Admin,
        Self::ContentManager,
        Self::Moderator,
        Self::Support,
        Self::Partner,
        Self::User,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Admin => "ADMIN",
            Self::ContentManager => "CONTENT_MANAGER",
            Self::Moderator => "MODERATOR",
            Self::Support => "SUPPORT",
            Self::Partner => "PARTNER",
            Self::User => "USER",
        }
    }

    const fn is_admin(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }

    /// Any back-office role.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::User | Self::Partner)
    }

    #[must_use]
    pub const fn can_manage_users(self) -> bool {
        self.is_admin()
    }

    /// Products, categories, bulk pricing and import.
    #[must_use]
    pub const fn can_manage_catalog(self) -> bool {
        self.is_admin() || matches!(self, Self::ContentManager)
    }

    /// Blog and CMS blocks.
    #[must_use]
    pub const fn can_manage_content(self) -> bool {
        self.is_admin() || matches!(self, Self::ContentManager)
    }

    #[must_use]
    pub const fn can_moderate(self) -> bool {
        self.is_admin() || matches!(self, Self::Moderator)
    }

    #[must_use]
    pub const fn can_handle_support(self) -> bool {
        self.is_admin() || matches!(self, Self::Support)
    }

    /// Changing order status. Support staff can look orders up but not move them.
    #[must_use]
    pub const fn can_manage_orders(self) -> bool {
        self.is_admin()
    }

    #[must_use]
    pub const fn can_view_all_orders(self) -> bool {
        self.is_admin() || matches!(self, Self::Support)
    }

    /// Whether an actor with this role may give `target` to someone.
    ///
    /// Only a super admin hands out `SUPER_ADMIN` or `ADMIN`; admins manage
    /// every other role.
    #[must_use]
    pub const fn can_assign(self, target: Self) -> bool {
        match self {
            Self::SuperAdmin => true,
            Self::Admin => !target.is_admin(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| format!("invalid role: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_is_lenient() {
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("content-manager".parse::<Role>().unwrap(), Role::ContentManager);
        assert_eq!(" USER ".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_staff() {
        assert!(Role::Support.is_staff());
        assert!(Role::Moderator.is_staff());
        assert!(!Role::User.is_staff());
        assert!(!Role::Partner.is_staff());
    }

    #[test]
    fn test_permissions_are_scoped() {
        assert!(Role::ContentManager.can_manage_content());
        assert!(Role::ContentManager.can_manage_catalog());
        assert!(!Role::ContentManager.can_moderate());
        assert!(Role::Moderator.can_moderate());
        assert!(!Role::Moderator.can_manage_catalog());
        assert!(Role::Support.can_handle_support());
        assert!(Role::Support.can_view_all_orders());
        assert!(!Role::Support.can_manage_orders());
        assert!(!Role::User.can_view_all_orders());
    }

    #[test]
    fn test_only_super_admin_grants_admin() {
        assert!(Role::SuperAdmin.can_assign(Role::Admin));
        assert!(Role::SuperAdmin.can_assign(Role::SuperAdmin));
        assert!(!Role::Admin.can_assign(Role::Admin));
        assert!(!Role::Admin.can_assign(Role::SuperAdmin));
        assert!(Role::Admin.can_assign(Role::Moderator));
        assert!(!Role::ContentManager.can_assign(Role::User));
    }

    #[test]
    fn test_serde_uses_screaming_case() {
        assert_eq!(
            serde_json::to_string(&Role::ContentManager).unwrap(),
            "\"CONTENT_MANAGER\""
        );
    }
}
