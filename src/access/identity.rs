//! Authenticated principals and their roles.

use serde::{Deserialize, Serialize};

/// Account role. Fixed at account creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to every employee and task
    Admin,
    /// Directory browsing, own profile, own and assigned tasks
    #[default]
    User,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check if the role can create employee profiles for other accounts
    pub fn can_manage_employees(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check if the role can delete employee profiles
    pub fn can_delete_employees(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check if the role can edit or delete any task regardless of ownership
    pub fn can_manage_all_tasks(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check if the role may set a task status without following the
    /// todo -> in-progress -> done sequence
    pub fn can_override_status(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Check if the role can read the audit log
    pub fn can_view_audit_log(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::User)
    }
}

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Linked employee profile, if the account has one
    pub employee_id: Option<String>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("USER".parse::<Role>(), Ok(Role::User));
        assert!("owner".parse::<Role>().is_err());
        // Unknown stored roles degrade to the least privileged role.
        assert_eq!(Role::from("superuser".to_string()), Role::User);
    }

    #[test]
    fn test_only_admin_has_management_rights() {
        assert!(Role::Admin.can_manage_employees());
        assert!(Role::Admin.can_override_status());
        assert!(!Role::User.can_manage_employees());
        assert!(!Role::User.can_delete_employees());
        assert!(!Role::User.can_manage_all_tasks());
        assert!(!Role::User.can_view_audit_log());
    }
}
