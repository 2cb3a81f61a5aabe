use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    ClinicAdmin,
    Staff,
}

impl UserRole {
    /// Roles allowed to mutate structures, templates and assignments.
    pub fn can_manage_forms(self) -> bool {
        matches!(self, UserRole::SuperAdmin | UserRole::ClinicAdmin)
    }
}

/// Claims embedded in the JWT access token. Tokens are issued by the
/// platform's auth service; this API only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // user UUID
    pub tenant: String, // clinic slug
    pub role: UserRole,
    pub exp: usize,
    pub iat: usize,
}

/// Extracted from the validated JWT — available via Axum extractors
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub tenant: String,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_roles_manage_forms() {
        assert!(UserRole::SuperAdmin.can_manage_forms());
        assert!(UserRole::ClinicAdmin.can_manage_forms());
        assert!(!UserRole::Staff.can_manage_forms());
    }
}
