//! Account type and the well-known role/permission names
//!
//! Roles and permissions are plain names here; the credential store owns
//! the role-to-permission mapping and resolves it at token-issue time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known role names
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const MODERATOR: &str = "moderator";
    pub const USER: &str = "user";
}

/// Well-known permission names (`resource.action`)
pub mod permissions {
    pub const USERS_READ: &str = "users.read";
    pub const USERS_WRITE: &str = "users.write";
    pub const USERS_DELETE: &str = "users.delete";
    pub const ADMIN_ACCESS: &str = "admin.access";
    pub const CONTENT_MODERATE: &str = "content.moderate";
}

/// An identity record. Owned by the credential store; mutated only through
/// the engine and the lockout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Unique, stored lowercase
    pub email: String,
    /// Never serialized into responses
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    /// Role names assigned to this account
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: String, password_hash: String, roles: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            email_verified: false,
            failed_attempts: 0,
            locked_until: None,
            roles,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_not_serialized() {
        let account = Account::new(
            "a@x.com".to_string(),
            "$argon2id$fake".to_string(),
            vec![roles::USER.to_string()],
        );
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("a@x.com"));
    }

}
