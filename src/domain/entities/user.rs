//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::pagination::PageParams;

/// Account role matching the database VARCHAR constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
}

impl UserRole {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            other => Err(format!("Unknown user role '{}'", other)),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer or back-office account.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - email: VARCHAR(255) NOT NULL UNIQUE (stored lowercase)
/// - password_hash: VARCHAR(255) NOT NULL (argon2id PHC string)
/// - full_name: VARCHAR(100) NOT NULL
/// - phone: VARCHAR(32) NULL
/// - role: VARCHAR(20) NOT NULL DEFAULT 'customer'
/// - is_active: BOOLEAN NOT NULL DEFAULT TRUE
/// - created_at / updated_at: TIMESTAMPTZ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    pub email: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub full_name: String,

    pub phone: Option<String>,

    pub role: UserRole,

    /// Inactive accounts cannot log in or refresh tokens
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email: String::new(),
            password_hash: String::new(),
            full_name: String::new(),
            phone: None,
            role: UserRole::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Admin user listing filter.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive match on email or full name
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

/// Repository trait for User data access operations.
///
/// The trait is defined in the domain layer to maintain dependency inversion.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by their Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Find a user by their (normalized) email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Insert a new user. A duplicate email yields `AppError::Conflict`.
    async fn create(&self, user: &User) -> Result<User, AppError>;

    /// Persist profile, role and active flag.
    async fn update(&self, user: &User) -> Result<User, AppError>;

    /// Replace the stored password hash.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AppError>;

    /// Page through users, returning the page and the total match count.
    async fn list(&self, filter: &UserFilter, page: PageParams)
        -> Result<(Vec<User>, i64), AppError>;

    /// Whether any booking references this user.
    async fn has_bookings(&self, id: i64) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_roundtrip() {
        for role in [UserRole::Customer, UserRole::Admin] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_user_default_is_active_customer() {
        let user = User::default();
        assert_eq!(user.role, UserRole::Customer);
        assert!(user.is_active);
        assert!(!user.is_admin());
    }

    #[test]
    fn test_user_password_hash_not_serialized() {
        let user = User {
            id: 42,
            email: "jane@example.com".into(),
            password_hash: "hashed_password".into(),
            full_name: "Jane Doe".into(),
            ..User::default()
        };

        let serialized = serde_json::to_string(&user).expect("Failed to serialize user");

        assert!(!serialized.contains("password_hash"));
        assert!(!serialized.contains("hashed_password"));
        assert!(serialized.contains("\"role\":\"customer\""));
    }
}
