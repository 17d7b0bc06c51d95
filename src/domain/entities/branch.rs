//! Branch entity and repository trait.
//!
//! A branch is one physical cinema location holding a set of halls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maps to the `branches` table. `name` is unique across the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub city: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Branch>, AppError>;

    /// List branches ordered by name, optionally only active ones in a city.
    async fn list(&self, active_only: bool, city: Option<&str>) -> Result<Vec<Branch>, AppError>;

    /// Insert a branch. A duplicate name yields `AppError::Conflict`.
    async fn create(&self, branch: &Branch) -> Result<Branch, AppError>;

    async fn update(&self, branch: &Branch) -> Result<Branch, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    async fn has_halls(&self, id: i64) -> Result<bool, AppError>;
}
