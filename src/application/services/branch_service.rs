//! Branch Service

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::request::{BranchListQuery, CreateBranchRequest, UpdateBranchRequest};
use crate::application::dto::response::{BranchResponse, HallResponse};
use crate::domain::{Branch, BranchRepository, HallRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::validate;

#[async_trait]
pub trait BranchService: Send + Sync {
    /// Active branches, optionally in one city
    async fn list(&self, query: BranchListQuery) -> Result<Vec<BranchResponse>, BranchError>;

    async fn get(&self, id: i64) -> Result<BranchResponse, BranchError>;

    /// Active halls of an active branch
    async fn list_halls(&self, branch_id: i64) -> Result<Vec<HallResponse>, BranchError>;

    async fn create(&self, request: CreateBranchRequest) -> Result<BranchResponse, BranchError>;

    async fn update(&self, id: i64, request: UpdateBranchRequest) -> Result<BranchResponse, BranchError>;

    async fn delete(&self, id: i64) -> Result<(), BranchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BranchError {
    #[error("Branch not found")]
    NotFound,

    #[error("Branch still has halls")]
    HasHalls,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<BranchError> for AppError {
    fn from(err: BranchError) -> Self {
        match err {
            BranchError::NotFound => AppError::NotFound(err.to_string()),
            BranchError::HasHalls => AppError::Conflict(err.to_string()),
            BranchError::Repository(e) => e,
        }
    }
}

pub struct BranchServiceImpl<B, H>
where
    B: BranchRepository,
    H: HallRepository,
{
    branch_repo: Arc<B>,
    hall_repo: Arc<H>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<B, H> BranchServiceImpl<B, H>
where
    B: BranchRepository,
    H: HallRepository,
{
    pub fn new(branch_repo: Arc<B>, hall_repo: Arc<H>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            branch_repo,
            hall_repo,
            id_generator,
        }
    }

    async fn load(&self, id: i64) -> Result<Branch, BranchError> {
        self.branch_repo.find_by_id(id).await?.ok_or(BranchError::NotFound)
    }
}

#[async_trait]
impl<B, H> BranchService for BranchServiceImpl<B, H>
where
    B: BranchRepository + 'static,
    H: HallRepository + 'static,
{
    async fn list(&self, query: BranchListQuery) -> Result<Vec<BranchResponse>, BranchError> {
        let city = query.city.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let branches = self.branch_repo.list(true, city).await?;
        Ok(branches.into_iter().map(BranchResponse::from).collect())
    }

    async fn get(&self, id: i64) -> Result<BranchResponse, BranchError> {
        let branch = self.load(id).await?;
        if !branch.is_active {
            return Err(BranchError::NotFound);
        }
        Ok(branch.into())
    }

    async fn list_halls(&self, branch_id: i64) -> Result<Vec<HallResponse>, BranchError> {
        self.get(branch_id).await?;
        let halls = self.hall_repo.list_by_branch(branch_id, true).await?;
        Ok(halls.into_iter().map(HallResponse::from).collect())
    }

    async fn create(&self, request: CreateBranchRequest) -> Result<BranchResponse, BranchError> {
        validate(&request)?;
        let now = Utc::now();
        let branch = Branch {
            id: self.id_generator.generate(),
            name: request.name.trim().to_string(),
            address: request.address.trim().to_string(),
            city: request.city.trim().to_string(),
            phone: request.phone.filter(|p| !p.trim().is_empty()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        Ok(self.branch_repo.create(&branch).await?.into())
    }

    async fn update(&self, id: i64, request: UpdateBranchRequest) -> Result<BranchResponse, BranchError> {
        validate(&request)?;
        let mut branch = self.load(id).await?;

        if let Some(name) = request.name {
            branch.name = name.trim().to_string();
        }
        if let Some(address) = request.address {
            branch.address = address.trim().to_string();
        }
        if let Some(city) = request.city {
            branch.city = city.trim().to_string();
        }
        if let Some(phone) = request.phone {
            branch.phone = Some(phone.trim().to_string()).filter(|p| !p.is_empty());
        }
        if let Some(is_active) = request.is_active {
            branch.is_active = is_active;
        }
        branch.updated_at = Utc::now();

        Ok(self.branch_repo.update(&branch).await?.into())
    }

    async fn delete(&self, id: i64) -> Result<(), BranchError> {
        self.load(id).await?;
        if self.branch_repo.has_halls(id).await? {
            return Err(BranchError::HasHalls);
        }
        self.branch_repo.delete(id).await?;
        Ok(())
    }
}
