//! User Service
//!
//! Handles profile management for customers and account administration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use super::auth_service::{hash_password, verify_password};
use super::Actor;
use crate::application::dto::request::{
    AdminUpdateUserRequest, ChangePasswordRequest, Paged, UpdateProfileRequest, UserListQuery,
};
use crate::application::dto::response::UserResponse;
use crate::domain::{SessionRepository, User, UserFilter, UserRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::validation::validate;

/// User service trait
#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_profile(&self, user_id: i64) -> Result<UserResponse, UserError>;

    async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, UserError>;

    /// Change own password and sign out every session
    async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
    ) -> Result<(), UserError>;

    async fn list_users(&self, query: UserListQuery) -> Result<Page<UserResponse>, UserError>;

    async fn get_user(&self, id: i64) -> Result<UserResponse, UserError>;

    /// Change another account's role or active flag
    async fn update_user(
        &self,
        actor: Actor,
        id: i64,
        request: AdminUpdateUserRequest,
    ) -> Result<UserResponse, UserError>;

    async fn delete_user(&self, actor: Actor, id: i64) -> Result<(), UserError>;
}

/// User service errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("Admins cannot change or delete their own account here")]
    SelfModification,

    #[error("User has bookings and cannot be deleted")]
    HasBookings,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound(err.to_string()),
            UserError::WrongPassword => AppError::BadRequest(err.to_string()),
            UserError::SelfModification => AppError::Forbidden(err.to_string()),
            UserError::HasBookings => AppError::Conflict(err.to_string()),
            UserError::Repository(e) => e,
        }
    }
}

/// UserService implementation
pub struct UserServiceImpl<U, S>
where
    U: UserRepository,
    S: SessionRepository,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
}

impl<U, S> UserServiceImpl<U, S>
where
    U: UserRepository,
    S: SessionRepository,
{
    pub fn new(user_repo: Arc<U>, session_repo: Arc<S>) -> Self {
        Self {
            user_repo,
            session_repo,
        }
    }

    async fn load(&self, id: i64) -> Result<User, UserError> {
        self.user_repo.find_by_id(id).await?.ok_or(UserError::NotFound)
    }
}

#[async_trait]
impl<U, S> UserService for UserServiceImpl<U, S>
where
    U: UserRepository + 'static,
    S: SessionRepository + 'static,
{
    async fn get_profile(&self, user_id: i64) -> Result<UserResponse, UserError> {
        Ok(self.load(user_id).await?.into())
    }

    async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, UserError> {
        validate(&request)?;
        let mut user = self.load(user_id).await?;

        if let Some(full_name) = request.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(phone) = request.phone {
            // An empty string clears the phone number
            user.phone = Some(phone.trim().to_string()).filter(|p| !p.is_empty());
        }
        user.updated_at = Utc::now();

        Ok(self.user_repo.update(&user).await?.into())
    }

    async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
    ) -> Result<(), UserError> {
        validate(&request)?;
        let user = self.load(user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(UserError::WrongPassword);
        }

        let hash = hash_password(&request.new_password)?;
        self.user_repo.update_password(user_id, &hash).await?;
        let revoked = self.session_repo.revoke_all_for_user(user_id).await?;
        info!(user_id, revoked, "Password changed, sessions revoked");
        Ok(())
    }

    async fn list_users(&self, query: UserListQuery) -> Result<Page<UserResponse>, UserError> {
        let page = query.page_params();
        let filter = UserFilter {
            search: query.search.filter(|s| !s.trim().is_empty()),
            role: query.role,
        };
        let (users, total) = self.user_repo.list(&filter, page).await?;
        Ok(Page::new(users, page, total).map(UserResponse::from))
    }

    async fn get_user(&self, id: i64) -> Result<UserResponse, UserError> {
        Ok(self.load(id).await?.into())
    }

    async fn update_user(
        &self,
        actor: Actor,
        id: i64,
        request: AdminUpdateUserRequest,
    ) -> Result<UserResponse, UserError> {
        if actor.user_id == id {
            return Err(UserError::SelfModification);
        }
        let mut user = self.load(id).await?;

        if let Some(role) = request.role {
            user.role = role;
        }
        let deactivated = request.is_active == Some(false) && user.is_active;
        if let Some(is_active) = request.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();

        let updated = self.user_repo.update(&user).await?;
        if deactivated {
            self.session_repo.revoke_all_for_user(id).await?;
        }
        info!(user_id = id, role = %updated.role, is_active = updated.is_active, "User updated by admin");
        Ok(updated.into())
    }

    async fn delete_user(&self, actor: Actor, id: i64) -> Result<(), UserError> {
        if actor.user_id == id {
            return Err(UserError::SelfModification);
        }
        self.load(id).await?;
        if self.user_repo.has_bookings(id).await? {
            return Err(UserError::HasBookings);
        }
        self.session_repo.revoke_all_for_user(id).await?;
        self.user_repo.delete(id).await?;
        Ok(())
    }
}
