//! User Handlers
//!
//! Own-profile endpoints plus the admin account management ones.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{
    AdminUpdateUserRequest, ChangePasswordRequest, UpdateProfileRequest, UserListQuery,
};
use crate::application::dto::response::UserResponse;
use crate::application::services::{UserService, UserServiceImpl};
use crate::infrastructure::repositories::{PgSessionRepository, PgUserRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

fn service(state: &AppState) -> UserServiceImpl<PgUserRepository, PgSessionRepository> {
    UserServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgSessionRepository::new(state.db.clone())),
    )
}

/// Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(service(&state).get_profile(auth.user_id).await?))
}

/// Update current user profile
pub async fn update_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(service(&state).update_profile(auth.user_id, body).await?))
}

/// Change own password; every refresh session is revoked
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    service(&state).change_password(auth.user_id, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    Ok(Json(service(&state).list_users(query).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    Ok(Json(service(&state).get_user(user_id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(body): Json<AdminUpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    Ok(Json(service(&state).update_user(auth.actor(), user_id, body).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    service(&state).delete_user(auth.actor(), user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
