//! User account and subscription endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{CurrentUser, MaybeUser};
use super::validation::validate_user_id;
use super::{ApiError, ApiResponse, AppState, SubscriptionDto, UserDto};
use crate::services::{RegisterInput, UserError};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    pub recipes_limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
    pub recipes_limit: Option<u64>,
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(id) => Self::not_found("User", id),
            UserError::Validation(msg) => Self::validation(msg),
            UserError::Conflict(msg) => Self::Conflict(msg),
            err @ UserError::NotSubscribed(_) => Self::NotFound(err.to_string()),
            UserError::Database(msg) => Self::DatabaseError(msg),
            UserError::Internal(msg) => Self::internal(msg),
        }
    }
}

/// Registers a new account.
///
/// # Endpoint
/// `POST /api/users`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service().register(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// `GET /api/users?limit&offset`
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let limit = state.page_limit(query.limit).await;
    let users = state
        .user_service()
        .list(viewer, limit, query.offset)
        .await?;
    Ok(Json(ApiResponse::success(users)))
}

/// `GET /api/users/{id}`
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let id = validate_user_id(id)?;
    let user = state.user_service().get(viewer, id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// `GET /api/users/me`
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let me = state.user_service().get(Some(user), user).await?;
    Ok(Json(ApiResponse::success(me)))
}

/// Follows an author.
///
/// # Endpoint
/// `POST /api/users/{id}/subscribe?recipes_limit=N`
///
/// # Response
/// 201 with the author, a preview of their recipes and their recipe count.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Query(query): Query<SubscribeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let author = validate_user_id(id)?;
    let view = state
        .user_service()
        .subscribe(user, author, query.recipes_limit)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(view))))
}

/// `DELETE /api/users/{id}/subscribe`
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let author = validate_user_id(id)?;
    state.user_service().unsubscribe(user, author).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/users/subscriptions?limit&offset&recipes_limit`
pub async fn subscriptions(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<ApiResponse<Vec<SubscriptionDto>>>, ApiError> {
    let limit = state.page_limit(query.limit).await;
    let views = state
        .user_service()
        .subscriptions(user, limit, query.offset, query.recipes_limit)
        .await?;
    Ok(Json(ApiResponse::success(views)))
}
