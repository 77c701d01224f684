use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, TokenDto};
use crate::constants::session::USER_ID_KEY;
use crate::domain::UserId;
use crate::services::AuthError;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                Self::validation("Unable to log in with provided credentials")
            }
            AuthError::UserNotFound => Self::unauthorized(),
            AuthError::Validation(msg) => Self::validation(msg),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::internal(msg),
        }
    }
}

// ============================================================================
// Authenticated identity
// ============================================================================

/// Resolved caller identity, placed in request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone, Copy)]
struct Authenticated(UserId);

/// Extractor for endpoints that require a logged-in user.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .map(|auth| Self(auth.0))
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Extractor for endpoints that are public but personalise their output
/// for a logged-in caller.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<UserId>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Authenticated>().map(|a| a.0)))
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the caller from, in order:
/// 1. Session cookie (from login)
/// 2. `Authorization: Token <t>` or `Authorization: Bearer <t>` header
/// 3. `X-Api-Key` header
///
/// Anonymous requests pass through; handlers decide whether they need a user.
/// A token that does not match any user is rejected outright.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Ok(Some(user_id)) = session.get::<i32>(USER_ID_KEY).await {
        tracing::Span::current().record("user_id", user_id);
        request
            .extensions_mut()
            .insert(Authenticated(UserId::new(user_id)));
        return Ok(next.run(request).await);
    }

    if let Some(token) = extract_token(&headers) {
        let user = state.auth_service().verify_token(&token).await?;
        let Some(user) = user else {
            return Err(ApiError::Unauthorized("Invalid token".to_string()));
        };
        tracing::Span::current().record("user_id", user.value());
        request.extensions_mut().insert(Authenticated(user));
    }

    Ok(next.run(request).await)
}

/// Extract the auth token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str
            .strip_prefix("Token ")
            .or_else(|| auth_str.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
    {
        return Some(key_str.trim().to_string());
    }

    None
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/token/login
/// Authenticate with email and password, returns the auth token on success
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenDto>>, ApiError> {
    let result = state
        .auth_service()
        .login(&payload.email, &payload.password)
        .await?;

    if let Err(e) = session.insert(USER_ID_KEY, result.user_id.value()).await {
        return Err(ApiError::internal(format!("Failed to create session: {e}")));
    }

    Ok(Json(ApiResponse::success(TokenDto {
        auth_token: result.auth_token,
    })))
}

/// POST /auth/token/logout
/// Rotates the caller's token and drops the session
pub async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    state.auth_service().logout(user).await?;
    let _ = session.flush().await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/set_password
/// Change password (requires current password verification)
pub async fn set_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .auth_service()
        .change_password(user, &payload.current_password, &payload.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Token abc"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));

        headers.insert("Authorization", HeaderValue::from_static("Bearer xyz "));
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));

        headers.insert("Authorization", HeaderValue::from_static("Basic Zm9v"));
        headers.insert("X-Api-Key", HeaderValue::from_static("key"));
        assert_eq!(extract_token(&headers).as_deref(), Some("key"));
    }
}
