use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;

use super::{ApiError, AppState};

/// Resolves a short-link token and redirects to the recipe page.
///
/// # Endpoint
/// `GET /s/{token}`
///
/// # Errors
/// 400 for a token that does not decode, 404 if the recipe is gone.
pub async fn follow(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.recipe_service().resolve_short_link(&token).await?;
    let base = state.config().read().await.public_base().to_string();

    tracing::debug!(recipe_id = id.value(), "Following short link");

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, format!("{base}/recipes/{id}/"))],
    ))
}
