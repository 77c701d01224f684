//! Recipe endpoints: CRUD, favorites, shopping cart and short links.

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;

use super::auth::{CurrentUser, MaybeUser};
use super::validation::{parse_flag, validate_recipe_id, validate_user_id};
use super::{ApiError, ApiResponse, AppState, RecipeDto, ShortLinkDto, ShortRecipeDto};
use crate::domain::{ListKind, UserId};
use crate::services::{RecipeError, RecipeInput, RecipeQuery};

impl From<RecipeError> for ApiError {
    fn from(err: RecipeError) -> Self {
        match err {
            RecipeError::NotFound(id) => Self::not_found("Recipe", id),
            RecipeError::Validation(msg) => Self::validation(msg),
            err @ RecipeError::Forbidden => Self::forbidden(err.to_string()),
            err @ RecipeError::AlreadyInList { .. } => Self::Conflict(err.to_string()),
            err @ RecipeError::NotInList { .. } => Self::NotFound(err.to_string()),
            RecipeError::InvalidLink(e) => Self::validation(e.to_string()),
            RecipeError::ShoppingList(e) => Self::validation(e.to_string()),
            RecipeError::Database(msg) => Self::DatabaseError(msg),
            RecipeError::Internal(msg) => Self::internal(msg),
        }
    }
}

/// Builds a [`RecipeQuery`] from the raw query string.
///
/// `tags` may repeat, so the string is parsed by hand rather than through
/// `Query<T>`.
fn parse_recipe_query(
    raw: Option<&str>,
    default_limit: impl FnOnce(Option<u64>) -> u64,
) -> Result<RecipeQuery, ApiError> {
    let mut tags = Vec::new();
    let mut author = None;
    let mut is_favorited = None;
    let mut is_in_shopping_cart = None;
    let mut limit = None;
    let mut offset = 0;

    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "tags" => {
                let slug = value.trim();
                if !slug.is_empty() {
                    tags.push(slug.to_string());
                }
            }
            "author" => {
                let id = value
                    .parse::<i32>()
                    .map_err(|_| ApiError::validation(format!("Invalid author: '{value}'")))?;
                author = Some(validate_user_id(id)?);
            }
            "is_favorited" => is_favorited = Some(value.into_owned()),
            "is_in_shopping_cart" => is_in_shopping_cart = Some(value.into_owned()),
            "limit" => {
                limit = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| ApiError::validation(format!("Invalid limit: '{value}'")))?,
                );
            }
            "offset" => {
                offset = value
                    .parse::<u64>()
                    .map_err(|_| ApiError::validation(format!("Invalid offset: '{value}'")))?;
            }
            _ => {}
        }
    }

    Ok(RecipeQuery {
        tags,
        author,
        is_favorited: parse_flag("is_favorited", is_favorited.as_deref())?,
        is_in_shopping_cart: parse_flag("is_in_shopping_cart", is_in_shopping_cart.as_deref())?,
        limit: default_limit(limit),
        offset,
    })
}

/// Lists recipes, newest first.
///
/// # Endpoint
/// `GET /api/recipes`
///
/// # Query Parameters
/// - `tags`: tag slug, repeatable; a recipe matches if it has any of them
/// - `author`: author id
/// - `is_favorited`, `is_in_shopping_cart`: `1` to restrict to the caller's
///   lists; ignored for anonymous callers
/// - `limit`, `offset`: window over the result
pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    RawQuery(raw): RawQuery,
) -> Result<Json<ApiResponse<Vec<RecipeDto>>>, ApiError> {
    let recipes_config = state.config().read().await.recipes.clone();
    let query = parse_recipe_query(raw.as_deref(), |limit| recipes_config.clamp_limit(limit))?;

    let recipes = state.recipe_service().list(viewer, query).await?;
    Ok(Json(ApiResponse::success(recipes)))
}

/// `GET /api/recipes/{id}`
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<RecipeDto>>, ApiError> {
    let id = validate_recipe_id(id)?;
    let recipe = state.recipe_service().get(viewer, id).await?;
    Ok(Json(ApiResponse::success(recipe)))
}

/// Publishes a recipe.
///
/// # Endpoint
/// `POST /api/recipes`
///
/// # Request Body
/// ```json
/// {
///   "name": "Pancakes",
///   "text": "Mix and fry.",
///   "cooking_time": 20,
///   "tags": [1, 2],
///   "ingredients": [{"id": 3, "amount": 200}]
/// }
/// ```
pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<RecipeInput>,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = state.recipe_service().create(user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(recipe))))
}

/// Replaces a recipe's fields, tags and ingredients. Author only.
///
/// # Endpoint
/// `PATCH /api/recipes/{id}`
pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<RecipeInput>,
) -> Result<Json<ApiResponse<RecipeDto>>, ApiError> {
    let id = validate_recipe_id(id)?;
    let recipe = state.recipe_service().update(user, id, payload).await?;
    Ok(Json(ApiResponse::success(recipe)))
}

/// `DELETE /api/recipes/{id}`
pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate_recipe_id(id)?;
    state.recipe_service().delete(user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the recipe's public short link, generating the token on first use.
///
/// # Endpoint
/// `GET /api/recipes/{id}/get-link`
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ShortLinkDto>>, ApiError> {
    let id = validate_recipe_id(id)?;
    let token = state.recipe_service().short_link(id).await?;
    let base = state.config().read().await.public_base().to_string();

    Ok(Json(ApiResponse::success(ShortLinkDto {
        short_link: format!("{base}/s/{token}"),
    })))
}

async fn add_to(
    state: &AppState,
    user: UserId,
    id: i32,
    kind: ListKind,
) -> Result<(StatusCode, Json<ApiResponse<ShortRecipeDto>>), ApiError> {
    let id = validate_recipe_id(id)?;
    let recipe = state.recipe_service().add_to_list(user, id, kind).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(recipe))))
}

async fn remove_from(
    state: &AppState,
    user: UserId,
    id: i32,
    kind: ListKind,
) -> Result<StatusCode, ApiError> {
    let id = validate_recipe_id(id)?;
    state
        .recipe_service()
        .remove_from_list(user, id, kind)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/recipes/{id}/favorite`
pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    add_to(&state, user, id, ListKind::Favorite).await
}

/// `DELETE /api/recipes/{id}/favorite`
pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    remove_from(&state, user, id, ListKind::Favorite).await
}

/// `POST /api/recipes/{id}/shopping_cart`
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    add_to(&state, user, id, ListKind::ShoppingCart).await
}

/// `DELETE /api/recipes/{id}/shopping_cart`
pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    remove_from(&state, user, id, ListKind::ShoppingCart).await
}

/// Downloads the caller's aggregated shopping list as a text attachment.
///
/// # Endpoint
/// `GET /api/recipes/download_shopping_cart`
///
/// # Errors
/// 400 when the cart is empty.
pub async fn download_shopping_cart(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let file = state.recipe_service().shopping_list(user).await?;

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.content,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<RecipeQuery, ApiError> {
        parse_recipe_query(Some(raw), |limit| limit.unwrap_or(6))
    }

    #[test]
    fn repeated_tags_are_collected() {
        let query = parse("tags=breakfast&tags=lunch&tags=&author=3&limit=10&offset=20").unwrap();
        assert_eq!(query.tags, vec!["breakfast", "lunch"]);
        assert_eq!(query.author, Some(UserId::new(3)));
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 20);
        assert!(!query.is_favorited);
    }

    #[test]
    fn flags_and_defaults() {
        let query = parse_recipe_query(None, |limit| limit.unwrap_or(6)).unwrap();
        assert_eq!(query.limit, 6);
        assert!(query.tags.is_empty());

        let query = parse("is_favorited=1&is_in_shopping_cart=0").unwrap();
        assert!(query.is_favorited);
        assert!(!query.is_in_shopping_cart);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(parse("author=abc").is_err());
        assert!(parse("author=0").is_err());
        assert!(parse("limit=-1").is_err());
        assert!(parse("is_favorited=maybe").is_err());
    }
}
