//! Dictionary categories

use super::validation::Validator;
use super::{created, ok, AdminUser, Envelope, Id, JsonBody};
use crate::db::{categories, vocabularies};
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use lisan_common::db::{Category, Vocabulary};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
}

/// Category with its vocabulary entries
#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    pub vocabularies: Vec<Vocabulary>,
}

fn validate_name(name: &str) -> ApiResult<()> {
    let mut v = Validator::new();
    v.min_chars("name", name, 1, "Category name is required");
    v.finish()
}

fn not_found() -> ApiError {
    ApiError::NotFound("Category not found".to_string())
}

/// GET /api/v1/categories
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    responses((status = 200, description = "All categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<Category>>>> {
    let categories = categories::list(&state.db).await?;
    Ok(ok("Categories retrieved", categories))
}

/// GET /api/v1/categories/:id
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category with its vocabulary", body = CategoryDetail),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    Id(id): Id,
) -> ApiResult<Json<Envelope<CategoryDetail>>> {
    let category = categories::get(&state.db, id).await?.ok_or_else(not_found)?;
    let vocabularies = vocabularies::list_by_category(&state.db, id).await?;

    Ok(ok("Category retrieved", CategoryDetail { category, vocabularies }))
}

/// POST /api/v1/categories
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid fields")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Category>>)> {
    validate_name(&req.name)?;

    let category = categories::create(&state.db, req.name.trim()).await?;
    info!(category_id = category.id, "Created category");
    Ok(created("Category created", category))
}

/// PUT /api/v1/categories/:id
#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category id")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category renamed", body = Category),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
    JsonBody(req): JsonBody<CategoryRequest>,
) -> ApiResult<Json<Envelope<Category>>> {
    validate_name(&req.name)?;

    let category = categories::rename(&state.db, id, req.name.trim())
        .await?
        .ok_or_else(not_found)?;
    Ok(ok("Category updated", category))
}

/// DELETE /api/v1/categories/:id
///
/// Refused with 409 while vocabulary still belongs to the category.
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    tag = "categories",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category still contains vocabulary")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    let deleted = categories::delete(&state.db, id).await.map_err(|e| {
        if e.is_foreign_key_violation() {
            ApiError::Conflict("Category still contains vocabulary".to_string())
        } else {
            e.into()
        }
    })?;

    if !deleted {
        return Err(not_found());
    }

    info!(category_id = id, "Deleted category");
    Ok(ok("Category deleted", ()))
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}
