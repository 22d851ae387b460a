//! Self-service account management

use super::validation::{is_http_url, Validator};
use super::{ok, AuthUser, Envelope, JsonBody};
use crate::db::users;
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::put, Json, Router};
use lisan_common::db::User;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

/// PUT /api/v1/users/me
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid fields")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> ApiResult<Json<Envelope<User>>> {
    let mut v = Validator::new();
    if let Some(username) = &req.username {
        v.min_chars("username", username, 3, "Username must be at least 3 characters");
    }
    if let Some(avatar) = &req.avatar {
        v.check(is_http_url(avatar), "avatar", "Avatar must be an http or https URL");
    }
    v.finish()?;

    let updated = users::update_profile(
        &state.db,
        user.user_id,
        req.username.as_deref().map(str::trim),
        req.avatar.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(user_id = user.user_id, "Updated profile");
    Ok(ok("Profile updated", updated))
}

/// DELETE /api/v1/users/me
#[utoipa::path(
    delete,
    path = "/api/v1/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Account and its progress deleted"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Envelope<()>>> {
    if !users::delete_user(&state.db, user.user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!(user_id = user.user_id, "Deleted account");
    Ok(ok("Account deleted", ()))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users/me", put(update_me).delete(delete_me))
}
