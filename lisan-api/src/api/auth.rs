//! Registration, login and token introspection

use super::validation::{is_valid_email, Validator};
use super::{created, ok, AuthUser, Envelope, JsonBody};
use crate::db::users;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use lisan_common::auth::{hash_password, issue_token, verify_password, Claims};
use lisan_common::db::{Role, User};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// POST /api/v1/auth/register
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid fields"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<User>>)> {
    let email = req.email.trim();

    let mut v = Validator::new();
    v.min_chars("username", &req.username, 3, "Username must be at least 3 characters")
        .check(is_valid_email(email), "email", "Invalid email address")
        .check(req.password.chars().count() >= 6, "password", "Password must be at least 6 characters");
    v.finish()?;

    if users::find_by_email(&state.db, email).await?.is_some() {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let user = users::create_user(
        &state.db,
        email,
        req.username.trim(),
        &hash_password(&req.password)?,
        Role::Student,
    )
    .await
    .map_err(|e| {
        if e.is_unique_violation() {
            ApiError::Conflict("Email is already registered".to_string())
        } else {
            e.into()
        }
    })?;

    info!(user_id = user.id, "Registered user");
    Ok(created("Registration successful", user))
}

/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<Envelope<LoginResponse>>> {
    let email = req.email.trim();

    let mut v = Validator::new();
    v.check(is_valid_email(email), "email", "Invalid email address")
        .check(!req.password.is_empty(), "password", "Password is required");
    v.finish()?;

    let user = users::find_by_email(&state.db, email)
        .await?
        .filter(|u| verify_password(&req.password, &u.password))
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: (Utc::now() + Duration::hours(state.auth.token_ttl_hours)).timestamp(),
    };
    let token = issue_token(&claims, &state.auth.token_secret)?;

    info!(user_id = user.id, "User logged in");
    Ok(ok("Login successful", LoginResponse { user, token }))
}

/// GET /api/v1/auth/me
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Token identity", body = AuthUser),
        (status = 401, description = "Missing token"),
        (status = 403, description = "Invalid or expired token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(user: AuthUser) -> Json<Envelope<AuthUser>> {
    ok("Profile retrieved", user)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}
