//! Request extractors: bearer-token identity and JSON bodies

use crate::error::ApiError;
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use chrono::Utc;
use lisan_common::auth::{verify_token, TokenError};
use lisan_common::db::Role;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

/// Caller identity taken from a valid bearer token
///
/// Missing token -> 401. Malformed, forged or expired token -> 403.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Access token is missing".to_string()))?;

        let claims = verify_token(token, &state.auth.token_secret, Utc::now().timestamp())
            .map_err(|e| {
                debug!(reason = ?e, "Rejected bearer token");
                match e {
                    TokenError::Expired => ApiError::Forbidden("Token has expired".to_string()),
                    _ => ApiError::Forbidden("Invalid token".to_string()),
                }
            })?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// An [`AuthUser`] whose role is admin; any other role -> 403
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

/// Numeric id from the single path parameter; non-numeric -> 400
#[derive(Debug, Clone, Copy)]
pub struct Id(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::BadRequest("Invalid id".to_string()))?;
        Ok(Id(id))
    }
}

/// `Json<T>` whose rejections use the API error body
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
