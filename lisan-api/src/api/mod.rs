//! HTTP API handlers
//!
//! Every resource module exposes a `*_routes()` builder; [`v1_routes`]
//! merges them under `/api/v1`. Successful responses use the
//! `{"message": ..., "data": ...}` envelope.

pub mod auth;
pub mod categories;
pub mod docs;
pub mod exercises;
pub mod extractors;
pub mod health;
pub mod lessons;
pub mod levels;
pub mod ocr;
pub mod users;
pub mod validation;
pub mod vocabularies;
pub mod webhooks;

pub use extractors::{AdminUser, AuthUser, Id, JsonBody};
pub use docs::docs_routes;
pub use health::health_routes;

use crate::AppState;
use axum::{http::StatusCode, Json, Router};
use serde::Serialize;

/// Success response body
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: String,
    pub data: T,
}

/// 200 with `data`
pub fn ok<T: Serialize>(message: &str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        message: message.to_string(),
        data,
    })
}

/// 201 with the created resource
pub fn created<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(message, data))
}

/// All routes served under `/api/v1`
pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::auth_routes())
        .merge(users::user_routes())
        .merge(categories::category_routes())
        .merge(vocabularies::vocabulary_routes())
        .merge(levels::level_routes())
        .merge(lessons::lesson_routes())
        .merge(exercises::exercise_routes())
        .merge(ocr::ocr_routes())
        .merge(webhooks::webhook_routes())
}
