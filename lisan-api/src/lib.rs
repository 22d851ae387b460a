//! lisan-api library interface
//!
//! Exposes the router and application state for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{LessonAudioQueue, LessonAudioRecorder, Services};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Token signing settings
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub token_secret: String,
    pub token_ttl_hours: i64,
}

/// Storage completion webhook settings
#[derive(Debug, Clone, Default)]
pub struct WebhookSettings {
    /// Last path segment the webhook route must carry; `None` disables it
    pub secret_key: Option<String>,
    pub bucket_name: Option<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub auth: Arc<AuthSettings>,
    pub services: Services,
    /// Background narration of long lesson content
    pub audio_jobs: LessonAudioQueue,
    pub webhook: Arc<WebhookSettings>,
    /// Lesson content above this many bytes is narrated in the background
    pub long_text_threshold: usize,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build the state and start the lesson audio worker
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        db: SqlitePool,
        auth: AuthSettings,
        services: Services,
        webhook: WebhookSettings,
        long_text_threshold: usize,
    ) -> Self {
        let recorder = Arc::new(LessonAudioRecorder::new(db.clone(), services.media.clone()));
        let audio_jobs = LessonAudioQueue::start(&services, recorder, long_text_threshold);

        Self {
            db,
            auth: Arc::new(auth),
            services,
            audio_jobs,
            webhook: Arc::new(webhook),
            long_text_threshold,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `/health` at the root, everything else under `/api/v1`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::docs_routes())
        .nest("/api/v1", api::v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
