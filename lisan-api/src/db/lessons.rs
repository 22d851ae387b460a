//! Lessons within a level

use chrono::Utc;
use lisan_common::db::{AudioStatus, Lesson, Level};
use lisan_common::learning::{close_sequence_gap, SequenceScope};
use lisan_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::info;
use utoipa::ToSchema;

/// Lesson with its level embedded
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LessonWithLevel {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub level: Option<Level>,
}

/// Narration state written alongside the lesson
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonAudio {
    pub voice_path: Option<String>,
    pub status: AudioStatus,
    pub operation_id: Option<String>,
}

impl LessonAudio {
    /// Audio available at `voice_path` (or none at all)
    pub fn ready(voice_path: Option<String>) -> Self {
        Self {
            voice_path,
            status: AudioStatus::Completed,
            operation_id: None,
        }
    }

    /// Waiting for background job `operation_id`
    pub fn pending(operation_id: String) -> Self {
        Self {
            voice_path: None,
            status: AudioStatus::Processing,
            operation_id: Some(operation_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewLesson {
    pub title: String,
    pub content: String,
    pub sequence: i64,
    pub level_id: i64,
    pub audio: LessonAudio,
}

/// Partial update; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct LessonChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub sequence: Option<i64>,
    pub level_id: Option<i64>,
    pub audio: Option<LessonAudio>,
}

async fn attach_levels(pool: &SqlitePool, lessons: Vec<Lesson>) -> Result<Vec<LessonWithLevel>> {
    let levels: HashMap<i64, Level> = crate::db::levels::list(pool)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    Ok(lessons
        .into_iter()
        .map(|lesson| LessonWithLevel {
            level: levels.get(&lesson.level_id).cloned(),
            lesson,
        })
        .collect())
}

/// All lessons with their level, in sequence order
pub async fn list(pool: &SqlitePool) -> Result<Vec<LessonWithLevel>> {
    let lessons =
        sqlx::query_as::<_, Lesson>("SELECT * FROM lessons ORDER BY sequence ASC, level_id ASC")
            .fetch_all(pool)
            .await?;

    attach_levels(pool, lessons).await
}

/// Lessons of one level in sequence order
pub async fn list_by_level(pool: &SqlitePool, level_id: i64) -> Result<Vec<Lesson>> {
    let lessons = sqlx::query_as::<_, Lesson>(
        "SELECT * FROM lessons WHERE level_id = ? ORDER BY sequence ASC",
    )
    .bind(level_id)
    .fetch_all(pool)
    .await?;

    Ok(lessons)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Lesson>> {
    let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(lesson)
}

pub async fn get_with_level(pool: &SqlitePool, id: i64) -> Result<Option<LessonWithLevel>> {
    let Some(lesson) = get(pool, id).await? else {
        return Ok(None);
    };
    let level = crate::db::levels::get(pool, lesson.level_id).await?;

    Ok(Some(LessonWithLevel { lesson, level }))
}

pub async fn create(pool: &SqlitePool, new: &NewLesson) -> Result<Lesson> {
    let now = Utc::now();
    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons
            (title, content, voice_path, audio_status, audio_operation_id, sequence, level_id,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new.title)
    .bind(&new.content)
    .bind(&new.audio.voice_path)
    .bind(new.audio.status)
    .bind(&new.audio.operation_id)
    .bind(new.sequence)
    .bind(new.level_id)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(lesson)
}

pub async fn update(pool: &SqlitePool, id: i64, changes: &LessonChanges) -> Result<Option<Lesson>> {
    // Audio columns are replaced together, including NULLs, when present
    let replace_audio = changes.audio.is_some();
    let audio = changes.audio.clone().unwrap_or(LessonAudio::ready(None));

    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        UPDATE lessons
        SET title = COALESCE(?, title),
            content = COALESCE(?, content),
            sequence = COALESCE(?, sequence),
            level_id = COALESCE(?, level_id),
            voice_path = CASE WHEN ? THEN ? ELSE voice_path END,
            audio_status = CASE WHEN ? THEN ? ELSE audio_status END,
            audio_operation_id = CASE WHEN ? THEN ? ELSE audio_operation_id END,
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&changes.title)
    .bind(&changes.content)
    .bind(changes.sequence)
    .bind(changes.level_id)
    .bind(replace_audio)
    .bind(&audio.voice_path)
    .bind(replace_audio)
    .bind(audio.status)
    .bind(replace_audio)
    .bind(&audio.operation_id)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(lesson)
}

/// Delete a lesson and close the gap in its level's sequence
pub async fn delete_with_renumber(pool: &SqlitePool, id: i64) -> Result<Option<Lesson>> {
    let mut tx = pool.begin().await?;

    let Some(lesson) = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
    else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM lessons WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let scope = SequenceScope::Lessons {
        level_id: lesson.level_id,
    };
    let moved = close_sequence_gap(&mut tx, scope, lesson.sequence).await?;

    tx.commit().await?;

    info!(
        lesson_id = id,
        level_id = lesson.level_id,
        sequence = lesson.sequence,
        renumbered = moved,
        "Deleted lesson"
    );
    Ok(Some(lesson))
}

/// Record the outcome of background audio job `operation_id`
///
/// `voice_path` is the uploaded URL, or `None` when the job failed. Only
/// applies while the lesson still carries this operation id; returns
/// whether a row was updated.
pub async fn finish_audio_job(
    pool: &SqlitePool,
    lesson_id: i64,
    operation_id: &str,
    voice_path: Option<&str>,
) -> Result<bool> {
    let status = if voice_path.is_some() {
        AudioStatus::Completed
    } else {
        AudioStatus::Failed
    };

    let result = sqlx::query(
        r#"
        UPDATE lessons
        SET voice_path = COALESCE(?, voice_path),
            audio_status = ?,
            audio_operation_id = NULL,
            updated_at = ?
        WHERE id = ? AND audio_operation_id = ?
        "#,
    )
    .bind(voice_path)
    .bind(status)
    .bind(Utc::now())
    .bind(lesson_id)
    .bind(operation_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Mark audio delivered by the storage completion webhook
pub async fn complete_audio_from_storage(
    pool: &SqlitePool,
    lesson_id: i64,
    voice_path: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE lessons
        SET voice_path = ?, audio_status = ?, audio_operation_id = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(voice_path)
    .bind(AudioStatus::Completed)
    .bind(Utc::now())
    .bind(lesson_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
