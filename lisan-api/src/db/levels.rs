//! Levels of the learning path

use chrono::Utc;
use lisan_common::db::Level;
use lisan_common::learning::{close_sequence_gap, SequenceScope};
use lisan_common::Result;
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NewLevel {
    pub name: String,
    pub description: Option<String>,
    pub sequence: i64,
}

/// Partial update; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct LevelChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub sequence: Option<i64>,
}

/// All levels in sequence order
pub async fn list(pool: &SqlitePool) -> Result<Vec<Level>> {
    let levels = sqlx::query_as::<_, Level>("SELECT * FROM levels ORDER BY sequence ASC")
        .fetch_all(pool)
        .await?;

    Ok(levels)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Level>> {
    let level = sqlx::query_as::<_, Level>("SELECT * FROM levels WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(level)
}

pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM levels WHERE id = ?)")
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(found)
}

/// Insert a level. A taken sequence is a unique violation.
pub async fn create(pool: &SqlitePool, new: &NewLevel) -> Result<Level> {
    let now = Utc::now();
    let level = sqlx::query_as::<_, Level>(
        r#"
        INSERT INTO levels (name, description, sequence, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new.name)
    .bind(&new.description)
    .bind(new.sequence)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(level)
}

pub async fn update(pool: &SqlitePool, id: i64, changes: &LevelChanges) -> Result<Option<Level>> {
    let level = sqlx::query_as::<_, Level>(
        r#"
        UPDATE levels
        SET name = COALESCE(?, name),
            description = CASE WHEN ? THEN ? ELSE description END,
            sequence = COALESCE(?, sequence),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&changes.name)
    .bind(changes.description.is_some())
    .bind(changes.description.clone().flatten())
    .bind(changes.sequence)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(level)
}

/// Delete a level and close the gap in the global sequence
///
/// Lessons, exercises and progress rows of the level cascade. Returns `None`
/// without touching anything when the level does not exist.
pub async fn delete_with_renumber(pool: &SqlitePool, id: i64) -> Result<Option<Level>> {
    let mut tx = pool.begin().await?;

    let Some(level) = sqlx::query_as::<_, Level>("SELECT * FROM levels WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
    else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM levels WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let moved = close_sequence_gap(&mut tx, SequenceScope::Levels, level.sequence).await?;

    tx.commit().await?;

    info!(level_id = id, sequence = level.sequence, renumbered = moved, "Deleted level");
    Ok(Some(level))
}
