//! Versioned schema migrations
//!
//! `init.rs` creates tables with `CREATE TABLE IF NOT EXISTS`, which never
//! alters a table that already exists. Column additions for databases created
//! by older builds live here, tracked in `schema_version`.
//!
//! Never modify an existing migration. Add a new `migrate_vN` and bump
//! `CURRENT_SCHEMA_VERSION`.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Latest applied version, 0 for a fresh database
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        // Baseline: tables created by init.rs
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v2: track the audio job that owns a lesson's narration
///
/// The completion callback only applies when the stored id still matches,
/// so an edit made while a job is running cannot be overwritten by it.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('lessons') WHERE name = 'audio_operation_id'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  audio_operation_id column already exists - skipping");
        return Ok(());
    }

    match sqlx::query("ALTER TABLE lessons ADD COLUMN audio_operation_id TEXT")
        .execute(pool)
        .await
    {
        Ok(_) => {
            info!("  Added audio_operation_id column to lessons table");
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
