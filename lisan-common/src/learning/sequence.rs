//! Dense sequence maintenance
//!
//! Levels are numbered 1..N globally, lessons 1..N within their level.
//! After a row is deleted every sibling above it moves down by one, inside
//! the caller's transaction.

use crate::Result;
use sqlx::SqliteConnection;

/// Which siblings share a sequence numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceScope {
    Levels,
    Lessons { level_id: i64 },
}

/// Shift every sibling with `sequence > deleted_sequence` down by one
///
/// Runs in two passes (store the new value negated, then flip the sign) so
/// the UNIQUE constraint never sees two rows with the same sequence while
/// SQLite visits rows in arbitrary order. Returns the number of rows moved.
pub async fn close_sequence_gap(
    conn: &mut SqliteConnection,
    scope: SequenceScope,
    deleted_sequence: i64,
) -> Result<u64> {
    let moved = match scope {
        SequenceScope::Levels => {
            sqlx::query("UPDATE levels SET sequence = -(sequence - 1) WHERE sequence > ?")
                .bind(deleted_sequence)
                .execute(&mut *conn)
                .await?
                .rows_affected()
        }
        SequenceScope::Lessons { level_id } => {
            sqlx::query(
                "UPDATE lessons SET sequence = -(sequence - 1) WHERE level_id = ? AND sequence > ?",
            )
            .bind(level_id)
            .bind(deleted_sequence)
            .execute(&mut *conn)
            .await?
            .rows_affected()
        }
    };

    match scope {
        SequenceScope::Levels => {
            sqlx::query("UPDATE levels SET sequence = -sequence WHERE sequence < 0")
                .execute(&mut *conn)
                .await?;
        }
        SequenceScope::Lessons { level_id } => {
            sqlx::query("UPDATE lessons SET sequence = -sequence WHERE level_id = ? AND sequence < 0")
                .bind(level_id)
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(moved)
}
