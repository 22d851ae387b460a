//! Progressive unlock
//!
//! Status is derived on every read from the user's progress rows, walking
//! items in sequence order. Nothing is cached.

use crate::db::ProgressStatus;

/// Derive the status of each item from its own progress row, if any
///
/// `rows` is in ascending sequence order. An item with a row reports the
/// row's status. An item without one is `Unlocked` when it is first or its
/// predecessor's row is `Completed`, otherwise `Locked`.
pub fn derive_statuses(rows: &[Option<ProgressStatus>]) -> Vec<ProgressStatus> {
    let mut previous_completed = true;

    rows.iter()
        .map(|row| {
            let status = match row {
                Some(status) => *status,
                None if previous_completed => ProgressStatus::Unlocked,
                None => ProgressStatus::Locked,
            };
            previous_completed = matches!(row, Some(ProgressStatus::Completed));
            status
        })
        .collect()
}
