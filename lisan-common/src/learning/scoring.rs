//! Level submission scoring
//!
//! An answer is correct only when the submitted ids form exactly the set of
//! correct choice ids. The submitted list is compared by length first and
//! then by membership, so repeated ids are not collapsed: `[1, 1]` against
//! the correct set `{1}` is wrong.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

/// One answered exercise
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub exercise_id: i64,
    pub answer_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSummary {
    pub total_questions: usize,
    pub correctly_answered: usize,
    /// 0..=100, rounded half up
    pub score: i64,
}

/// Grade `submissions` against the correct choice ids of every exercise in
/// the level
///
/// `correct_sets` must hold one entry per exercise of the level, including
/// exercises without any correct choice. Submissions for exercises outside
/// the level are ignored. An exercise answered twice counts once, using the
/// last submission.
pub fn score_submissions(
    correct_sets: &HashMap<i64, HashSet<i64>>,
    submissions: &[Submission],
) -> Result<ScoreSummary> {
    let total = correct_sets.len();
    if total == 0 {
        return Err(Error::InvalidInput("No exercises found for this level".into()));
    }

    let mut graded: HashMap<i64, bool> = HashMap::new();
    for submission in submissions {
        if let Some(correct) = correct_sets.get(&submission.exercise_id) {
            graded.insert(submission.exercise_id, is_exact_match(&submission.answer_ids, correct));
        }
    }

    let correctly_answered = graded.values().filter(|ok| **ok).count();

    Ok(ScoreSummary {
        total_questions: total,
        correctly_answered,
        score: percentage(correctly_answered, total),
    })
}

fn is_exact_match(answer_ids: &[i64], correct: &HashSet<i64>) -> bool {
    answer_ids.len() == correct.len() && answer_ids.iter().all(|id| correct.contains(id))
}

/// `round(100 * correct / total)`, half up, in integer arithmetic
fn percentage(correct: usize, total: usize) -> i64 {
    let (c, n) = (correct as i64, total as i64);
    (200 * c + n) / (2 * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(entries: &[(i64, &[i64])]) -> HashMap<i64, HashSet<i64>> {
        entries
            .iter()
            .map(|(id, ids)| (*id, ids.iter().copied().collect()))
            .collect()
    }

    fn sub(exercise_id: i64, answer_ids: &[i64]) -> Submission {
        Submission {
            exercise_id,
            answer_ids: answer_ids.to_vec(),
        }
    }

    #[test]
    fn test_all_correct() {
        let correct = sets(&[(1, &[10]), (2, &[20, 21])]);
        let summary = score_submissions(&correct, &[sub(1, &[10]), sub(2, &[21, 20])]).unwrap();
        assert_eq!(summary.total_questions, 2);
        assert_eq!(summary.correctly_answered, 2);
        assert_eq!(summary.score, 100);
    }

    #[test]
    fn test_partial_set_is_wrong() {
        let correct = sets(&[(1, &[10, 11])]);
        let summary = score_submissions(&correct, &[sub(1, &[10])]).unwrap();
        assert_eq!(summary.correctly_answered, 0);
        assert_eq!(summary.score, 0);
    }

    #[test]
    fn test_duplicate_ids_not_collapsed() {
        let correct = sets(&[(1, &[1])]);
        let summary = score_submissions(&correct, &[sub(1, &[1, 1])]).unwrap();
        assert_eq!(summary.correctly_answered, 0);
    }

    #[test]
    fn test_unknown_exercise_ignored() {
        let correct = sets(&[(1, &[10]), (2, &[20]), (3, &[30])]);
        let summary = score_submissions(&correct, &[sub(1, &[10]), sub(99, &[1])]).unwrap();
        assert_eq!(summary.total_questions, 3);
        assert_eq!(summary.correctly_answered, 1);
        assert_eq!(summary.score, 33);
    }

    #[test]
    fn test_unanswered_exercises_count_against_score() {
        let correct = sets(&[(1, &[10]), (2, &[20]), (3, &[30])]);
        let summary =
            score_submissions(&correct, &[sub(1, &[10]), sub(2, &[20])]).unwrap();
        assert_eq!(summary.score, 67);
    }

    #[test]
    fn test_rounds_half_up() {
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn test_zero_exercises_is_error() {
        let result = score_submissions(&HashMap::new(), &[sub(1, &[1])]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_exercise_without_correct_choice_never_matches_non_empty() {
        let correct = sets(&[(1, &[])]);
        let summary = score_submissions(&correct, &[sub(1, &[5])]).unwrap();
        assert_eq!(summary.correctly_answered, 0);
    }
}
