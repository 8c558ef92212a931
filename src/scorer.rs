//! Scores a cleaned dataset against a known-correct copy by row membership.

use crate::dataset::{row_key_for, Dataset, ValueKey};
use crate::error::{CleanError, Result};
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Accuracy {
    pub percent: f32,
    pub correct: usize,
    pub total: usize,
    /// Cleaned rows absent from the ground truth, rendered for diagnostics.
    pub wrong: Vec<String>,
}

/// A cleaned row counts as correct iff it appears anywhere in the ground
/// truth, compared structurally under the ground truth's attribute domains
/// so formatting artifacts cannot cause false mismatches. Assumes the
/// ground truth holds no duplicate rows; if it does, membership over-counts
/// correctness (known approximation).
pub fn score(cleaned: &Dataset, truth: &Dataset) -> Result<Accuracy> {
    if cleaned.num_attributes() != truth.num_attributes() {
        return Err(CleanError::Config(format!(
            "cleaned dataset has {} attributes but ground truth has {}",
            cleaned.num_attributes(),
            truth.num_attributes()
        )));
    }

    info!("Calculating how many tuples were correctly classified...");
    let truth_keys: HashSet<Vec<ValueKey>> =
        (0..truth.num_rows()).map(|row| truth.row_key(row)).collect();

    let mut correct = 0;
    let mut wrong = Vec::new();
    for row in 0..cleaned.num_rows() {
        let key = row_key_for(&truth.attributes, cleaned.row(row));
        if truth_keys.contains(&key) {
            correct += 1;
        } else {
            wrong.push(cleaned.render_row(row));
        }
    }

    let total = cleaned.num_rows();
    let percent = if total == 0 {
        100.0
    } else {
        (correct as f32 * 100.0) / total as f32
    };
    info!(
        "{}%: {} out of {} correctly classified.",
        percent, correct, total
    );
    Ok(Accuracy {
        percent,
        correct,
        total,
        wrong,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUTH: &str = "name,zip\nmercy,16801\ngeisinger,17821\nnittany,16803\n";

    #[test]
    fn test_identical_dataset_scores_100() {
        let truth = Dataset::from_csv_str(TRUTH).unwrap();
        let cleaned = Dataset::from_csv_str(TRUTH).unwrap();
        let accuracy = score(&cleaned, &truth).unwrap();
        assert_eq!(accuracy.percent, 100.0);
        assert!(accuracy.wrong.is_empty());
    }

    #[test]
    fn test_one_altered_row() {
        let truth = Dataset::from_csv_str(TRUTH).unwrap();
        let cleaned =
            Dataset::from_csv_str("name,zip\nmercy,16801\ngeisinger,99999\nnittany,16803\n")
                .unwrap();
        let accuracy = score(&cleaned, &truth).unwrap();
        assert_eq!(accuracy.correct, 2);
        assert_eq!(accuracy.total, 3);
        assert!((accuracy.percent - 100.0 * 2.0 / 3.0).abs() < 1e-4);
        assert_eq!(accuracy.wrong, vec!["geisinger,99999".to_string()]);
    }

    #[test]
    fn test_numeric_formatting_does_not_miscount() {
        let truth = Dataset::from_csv_str(TRUTH).unwrap();
        let cleaned = Dataset::from_csv_str(
            "name,zip\nmercy,16801.0\ngeisinger,17821\nnittany,16803\n",
        )
        .unwrap();
        let accuracy = score(&cleaned, &truth).unwrap();
        assert_eq!(accuracy.percent, 100.0);
    }

    #[test]
    fn test_empty_cleaned_dataset_scores_100() {
        let truth = Dataset::from_csv_str(TRUTH).unwrap();
        let cleaned = truth.empty_like();
        let accuracy = score(&cleaned, &truth).unwrap();
        assert_eq!(accuracy.percent, 100.0);
        assert_eq!(accuracy.total, 0);
    }

    #[test]
    fn test_width_mismatch_is_fatal() {
        let truth = Dataset::from_csv_str(TRUTH).unwrap();
        let cleaned = Dataset::from_csv_str("name\nmercy\n").unwrap();
        assert!(score(&cleaned, &truth).is_err());
    }
}
