//! Precision, recall and F1 over predicted and ground-truth class paths.
//!
//! Two granularities are scored:
//!
//! - **path level**: each path is one atomic unit compared by exact sequence,
//! - **node level**: all paths of a column are flattened into one set of class
//!   names, ignoring order and depth.
//!
//! Each granularity reports a macro average (mean of per-column scores) and a
//! micro average (scores of the summed counts).

use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::EvaluationRecord;

/// Confusion counts for one column or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl Counts {
    /// Compares two sets.
    ///
    /// # Examples
    ///
    /// ```
    /// use ontopath::eval::Counts;
    /// use std::collections::HashSet;
    ///
    /// let predicted: HashSet<&str> = ["A", "B"].into_iter().collect();
    /// let expected: HashSet<&str> = ["A", "C"].into_iter().collect();
    ///
    /// let counts = Counts::from_sets(&predicted, &expected);
    /// assert_eq!(counts.true_positives, 1);
    /// assert_eq!(counts.false_positives, 1);
    /// assert_eq!(counts.false_negatives, 1);
    /// ```
    pub fn from_sets<T: Eq + Hash>(predicted: &HashSet<T>, expected: &HashSet<T>) -> Self {
        Self {
            true_positives: predicted.intersection(expected).count(),
            false_positives: predicted.difference(expected).count(),
            false_negatives: expected.difference(predicted).count(),
        }
    }

    /// Precision, recall and F1 of these counts; any ratio with a zero
    /// denominator is 0.
    pub fn scores(&self) -> Scores {
        let tp = self.true_positives as f64;
        let precision = ratio(tp, tp + self.false_positives as f64);
        let recall = ratio(tp, tp + self.false_negatives as f64);
        Scores {
            precision,
            recall,
            f1: harmonic_mean(precision, recall),
        }
    }
}

impl std::ops::AddAssign for Counts {
    fn add_assign(&mut self, other: Self) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Macro and micro averages at one granularity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelScores {
    pub macro_avg: Scores,
    pub micro_avg: Scores,
    /// Counts summed over all columns.
    pub totals: Counts,
    /// Number of columns scored.
    pub columns: usize,
}

impl LevelScores {
    /// Aggregates per-column counts. An empty input yields all zeros.
    pub fn from_counts<I>(per_column: I) -> Self
    where
        I: IntoIterator<Item = Counts>,
    {
        let mut totals = Counts::default();
        let mut sums = Scores::default();
        let mut columns = 0;

        for counts in per_column {
            let scores = counts.scores();
            sums.precision += scores.precision;
            sums.recall += scores.recall;
            sums.f1 += scores.f1;
            totals += counts;
            columns += 1;
        }

        let macro_avg = if columns == 0 {
            Scores::default()
        } else {
            let n = columns as f64;
            Scores {
                precision: sums.precision / n,
                recall: sums.recall / n,
                f1: sums.f1 / n,
            }
        };

        Self {
            macro_avg,
            micro_avg: totals.scores(),
            totals,
            columns,
        }
    }
}

/// Counts for one column, paths compared as whole sequences.
///
/// An empty predicted path is a unit of its own, like any other path.
pub fn path_counts(predicted: &[Vec<String>], expected: &[Vec<String>]) -> Counts {
    let predicted: HashSet<&[String]> = predicted.iter().map(Vec::as_slice).collect();
    let expected: HashSet<&[String]> = expected.iter().map(Vec::as_slice).collect();
    Counts::from_sets(&predicted, &expected)
}

/// Counts for one column, paths flattened into a set of class names.
pub fn node_counts(predicted: &[Vec<String>], expected: &[Vec<String>]) -> Counts {
    Counts::from_sets(&flatten(predicted), &flatten(expected))
}

pub fn path_level(records: &[EvaluationRecord]) -> LevelScores {
    LevelScores::from_counts(
        records
            .iter()
            .map(|r| path_counts(&r.pred_paths, &r.gt_paths)),
    )
}

pub fn node_level(records: &[EvaluationRecord]) -> LevelScores {
    LevelScores::from_counts(
        records
            .iter()
            .map(|r| node_counts(&r.pred_paths, &r.gt_paths)),
    )
}

fn flatten(paths: &[Vec<String>]) -> HashSet<&str> {
    paths.iter().flatten().map(String::as_str).collect()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b > 0.0 { 2.0 * a * b / (a + b) } else { 0.0 }
}
