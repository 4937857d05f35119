//! Row-major class probability matrix.

use serde::{Deserialize, Serialize};

use crate::error::MetricError;

/// Class probability estimates, one row per sample and one column per class.
///
/// Column `j` holds the probability of class label `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityMatrix {
    values: Vec<f64>,
    n_rows: usize,
    n_classes: usize,
}

impl ProbabilityMatrix {
    /// Build a matrix from per-sample rows.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MetricError::RaggedProbabilities`] | Rows differ in width |
    /// | [`MetricError::InvalidProbability`] | A value is negative or non-finite |
    /// | [`MetricError::NoClassColumns`] | Rows are present but have zero width |
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, MetricError> {
        let n_rows = rows.len();
        let n_classes = rows.first().map_or(0, Vec::len);
        if n_rows > 0 && n_classes == 0 {
            return Err(MetricError::NoClassColumns { n_rows });
        }
        let mut values = Vec::with_capacity(n_rows * n_classes);
        for (row, probs) in rows.into_iter().enumerate() {
            if probs.len() != n_classes {
                return Err(MetricError::RaggedProbabilities {
                    row,
                    expected: n_classes,
                    got: probs.len(),
                });
            }
            for (column, &value) in probs.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(MetricError::InvalidProbability { row, column, value });
                }
            }
            values.extend(probs);
        }
        Ok(Self {
            values,
            n_rows,
            n_classes,
        })
    }

    /// Number of samples.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of class columns.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Whether the matrix holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Borrow one row.
    ///
    /// # Panics
    ///
    /// Panics if `row >= n_rows()`.
    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.n_classes..(row + 1) * self.n_classes]
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics; a zero-width matrix has empty `values` anyway.
        self.values.chunks_exact(self.n_classes.max(1))
    }

    /// Copy out one class column.
    ///
    /// # Panics
    ///
    /// Panics if `class >= n_classes()`.
    #[must_use]
    pub fn column(&self, class: usize) -> Vec<f64> {
        assert!(class < self.n_classes, "column {class} out of range");
        self.rows().map(|r| r[class]).collect()
    }

    /// Most probable class per row (first maximum wins on ties).
    #[must_use]
    pub fn argmax(&self) -> Vec<usize> {
        self.rows()
            .map(|r| {
                r.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, &p)| {
                        if p > best.1 { (i, p) } else { best }
                    })
                    .0
            })
            .collect()
    }
}
