//! Confusion matrix, per-class metrics and the classification report.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::{MetricError, check_lengths};

/// A confusion matrix for multi-class classification.
///
/// Entry `matrix[i][j]` counts how many samples with true label
/// `classes()[i]` were predicted as `classes()[j]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
    classes: Vec<usize>,
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    /// The class index.
    pub class: usize,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true samples for this class.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
    /// Number of samples predicted as this class.
    pub predicted: usize,
}

impl ClassMetrics {
    /// Whether the class occurs in either the truth or the predictions.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.support > 0 || self.predicted > 0
    }
}

impl ConfusionMatrix {
    /// Build a confusion matrix from true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MetricError::EmptyInput`] | Zero labels provided |
    /// | [`MetricError::LengthMismatch`] | Truth and prediction lengths differ |
    /// | [`MetricError::ClassOutOfRange`] | A label is `>= n_classes` |
    pub fn from_labels(
        true_labels: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, MetricError> {
        check_lengths(true_labels.len(), predicted.len())?;
        let mut matrix = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in true_labels.iter().zip(predicted) {
            if let Some(&label) = [t, p].iter().find(|&&l| l >= n_classes) {
                return Err(MetricError::ClassOutOfRange { label, n_classes });
            }
            matrix[t][p] += 1;
        }
        Ok(Self {
            matrix,
            classes: (0..n_classes).collect(),
        })
    }

    /// Build a confusion matrix over the distinct labels seen in either input.
    ///
    /// Rows and columns follow ascending label order, so the matrix size
    /// depends on how many labels occur, not on their values.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`MetricError::EmptyInput`] | Zero labels provided |
    /// | [`MetricError::LengthMismatch`] | Truth and prediction lengths differ |
    pub fn from_predictions(true_labels: &[usize], predicted: &[usize]) -> Result<Self, MetricError> {
        check_lengths(true_labels.len(), predicted.len())?;
        let classes: Vec<usize> = true_labels
            .iter()
            .chain(predicted)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position = |label: usize| classes.partition_point(|&c| c < label);
        let mut matrix = vec![vec![0usize; classes.len()]; classes.len()];
        for (&t, &p) in true_labels.iter().zip(predicted) {
            matrix[position(t)][position(p)] += 1;
        }
        Ok(Self { matrix, classes })
    }

    /// Overall accuracy: proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes()).map(|i| self.matrix[i][i]).sum();
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Total number of samples counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flat_map(|row| row.iter()).sum()
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.n_classes())
            .map(|c| {
                let tp = self.matrix[c][c];
                let predicted: usize = (0..self.n_classes()).map(|i| self.matrix[i][c]).sum();
                let support: usize = self.matrix[c].iter().sum();
                let precision = if predicted == 0 {
                    0.0
                } else {
                    tp as f64 / predicted as f64
                };
                let recall = if support == 0 {
                    0.0
                } else {
                    tp as f64 / support as f64
                };
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: self.classes[c],
                    precision,
                    recall,
                    f1,
                    support,
                    predicted,
                }
            })
            .collect()
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Class label of each row and column, ascending.
    #[must_use]
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in &self.classes {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;

        for (i, row) in self.classes.iter().zip(&self.matrix) {
            write!(f, "true_{i:>3}")?;
            for val in row {
                write!(f, " {val:>7}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// Averaged precision/recall/F1 row of a [`ClassificationReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageRow {
    /// Averaged precision.
    pub precision: f64,
    /// Averaged recall.
    pub recall: f64,
    /// Averaged F1.
    pub f1: f64,
    /// Total support.
    pub support: usize,
}

/// Text-and-data summary of per-class precision, recall, and F1.
///
/// Only classes present in the truth or the predictions are listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Per-class rows.
    pub classes: Vec<ClassMetrics>,
    /// Overall accuracy.
    pub accuracy: f64,
    /// Unweighted mean over listed classes.
    pub macro_avg: AverageRow,
    /// Support-weighted mean over listed classes.
    pub weighted_avg: AverageRow,
}

impl ClassificationReport {
    /// Build the report from a confusion matrix.
    #[must_use]
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let classes: Vec<ClassMetrics> = cm
            .class_metrics()
            .into_iter()
            .filter(ClassMetrics::is_present)
            .collect();
        let total: usize = classes.iter().map(|c| c.support).sum();
        let n = classes.len().max(1) as f64;
        let macro_avg = AverageRow {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
            support: total,
        };
        let weighted = |pick: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes
                    .iter()
                    .map(|c| pick(c) * c.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };
        let weighted_avg = AverageRow {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: total,
        };
        Self {
            accuracy: cm.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
        }
    }

    /// Build the report directly from label sequences.
    ///
    /// # Errors
    ///
    /// Same as [`ConfusionMatrix::from_predictions`].
    pub fn from_predictions(true_labels: &[usize], predicted: &[usize]) -> Result<Self, MetricError> {
        ConfusionMatrix::from_predictions(true_labels, predicted).map(|cm| Self::from_confusion(&cm))
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.class, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, row) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, row.precision, row.recall, row.f1, row.support
            )?;
        }
        Ok(())
    }
}
