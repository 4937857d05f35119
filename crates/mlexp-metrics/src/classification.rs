//! Label- and probability-based classification metrics.

use serde::{Deserialize, Serialize};

use crate::confusion::ConfusionMatrix;
use crate::error::{MetricError, check_lengths};
use crate::probability::ProbabilityMatrix;

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs.
const LOG_LOSS_EPS: f64 = 1e-15;

/// Strategy for combining per-class scores into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Average {
    /// Unweighted mean over classes present in truth or predictions.
    Macro,
    /// Global counts of true positives, false positives and false negatives.
    Micro,
    /// Mean over classes weighted by true support.
    Weighted,
}

impl Average {
    /// All averaging strategies, in reporting order.
    pub const ALL: [Average; 3] = [Average::Macro, Average::Micro, Average::Weighted];

    /// Suffix used when reporting an averaged metric (`f1_macro`, ...).
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Macro => "macro",
            Self::Micro => "micro",
            Self::Weighted => "weighted",
        }
    }
}

/// Fraction of predictions equal to the truth.
///
/// # Errors
///
/// [`MetricError::EmptyInput`] or [`MetricError::LengthMismatch`].
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> Result<f64, MetricError> {
    check_lengths(truth.len(), predicted.len())?;
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / truth.len() as f64)
}

/// Mean recall over the classes that occur in the truth.
///
/// # Errors
///
/// [`MetricError::EmptyInput`] or [`MetricError::LengthMismatch`].
pub fn balanced_accuracy(truth: &[usize], predicted: &[usize]) -> Result<f64, MetricError> {
    let cm = ConfusionMatrix::from_predictions(truth, predicted)?;
    let recalls: Vec<f64> = cm
        .class_metrics()
        .into_iter()
        .filter(|m| m.support > 0)
        .map(|m| m.recall)
        .collect();
    Ok(recalls.iter().sum::<f64>() / recalls.len() as f64)
}

/// F1 score combined across classes with the given averaging strategy.
///
/// Classes with no true and no predicted samples are ignored. Undefined
/// per-class precision or recall counts as 0.0.
///
/// # Errors
///
/// [`MetricError::EmptyInput`] or [`MetricError::LengthMismatch`].
pub fn f1_score(truth: &[usize], predicted: &[usize], average: Average) -> Result<f64, MetricError> {
    let cm = ConfusionMatrix::from_predictions(truth, predicted)?;
    let classes: Vec<_> = cm
        .class_metrics()
        .into_iter()
        .filter(|m| m.is_present())
        .collect();

    let score = match average {
        Average::Macro => classes.iter().map(|m| m.f1).sum::<f64>() / classes.len() as f64,
        Average::Weighted => {
            let support: usize = classes.iter().map(|m| m.support).sum();
            classes
                .iter()
                .map(|m| m.f1 * m.support as f64)
                .sum::<f64>()
                / support as f64
        }
        Average::Micro => {
            let tp: usize = (0..cm.n_classes()).map(|c| cm.as_rows()[c][c]).sum();
            let predicted_total: usize = classes.iter().map(|m| m.predicted).sum();
            let support_total: usize = classes.iter().map(|m| m.support).sum();
            let precision = tp as f64 / predicted_total as f64;
            let recall = tp as f64 / support_total as f64;
            if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            }
        }
    };
    Ok(score)
}

/// Mean negative log-likelihood of the true class.
///
/// Rows are renormalised to sum to one and clipped away from 0 and 1.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MetricError::EmptyInput`] | Zero samples |
/// | [`MetricError::LengthMismatch`] | Row count differs from truth length |
/// | [`MetricError::ClassOutOfRange`] | A label has no probability column |
pub fn log_loss(truth: &[usize], probabilities: &ProbabilityMatrix) -> Result<f64, MetricError> {
    check_lengths(truth.len(), probabilities.n_rows())?;
    let n_classes = probabilities.n_classes();
    if let Some(&label) = truth.iter().find(|&&l| l >= n_classes) {
        return Err(MetricError::ClassOutOfRange { label, n_classes });
    }
    let mut total = 0.0;
    for (&label, row) in truth.iter().zip(probabilities.rows()) {
        let row_sum: f64 = row.iter().sum();
        let p = if row_sum > 0.0 { row[label] / row_sum } else { 0.0 };
        total -= p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS).ln();
    }
    Ok(total / truth.len() as f64)
}
