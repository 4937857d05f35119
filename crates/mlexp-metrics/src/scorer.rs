//! Named scorers used to rank candidates during hyperparameter search.
//!
//! Every scorer follows "greater is better": error metrics are exposed
//! negated under a `neg_` name.

use crate::classification::{Average, accuracy, balanced_accuracy, f1_score, log_loss};
use crate::error::MetricError;
use crate::probability::ProbabilityMatrix;
use crate::regression::{mean_absolute_error, mean_squared_error, r2_score, root_mean_squared_error};
use crate::roc::{roc_auc_ovr_weighted, roc_auc_score};
use crate::value::Prediction;

/// Label-based scoring function.
pub type LabelScoreFn<L> = fn(&[L], &[L]) -> Result<f64, MetricError>;

/// Probability-based scoring function.
pub type ProbabilityScoreFn<L> = fn(&[L], &ProbabilityMatrix) -> Result<f64, MetricError>;

/// A scoring criterion resolved from its name.
#[derive(Debug, Clone, Copy)]
pub enum Scorer<L> {
    /// Scores hard predictions.
    Labels {
        /// Registered name.
        name: &'static str,
        /// +1.0, or -1.0 for negated error metrics.
        sign: f64,
        /// The underlying metric.
        func: LabelScoreFn<L>,
    },
    /// Scores class probability estimates.
    Probabilities {
        /// Registered name.
        name: &'static str,
        /// +1.0, or -1.0 for negated error metrics.
        sign: f64,
        /// The underlying metric.
        func: ProbabilityScoreFn<L>,
    },
}

/// Names accepted by [`Scorer::classification`].
pub const CLASSIFICATION_SCORERS: &[&str] = &[
    "accuracy",
    "balanced_accuracy",
    "f1_macro",
    "f1_micro",
    "f1_weighted",
    "neg_log_loss",
    "roc_auc",
];

/// Names accepted by [`Scorer::regression`].
pub const REGRESSION_SCORERS: &[&str] = &[
    "neg_mean_squared_error",
    "neg_mean_absolute_error",
    "neg_root_mean_squared_error",
    "r2",
];

/// Binary AUC from the greater label's column, or weighted one-vs-rest AUC.
fn roc_auc_from_probabilities(labels: &[usize], probabilities: &ProbabilityMatrix) -> Result<f64, MetricError> {
    if probabilities.n_classes() <= 2 {
        let truth: Vec<bool> = labels.iter().map(|&l| l == 1).collect();
        if probabilities.n_classes() < 2 {
            return Err(MetricError::ClassOutOfRange {
                label: 1,
                n_classes: probabilities.n_classes(),
            });
        }
        roc_auc_score(&truth, &probabilities.column(1))
    } else {
        roc_auc_ovr_weighted(labels, probabilities)
    }
}

impl Scorer<usize> {
    /// Resolve a classification scorer by name.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::UnknownScorer`] for names outside
    /// [`CLASSIFICATION_SCORERS`].
    pub fn classification(name: &str) -> Result<Self, MetricError> {
        let scorer = match name {
            "accuracy" => Self::Labels { name: "accuracy", sign: 1.0, func: accuracy },
            "balanced_accuracy" => Self::Labels {
                name: "balanced_accuracy",
                sign: 1.0,
                func: balanced_accuracy,
            },
            "f1_macro" => Self::Labels {
                name: "f1_macro",
                sign: 1.0,
                func: |t, p| f1_score(t, p, Average::Macro),
            },
            "f1_micro" => Self::Labels {
                name: "f1_micro",
                sign: 1.0,
                func: |t, p| f1_score(t, p, Average::Micro),
            },
            "f1_weighted" => Self::Labels {
                name: "f1_weighted",
                sign: 1.0,
                func: |t, p| f1_score(t, p, Average::Weighted),
            },
            "neg_log_loss" => Self::Probabilities { name: "neg_log_loss", sign: -1.0, func: log_loss },
            "roc_auc" => Self::Probabilities {
                name: "roc_auc",
                sign: 1.0,
                func: roc_auc_from_probabilities,
            },
            other => return Err(MetricError::UnknownScorer { name: other.to_string() }),
        };
        Ok(scorer)
    }
}

impl Scorer<f64> {
    /// Resolve a regression scorer by name.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::UnknownScorer`] for names outside
    /// [`REGRESSION_SCORERS`].
    pub fn regression(name: &str) -> Result<Self, MetricError> {
        let scorer = match name {
            "neg_mean_squared_error" => Self::Labels {
                name: "neg_mean_squared_error",
                sign: -1.0,
                func: mean_squared_error,
            },
            "neg_mean_absolute_error" => Self::Labels {
                name: "neg_mean_absolute_error",
                sign: -1.0,
                func: mean_absolute_error,
            },
            "neg_root_mean_squared_error" => Self::Labels {
                name: "neg_root_mean_squared_error",
                sign: -1.0,
                func: root_mean_squared_error,
            },
            "r2" => Self::Labels { name: "r2", sign: 1.0, func: r2_score },
            other => return Err(MetricError::UnknownScorer { name: other.to_string() }),
        };
        Ok(scorer)
    }
}

impl<L> Scorer<L> {
    /// The registered scorer name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Labels { name, .. } | Self::Probabilities { name, .. } => *name,
        }
    }

    /// Whether the scorer consumes class probabilities instead of labels.
    #[must_use]
    pub fn needs_probabilities(&self) -> bool {
        matches!(self, Self::Probabilities { .. })
    }

    /// Score a prediction against the truth, greater is better.
    ///
    /// # Errors
    ///
    /// [`MetricError::LabelsRequired`] or [`MetricError::ProbabilitiesRequired`]
    /// when handed the wrong kind of prediction, plus any error of the
    /// underlying metric.
    pub fn score(&self, truth: &[L], prediction: Prediction<'_, L>) -> Result<f64, MetricError> {
        match (self, prediction) {
            (Self::Labels { sign, func, .. }, Prediction::Labels(predicted)) => {
                func(truth, predicted).map(|v| sign * v)
            }
            (Self::Probabilities { sign, func, .. }, Prediction::Probabilities(probabilities)) => {
                func(truth, probabilities).map(|v| sign * v)
            }
            (Self::Labels { name, .. }, Prediction::Probabilities(_)) => {
                Err(MetricError::LabelsRequired { metric: *name })
            }
            (Self::Probabilities { name, .. }, Prediction::Labels(_)) => {
                Err(MetricError::ProbabilitiesRequired { metric: *name })
            }
        }
    }
}
