//! Classification, regression and ROC metrics for experiment evaluation.
//!
//! Pure math library, zero file I/O; diagnostics go through `tracing`.
//! Provides label-based classification metrics with macro/micro/weighted
//! averaging, log-loss over class probabilities, confusion matrices and
//! classification reports, regression error metrics, ROC curves with binary and one-vs-rest AUC, and the named
//! scorers used to rank hyperparameter candidates.

mod classification;
mod confusion;
mod error;
mod probability;
mod regression;
mod roc;
mod scorer;
mod value;

pub use classification::{Average, accuracy, balanced_accuracy, f1_score, log_loss};
pub use confusion::{AverageRow, ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use error::MetricError;
pub use probability::ProbabilityMatrix;
pub use regression::{mean_absolute_error, mean_squared_error, r2_score, root_mean_squared_error};
pub use roc::{RocCurve, auc, one_hot, one_vs_rest_auc, roc_auc_ovr_weighted, roc_auc_score, roc_curve};
pub use scorer::{CLASSIFICATION_SCORERS, LabelScoreFn, ProbabilityScoreFn, REGRESSION_SCORERS, Scorer};
pub use value::{MetricValue, Prediction};
