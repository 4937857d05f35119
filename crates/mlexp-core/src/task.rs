//! The learning-task interface an experiment is generic over.

use mlexp_metrics::{MetricError, ProbabilityMatrix, Scorer};

use crate::error::ExperimentError;
use crate::registry::{Evaluation, MetricRegistry};
use crate::setup::Target;

/// What kind of problem an experiment solves and how it is scored.
///
/// The lifecycle controller handles baselines and search; a task supplies
/// the label type, its metrics, the scorer used to rank candidates, and how
/// a prediction is evaluated against the registered metrics.
pub trait Task {
    /// The target type.
    type Label: Target;

    /// A registry entry.
    type Metric;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Scorer name used to rank search candidates, if the task has one.
    fn standard_metric(&self) -> Option<&'static str> {
        None
    }

    /// Resolve a scorer by name.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::UnknownScorer`] for names the task does not know.
    fn scorer(&self, name: &str) -> Result<Scorer<Self::Label>, MetricError>;

    /// Metrics registered when an experiment is created.
    fn default_metrics(&self) -> MetricRegistry<Self::Metric> {
        MetricRegistry::new()
    }

    /// Score `predictions` against `labels` with every registered metric.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::NotImplemented`] unless overridden.
    fn evaluate_predictions(
        &self,
        _metrics: &MetricRegistry<Self::Metric>,
        _labels: &[Self::Label],
        _predictions: &[Self::Label],
        _class_probabilities: Option<&ProbabilityMatrix>,
    ) -> Result<Evaluation, ExperimentError> {
        Err(ExperimentError::NotImplemented {
            operation: "evaluate_predictions",
        })
    }
}
