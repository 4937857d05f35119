//! Regression: default error metrics and direct evaluation.

use mlexp_metrics::{MetricError, ProbabilityMatrix, Scorer, mean_absolute_error, mean_squared_error};
use tracing::{info, instrument};

use crate::error::ExperimentError;
use crate::registry::{Evaluation, MetricRegistry};
use crate::task::Task;

/// A regression registry entry: `(truth, predicted) -> value`.
pub type RegressionMetric = Box<dyn Fn(&[f64], &[f64]) -> Result<f64, MetricError> + Send + Sync>;

/// Supervised regression over continuous targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Regression;

impl Regression {
    /// Scorer ranking search candidates by default. Negated so larger is better.
    pub const STANDARD_METRIC: &'static str = "neg_root_mean_squared_error";
}

impl Task for Regression {
    type Label = f64;
    type Metric = RegressionMetric;

    fn name(&self) -> &'static str {
        "regression"
    }

    fn standard_metric(&self) -> Option<&'static str> {
        Some(Self::STANDARD_METRIC)
    }

    fn scorer(&self, name: &str) -> Result<Scorer<f64>, MetricError> {
        Scorer::regression(name)
    }

    fn default_metrics(&self) -> MetricRegistry<RegressionMetric> {
        let mut metrics: MetricRegistry<RegressionMetric> = MetricRegistry::new();
        metrics.insert("mse", Box::new(mean_squared_error));
        metrics.insert("mae", Box::new(mean_absolute_error));
        metrics
    }

    /// Every metric is applied directly; any failure is returned.
    #[instrument(skip_all, fields(n_metrics = metrics.len(), n_samples = labels.len()))]
    fn evaluate_predictions(
        &self,
        metrics: &MetricRegistry<RegressionMetric>,
        labels: &[f64],
        predictions: &[f64],
        _class_probabilities: Option<&ProbabilityMatrix>,
    ) -> Result<Evaluation, ExperimentError> {
        let mut evaluation = Evaluation::new();
        for (name, metric) in metrics.iter() {
            let value = metric(labels, predictions)?;
            info!("{name}: {value}");
            evaluation.insert(name, value.into());
        }
        Ok(evaluation)
    }
}
