//! Metric inputs and outputs shared by registries and scorers.

use std::fmt;

use serde::Serialize;

use crate::confusion::{ClassificationReport, ConfusionMatrix};
use crate::probability::ProbabilityMatrix;

/// The prediction a metric is scored against.
#[derive(Debug, Clone, Copy)]
pub enum Prediction<'a, L> {
    /// Hard predictions, one per sample.
    Labels(&'a [L]),
    /// Class probability estimates, one row per sample.
    Probabilities(&'a ProbabilityMatrix),
}

/// Result of one evaluated metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// A single number.
    Scalar(f64),
    /// A confusion matrix.
    ConfusionMatrix(ConfusionMatrix),
    /// A per-class classification report.
    Report(ClassificationReport),
}

impl MetricValue {
    /// The scalar value, if this is a scalar metric.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::ConfusionMatrix(cm) => write!(f, "\n{cm}"),
            Self::Report(report) => write!(f, "\n{report}"),
        }
    }
}
