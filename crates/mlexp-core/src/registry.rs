//! Named metric registries, evaluation results and baselines.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use mlexp_metrics::MetricValue;
use serde::Serialize;

use crate::error::ExperimentError;
use crate::setup::Target;

/// Metrics keyed by name. Inserting an existing name replaces it.
pub struct MetricRegistry<E> {
    entries: BTreeMap<String, E>,
}

impl<E> MetricRegistry<E> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a metric, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, metric: E) -> Option<E> {
        self.entries.insert(name.into(), metric)
    }

    /// Remove a metric by name.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::MetricNotRegistered`] if the name is unknown.
    pub fn remove(&mut self, name: &str) -> Result<E, ExperimentError> {
        self.entries
            .remove(name)
            .ok_or_else(|| ExperimentError::MetricNotRegistered {
                name: name.to_string(),
            })
    }

    /// Whether a metric is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over `(name, metric)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &E)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of registered metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for MetricRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for MetricRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Metric results of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    values: BTreeMap<String, MetricValue>,
    unresolved: Vec<String>,
}

impl Evaluation {
    /// Create an empty evaluation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result.
    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) {
        self.values.insert(name.into(), value);
    }

    /// Record a metric that could not be computed.
    pub fn mark_unresolved(&mut self, name: impl Into<String>) {
        self.unresolved.push(name.into());
    }

    /// The result recorded under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.values.get(name)
    }

    /// The scalar result recorded under `name`.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(MetricValue::as_scalar)
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Metrics dropped because neither labels nor probabilities could score them.
    #[must_use]
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Number of recorded results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no results were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A reference prediction to benchmark a model against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Baseline<L> {
    /// The same prediction for every sample, e.g. the majority class.
    Constant(L),
    /// One prediction per sample.
    Predictions(Vec<L>),
}

impl<L: Target> Baseline<L> {
    /// Expand to one prediction per label.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::BaselineLengthMismatch`] if a per-sample
    /// baseline has the wrong length.
    pub fn resolve(&self, n_labels: usize) -> Result<Cow<'_, [L]>, ExperimentError> {
        match self {
            Self::Constant(value) => Ok(Cow::Owned(vec![value.clone(); n_labels])),
            Self::Predictions(values) if values.len() == n_labels => Ok(Cow::Borrowed(values)),
            Self::Predictions(values) => Err(ExperimentError::BaselineLengthMismatch {
                baseline: values.len(),
                labels: n_labels,
            }),
        }
    }
}
