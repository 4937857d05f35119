//! Configuration builder for experiments.

use std::path::{Path, PathBuf};

use crate::error::ExperimentError;
use crate::io::validate_tag;

/// Model directory used when none is configured, relative to the working directory.
pub const DEFAULT_MODEL_DIR: &str = ".models";

/// Tag used for both model and processing runs unless overridden.
pub const DEFAULT_TAG: &str = "_development";

/// Configuration for an experiment.
///
/// Construct via [`ExperimentConfig::new`], then chain `with_*` methods.
/// Values are validated when the experiment is created.
///
/// # Defaults
///
/// | Parameter          | Default          |
/// |--------------------|------------------|
/// | `cv_split_count`   | 5                |
/// | `seed`             | 100              |
/// | `cv_test_fraction` | 0.4              |
/// | `model_dir`        | `None` (`.models`) |
/// | `model_tag`        | `"_development"` |
/// | `process_tag`      | `"_development"` |
/// | `standard_metric`  | `None` (task default) |
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub(crate) cv_split_count: usize,
    pub(crate) seed: u64,
    pub(crate) cv_test_fraction: f64,
    pub(crate) model_dir: Option<PathBuf>,
    pub(crate) model_tag: String,
    pub(crate) process_tag: String,
    pub(crate) standard_metric: Option<String>,
}

impl ExperimentConfig {
    /// Create a config with the defaults above.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cv_split_count: 5,
            seed: 100,
            cv_test_fraction: 0.4,
            model_dir: None,
            model_tag: DEFAULT_TAG.to_string(),
            process_tag: DEFAULT_TAG.to_string(),
            standard_metric: None,
        }
    }

    // --- Setters ---

    /// Set the number of CV splits used by search.
    #[must_use]
    pub fn with_cv_split_count(mut self, cv_split_count: usize) -> Self {
        self.cv_split_count = cv_split_count;
        self
    }

    /// Set the seed for CV splits and randomized search.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the share of each CV split held out for validation.
    #[must_use]
    pub fn with_cv_test_fraction(mut self, cv_test_fraction: f64) -> Self {
        self.cv_test_fraction = cv_test_fraction;
        self
    }

    /// Set the base model directory. The process tag is appended to it.
    #[must_use]
    pub fn with_model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(model_dir.into());
        self
    }

    /// Set the file stem models are stored under.
    #[must_use]
    pub fn with_model_tag(mut self, model_tag: impl Into<String>) -> Self {
        self.model_tag = model_tag.into();
        self
    }

    /// Set the processing-run tag, used as a model subdirectory.
    #[must_use]
    pub fn with_process_tag(mut self, process_tag: impl Into<String>) -> Self {
        self.process_tag = process_tag.into();
        self
    }

    /// Override the task's scorer used to rank search candidates.
    #[must_use]
    pub fn with_standard_metric(mut self, standard_metric: impl Into<String>) -> Self {
        self.standard_metric = Some(standard_metric.into());
        self
    }

    // --- Getters ---

    /// Number of CV splits.
    #[must_use]
    pub fn cv_split_count(&self) -> usize {
        self.cv_split_count
    }

    /// Seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// CV held-out fraction.
    #[must_use]
    pub fn cv_test_fraction(&self) -> f64 {
        self.cv_test_fraction
    }

    /// Configured base model directory, if any.
    #[must_use]
    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }

    /// Model tag.
    #[must_use]
    pub fn model_tag(&self) -> &str {
        &self.model_tag
    }

    /// Processing-run tag.
    #[must_use]
    pub fn process_tag(&self) -> &str {
        &self.process_tag
    }

    /// Scorer override, if any.
    #[must_use]
    pub fn standard_metric(&self) -> Option<&str> {
        self.standard_metric.as_deref()
    }

    /// `<model_dir or .models>/<process_tag>`.
    #[must_use]
    pub fn resolved_model_dir(&self) -> PathBuf {
        self.model_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_MODEL_DIR))
            .join(&self.process_tag)
    }

    /// Check every value is usable.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ExperimentError::InvalidSplitCount`] | `cv_split_count == 0` |
    /// | [`ExperimentError::InvalidSplitFraction`] | `cv_test_fraction` not in (0.0, 1.0) |
    /// | [`ExperimentError::InvalidTag`] | A tag is empty or contains a path separator |
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.cv_split_count == 0 {
            return Err(ExperimentError::InvalidSplitCount {
                n_splits: self.cv_split_count,
            });
        }
        if !(self.cv_test_fraction > 0.0 && self.cv_test_fraction < 1.0) {
            return Err(ExperimentError::InvalidSplitFraction {
                fraction: self.cv_test_fraction,
            });
        }
        validate_tag(&self.model_tag)?;
        validate_tag(&self.process_tag)?;
        Ok(())
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExperimentConfig::new();
        assert_eq!(config.cv_split_count(), 5);
        assert_eq!(config.seed(), 100);
        assert!((config.cv_test_fraction() - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.resolved_model_dir(), PathBuf::from(".models/_development"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn process_tag_always_appended() {
        let config = ExperimentConfig::new()
            .with_model_dir("/srv/models")
            .with_process_tag("features_v2");
        assert_eq!(config.resolved_model_dir(), PathBuf::from("/srv/models/features_v2"));
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            ExperimentConfig::new().with_cv_split_count(0).validate(),
            Err(ExperimentError::InvalidSplitCount { .. })
        ));
        assert!(matches!(
            ExperimentConfig::new().with_cv_test_fraction(1.5).validate(),
            Err(ExperimentError::InvalidSplitFraction { .. })
        ));
        assert!(matches!(
            ExperimentConfig::new().with_model_tag("../escape").validate(),
            Err(ExperimentError::InvalidTag { .. })
        ));
        assert!(ExperimentConfig::new().with_process_tag("").validate().is_err());
    }
}
