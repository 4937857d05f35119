//! The experiment lifecycle controller.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use mlexp_metrics::ProbabilityMatrix;
use tracing::{info, instrument};

use crate::classifier::{Classification, RocEvaluation, evaluate_roc};
use crate::config::ExperimentConfig;
use crate::error::ExperimentError;
use crate::io::{ModelIo, ModelLocation};
use crate::model::Model;
use crate::params::ParamSpace;
use crate::processing::{ProcessData, ProcessMode};
use crate::registry::{Baseline, Evaluation, MetricRegistry};
use crate::regression::Regression;
use crate::search::{CvSearch, SearchOutcome, SearchStrategy};
use crate::setup::{ExperimentSetup, MLSetup};
use crate::split::StratifiedShuffleSplit;
use crate::task::Task;

/// Drives process, train, predict and evaluate for one model type.
///
/// Owns the raw train/test data, a metric registry seeded from the task's
/// defaults, an optional baseline and the model store/load pair. The raw
/// data is never modified; processing returns a fresh [`ExperimentSetup`].
pub struct ExperimentBase<K: Task, M> {
    task: K,
    training: MLSetup<K::Label>,
    testing: MLSetup<K::Label>,
    config: ExperimentConfig,
    model_dir: PathBuf,
    metrics: MetricRegistry<K::Metric>,
    model_io: ModelIo<M>,
    baseline: Option<Baseline<K::Label>>,
}

/// A classification experiment.
pub type ClassifierExperiment<M> = ExperimentBase<Classification, M>;

/// A regression experiment.
pub type RegressionExperiment<M> = ExperimentBase<Regression, M>;

impl<K: Task, M: Model<Label = K::Label>> ExperimentBase<K, M> {
    /// Create an experiment over raw train and test data.
    ///
    /// The model directory resolves to `<model_dir or .models>/<process_tag>`;
    /// it is created lazily when a model is stored.
    ///
    /// # Errors
    ///
    /// Any error of [`ExperimentConfig::validate`].
    pub fn new(
        task: K,
        training: MLSetup<K::Label>,
        testing: MLSetup<K::Label>,
        config: ExperimentConfig,
        model_io: ModelIo<M>,
    ) -> Result<Self, ExperimentError> {
        config.validate()?;
        let model_dir = config.resolved_model_dir();
        let metrics = task.default_metrics();
        info!(
            task = task.name(),
            n_train = training.n_samples(),
            n_test = testing.n_samples(),
            model_dir = %model_dir.display(),
            "experiment created"
        );
        Ok(Self {
            task,
            training,
            testing,
            config,
            model_dir,
            metrics,
            model_io,
            baseline: None,
        })
    }

    /// The task.
    #[must_use]
    pub fn task(&self) -> &K {
        &self.task
    }

    /// Raw training data.
    #[must_use]
    pub fn training(&self) -> &MLSetup<K::Label> {
        &self.training
    }

    /// Raw test data.
    #[must_use]
    pub fn testing(&self) -> &MLSetup<K::Label> {
        &self.testing
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Resolved model directory.
    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// The metric registry.
    #[must_use]
    pub fn metrics(&self) -> &MetricRegistry<K::Metric> {
        &self.metrics
    }

    // --- Processing ---

    /// Run a processor over the raw data.
    ///
    /// # Errors
    ///
    /// Whatever the processor returns.
    pub fn process_data<P: ProcessData<K::Label>>(
        &self,
        processor: &mut P,
        mode: ProcessMode,
    ) -> Result<ExperimentSetup<K::Label>, ExperimentError> {
        processor.process_data(&self.training, &self.testing, mode)
    }

    /// Process with previously persisted transforms only.
    ///
    /// # Errors
    ///
    /// Whatever the processor returns, typically when no stored state exists.
    pub fn process_data_from_stored_models<P: ProcessData<K::Label>>(
        &self,
        processor: &mut P,
    ) -> Result<ExperimentSetup<K::Label>, ExperimentError> {
        self.process_data(processor, ProcessMode::Apply)
    }

    // --- Training and prediction ---

    /// Fit a model on the training side of `full_setup`.
    ///
    /// With a parameter space, runs [`cv_search`](Self::cv_search) and
    /// returns its refit winner; otherwise fits `model` directly.
    ///
    /// # Errors
    ///
    /// Any search error, or the model's fit error.
    #[instrument(skip_all, fields(task = self.task.name(), search = parameters.is_some()))]
    pub fn train_model(
        &self,
        mut model: M,
        full_setup: &ExperimentSetup<K::Label>,
        parameters: Option<&ParamSpace>,
        strategy: SearchStrategy,
    ) -> Result<M, ExperimentError> {
        let train = &full_setup.train_data;
        match parameters {
            Some(space) => Ok(self.cv_search(train, &model, space, strategy)?.best_estimator),
            None => {
                model.fit(train.observations(), train.labels())?;
                info!(n_samples = train.n_samples(), "model fitted");
                Ok(model)
            }
        }
    }

    /// Label predictions for the test side of `full_setup`.
    ///
    /// # Errors
    ///
    /// The model's predict error.
    pub fn predict(&self, full_setup: &ExperimentSetup<K::Label>, model: &M) -> Result<Vec<K::Label>, ExperimentError> {
        Ok(model.predict(full_setup.test_data.observations())?)
    }

    /// Class probability estimates for the test side of `full_setup`.
    ///
    /// # Errors
    ///
    /// The model's predict_proba error, including
    /// [`ModelError::Unsupported`](crate::ModelError::Unsupported).
    pub fn predict_proba(
        &self,
        full_setup: &ExperimentSetup<K::Label>,
        model: &M,
    ) -> Result<ProbabilityMatrix, ExperimentError> {
        Ok(model.predict_proba(full_setup.test_data.observations())?)
    }

    // --- Evaluation ---

    /// Score `predictions`, or the configured baseline, against `labels`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ExperimentError::NoBaselineConfigured`] | Baseline requested but unset |
    /// | [`ExperimentError::BaselineLengthMismatch`] | Per-sample baseline of the wrong length |
    /// | Task errors | From [`Task::evaluate_predictions`] |
    pub fn evaluate_predictions(
        &self,
        labels: &[K::Label],
        predictions: &[K::Label],
        class_probabilities: Option<&ProbabilityMatrix>,
        baseline_prediction: bool,
    ) -> Result<Evaluation, ExperimentError> {
        let selected: Cow<'_, [K::Label]> = if baseline_prediction {
            let baseline = self.baseline.as_ref().ok_or(ExperimentError::NoBaselineConfigured)?;
            baseline.resolve(labels.len())?
        } else {
            Cow::Borrowed(predictions)
        };
        self.task
            .evaluate_predictions(&self.metrics, labels, &selected, class_probabilities)
    }

    /// Set the reference prediction used by baseline evaluation.
    pub fn set_baseline(&mut self, baseline: Baseline<K::Label>) {
        self.baseline = Some(baseline);
    }

    /// The configured baseline, if any.
    #[must_use]
    pub fn baseline(&self) -> Option<&Baseline<K::Label>> {
        self.baseline.as_ref()
    }

    /// Register a metric. An existing metric of the same name is replaced.
    pub fn add_metric(&mut self, name: impl Into<String>, metric: K::Metric) {
        self.metrics.insert(name, metric);
    }

    /// Unregister a metric.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::MetricNotRegistered`] if the name is unknown.
    pub fn remove_metric(&mut self, name: &str) -> Result<K::Metric, ExperimentError> {
        self.metrics.remove(name)
    }

    // --- Cross-validation ---

    /// The splitter used by search: `cv_split_count` splits holding out
    /// `cv_test_fraction`, seeded from the configuration.
    ///
    /// Every call returns a splitter that produces the same partitions.
    ///
    /// # Errors
    ///
    /// Any error of [`StratifiedShuffleSplit::new`].
    pub fn cv_splits(&self) -> Result<StratifiedShuffleSplit, ExperimentError> {
        Ok(StratifiedShuffleSplit::new(self.config.cv_split_count, self.config.cv_test_fraction)?
            .with_seed(self.config.seed))
    }

    /// The scorer name used to rank search candidates.
    #[must_use]
    pub fn standard_metric(&self) -> Option<&str> {
        self.config.standard_metric().or_else(|| self.task.standard_metric())
    }

    /// Search `parameters` with cross-validation on `data`.
    ///
    /// Candidates are ranked by [`standard_metric`](Self::standard_metric)
    /// and the winner is refit on all of `data`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ExperimentError::StandardMetricNotConfigured`] | Neither the task nor the config names a scorer |
    /// | [`ExperimentError::Metric`] | Unknown scorer name, or a scoring failure |
    /// | Split and search errors | From [`StratifiedShuffleSplit::split`] and [`CvSearch::run`] |
    pub fn cv_search(
        &self,
        data: &MLSetup<K::Label>,
        model: &M,
        parameters: &ParamSpace,
        strategy: SearchStrategy,
    ) -> Result<SearchOutcome<M>, ExperimentError> {
        let metric = self
            .standard_metric()
            .ok_or(ExperimentError::StandardMetricNotConfigured)?;
        let scorer = self.task.scorer(metric)?;
        let splits = self.cv_splits()?.split(data.labels())?;
        CvSearch::new(scorer, strategy)
            .with_seed(self.config.seed)
            .run(model, parameters, data, &splits)
    }

    // --- Persistence ---

    /// Where models are stored: the model directory and the model tag.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::InvalidTag`] for an invalid model tag.
    pub fn model_location(&self) -> Result<ModelLocation, ExperimentError> {
        ModelLocation::new(&self.model_dir, self.config.model_tag())
    }

    /// Store a model with the experiment's store routine.
    ///
    /// # Errors
    ///
    /// Whatever the store routine returns.
    pub fn store_model(&self, model: &M) -> Result<PathBuf, ExperimentError> {
        self.model_io.store(model, &self.model_location()?)
    }

    /// Load a model with the experiment's load routine.
    ///
    /// # Errors
    ///
    /// Whatever the load routine returns.
    pub fn load_model(&self) -> Result<M, ExperimentError> {
        self.model_io.load(&self.model_location()?)
    }
}

impl<M: Model<Label = usize>> ExperimentBase<Classification, M> {
    /// ROC analysis of class probabilities on the test side of `full_setup`.
    ///
    /// # Errors
    ///
    /// Any error of [`evaluate_roc`].
    pub fn evaluate_roc_metrics(
        &self,
        full_setup: &ExperimentSetup<usize>,
        class_probabilities: &ProbabilityMatrix,
    ) -> Result<RocEvaluation, ExperimentError> {
        evaluate_roc(full_setup.test_data.labels(), class_probabilities)
    }
}
