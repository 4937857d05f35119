//! Experiment orchestration for supervised learning.
//!
//! An [`ExperimentBase`] takes a raw train/test pair through processing,
//! training (optionally with cross-validated hyperparameter search),
//! prediction and evaluation. It is generic over a [`Task`], which decides
//! the label type, the default metrics and how predictions are scored
//! ([`Classification`] or [`Regression`]), and over a [`Model`], which is
//! persisted through a pluggable [`ModelIo`] pair.
//!
//! # Quick start
//!
//! ```no_run
//! use mlexp_core::{
//!     ClassifierExperiment, Classification, ExperimentConfig, ExperimentSetup, ModelIo,
//!     SearchStrategy,
//! };
//! # fn run<M>(data: mlexp_core::MLSetup<usize>, model: M) -> Result<(), mlexp_core::ExperimentError>
//! # where M: mlexp_core::Model<Label = usize> + serde::Serialize + serde::de::DeserializeOwned + 'static {
//! let setup = ExperimentSetup::split(&data, 0.25, 7)?;
//! let experiment: ClassifierExperiment<M> = ClassifierExperiment::new(
//!     Classification,
//!     setup.train_data.clone(),
//!     setup.test_data.clone(),
//!     ExperimentConfig::new(),
//!     ModelIo::with_defaults(),
//! )?;
//! let model = experiment.train_model(model, &setup, None, SearchStrategy::default())?;
//! let predictions = experiment.predict(&setup, &model)?;
//! let evaluation =
//!     experiment.evaluate_predictions(setup.test_data.labels(), &predictions, None, false)?;
//! experiment.store_model(&model)?;
//! # let _ = evaluation;
//! # Ok(())
//! # }
//! ```

mod classifier;
mod config;
mod error;
mod experiment;
mod io;
mod model;
mod params;
mod processing;
mod registry;
mod regression;
mod search;
mod setup;
mod split;
mod task;

pub use classifier::{AveragedFn, ClassRoc, Classification, ClassificationMetric, RocEvaluation, ScalarFn, evaluate_roc};
pub use config::{DEFAULT_MODEL_DIR, DEFAULT_TAG, ExperimentConfig};
pub use error::{ExperimentError, ModelError};
pub use experiment::{ClassifierExperiment, ExperimentBase, RegressionExperiment};
pub use io::{
    GENERIC_EXTENSION, LoadFn, ModelIo, ModelLocation, StoreFn, default_load_model, default_store_model,
    make_directory,
};
pub use model::{Model, ParamSet, ParamValue, Persistence, format_params};
pub use params::{ParamDistribution, ParamSpace};
pub use processing::{FeaturePipeline, FeatureProcessor, ProcessData, ProcessMode};
pub use registry::{Baseline, Evaluation, MetricRegistry};
pub use regression::{Regression, RegressionMetric};
pub use search::{CandidateResult, CvResults, CvSearch, SearchOutcome, SearchStrategy};
pub use setup::{ExperimentSetup, MLSetup, Observations, Target};
pub use split::{Split, StratifiedShuffleSplit};
pub use task::Task;
