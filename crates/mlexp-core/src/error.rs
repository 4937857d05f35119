use std::path::PathBuf;

use mlexp_metrics::MetricError;

/// Errors raised by a model implementation.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when a model is asked for a capability it does not have.
    #[error("model does not support {operation}")]
    Unsupported {
        /// The unsupported operation, e.g. `predict_proba`.
        operation: &'static str,
    },

    /// Returned when predicting before `fit` was called.
    #[error("model has not been fitted")]
    NotFitted,

    /// Returned when a parameter name is not recognised by the model.
    #[error("unknown parameter \"{name}\"")]
    UnknownParameter {
        /// The unrecognised parameter name.
        name: String,
    },

    /// Returned when a parameter value has the wrong type or range.
    #[error("invalid value {value} for parameter \"{name}\"")]
    InvalidParameter {
        /// The parameter name.
        name: String,
        /// The rejected value, rendered for display.
        value: String,
    },

    /// Returned when fit or predict input is unusable.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable description of the problem.
        reason: String,
    },

    /// Returned when a model's native save or load routine fails.
    #[error("native model persistence failed for {path}")]
    NativePersistence {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors from the experiment lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    /// Returned when a lifecycle step has no concrete implementation.
    #[error("{operation} is not implemented for this experiment")]
    NotImplemented {
        /// The lifecycle step that was invoked.
        operation: &'static str,
    },

    /// Returned when CV search is requested without a standard scoring metric.
    #[error("no standard metric has been configured; use a classifier or regression experiment, or set one explicitly")]
    StandardMetricNotConfigured,

    /// Returned when baseline evaluation is requested without a baseline value.
    #[error("baseline evaluation requested but no baseline prediction is configured")]
    NoBaselineConfigured,

    /// Returned when ROC evaluation receives one or fewer probability records.
    #[error("ROC evaluation needs more than one probability record, got {records}")]
    InsufficientData {
        /// Number of records supplied.
        records: usize,
    },

    /// Returned when label and observation counts disagree.
    #[error("{labels} labels for {rows} observation rows")]
    LabelCountMismatch {
        /// Number of labels.
        labels: usize,
        /// Number of observation rows.
        rows: usize,
    },

    /// Returned when an observation row has a different width than the header.
    #[error("observation row {row} has {got} values, expected {expected}")]
    RowWidthMismatch {
        /// Zero-based row position.
        row: usize,
        /// Number of columns.
        expected: usize,
        /// Number of values in the row.
        got: usize,
    },

    /// Returned when the observation index and rows differ in length.
    #[error("index has {index} entries for {rows} observation rows")]
    IndexLengthMismatch {
        /// Number of index entries.
        index: usize,
        /// Number of rows.
        rows: usize,
    },

    /// Returned when train and test share row indices.
    #[error("train and test share {count} row indices")]
    OverlappingRows {
        /// Size of the intersection.
        count: usize,
    },

    /// Returned when a split fraction is not strictly between 0 and 1.
    #[error("split fraction must be in (0.0, 1.0), got {fraction}")]
    InvalidSplitFraction {
        /// The rejected fraction.
        fraction: f64,
    },

    /// Returned when the CV split count is zero.
    #[error("cv split count must be at least 1, got {n_splits}")]
    InvalidSplitCount {
        /// The rejected count.
        n_splits: usize,
    },

    /// Returned when a storage tag is empty or would escape the model directory.
    #[error("invalid tag \"{tag}\": must be non-empty and free of path separators")]
    InvalidTag {
        /// The rejected tag.
        tag: String,
    },

    /// Returned when a stratum has too few samples to appear in both sides of a split.
    #[error("stratum {stratum} has only {count} samples, need at least 2 for a stratified split")]
    TooFewSamplesForSplit {
        /// The stratum key (class label).
        stratum: usize,
        /// Number of samples in it.
        count: usize,
    },

    /// Returned when a split leaves the train or test side empty.
    #[error("a split of {n_samples} samples with test fraction {fraction} leaves one side empty")]
    DegenerateSplit {
        /// Number of samples being split.
        n_samples: usize,
        /// Requested test fraction.
        fraction: f64,
    },

    /// Returned when a search is given an empty parameter space.
    #[error("parameter space is empty")]
    EmptyParameterSpace,

    /// Returned when a parameter entry offers no candidate values.
    #[error("parameter \"{name}\" has no candidate values")]
    EmptyCandidates {
        /// The parameter name.
        name: String,
    },

    /// Returned when a sampling distribution has an empty or invalid range.
    #[error("parameter \"{name}\" has an invalid range [{low}, {high})")]
    InvalidDistribution {
        /// The parameter name.
        name: String,
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },

    /// Returned when grid search meets a continuous distribution.
    #[error("grid search needs explicit candidate values, parameter \"{name}\" is a distribution")]
    ContinuousGridParameter {
        /// The parameter name.
        name: String,
    },

    /// Returned when a randomized search is given a zero iteration budget.
    #[error("randomized search needs at least one iteration")]
    ZeroIterations,

    /// Returned when removing a metric that was never registered.
    #[error("metric \"{name}\" is not registered")]
    MetricNotRegistered {
        /// The metric name.
        name: String,
    },

    /// Returned when a baseline's length does not match the labels it is scored against.
    #[error("baseline has {baseline} predictions for {labels} labels")]
    BaselineLengthMismatch {
        /// Number of baseline predictions.
        baseline: usize,
        /// Number of labels.
        labels: usize,
    },

    /// Wraps a model failure.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Wraps a scoring failure.
    #[error("metric error: {0}")]
    Metric(#[from] MetricError),

    /// Returned when the model directory cannot be created.
    #[error("cannot create model directory {path}")]
    CreateModelDir {
        /// Directory that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a feature processor's persisted state is unusable.
    #[error("feature processing failed: {reason}")]
    Processing {
        /// Human-readable description of the failure.
        reason: String,
    },
}
