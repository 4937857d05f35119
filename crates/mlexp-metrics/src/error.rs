/// Errors from metric and scorer computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    /// Returned when a metric receives zero samples.
    #[error("metric input has zero samples")]
    EmptyInput,

    /// Returned when the truth and prediction sequences differ in length.
    #[error("truth has {truth} samples but prediction has {predicted}")]
    LengthMismatch {
        /// Number of ground-truth samples.
        truth: usize,
        /// Number of predicted samples (or probability rows).
        predicted: usize,
    },

    /// Returned when a label-based metric is handed class probabilities.
    #[error("metric {metric} requires hard label predictions")]
    LabelsRequired {
        /// Name of the metric that rejected its input.
        metric: &'static str,
    },

    /// Returned when a probability-based metric is handed hard labels.
    #[error("metric {metric} requires class probabilities")]
    ProbabilitiesRequired {
        /// Name of the metric that rejected its input.
        metric: &'static str,
    },

    /// Returned when a true label has no matching probability column.
    #[error("label {label} is out of range for {n_classes} probability columns")]
    ClassOutOfRange {
        /// The offending label.
        label: usize,
        /// Number of probability columns.
        n_classes: usize,
    },

    /// Returned when probability rows have different widths.
    #[error("probability row {row} has {got} columns, expected {expected}")]
    RaggedProbabilities {
        /// Zero-based index of the offending row.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        got: usize,
    },

    /// Returned when probability rows carry no class columns.
    #[error("{n_rows} probability rows have no class columns")]
    NoClassColumns {
        /// Number of rows supplied.
        n_rows: usize,
    },

    /// Returned when a probability is negative, NaN, or infinite.
    #[error("invalid probability {value} at row {row}, column {column}")]
    InvalidProbability {
        /// Zero-based row index.
        row: usize,
        /// Zero-based column index.
        column: usize,
        /// The offending value.
        value: f64,
    },

    /// Returned when a score or regression value is NaN or infinite.
    #[error("non-finite value at sample {index}")]
    NonFiniteValue {
        /// Zero-based index of the offending sample.
        index: usize,
    },

    /// Returned when ROC AUC is requested but the truth holds a single class.
    #[error("ROC AUC is undefined when only one class is present in the truth")]
    SingleClass,

    /// Returned when a scorer name is not known to the scoring registry.
    #[error("unknown scorer \"{name}\"")]
    UnknownScorer {
        /// The unrecognised scorer name.
        name: String,
    },
}

impl MetricError {
    /// Whether this error means the metric was given the wrong kind of
    /// prediction (labels vs. probabilities) rather than bad data.
    #[must_use]
    pub fn is_domain_error(&self) -> bool {
        matches!(
            self,
            Self::LabelsRequired { .. }
                | Self::ProbabilitiesRequired { .. }
                | Self::ClassOutOfRange { .. }
                | Self::SingleClass
        )
    }
}

/// Check that truth and prediction are non-empty and of equal length.
pub(crate) fn check_lengths(truth: usize, predicted: usize) -> Result<(), MetricError> {
    if truth == 0 {
        return Err(MetricError::EmptyInput);
    }
    if truth != predicted {
        return Err(MetricError::LengthMismatch { truth, predicted });
    }
    Ok(())
}
