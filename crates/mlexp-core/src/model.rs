//! The estimator contract experiments train, search and persist.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use mlexp_metrics::ProbabilityMatrix;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::setup::{Observations, Target};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean switch.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Free-form text, e.g. a strategy name.
    Text(String),
}

impl ParamValue {
    /// The value as a non-negative integer, if it is one.
    #[must_use]
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }

    /// The value as a float; integers are widened.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The value as text, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One concrete hyperparameter assignment.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Render a parameter set as `a=1, b=x`.
#[must_use]
pub fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// How a model type is written to and read from disk by default.
pub enum Persistence<M> {
    /// The model has its own on-disk format.
    Native {
        /// File extension of the native format, without the dot.
        extension: &'static str,
        /// Write the model to the given path.
        save: fn(&M, &Path) -> Result<(), ModelError>,
        /// Read a model from the given path.
        load: fn(&Path) -> Result<M, ModelError>,
    },
    /// Fall back to generic binary serialization.
    Generic,
}

impl<M> Clone for Persistence<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Persistence<M> {}

impl<M> fmt::Debug for Persistence<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { extension, .. } => {
                f.debug_struct("Native").field("extension", extension).finish_non_exhaustive()
            }
            Self::Generic => f.write_str("Generic"),
        }
    }
}

/// A trainable estimator.
///
/// Models are cloned once per search candidate, so `Clone` should produce an
/// independent, unfitted-or-fitted copy with the same hyperparameters.
pub trait Model: Clone + Send + Sync {
    /// The target type the model predicts.
    type Label: Target;

    /// Fit on the observations and their labels.
    ///
    /// # Errors
    ///
    /// Implementation-specific [`ModelError`]s.
    fn fit(&mut self, observations: &Observations, labels: &[Self::Label]) -> Result<(), ModelError>;

    /// Predict one label per observation row.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotFitted`] before `fit`, or implementation-specific errors.
    fn predict(&self, observations: &Observations) -> Result<Vec<Self::Label>, ModelError>;

    /// Class probability estimates, one row per observation.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Unsupported`] unless overridden.
    fn predict_proba(&self, _observations: &Observations) -> Result<ProbabilityMatrix, ModelError> {
        Err(ModelError::Unsupported {
            operation: "predict_proba",
        })
    }

    /// Set one hyperparameter by name.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownParameter`] or [`ModelError::InvalidParameter`].
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ModelError>;

    /// Apply every assignment in `params`.
    ///
    /// # Errors
    ///
    /// The first error from [`Model::set_param`].
    fn set_params(&mut self, params: &ParamSet) -> Result<(), ModelError> {
        for (name, value) in params {
            self.set_param(name, value)?;
        }
        Ok(())
    }

    /// The default on-disk format for this model type.
    fn persistence() -> Persistence<Self> {
        Persistence::Generic
    }
}
