//! Domain types for mlexp-io.

use std::fmt;
use std::str::FromStr;

use mlexp_core::{MLSetup, Target};

use crate::IoError;

/// Name shared by one run's artifacts.
///
/// The CLI uses it as the prefix of every `{name}_*.json` result file and
/// as the model tag, so the stored model lands at
/// `<model_dir>/<process_tag>/{name}.<ext>`. Only ASCII letters, digits,
/// `_` and `-` are allowed, which keeps the name a single path component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

impl ExperimentName {
    /// # Errors
    ///
    /// [`IoError::InvalidExperimentName`] for an empty name or one with a
    /// character outside `[a-zA-Z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, IoError> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(is_name_char) {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ExperimentName {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ExperimentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A labeled table read from disk.
///
/// Produced by [`DatasetReader`](crate::DatasetReader). `ids[i]` names the
/// row at position `i` of `data`; without an ID column the IDs are the
/// zero-based row numbers. For classification, label `c` stands for
/// `class_names[c]`; regression datasets have no class names.
#[derive(Debug, Clone)]
pub struct Dataset<L: Target> {
    ids: Vec<String>,
    data: MLSetup<L>,
    class_names: Vec<String>,
}

impl<L: Target> Dataset<L> {
    pub(crate) fn new(ids: Vec<String>, data: MLSetup<L>, class_names: Vec<String>) -> Self {
        Self { ids, data, class_names }
    }

    /// Row identifiers in file order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Observations and labels.
    #[must_use]
    pub fn data(&self) -> &MLSetup<L> {
        &self.data
    }

    /// Take the observations and labels.
    #[must_use]
    pub fn into_data(self) -> MLSetup<L> {
        self.data
    }

    /// Class names, sorted; empty for regression targets.
    #[must_use]
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.ids.len()
    }
}

impl Dataset<usize> {
    /// Name of an encoded class label.
    #[must_use]
    pub fn class_name(&self, label: usize) -> Option<&str> {
        self.class_names.get(label).map(String::as_str)
    }
}
