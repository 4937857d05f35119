//! Typed data carriers: observation tables, labelled setups and train/test pairs.

use std::collections::HashSet;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;
use crate::split::StratifiedShuffleSplit;

/// A label type an experiment can train on.
pub trait Target:
    Clone + PartialEq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Stratum used to balance shuffle splits, or `None` for unstratified targets.
    fn stratum(&self) -> Option<usize>;
}

/// Class labels stratify by class.
impl Target for usize {
    fn stratum(&self) -> Option<usize> {
        Some(*self)
    }
}

/// Continuous targets are split without stratification.
impl Target for f64 {
    fn stratum(&self) -> Option<usize> {
        None
    }
}

/// A feature table: named columns, one row per observation, and a row index.
///
/// The index identifies each row across splits and transformations, so
/// train/test leakage can be detected after processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    columns: Vec<String>,
    index: Vec<usize>,
    rows: Vec<Vec<f64>>,
}

impl Observations {
    /// Build a table with the default index `0..rows.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::RowWidthMismatch`] if a row's width differs
    /// from the number of columns.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, ExperimentError> {
        let index = (0..rows.len()).collect();
        Self::with_index(columns, index, rows)
    }

    /// Build a table with an explicit row index.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ExperimentError::IndexLengthMismatch`] | `index.len() != rows.len()` |
    /// | [`ExperimentError::RowWidthMismatch`] | A row's width differs from the column count |
    pub fn with_index(
        columns: Vec<String>,
        index: Vec<usize>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, ExperimentError> {
        if index.len() != rows.len() {
            return Err(ExperimentError::IndexLengthMismatch {
                index: index.len(),
                rows: rows.len(),
            });
        }
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(ExperimentError::RowWidthMismatch {
                row,
                expected: columns.len(),
                got: values.len(),
            });
        }
        Ok(Self {
            columns,
            index,
            rows,
        })
    }

    /// Replace the feature columns while keeping this table's row index.
    ///
    /// # Errors
    ///
    /// Same as [`Observations::with_index`].
    pub fn with_features(
        &self,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, ExperimentError> {
        Self::with_index(columns, self.index.clone(), rows)
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row index values.
    #[must_use]
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Feature rows (row-major).
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Copy the rows at the given positions, preserving their index values.
    ///
    /// # Panics
    ///
    /// Panics if a position is out of bounds.
    #[must_use]
    pub fn select(&self, positions: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            index: positions.iter().map(|&p| self.index[p]).collect(),
            rows: positions.iter().map(|&p| self.rows[p].clone()).collect(),
        }
    }
}

/// Observations paired with one label per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLSetup<L> {
    observations: Observations,
    labels: Vec<L>,
}

impl<L: Target> MLSetup<L> {
    /// Pair a table with its labels.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::LabelCountMismatch`] when the label count
    /// differs from the row count.
    pub fn new(observations: Observations, labels: Vec<L>) -> Result<Self, ExperimentError> {
        if labels.len() != observations.n_rows() {
            return Err(ExperimentError::LabelCountMismatch {
                labels: labels.len(),
                rows: observations.n_rows(),
            });
        }
        Ok(Self {
            observations,
            labels,
        })
    }

    /// The observation table.
    #[must_use]
    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    /// The labels, aligned with the observation rows.
    #[must_use]
    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    /// Number of labelled samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Copy the samples at the given positions.
    ///
    /// # Panics
    ///
    /// Panics if a position is out of bounds.
    #[must_use]
    pub fn select(&self, positions: &[usize]) -> Self {
        Self {
            observations: self.observations.select(positions),
            labels: positions.iter().map(|&p| self.labels[p].clone()).collect(),
        }
    }
}

/// A train/test pair of labelled setups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSetup<L> {
    /// Data the model is fitted on.
    pub train_data: MLSetup<L>,
    /// Held-out data the model is evaluated on.
    pub test_data: MLSetup<L>,
}

impl<L: Target> ExperimentSetup<L> {
    /// Pair train and test data, rejecting shared row indices.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::OverlappingRows`] if any row index occurs
    /// on both sides.
    pub fn new(train_data: MLSetup<L>, test_data: MLSetup<L>) -> Result<Self, ExperimentError> {
        let setup = Self::new_unchecked(train_data, test_data);
        let overlap = setup.overlapping_rows();
        if !overlap.is_empty() {
            return Err(ExperimentError::OverlappingRows {
                count: overlap.len(),
            });
        }
        Ok(setup)
    }

    /// Pair train and test data without the leakage check.
    #[must_use]
    pub fn new_unchecked(train_data: MLSetup<L>, test_data: MLSetup<L>) -> Self {
        Self {
            train_data,
            test_data,
        }
    }

    /// Row indices present in both train and test, ascending.
    #[must_use]
    pub fn overlapping_rows(&self) -> Vec<usize> {
        let train: HashSet<usize> = self.train_data.observations.index.iter().copied().collect();
        let mut shared: Vec<usize> = self
            .test_data
            .observations
            .index
            .iter()
            .copied()
            .filter(|i| train.contains(i))
            .collect();
        shared.sort_unstable();
        shared.dedup();
        shared
    }

    /// Split one labelled setup into a disjoint train/test pair.
    ///
    /// Class labels are stratified so each class keeps roughly the same
    /// share on both sides; continuous targets are shuffled as one group.
    ///
    /// # Errors
    ///
    /// Any error of [`StratifiedShuffleSplit::new`] or
    /// [`StratifiedShuffleSplit::split`].
    pub fn split(data: &MLSetup<L>, test_fraction: f64, seed: u64) -> Result<Self, ExperimentError> {
        let splitter = StratifiedShuffleSplit::new(1, test_fraction)?.with_seed(seed);
        let mut splits = splitter.split(data.labels())?;
        let split = splits.remove(0);
        Ok(Self::new_unchecked(
            data.select(&split.train),
            data.select(&split.test),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: usize) -> Observations {
        let rows = (0..n).map(|i| vec![i as f64, (i * 2) as f64]).collect();
        Observations::new(vec!["a".into(), "b".into()], rows).unwrap()
    }

    #[test]
    fn label_count_must_match_rows() {
        let err = MLSetup::new(table(3), vec![0usize, 1]).unwrap_err();
        assert!(matches!(err, ExperimentError::LabelCountMismatch { labels: 2, rows: 3 }));
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = Observations::new(vec!["a".into()], vec![vec![1.0], vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, ExperimentError::RowWidthMismatch { row: 1, expected: 1, got: 2 }));
    }

    #[test]
    fn select_preserves_index() {
        let obs = table(5).select(&[4, 1]);
        assert_eq!(obs.index(), &[4, 1]);
        assert_eq!(obs.rows()[0], vec![4.0, 8.0]);
    }

    #[test]
    fn disjoint_setup_accepted() {
        let data = MLSetup::new(table(6), vec![0usize, 1, 0, 1, 0, 1]).unwrap();
        let setup = ExperimentSetup::new(data.select(&[0, 1, 2, 3]), data.select(&[4, 5])).unwrap();
        assert!(setup.overlapping_rows().is_empty());
    }

    #[test]
    fn overlapping_setup_detected() {
        let data = MLSetup::new(table(6), vec![0usize, 1, 0, 1, 0, 1]).unwrap();
        let train = data.select(&[0, 1, 2, 3]);
        let test = data.select(&[3, 4]);
        let unchecked = ExperimentSetup::new_unchecked(train.clone(), test.clone());
        assert_eq!(unchecked.overlapping_rows(), vec![3]);
        let err = ExperimentSetup::new(train, test).unwrap_err();
        assert!(matches!(err, ExperimentError::OverlappingRows { count: 1 }));
    }

    #[test]
    fn split_is_disjoint_and_complete() {
        let labels: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let data = MLSetup::new(table(20), labels).unwrap();
        let setup = ExperimentSetup::split(&data, 0.25, 3).unwrap();
        assert!(setup.overlapping_rows().is_empty());
        assert_eq!(setup.train_data.n_samples() + setup.test_data.n_samples(), 20);
        let test_ones = setup.test_data.labels().iter().filter(|&&l| l == 1).count();
        assert_eq!(test_ones * 2, setup.test_data.n_samples());
    }

    #[test]
    fn regression_targets_split_unstratified() {
        let labels: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let data = MLSetup::new(table(10), labels).unwrap();
        let setup = ExperimentSetup::split(&data, 0.3, 9).unwrap();
        assert_eq!(setup.test_data.n_samples(), 3);
        assert!(setup.overlapping_rows().is_empty());
    }
}
