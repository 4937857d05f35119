//! Seeded stratified shuffle splits for cross-validation.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::ExperimentError;
use crate::setup::Target;

/// Positions of one train/test split, each ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Training positions.
    pub train: Vec<usize>,
    /// Held-out positions.
    pub test: Vec<usize>,
}

/// Repeated randomized train/test splits that keep class proportions.
///
/// Every call to [`split`](Self::split) starts from a fresh generator seeded
/// with the configured seed, so the same labels always produce the same
/// splits. Targets without a stratum (continuous labels) are shuffled as a
/// single group.
///
/// Construct via [`StratifiedShuffleSplit::new`], then chain `with_seed`.
#[derive(Debug, Clone)]
pub struct StratifiedShuffleSplit {
    n_splits: usize,
    test_fraction: f64,
    seed: u64,
}

impl StratifiedShuffleSplit {
    /// Create a splitter producing `n_splits` splits with the given test share.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ExperimentError::InvalidSplitCount`] | `n_splits == 0` |
    /// | [`ExperimentError::InvalidSplitFraction`] | `test_fraction` not in (0.0, 1.0) |
    pub fn new(n_splits: usize, test_fraction: f64) -> Result<Self, ExperimentError> {
        if n_splits == 0 {
            return Err(ExperimentError::InvalidSplitCount { n_splits });
        }
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ExperimentError::InvalidSplitFraction {
                fraction: test_fraction,
            });
        }
        Ok(Self {
            n_splits,
            test_fraction,
            seed: 42,
        })
    }

    /// Set the seed for shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of splits produced per call.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Fraction of each stratum held out.
    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Configured seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Produce the splits for the given labels.
    ///
    /// Each stratum contributes `round(test_fraction * size)` samples to the
    /// test side, clamped so both sides receive at least one.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ExperimentError::TooFewSamplesForSplit`] | A class has fewer than 2 samples |
    /// | [`ExperimentError::DegenerateSplit`] | Fewer than 2 unstratified samples |
    pub fn split<L: Target>(&self, labels: &[L]) -> Result<Vec<Split>, ExperimentError> {
        let mut strata: BTreeMap<Option<usize>, Vec<usize>> = BTreeMap::new();
        for (i, label) in labels.iter().enumerate() {
            strata.entry(label.stratum()).or_default().push(i);
        }

        if labels.len() < 2 {
            return Err(ExperimentError::DegenerateSplit {
                n_samples: labels.len(),
                fraction: self.test_fraction,
            });
        }
        for (key, positions) in &strata {
            if let Some(stratum) = *key
                && positions.len() < 2
            {
                return Err(ExperimentError::TooFewSamplesForSplit {
                    stratum,
                    count: positions.len(),
                });
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut splits = Vec::with_capacity(self.n_splits);
        for _ in 0..self.n_splits {
            let mut train = Vec::with_capacity(labels.len());
            let mut test = Vec::new();
            for positions in strata.values() {
                let mut shuffled = positions.clone();
                shuffled.shuffle(&mut rng);
                let n_test = self.test_count(shuffled.len());
                test.extend_from_slice(&shuffled[..n_test]);
                train.extend_from_slice(&shuffled[n_test..]);
            }
            train.sort_unstable();
            test.sort_unstable();
            splits.push(Split { train, test });
        }

        debug!(
            n_splits = self.n_splits,
            n_strata = strata.len(),
            n_test = splits[0].test.len(),
            "shuffle splits generated"
        );
        Ok(splits)
    }

    fn test_count(&self, size: usize) -> usize {
        let raw = (self.test_fraction * size as f64).round() as usize;
        raw.clamp(1, size - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<usize> {
        let mut labels = vec![0usize; 30];
        labels.extend(vec![1usize; 20]);
        labels.extend(vec![2usize; 10]);
        labels
    }

    #[test]
    fn class_proportions_preserved() {
        let splitter = StratifiedShuffleSplit::new(3, 0.4).unwrap().with_seed(7);
        let labels = labels();
        for split in splitter.split(&labels).unwrap() {
            let count = |class: usize| split.test.iter().filter(|&&i| labels[i] == class).count();
            assert_eq!(count(0), 12);
            assert_eq!(count(1), 8);
            assert_eq!(count(2), 4);
            assert_eq!(split.train.len() + split.test.len(), labels.len());
        }
    }

    #[test]
    fn repeated_calls_are_identical() {
        let splitter = StratifiedShuffleSplit::new(5, 0.4).unwrap().with_seed(100);
        let labels = labels();
        assert_eq!(splitter.split(&labels).unwrap(), splitter.split(&labels).unwrap());
    }

    #[test]
    fn splits_differ_from_each_other() {
        let splitter = StratifiedShuffleSplit::new(2, 0.4).unwrap();
        let splits = splitter.split(&labels()).unwrap();
        assert_ne!(splits[0], splits[1]);
    }

    #[test]
    fn seeds_change_the_splits() {
        let labels = labels();
        let a = StratifiedShuffleSplit::new(1, 0.4).unwrap().with_seed(1);
        let b = StratifiedShuffleSplit::new(1, 0.4).unwrap().with_seed(2);
        assert_ne!(a.split(&labels).unwrap(), b.split(&labels).unwrap());
    }

    #[test]
    fn singleton_class_rejected() {
        let splitter = StratifiedShuffleSplit::new(1, 0.5).unwrap();
        let err = splitter.split(&[0usize, 0, 1]).unwrap_err();
        assert!(matches!(err, ExperimentError::TooFewSamplesForSplit { stratum: 1, count: 1 }));
    }

    #[test]
    fn tiny_class_keeps_both_sides() {
        let splitter = StratifiedShuffleSplit::new(1, 0.1).unwrap();
        let split = &splitter.split(&[0usize, 0, 1, 1]).unwrap()[0];
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 2);
    }

    #[test]
    fn invalid_configuration() {
        assert!(StratifiedShuffleSplit::new(0, 0.4).is_err());
        assert!(StratifiedShuffleSplit::new(3, 0.0).is_err());
        assert!(StratifiedShuffleSplit::new(3, 1.0).is_err());
        assert!(StratifiedShuffleSplit::new(3, f64::NAN).is_err());
    }

    #[test]
    fn continuous_targets_unstratified() {
        let targets: Vec<f64> = (0..10).map(f64::from).collect();
        let splitter = StratifiedShuffleSplit::new(1, 0.2).unwrap();
        let split = &splitter.split(&targets).unwrap()[0];
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);
    }
}
