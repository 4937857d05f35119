//! Hyperparameter spaces for grid and randomized search.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ExperimentError;
use crate::model::{ParamSet, ParamValue};

/// Candidate values for one hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamDistribution {
    /// An explicit list of candidates.
    Values(Vec<ParamValue>),
    /// Floats drawn uniformly from `[low, high)`.
    Uniform {
        /// Inclusive lower bound.
        low: f64,
        /// Exclusive upper bound.
        high: f64,
    },
    /// Floats whose logarithm is uniform on `[ln low, ln high)`.
    LogUniform {
        /// Inclusive lower bound, must be positive.
        low: f64,
        /// Exclusive upper bound.
        high: f64,
    },
    /// Integers drawn uniformly from `[low, high)`.
    IntRange {
        /// Inclusive lower bound.
        low: i64,
        /// Exclusive upper bound.
        high: i64,
    },
}

/// `rng.gen_range(low..high)` panics unless the bounds and their width are finite.
fn is_sampling_range(low: f64, high: f64) -> bool {
    low.is_finite() && high.is_finite() && low < high && (high - low).is_finite()
}

impl ParamDistribution {
    fn validate(&self, name: &str) -> Result<(), ExperimentError> {
        let (low, high, ok) = match *self {
            Self::Values(ref values) => {
                if values.is_empty() {
                    return Err(ExperimentError::EmptyCandidates {
                        name: name.to_string(),
                    });
                }
                return Ok(());
            }
            Self::Uniform { low, high } => (low, high, is_sampling_range(low, high)),
            Self::LogUniform { low, high } => (
                low,
                high,
                low > 0.0 && high.is_finite() && is_sampling_range(low.ln(), high.ln()),
            ),
            Self::IntRange { low, high } => (low as f64, high as f64, low < high),
        };
        if ok {
            Ok(())
        } else {
            Err(ExperimentError::InvalidDistribution {
                name: name.to_string(),
                low,
                high,
            })
        }
    }

    /// Callers must have validated the distribution first.
    fn sample<R: Rng>(&self, rng: &mut R) -> ParamValue {
        match *self {
            Self::Values(ref values) => values[rng.gen_range(0..values.len())].clone(),
            Self::Uniform { low, high } => ParamValue::Float(rng.gen_range(low..high)),
            Self::LogUniform { low, high } => {
                ParamValue::Float(rng.gen_range(low.ln()..high.ln()).exp())
            }
            Self::IntRange { low, high } => ParamValue::Int(rng.gen_range(low..high)),
        }
    }
}

/// Named hyperparameter candidates, iterated in name order.
///
/// Construct via [`ParamSpace::new`], then chain `with_values` or
/// `with_distribution`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpace {
    entries: BTreeMap<String, ParamDistribution>,
}

impl ParamSpace {
    /// Create an empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with an explicit candidate list.
    #[must_use]
    pub fn with_values<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.entries.insert(name.into(), ParamDistribution::Values(values));
        self
    }

    /// Add a parameter sampled from a distribution.
    #[must_use]
    pub fn with_distribution(mut self, name: impl Into<String>, distribution: ParamDistribution) -> Self {
        self.entries.insert(name.into(), distribution);
        self
    }

    /// Whether no parameters are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of parameters defined.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over `(name, distribution)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamDistribution)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check the space is non-empty and every entry is usable.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ExperimentError::EmptyParameterSpace`] | No parameters |
    /// | [`ExperimentError::EmptyCandidates`] | A candidate list is empty |
    /// | [`ExperimentError::InvalidDistribution`] | A range is empty or non-finite |
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.entries.is_empty() {
            return Err(ExperimentError::EmptyParameterSpace);
        }
        for (name, distribution) in &self.entries {
            distribution.validate(name)?;
        }
        Ok(())
    }

    /// Every combination of the candidate lists, last parameter varying fastest.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::ContinuousGridParameter`] if any entry is a
    /// distribution, plus any error of [`ParamSpace::validate`].
    pub fn grid(&self) -> Result<Vec<ParamSet>, ExperimentError> {
        self.validate()?;
        let mut grid = vec![ParamSet::new()];
        for (name, distribution) in &self.entries {
            let ParamDistribution::Values(values) = distribution else {
                return Err(ExperimentError::ContinuousGridParameter { name: name.clone() });
            };
            grid = grid
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |value| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(grid)
    }

    /// Draw `n_iter` candidate assignments.
    ///
    /// When every entry is a list, candidates are drawn from the grid without
    /// replacement; a budget larger than the grid yields the whole grid in
    /// shuffled order. Otherwise each parameter is sampled independently.
    ///
    /// # Errors
    ///
    /// [`ExperimentError::ZeroIterations`] if `n_iter == 0`, plus any error of
    /// [`ParamSpace::validate`].
    pub fn sample<R: Rng>(&self, n_iter: usize, rng: &mut R) -> Result<Vec<ParamSet>, ExperimentError> {
        if n_iter == 0 {
            return Err(ExperimentError::ZeroIterations);
        }
        self.validate()?;

        let all_lists = self
            .entries
            .values()
            .all(|d| matches!(d, ParamDistribution::Values(_)));
        if all_lists {
            let grid = self.grid()?;
            if n_iter > grid.len() {
                warn!(
                    n_iter,
                    grid_size = grid.len(),
                    "iteration budget exceeds grid size, sampling the whole grid"
                );
            }
            let amount = n_iter.min(grid.len());
            return Ok(index::sample(rng, grid.len(), amount)
                .into_iter()
                .map(|i| grid[i].clone())
                .collect());
        }

        Ok((0..n_iter)
            .map(|_| {
                self.entries
                    .iter()
                    .map(|(name, distribution)| (name.clone(), distribution.sample(rng)))
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn space() -> ParamSpace {
        ParamSpace::new()
            .with_values("k", [1, 3, 5])
            .with_values("weights", ["uniform", "distance"])
    }

    #[test]
    fn grid_is_cartesian_product() {
        let grid = space().grid().unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0]["k"], ParamValue::Int(1));
        assert_eq!(grid[0]["weights"], ParamValue::from("uniform"));
        assert_eq!(grid[1]["weights"], ParamValue::from("distance"));
        assert_eq!(grid[5]["k"], ParamValue::Int(5));
    }

    #[test]
    fn grid_rejects_distributions() {
        let space = space().with_distribution("alpha", ParamDistribution::Uniform { low: 0.0, high: 1.0 });
        let err = space.grid().unwrap_err();
        assert!(matches!(err, ExperimentError::ContinuousGridParameter { ref name } if name == "alpha"));
    }

    #[test]
    fn list_sampling_is_without_replacement() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let samples = space().sample(4, &mut rng).unwrap();
        assert_eq!(samples.len(), 4);
        for (i, a) in samples.iter().enumerate() {
            for b in &samples[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn oversized_budget_capped_at_grid() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(space().sample(50, &mut rng).unwrap().len(), 6);
    }

    #[test]
    fn distributions_sample_in_range() {
        let space = ParamSpace::new()
            .with_distribution("alpha", ParamDistribution::LogUniform { low: 1e-3, high: 1.0 })
            .with_distribution("depth", ParamDistribution::IntRange { low: 2, high: 5 });
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for params in space.sample(30, &mut rng).unwrap() {
            let alpha = params["alpha"].as_f64().unwrap();
            assert!((1e-3..1.0).contains(&alpha));
            let depth = params["depth"].as_usize().unwrap();
            assert!((2..5).contains(&depth));
        }
    }

    #[test]
    fn invalid_spaces_rejected() {
        assert!(matches!(ParamSpace::new().grid(), Err(ExperimentError::EmptyParameterSpace)));
        let empty_list = ParamSpace::new().with_values("k", Vec::<i64>::new());
        assert!(matches!(empty_list.grid(), Err(ExperimentError::EmptyCandidates { .. })));
        let bad_range = ParamSpace::new().with_distribution("k", ParamDistribution::IntRange { low: 3, high: 3 });
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            bad_range.sample(2, &mut rng),
            Err(ExperimentError::InvalidDistribution { .. })
        ));
        assert!(matches!(space().sample(0, &mut rng), Err(ExperimentError::ZeroIterations)));
    }

    #[test]
    fn overflowing_float_ranges_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let wide = ParamSpace::new().with_distribution(
            "alpha",
            ParamDistribution::Uniform { low: -f64::MAX, high: f64::MAX },
        );
        assert!(matches!(
            wide.sample(1, &mut rng),
            Err(ExperimentError::InvalidDistribution { ref name, .. }) if name == "alpha"
        ));

        let full = ParamSpace::new().with_distribution(
            "alpha",
            ParamDistribution::LogUniform { low: f64::MIN_POSITIVE, high: f64::MAX },
        );
        assert_eq!(full.sample(5, &mut rng).unwrap().len(), 5);
    }
}
