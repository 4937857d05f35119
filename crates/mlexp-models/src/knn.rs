//! k-nearest-neighbors classification and regression.

use mlexp_core::{Model, ModelError, Observations, ParamValue};
use mlexp_metrics::ProbabilityMatrix;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{check_training, check_width, invalid_parameter, squared_euclidean};

/// How neighbor votes are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weights {
    /// Every neighbor counts once.
    Uniform,
    /// Neighbors count by inverse distance; exact matches take all the weight.
    Distance,
}

impl Weights {
    fn from_param(name: &str, value: &ParamValue) -> Result<Self, ModelError> {
        match value.as_str() {
            Some("uniform") => Ok(Self::Uniform),
            Some("distance") => Ok(Self::Distance),
            _ => Err(invalid_parameter(name, value)),
        }
    }
}

/// Stored training rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Memory<L> {
    rows: Vec<Vec<f64>>,
    labels: Vec<L>,
    n_features: usize,
}

impl<L: Clone> Memory<L> {
    fn fit(observations: &Observations, labels: &[L]) -> Result<Self, ModelError> {
        check_training(observations, labels)?;
        Ok(Self {
            rows: observations.rows().to_vec(),
            labels: labels.to_vec(),
            n_features: observations.n_features(),
        })
    }

    fn is_fitted(&self) -> bool {
        !self.rows.is_empty()
    }

    /// The `k` nearest stored rows as `(position, distance)`, closest first.
    /// Equal distances keep training order.
    fn neighbors(&self, sample: &[f64], k: usize) -> Vec<(usize, f64)> {
        let mut distances: Vec<(usize, f64)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i, squared_euclidean(sample, row).sqrt()))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances.truncate(k);
        distances
    }
}

/// Per-neighbor weights for the given strategy.
fn neighbor_weights(neighbors: &[(usize, f64)], weights: Weights) -> Vec<f64> {
    match weights {
        Weights::Uniform => vec![1.0; neighbors.len()],
        Weights::Distance => {
            if neighbors.iter().any(|&(_, d)| d == 0.0) {
                neighbors
                    .iter()
                    .map(|&(_, d)| if d == 0.0 { 1.0 } else { 0.0 })
                    .collect()
            } else {
                neighbors.iter().map(|&(_, d)| 1.0 / d).collect()
            }
        }
    }
}

fn set_common_param(k: &mut usize, weights: &mut Weights, name: &str, value: &ParamValue) -> Result<(), ModelError> {
    match name {
        "n_neighbors" => {
            *k = value
                .as_usize()
                .filter(|&k| k > 0)
                .ok_or_else(|| invalid_parameter(name, value))?;
            Ok(())
        }
        "weights" => {
            *weights = Weights::from_param(name, value)?;
            Ok(())
        }
        _ => Err(ModelError::UnknownParameter { name: name.to_string() }),
    }
}

/// Classifier voting among the `k` nearest training rows.
///
/// Labels must be class indices `0..n_classes`. Probabilities are the
/// weighted vote shares; predictions are the class with the largest share,
/// lowest class on ties.
///
/// # Parameters
///
/// | Name          | Value                        | Default     |
/// |---------------|------------------------------|-------------|
/// | `n_neighbors` | integer >= 1                 | 5           |
/// | `weights`     | `"uniform"` or `"distance"`  | `"uniform"` |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNeighborsClassifier {
    k: usize,
    weights: Weights,
    memory: Memory<usize>,
    n_classes: usize,
}

impl KNeighborsClassifier {
    /// Create an unfitted classifier.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidParameter`] if `k` is zero.
    pub fn new(k: usize) -> Result<Self, ModelError> {
        if k == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: k.to_string(),
            });
        }
        Ok(Self {
            k,
            weights: Weights::Uniform,
            memory: Memory::default(),
            n_classes: 0,
        })
    }

    /// Set the vote weighting.
    #[must_use]
    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    /// Number of neighbors consulted.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Vote weighting.
    #[must_use]
    pub fn weights(&self) -> Weights {
        self.weights
    }

    /// Number of classes seen during fit.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn vote(&self, sample: &[f64]) -> Vec<f64> {
        let neighbors = self.memory.neighbors(sample, self.k);
        let weights = neighbor_weights(&neighbors, self.weights);
        let mut votes = vec![0.0; self.n_classes];
        for (&(i, _), w) in neighbors.iter().zip(weights) {
            votes[self.memory.labels[i]] += w;
        }
        let total: f64 = votes.iter().sum();
        votes.iter_mut().for_each(|v| *v /= total);
        votes
    }
}

impl Model for KNeighborsClassifier {
    type Label = usize;

    fn fit(&mut self, observations: &Observations, labels: &[usize]) -> Result<(), ModelError> {
        self.memory = Memory::fit(observations, labels)?;
        self.n_classes = labels.iter().max().map_or(0, |&m| m + 1);
        debug!(
            n_samples = labels.len(),
            n_classes = self.n_classes,
            k = self.k,
            "k-neighbors classifier fitted"
        );
        Ok(())
    }

    fn predict(&self, observations: &Observations) -> Result<Vec<usize>, ModelError> {
        Ok(self.predict_proba(observations)?.argmax())
    }

    fn predict_proba(&self, observations: &Observations) -> Result<ProbabilityMatrix, ModelError> {
        if !self.memory.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        check_width(observations, self.memory.n_features)?;
        let rows: Vec<Vec<f64>> = observations
            .rows()
            .par_iter()
            .map(|sample| self.vote(sample))
            .collect();
        ProbabilityMatrix::from_rows(rows).map_err(|e| ModelError::InvalidInput { reason: e.to_string() })
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ModelError> {
        set_common_param(&mut self.k, &mut self.weights, name, value)
    }
}

/// Regressor averaging the targets of the `k` nearest training rows.
///
/// Accepts the same parameters as [`KNeighborsClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNeighborsRegressor {
    k: usize,
    weights: Weights,
    memory: Memory<f64>,
}

impl KNeighborsRegressor {
    /// Create an unfitted regressor.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidParameter`] if `k` is zero.
    pub fn new(k: usize) -> Result<Self, ModelError> {
        if k == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: k.to_string(),
            });
        }
        Ok(Self {
            k,
            weights: Weights::Uniform,
            memory: Memory::default(),
        })
    }

    /// Set the neighbor weighting.
    #[must_use]
    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    /// Number of neighbors consulted.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    fn estimate(&self, sample: &[f64]) -> f64 {
        let neighbors = self.memory.neighbors(sample, self.k);
        let weights = neighbor_weights(&neighbors, self.weights);
        let total: f64 = weights.iter().sum();
        neighbors
            .iter()
            .zip(&weights)
            .map(|(&(i, _), w)| self.memory.labels[i] * w)
            .sum::<f64>()
            / total
    }
}

impl Model for KNeighborsRegressor {
    type Label = f64;

    fn fit(&mut self, observations: &Observations, labels: &[f64]) -> Result<(), ModelError> {
        if let Some(index) = labels.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::InvalidInput {
                reason: format!("target {index} is not finite"),
            });
        }
        self.memory = Memory::fit(observations, labels)?;
        debug!(n_samples = labels.len(), k = self.k, "k-neighbors regressor fitted");
        Ok(())
    }

    fn predict(&self, observations: &Observations) -> Result<Vec<f64>, ModelError> {
        if !self.memory.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        check_width(observations, self.memory.n_features)?;
        Ok(observations
            .rows()
            .par_iter()
            .map(|sample| self.estimate(sample))
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ModelError> {
        set_common_param(&mut self.k, &mut self.weights, name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations(rows: Vec<Vec<f64>>) -> Observations {
        let columns = (0..rows[0].len()).map(|i| format!("f{i}")).collect();
        Observations::new(columns, rows).unwrap()
    }

    fn two_clusters() -> (Observations, Vec<usize>) {
        let obs = observations(vec![
            vec![0.0, 0.0],
            vec![0.1, 0.2],
            vec![0.2, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 4.9],
            vec![4.8, 5.2],
        ]);
        (obs, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn separates_clusters() {
        let (obs, labels) = two_clusters();
        let mut model = KNeighborsClassifier::new(3).unwrap();
        model.fit(&obs, &labels).unwrap();
        let test = observations(vec![vec![0.3, 0.3], vec![4.9, 5.0]]);
        assert_eq!(model.predict(&test).unwrap(), vec![0, 1]);
        let proba = model.predict_proba(&test).unwrap();
        assert_eq!(proba.row(0), &[1.0, 0.0]);
    }

    #[test]
    fn vote_shares_with_uniform_weights() {
        let (obs, labels) = two_clusters();
        let mut model = KNeighborsClassifier::new(6).unwrap();
        model.fit(&obs, &labels).unwrap();
        let proba = model.predict_proba(&observations(vec![vec![1.0, 1.0]])).unwrap();
        assert!((proba.row(0)[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn distance_weights_favor_exact_matches() {
        let (obs, labels) = two_clusters();
        let mut model = KNeighborsClassifier::new(6).unwrap().with_weights(Weights::Distance);
        model.fit(&obs, &labels).unwrap();
        let proba = model.predict_proba(&observations(vec![vec![5.0, 5.0]])).unwrap();
        assert_eq!(proba.row(0), &[0.0, 1.0]);
    }

    #[test]
    fn params_by_name() {
        let mut model = KNeighborsClassifier::new(1).unwrap();
        model.set_param("n_neighbors", &ParamValue::Int(4)).unwrap();
        model.set_param("weights", &ParamValue::from("distance")).unwrap();
        assert_eq!(model.k(), 4);
        assert_eq!(model.weights(), Weights::Distance);
        assert!(model.set_param("n_neighbors", &ParamValue::Int(0)).is_err());
        assert!(model.set_param("weights", &ParamValue::from("cosine")).is_err());
        assert!(matches!(
            model.set_param("leaf_size", &ParamValue::Int(3)),
            Err(ModelError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn unfitted_and_mismatched_input_rejected() {
        let model = KNeighborsClassifier::new(1).unwrap();
        let test = observations(vec![vec![0.0, 0.0]]);
        assert!(matches!(model.predict(&test), Err(ModelError::NotFitted)));

        let (obs, labels) = two_clusters();
        let mut model = model;
        model.fit(&obs, &labels).unwrap();
        assert!(matches!(
            model.predict(&observations(vec![vec![0.0]])),
            Err(ModelError::InvalidInput { .. })
        ));
    }

    #[test]
    fn regressor_averages_neighbors() {
        let obs = observations(vec![vec![0.0], vec![1.0], vec![2.0], vec![10.0]]);
        let mut model = KNeighborsRegressor::new(2).unwrap();
        model.fit(&obs, &[0.0, 2.0, 4.0, 100.0]).unwrap();
        let predicted = model.predict(&observations(vec![vec![0.4], vec![9.0]])).unwrap();
        assert!((predicted[0] - 1.0).abs() < 1e-12);
        assert!((predicted[1] - 52.0).abs() < 1e-12);
    }

    #[test]
    fn regressor_rejects_non_finite_targets() {
        let obs = observations(vec![vec![0.0], vec![1.0]]);
        let mut model = KNeighborsRegressor::new(1).unwrap();
        assert!(model.fit(&obs, &[0.0, f64::NAN]).is_err());
    }
}
