//! Nearest-centroid classification with a human-readable native format.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use mlexp_core::{Model, ModelError, Observations, ParamValue, Persistence};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{check_training, check_width, invalid_parameter, squared_euclidean};

/// Assigns each sample to the class with the closest mean.
///
/// Class means are pulled toward the global mean by `shrinkage`
/// (0 keeps the class means, 1 collapses them onto the global mean).
/// Labels must be class indices; a class absent from training gets the
/// global mean as its centroid. Distance ties go to the lowest class.
///
/// The model persists natively as JSON.
///
/// # Parameters
///
/// | Name        | Value          | Default |
/// |-------------|----------------|---------|
/// | `shrinkage` | float in [0, 1]| 0.0     |
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroid {
    shrinkage: f64,
    centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    /// Create an unfitted model without shrinkage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shrinkage toward the global mean.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidParameter`] if `shrinkage` is outside `[0, 1]`.
    pub fn with_shrinkage(mut self, shrinkage: f64) -> Result<Self, ModelError> {
        self.set_param("shrinkage", &ParamValue::Float(shrinkage))?;
        Ok(self)
    }

    /// Shrinkage toward the global mean.
    #[must_use]
    pub fn shrinkage(&self) -> f64 {
        self.shrinkage
    }

    /// Fitted class centroids, indexed by class.
    #[must_use]
    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    fn closest(&self, sample: &[f64]) -> usize {
        self.centroids
            .iter()
            .enumerate()
            .map(|(class, centroid)| (class, squared_euclidean(sample, centroid)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map_or(0, |(class, _)| class)
    }

    fn save_json(&self, path: &Path) -> Result<(), ModelError> {
        let file = File::create(path).map_err(|e| native_error(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|e| native_error(path, e))
    }

    fn load_json(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path).map_err(|e| native_error(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| native_error(path, e))
    }
}

fn native_error(path: &Path, source: impl std::error::Error + Send + Sync + 'static) -> ModelError {
    ModelError::NativePersistence {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

impl Model for NearestCentroid {
    type Label = usize;

    fn fit(&mut self, observations: &Observations, labels: &[usize]) -> Result<(), ModelError> {
        check_training(observations, labels)?;
        let n_features = observations.n_features();
        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);

        let mut sums = vec![vec![0.0; n_features]; n_classes];
        let mut counts = vec![0usize; n_classes];
        let mut global = vec![0.0; n_features];
        for (row, &label) in observations.rows().iter().zip(labels) {
            counts[label] += 1;
            for (f, &v) in row.iter().enumerate() {
                sums[label][f] += v;
                global[f] += v;
            }
        }
        let n = labels.len() as f64;
        global.iter_mut().for_each(|g| *g /= n);

        self.centroids = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| {
                sum.iter()
                    .zip(&global)
                    .map(|(&s, &g)| {
                        let mean = if count > 0 { s / count as f64 } else { g };
                        (1.0 - self.shrinkage) * mean + self.shrinkage * g
                    })
                    .collect()
            })
            .collect();

        debug!(n_classes, n_features, shrinkage = self.shrinkage, "nearest centroid fitted");
        Ok(())
    }

    fn predict(&self, observations: &Observations) -> Result<Vec<usize>, ModelError> {
        let Some(first) = self.centroids.first() else {
            return Err(ModelError::NotFitted);
        };
        check_width(observations, first.len())?;
        Ok(observations
            .rows()
            .par_iter()
            .map(|sample| self.closest(sample))
            .collect())
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ModelError> {
        match name {
            "shrinkage" => {
                self.shrinkage = value
                    .as_f64()
                    .filter(|v| (0.0..=1.0).contains(v))
                    .ok_or_else(|| invalid_parameter(name, value))?;
                Ok(())
            }
            _ => Err(ModelError::UnknownParameter { name: name.to_string() }),
        }
    }

    fn persistence() -> Persistence<Self> {
        Persistence::Native {
            extension: "json",
            save: Self::save_json,
            load: Self::load_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations(rows: Vec<Vec<f64>>) -> Observations {
        let columns = (0..rows[0].len()).map(|i| format!("f{i}")).collect();
        Observations::new(columns, rows).unwrap()
    }

    #[test]
    fn class_means_without_shrinkage() {
        let obs = observations(vec![vec![0.0], vec![2.0], vec![8.0], vec![10.0]]);
        let mut model = NearestCentroid::new();
        model.fit(&obs, &[0, 0, 1, 1]).unwrap();
        assert_eq!(model.centroids(), &[vec![1.0], vec![9.0]]);
        assert_eq!(model.predict(&observations(vec![vec![4.0], vec![6.0]])).unwrap(), vec![0, 1]);
    }

    #[test]
    fn full_shrinkage_collapses_to_global_mean() {
        let obs = observations(vec![vec![0.0], vec![2.0], vec![8.0], vec![10.0]]);
        let mut model = NearestCentroid::new().with_shrinkage(1.0).unwrap();
        model.fit(&obs, &[0, 0, 1, 1]).unwrap();
        assert_eq!(model.centroids(), &[vec![5.0], vec![5.0]]);
        // Equal distance to every centroid resolves to class 0.
        assert_eq!(model.predict(&observations(vec![vec![9.0]])).unwrap(), vec![0]);
    }

    #[test]
    fn shrinkage_out_of_range_rejected() {
        assert!(NearestCentroid::new().with_shrinkage(1.5).is_err());
        let mut model = NearestCentroid::new();
        assert!(model.set_param("shrinkage", &ParamValue::from("high")).is_err());
    }

    #[test]
    fn probabilities_unsupported() {
        let obs = observations(vec![vec![0.0], vec![1.0]]);
        let mut model = NearestCentroid::new();
        model.fit(&obs, &[0, 1]).unwrap();
        assert!(matches!(model.predict_proba(&obs), Err(ModelError::Unsupported { .. })));
    }

    #[test]
    fn native_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("centroid.json");
        let obs = observations(vec![vec![0.0, 1.0], vec![4.0, 5.0]]);
        let mut model = NearestCentroid::new().with_shrinkage(0.25).unwrap();
        model.fit(&obs, &[0, 1]).unwrap();

        let Persistence::Native { extension, save, load } = NearestCentroid::persistence() else {
            panic!("expected native persistence");
        };
        assert_eq!(extension, "json");
        save(&model, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"shrinkage\": 0.25"));
        assert_eq!(load(&path).unwrap(), model);
    }

    #[test]
    fn missing_native_file_reports_path() {
        let err = NearestCentroid::load_json(Path::new("/nonexistent/centroid.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/centroid.json"));
    }
}
