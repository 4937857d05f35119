//! Feature processing contract and the train/test pipeline adapter.

use tracing::{debug, instrument};

use crate::error::ExperimentError;
use crate::setup::{ExperimentSetup, MLSetup, Observations, Target};

/// Whether model-based feature transforms are fitted or only applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// Fit transforms on the training data, then apply them.
    Fit,
    /// Apply previously fitted (or persisted) transforms only.
    Apply,
}

/// Turns a raw train/test pair into the pair a model is trained on.
pub trait ProcessData<L: Target> {
    /// Produce a fresh processed setup. The raw data is never modified.
    ///
    /// # Errors
    ///
    /// Implementation-specific; typically [`ExperimentError::Processing`].
    fn process_data(
        &mut self,
        training: &MLSetup<L>,
        testing: &MLSetup<L>,
        mode: ProcessMode,
    ) -> Result<ExperimentSetup<L>, ExperimentError>;
}

/// A feature transformation with optional fitted state.
pub trait FeatureProcessor {
    /// Fit the model-based transforms on a feature table.
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn fit_model_based_features(&mut self, features: &Observations) -> Result<(), ExperimentError>;

    /// Apply the fitted transforms.
    ///
    /// # Errors
    ///
    /// Implementation-specific; typically when no fitted state exists.
    fn transform_model_based_features(&self, features: &Observations) -> Result<Observations, ExperimentError>;

    /// Process a raw table, fitting first when `training` is set.
    ///
    /// # Errors
    ///
    /// Any error of the fit or transform step.
    fn process_data(&mut self, raw: &Observations, training: bool) -> Result<Observations, ExperimentError> {
        if training {
            self.fit_model_based_features(raw)?;
        }
        self.transform_model_based_features(raw)
    }
}

/// Runs a [`FeatureProcessor`] over a train/test pair.
///
/// In [`ProcessMode::Fit`] the training table is processed with fitting and
/// the test table without; in [`ProcessMode::Apply`] neither side is fitted.
/// The processed pair must keep train and test rows disjoint.
#[derive(Debug, Clone)]
pub struct FeaturePipeline<P> {
    processor: P,
}

impl<P: FeatureProcessor> FeaturePipeline<P> {
    /// Wrap a processor.
    #[must_use]
    pub fn new(processor: P) -> Self {
        Self { processor }
    }

    /// The wrapped processor.
    #[must_use]
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Unwrap the processor.
    #[must_use]
    pub fn into_inner(self) -> P {
        self.processor
    }
}

impl<L: Target, P: FeatureProcessor> ProcessData<L> for FeaturePipeline<P> {
    #[instrument(skip_all, fields(?mode, n_train = training.n_samples(), n_test = testing.n_samples()))]
    fn process_data(
        &mut self,
        training: &MLSetup<L>,
        testing: &MLSetup<L>,
        mode: ProcessMode,
    ) -> Result<ExperimentSetup<L>, ExperimentError> {
        let fit = mode == ProcessMode::Fit;
        let train_features = self.processor.process_data(training.observations(), fit)?;
        let test_features = self.processor.process_data(testing.observations(), false)?;
        debug!(
            n_features = train_features.n_features(),
            "features processed"
        );
        ExperimentSetup::new(
            MLSetup::new(train_features, training.labels().to_vec())?,
            MLSetup::new(test_features, testing.labels().to_vec())?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Subtracts the fitted column minimum.
    #[derive(Default)]
    struct MinShift {
        minimum: Option<Vec<f64>>,
    }

    impl FeatureProcessor for MinShift {
        fn fit_model_based_features(&mut self, features: &Observations) -> Result<(), ExperimentError> {
            let mut minimum = vec![f64::INFINITY; features.n_features()];
            for row in features.rows() {
                for (m, &v) in minimum.iter_mut().zip(row) {
                    *m = m.min(v);
                }
            }
            self.minimum = Some(minimum);
            Ok(())
        }

        fn transform_model_based_features(&self, features: &Observations) -> Result<Observations, ExperimentError> {
            let minimum = self.minimum.as_ref().ok_or_else(|| ExperimentError::Processing {
                reason: "not fitted".into(),
            })?;
            let rows = features
                .rows()
                .iter()
                .map(|row| row.iter().zip(minimum).map(|(v, m)| v - m).collect())
                .collect();
            features.with_features(features.columns().to_vec(), rows)
        }
    }

    fn setup() -> ExperimentSetup<usize> {
        let obs = Observations::new(vec!["x".into()], vec![vec![2.0], vec![4.0], vec![3.0], vec![10.0]]).unwrap();
        let data = MLSetup::new(obs, vec![0, 1, 0, 1]).unwrap();
        ExperimentSetup::new(data.select(&[0, 1]), data.select(&[2, 3])).unwrap()
    }

    #[test]
    fn fit_uses_training_statistics_only() {
        let raw = setup();
        let mut pipeline = FeaturePipeline::new(MinShift::default());
        let processed = pipeline
            .process_data(&raw.train_data, &raw.test_data, ProcessMode::Fit)
            .unwrap();
        assert_eq!(processed.train_data.observations().rows(), &[vec![0.0], vec![2.0]]);
        assert_eq!(processed.test_data.observations().rows(), &[vec![1.0], vec![8.0]]);
        assert_eq!(processed.test_data.observations().index(), &[2, 3]);
        assert_eq!(processed.test_data.labels(), raw.test_data.labels());
    }

    #[test]
    fn apply_without_fitted_state_fails() {
        let raw = setup();
        let mut pipeline = FeaturePipeline::new(MinShift::default());
        let err = pipeline
            .process_data(&raw.train_data, &raw.test_data, ProcessMode::Apply)
            .unwrap_err();
        assert!(matches!(err, ExperimentError::Processing { .. }));
    }
}
