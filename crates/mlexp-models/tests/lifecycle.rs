//! Full experiment lifecycle with the reference estimators.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use mlexp_core::{
    ClassifierExperiment, Classification, ExperimentConfig, ExperimentSetup, FeaturePipeline, MLSetup, Model,
    ModelIo, Observations, ParamSpace, ProcessMode, Regression, RegressionExperiment, SearchStrategy,
};
use mlexp_models::{KNeighborsClassifier, KNeighborsRegressor, NearestCentroid, SCALER_STATE_FILE, StandardScaler};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 90 samples, 3 classes, 4 features on very different scales.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]).
/// Feature 3 is pure noise in [0, 1000].
fn make_classification() -> MLSetup<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for i in 0..90 {
        let class = i % 3;
        labels.push(class);
        let mut row: Vec<f64> = (0..3)
            .map(|_| class as f64 * 3.0 + rng.r#gen::<f64>() * 0.5)
            .collect();
        row.push(rng.r#gen::<f64>() * 1000.0);
        rows.push(row);
    }
    let columns = ["f0", "f1", "f2", "noise"].map(String::from).to_vec();
    MLSetup::new(Observations::new(columns, rows).unwrap(), labels).unwrap()
}

/// y = 3x + small noise over x in [0, 10).
fn make_regression() -> MLSetup<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut rows = Vec::new();
    let mut targets = Vec::new();
    for _ in 0..80 {
        let x = rng.gen_range(0.0..10.0);
        rows.push(vec![x]);
        targets.push(3.0 * x + rng.gen_range(-0.1..0.1));
    }
    MLSetup::new(Observations::new(vec!["x".into()], rows).unwrap(), targets).unwrap()
}

fn classifier_experiment<M>(
    data: &MLSetup<usize>,
    model_dir: &std::path::Path,
) -> (ClassifierExperiment<M>, ExperimentSetup<usize>)
where
    M: Model<Label = usize> + serde::Serialize + serde::de::DeserializeOwned + 'static,
{
    let raw = ExperimentSetup::split(data, 0.3, 11).unwrap();
    let experiment = ClassifierExperiment::new(
        Classification,
        raw.train_data.clone(),
        raw.test_data.clone(),
        ExperimentConfig::new().with_model_dir(model_dir).with_process_tag("run_1"),
        ModelIo::with_defaults(),
    )
    .unwrap();
    (experiment, raw)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[test]
fn knn_search_evaluate_store_load() {
    let dir = tempfile::tempdir().unwrap();
    let data = make_classification();
    let (experiment, _) = classifier_experiment::<KNeighborsClassifier>(&data, dir.path());

    let mut pipeline = FeaturePipeline::new(StandardScaler::new(experiment.model_dir()));
    let setup = experiment.process_data(&mut pipeline, ProcessMode::Fit).unwrap();

    let space = ParamSpace::new()
        .with_values("n_neighbors", [1i64, 3, 5])
        .with_values("weights", ["uniform", "distance"]);
    let model = experiment
        .train_model(KNeighborsClassifier::new(1).unwrap(), &setup, Some(&space), SearchStrategy::Grid)
        .unwrap();

    let predictions = experiment.predict(&setup, &model).unwrap();
    let probabilities = experiment.predict_proba(&setup, &model).unwrap();
    let evaluation = experiment
        .evaluate_predictions(setup.test_data.labels(), &predictions, Some(&probabilities), false)
        .unwrap();
    let accuracy = evaluation.scalar("accuracy").unwrap();
    assert!(accuracy > 0.9, "accuracy {accuracy} <= 0.9");
    assert!(evaluation.get("log_loss").is_some(), "log_loss should resolve via probabilities");
    assert!(evaluation.unresolved().is_empty());

    let roc = experiment.evaluate_roc_metrics(&setup, &probabilities).unwrap();
    assert!(roc.multiclass);
    assert_eq!(roc.curves.len(), 3);
    assert!(roc.roc_auc_score > 0.9);

    let path = experiment.store_model(&model).unwrap();
    assert_eq!(path, dir.path().join("run_1").join("_development.bin"));
    let loaded = experiment.load_model().unwrap();
    assert_eq!(loaded, model);
    assert_eq!(experiment.predict(&setup, &loaded).unwrap(), predictions);
}

#[test]
fn stored_scaler_reproduces_processing() {
    let dir = tempfile::tempdir().unwrap();
    let data = make_classification();
    let (experiment, _) = classifier_experiment::<KNeighborsClassifier>(&data, dir.path());

    let mut fitted = FeaturePipeline::new(StandardScaler::new(experiment.model_dir()));
    let first = experiment.process_data(&mut fitted, ProcessMode::Fit).unwrap();
    assert!(experiment.model_dir().join(SCALER_STATE_FILE).exists());

    let mut fresh = FeaturePipeline::new(StandardScaler::new(experiment.model_dir()));
    let second = experiment.process_data_from_stored_models(&mut fresh).unwrap();
    assert_eq!(first.train_data, second.train_data);
    assert_eq!(first.test_data, second.test_data);
}

#[test]
fn processing_without_stored_state_fails() {
    let dir = tempfile::tempdir().unwrap();
    let data = make_classification();
    let (experiment, _) = classifier_experiment::<KNeighborsClassifier>(&data, dir.path());
    let mut pipeline = FeaturePipeline::new(StandardScaler::new(experiment.model_dir()));
    assert!(experiment.process_data_from_stored_models(&mut pipeline).is_err());
}

#[test]
fn nearest_centroid_uses_native_format() {
    let dir = tempfile::tempdir().unwrap();
    let data = make_classification();
    let (experiment, _) = classifier_experiment::<NearestCentroid>(&data, dir.path());
    let mut pipeline = FeaturePipeline::new(StandardScaler::new(experiment.model_dir()));
    let setup = experiment.process_data(&mut pipeline, ProcessMode::Fit).unwrap();

    let model = experiment
        .train_model(NearestCentroid::new(), &setup, None, SearchStrategy::Grid)
        .unwrap();
    let path = experiment.store_model(&model).unwrap();
    assert_eq!(path.extension().unwrap(), "json");
    assert_eq!(experiment.load_model().unwrap(), model);

    // Scalar metrics needing probabilities are unresolved, not fatal.
    let predictions = experiment.predict(&setup, &model).unwrap();
    let evaluation = experiment
        .evaluate_predictions(setup.test_data.labels(), &predictions, None, false)
        .unwrap();
    assert!(evaluation.unresolved().iter().any(|name| name == "log_loss"));
    assert!(evaluation.scalar("accuracy").unwrap() > 0.9);
}

#[test]
fn randomized_search_over_shrinkage() {
    let dir = tempfile::tempdir().unwrap();
    let data = make_classification();
    let (experiment, raw) = classifier_experiment::<NearestCentroid>(&data, dir.path());
    let space = ParamSpace::new().with_values("shrinkage", [0.0, 0.1, 0.5, 0.9]);

    let outcome = experiment
        .cv_search(&raw.train_data, &NearestCentroid::new(), &space, SearchStrategy::Randomized { n_iter: 3 })
        .unwrap();
    assert_eq!(outcome.results.candidates.len(), 3);
    assert_eq!(outcome.best_estimator.shrinkage(), outcome.best_params["shrinkage"].as_f64().unwrap());
}

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

#[test]
fn knn_regression_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let data = make_regression();
    let raw = ExperimentSetup::split(&data, 0.25, 3).unwrap();
    let experiment: RegressionExperiment<KNeighborsRegressor> = RegressionExperiment::new(
        Regression,
        raw.train_data.clone(),
        raw.test_data.clone(),
        ExperimentConfig::new().with_model_dir(dir.path()),
        ModelIo::with_defaults(),
    )
    .unwrap();

    let space = ParamSpace::new().with_values("n_neighbors", [1i64, 2, 4, 8]);
    let model = experiment
        .train_model(KNeighborsRegressor::new(1).unwrap(), &raw, Some(&space), SearchStrategy::Grid)
        .unwrap();
    let predictions = experiment.predict(&raw, &model).unwrap();
    let evaluation = experiment
        .evaluate_predictions(raw.test_data.labels(), &predictions, None, false)
        .unwrap();
    let mae = evaluation.scalar("mae").unwrap();
    assert!(mae < 1.0, "mae {mae} >= 1.0");
    assert!(evaluation.scalar("mse").is_some());

    experiment.store_model(&model).unwrap();
    assert_eq!(experiment.load_model().unwrap(), model);
}
