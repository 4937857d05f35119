use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use mlexp_core::{
    Baseline, ClassifierExperiment, Classification, DEFAULT_TAG, Evaluation, ExperimentConfig, ExperimentError,
    ExperimentSetup, FeaturePipeline, MLSetup, Model, ModelError, ModelIo, ParamSpace, ProcessMode, Regression,
    RegressionExperiment, SearchStrategy, Task, format_params,
};
use mlexp_io::{DatasetReader, ExperimentName, ResultWriter};
use mlexp_models::{KNeighborsClassifier, KNeighborsRegressor, NearestCentroid, StandardScaler};

#[derive(Parser)]
#[command(name = "mlexp")]
#[command(about = "Supervised-learning experiments: process, train, search, predict, evaluate")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for the train/test split and cross-validation
    #[arg(long, default_value_t = 100, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel prediction (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Input, output and lifecycle options shared by both tasks.
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Path to the input CSV file
    #[arg(long)]
    data: PathBuf,

    /// Column holding row IDs (row numbers are used if not set)
    #[arg(long)]
    id_column: Option<String>,

    /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
    #[arg(long)]
    experiment: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Base directory for stored models and processing state (defaults to .models)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Subdirectory of the model directory for this processing run
    #[arg(long, default_value = DEFAULT_TAG)]
    process_tag: String,

    /// Fraction of rows held out for testing
    #[arg(long, default_value_t = 0.25)]
    test_fraction: f64,

    /// Skip feature standardization
    #[arg(long, default_value_t = false)]
    no_scale: bool,

    /// Hyperparameter search: "grid_search" or "randomized_search" (no search if not set)
    #[arg(long)]
    search: Option<String>,

    /// Candidate budget for randomized search
    #[arg(long, default_value_t = SearchStrategy::DEFAULT_ITERATIONS)]
    n_iter: usize,

    /// Number of cross-validation splits
    #[arg(long, default_value_t = 5)]
    cv_splits: usize,

    /// Fraction of each cross-validation split held out
    #[arg(long, default_value_t = 0.4)]
    cv_test_fraction: f64,

    /// Scorer ranking search candidates (defaults to the task's standard metric)
    #[arg(long)]
    scoring: Option<String>,

    /// Candidate neighbor counts for k-nearest-neighbors models
    #[arg(long, value_delimiter = ',', default_value = "1,3,5,7")]
    neighbors: Vec<i64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClassifierKind {
    /// k-nearest neighbors with vote-share probabilities
    Knn,
    /// Nearest class centroid, labels only
    Centroid,
}

#[derive(Subcommand)]
enum Command {
    /// Train and evaluate a classifier on a labeled CSV
    Classify {
        #[command(flatten)]
        run: RunArgs,

        /// Column holding class labels
        #[arg(long)]
        label: String,

        /// Classifier to train
        #[arg(long, value_enum, default_value = "knn")]
        model: ClassifierKind,

        /// Candidate shrinkage values for the centroid classifier
        #[arg(long, value_delimiter = ',', default_value = "0,0.1,0.25,0.5")]
        shrinkage: Vec<f64>,

        /// Also score a constant prediction of this class
        #[arg(long)]
        baseline_class: Option<String>,
    },

    /// Train and evaluate a k-nearest-neighbors regressor on a CSV
    Regress {
        #[command(flatten)]
        run: RunArgs,

        /// Column holding the numeric target
        #[arg(long)]
        target: String,

        /// Also score a constant prediction of this value
        #[arg(long)]
        baseline_value: Option<f64>,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct RunOutput {
    experiment: String,
    task: &'static str,
    n_train: usize,
    n_test: usize,
    n_features: usize,
    best_params: Option<String>,
    cv_best_score: Option<f64>,
    scores: BTreeMap<String, f64>,
    baseline_scores: Option<BTreeMap<String, f64>>,
    unresolved: Vec<String>,
    roc_auc: Option<f64>,
    model_path: PathBuf,
}

fn scalar_scores(evaluation: &Evaluation) -> BTreeMap<String, f64> {
    evaluation
        .iter()
        .filter_map(|(name, value)| value.as_scalar().map(|v| (name.to_string(), v)))
        .collect()
}

fn experiment_config(run: &RunArgs, seed: u64, model_tag: &ExperimentName) -> ExperimentConfig {
    let mut config = ExperimentConfig::new()
        .with_seed(seed)
        .with_cv_split_count(run.cv_splits)
        .with_cv_test_fraction(run.cv_test_fraction)
        .with_model_tag(model_tag.as_str())
        .with_process_tag(run.process_tag.as_str());
    if let Some(dir) = &run.model_dir {
        config = config.with_model_dir(dir);
    }
    if let Some(scoring) = &run.scoring {
        config = config.with_standard_metric(scoring);
    }
    config
}

/// Standardize features with state persisted under the model directory, unless disabled.
fn processed_setup<L: mlexp_core::Target>(
    raw: ExperimentSetup<L>,
    model_dir: &Path,
    no_scale: bool,
    process: impl FnOnce(&mut FeaturePipeline<StandardScaler>) -> Result<ExperimentSetup<L>, ExperimentError>,
) -> Result<ExperimentSetup<L>> {
    if no_scale {
        return Ok(raw);
    }
    let mut pipeline = FeaturePipeline::new(StandardScaler::new(model_dir));
    process(&mut pipeline).context("feature processing failed")
}

/// Search or plain fit, returning the model and the search summary.
fn fit_model<K, M>(
    experiment: &mlexp_core::ExperimentBase<K, M>,
    run: &RunArgs,
    setup: &ExperimentSetup<K::Label>,
    model: M,
    space: &ParamSpace,
    writer: &ResultWriter,
) -> Result<(M, Option<String>, Option<f64>)>
where
    K: Task,
    M: Model<Label = K::Label>,
{
    match &run.search {
        Some(name) => {
            let strategy = SearchStrategy::from_name(name, run.n_iter);
            let outcome = experiment
                .cv_search(&setup.train_data, &model, space, strategy)
                .context("hyperparameter search failed")?;
            writer.write_search(&outcome.results)?;
            Ok((
                outcome.best_estimator,
                Some(format_params(&outcome.best_params)),
                Some(outcome.best_score),
            ))
        }
        None => {
            let model = experiment
                .train_model(model, setup, None, SearchStrategy::Grid)
                .context("training failed")?;
            Ok((model, None, None))
        }
    }
}

fn run_classification<M>(
    run: &RunArgs,
    seed: u64,
    label: &str,
    model: M,
    space: ParamSpace,
    baseline_class: Option<&str>,
) -> Result<RunOutput>
where
    M: Model<Label = usize> + Serialize + DeserializeOwned + 'static,
{
    let experiment_name = ExperimentName::new(run.experiment.clone())?;

    // 1. Read dataset and split
    let mut reader = DatasetReader::new(&run.data, label);
    if let Some(id_column) = &run.id_column {
        reader = reader.with_id_column(id_column);
    }
    let dataset = reader
        .read_classification()
        .context("failed to read input CSV")?;
    let raw = ExperimentSetup::split(dataset.data(), run.test_fraction, seed).context("train/test split failed")?;

    // 2. Build experiment and process features
    let mut experiment: ClassifierExperiment<M> = ClassifierExperiment::new(
        Classification,
        raw.train_data.clone(),
        raw.test_data.clone(),
        experiment_config(run, seed, &experiment_name),
        ModelIo::with_defaults(),
    )?;
    let setup = processed_setup(raw, experiment.model_dir(), run.no_scale, |pipeline| {
        experiment.process_data(pipeline, ProcessMode::Fit)
    })?;

    // 3. Train
    let writer = ResultWriter::new(&run.output_dir, experiment_name)?;
    let (model, best_params, cv_best_score) = fit_model(&experiment, run, &setup, model, &space, &writer)?;

    // 4. Predict
    let predictions = experiment.predict(&setup, &model).context("prediction failed")?;
    let probabilities = match experiment.predict_proba(&setup, &model) {
        Ok(probabilities) => Some(probabilities),
        Err(ExperimentError::Model(ModelError::Unsupported { .. })) => {
            info!("model has no probability estimates, skipping ROC");
            None
        }
        Err(e) => return Err(e).context("probability prediction failed"),
    };

    // 5. Evaluate
    let labels = setup.test_data.labels();
    let evaluation = experiment
        .evaluate_predictions(labels, &predictions, probabilities.as_ref(), false)
        .context("evaluation failed")?;
    let baseline = match baseline_class {
        Some(name) => {
            let class = dataset
                .class_names()
                .iter()
                .position(|c| c == name)
                .with_context(|| format!("baseline class \"{name}\" not in the dataset"))?;
            experiment.set_baseline(Baseline::Constant(class));
            Some(
                experiment
                    .evaluate_predictions(labels, &predictions, None, true)
                    .context("baseline evaluation failed")?,
            )
        }
        None => None,
    };
    let roc = match &probabilities {
        Some(probabilities) => match experiment.evaluate_roc_metrics(&setup, probabilities) {
            Ok(roc) => Some(roc),
            Err(e) => {
                warn!(error = %e, "ROC evaluation skipped");
                None
            }
        },
        None => None,
    };

    // 6. Store model and write results
    let model_path = experiment.store_model(&model).context("failed to store model")?;
    writer.write_evaluation(Classification.name(), labels.len(), &evaluation, baseline.as_ref())?;
    if let Some(roc) = &roc {
        writer.write_roc(roc, dataset.class_names())?;
    }
    let test_ids = row_ids(dataset.ids(), &setup.test_data);
    let predicted_names: Vec<&str> = predictions
        .iter()
        .map(|&p| dataset.class_name(p).unwrap_or_default())
        .collect();
    writer.write_predictions(&test_ids, &predicted_names, probabilities.as_ref())?;

    Ok(RunOutput {
        experiment: run.experiment.clone(),
        task: Classification.name(),
        n_train: setup.train_data.n_samples(),
        n_test: setup.test_data.n_samples(),
        n_features: setup.train_data.observations().n_features(),
        best_params,
        cv_best_score,
        scores: scalar_scores(&evaluation),
        baseline_scores: baseline.as_ref().map(scalar_scores),
        unresolved: evaluation.unresolved().to_vec(),
        roc_auc: roc.map(|r| r.roc_auc_score),
        model_path,
    })
}

fn run_regression(run: &RunArgs, seed: u64, target: &str, baseline_value: Option<f64>) -> Result<RunOutput> {
    let experiment_name = ExperimentName::new(run.experiment.clone())?;

    // 1. Read dataset and split
    let mut reader = DatasetReader::new(&run.data, target);
    if let Some(id_column) = &run.id_column {
        reader = reader.with_id_column(id_column);
    }
    let dataset = reader.read_regression().context("failed to read input CSV")?;
    let raw = ExperimentSetup::split(dataset.data(), run.test_fraction, seed).context("train/test split failed")?;

    // 2. Build experiment and process features
    let mut experiment: RegressionExperiment<KNeighborsRegressor> = RegressionExperiment::new(
        Regression,
        raw.train_data.clone(),
        raw.test_data.clone(),
        experiment_config(run, seed, &experiment_name),
        ModelIo::with_defaults(),
    )?;
    let setup = processed_setup(raw, experiment.model_dir(), run.no_scale, |pipeline| {
        experiment.process_data(pipeline, ProcessMode::Fit)
    })?;

    // 3. Train
    let writer = ResultWriter::new(&run.output_dir, experiment_name)?;
    let first_k = run.neighbors.first().copied().unwrap_or(5).max(1);
    let model = KNeighborsRegressor::new(usize::try_from(first_k).unwrap_or(1))?;
    let space = ParamSpace::new()
        .with_values("n_neighbors", run.neighbors.iter().copied())
        .with_values("weights", ["uniform", "distance"]);
    let (model, best_params, cv_best_score) = fit_model(&experiment, run, &setup, model, &space, &writer)?;

    // 4. Predict and evaluate
    let predictions = experiment.predict(&setup, &model).context("prediction failed")?;
    let labels = setup.test_data.labels();
    let evaluation = experiment
        .evaluate_predictions(labels, &predictions, None, false)
        .context("evaluation failed")?;
    let baseline = match baseline_value {
        Some(value) => {
            experiment.set_baseline(Baseline::Constant(value));
            Some(
                experiment
                    .evaluate_predictions(labels, &predictions, None, true)
                    .context("baseline evaluation failed")?,
            )
        }
        None => None,
    };

    // 5. Store model and write results
    let model_path = experiment.store_model(&model).context("failed to store model")?;
    writer.write_evaluation(Regression.name(), labels.len(), &evaluation, baseline.as_ref())?;
    let test_ids = row_ids(dataset.ids(), &setup.test_data);
    writer.write_predictions(&test_ids, &predictions, None)?;

    Ok(RunOutput {
        experiment: run.experiment.clone(),
        task: Regression.name(),
        n_train: setup.train_data.n_samples(),
        n_test: setup.test_data.n_samples(),
        n_features: setup.train_data.observations().n_features(),
        best_params,
        cv_best_score,
        scores: scalar_scores(&evaluation),
        baseline_scores: baseline.as_ref().map(scalar_scores),
        unresolved: evaluation.unresolved().to_vec(),
        roc_auc: None,
        model_path,
    })
}

/// IDs of the rows in `data`, looked up by their preserved row index.
fn row_ids<L: mlexp_core::Target>(ids: &[String], data: &MLSetup<L>) -> Vec<String> {
    data.observations()
        .index()
        .iter()
        .map(|&i| ids.get(i).cloned().unwrap_or_else(|| i.to_string()))
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    let output = match cli.command {
        Command::Classify {
            run,
            label,
            model,
            shrinkage,
            baseline_class,
        } => match model {
            ClassifierKind::Knn => {
                let first_k = run.neighbors.first().copied().unwrap_or(5).max(1);
                let knn = KNeighborsClassifier::new(usize::try_from(first_k).unwrap_or(1))?;
                let space = ParamSpace::new()
                    .with_values("n_neighbors", run.neighbors.iter().copied())
                    .with_values("weights", ["uniform", "distance"]);
                run_classification(&run, cli.seed, &label, knn, space, baseline_class.as_deref())?
            }
            ClassifierKind::Centroid => {
                let space = ParamSpace::new().with_values("shrinkage", shrinkage.iter().copied());
                run_classification(
                    &run,
                    cli.seed,
                    &label,
                    NearestCentroid::new(),
                    space,
                    baseline_class.as_deref(),
                )?
            }
        },
        Command::Regress {
            run,
            target,
            baseline_value,
        } => run_regression(&run, cli.seed, &target, baseline_value)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
