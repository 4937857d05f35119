//! JSON result writer for evaluation, ROC, search and prediction outputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mlexp_core::{CandidateResult, ClassRoc, CvResults, Evaluation, RocEvaluation};
use mlexp_metrics::{MetricValue, ProbabilityMatrix};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Writes experiment results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_evaluate.json`,
/// `{experiment}_roc.json`, `{experiment}_search.json` and
/// `{experiment}_predict.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Path of the `{experiment}_{suffix}.json` artifact.
    #[must_use]
    pub fn artifact_path(&self, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{suffix}.json", self.experiment.as_str()))
    }

    fn write_json<T: Serialize>(&self, suffix: &str, artifact: &T) -> Result<PathBuf, IoError> {
        let path = self.artifact_path(suffix);
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::Serialize {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Write metric results to `{experiment}_evaluate.json`.
    ///
    /// `baseline` holds the same metrics scored against the baseline
    /// prediction, when one was evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`].
    #[instrument(skip_all)]
    pub fn write_evaluation(
        &self,
        task: &str,
        n_samples: usize,
        evaluation: &Evaluation,
        baseline: Option<&Evaluation>,
    ) -> Result<PathBuf, IoError> {
        let artifact = EvaluateArtifact {
            experiment: self.experiment.as_str(),
            task,
            n_samples,
            metrics: MetricsEntry::from(evaluation),
            baseline: baseline.map(MetricsEntry::from),
        };
        let path = self.write_json("evaluate", &artifact)?;
        info!(path = %path.display(), "evaluation result written");
        Ok(path)
    }

    /// Write ROC curves to `{experiment}_roc.json`.
    ///
    /// `class_names` labels the per-class curves when non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`].
    #[instrument(skip_all)]
    pub fn write_roc(&self, roc: &RocEvaluation, class_names: &[String]) -> Result<PathBuf, IoError> {
        let curves: Vec<CurveEntry> = roc
            .curves
            .iter()
            .map(|curve| CurveEntry {
                name: class_names.get(curve.class).map(String::as_str),
                roc: curve,
            })
            .collect();
        let artifact = RocArtifact {
            experiment: self.experiment.as_str(),
            roc_auc_score: roc.roc_auc_score,
            multiclass: roc.multiclass,
            curves,
        };
        let path = self.write_json("roc", &artifact)?;
        info!(path = %path.display(), "ROC result written");
        Ok(path)
    }

    /// Write a cross-validation report to `{experiment}_search.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`].
    #[instrument(skip_all)]
    pub fn write_search(&self, results: &CvResults) -> Result<PathBuf, IoError> {
        let artifact = SearchArtifact {
            experiment: self.experiment.as_str(),
            scorer: &results.scorer,
            strategy: &results.strategy,
            n_splits: results.n_splits,
            best: results.best(),
            candidates: &results.candidates,
        };
        let path = self.write_json("search", &artifact)?;
        info!(path = %path.display(), "search result written");
        Ok(path)
    }

    /// Write per-row predictions to `{experiment}_predict.json`.
    ///
    /// Rows are paired positionally with `ids`; `probabilities`, when given,
    /// adds each row's class probability vector.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`].
    #[instrument(skip_all)]
    pub fn write_predictions<P: Serialize>(
        &self,
        ids: &[String],
        predictions: &[P],
        probabilities: Option<&ProbabilityMatrix>,
    ) -> Result<PathBuf, IoError> {
        let entries: Vec<PredictionEntry<'_, P>> = ids
            .iter()
            .zip(predictions)
            .enumerate()
            .map(|(i, (id, prediction))| PredictionEntry {
                id,
                prediction,
                probabilities: probabilities.map(|p| p.row(i)),
            })
            .collect();
        let artifact = PredictArtifact {
            experiment: self.experiment.as_str(),
            n_samples: entries.len(),
            predictions: entries,
        };
        let path = self.write_json("predict", &artifact)?;
        info!(path = %path.display(), "predictions written");
        Ok(path)
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    task: &'a str,
    n_samples: usize,
    metrics: MetricsEntry<'a>,
    baseline: Option<MetricsEntry<'a>>,
}

#[derive(Serialize)]
struct MetricsEntry<'a> {
    values: BTreeMap<&'a str, &'a MetricValue>,
    unresolved: &'a [String],
}

impl<'a> From<&'a Evaluation> for MetricsEntry<'a> {
    fn from(evaluation: &'a Evaluation) -> Self {
        Self {
            values: evaluation.iter().collect(),
            unresolved: evaluation.unresolved(),
        }
    }
}

#[derive(Serialize)]
struct RocArtifact<'a> {
    experiment: &'a str,
    roc_auc_score: f64,
    multiclass: bool,
    curves: Vec<CurveEntry<'a>>,
}

#[derive(Serialize)]
struct CurveEntry<'a> {
    name: Option<&'a str>,
    #[serde(flatten)]
    roc: &'a ClassRoc,
}

#[derive(Serialize)]
struct SearchArtifact<'a> {
    experiment: &'a str,
    scorer: &'a str,
    strategy: &'a str,
    n_splits: usize,
    best: &'a CandidateResult,
    candidates: &'a [CandidateResult],
}

#[derive(Serialize)]
struct PredictArtifact<'a, P> {
    experiment: &'a str,
    n_samples: usize,
    predictions: Vec<PredictionEntry<'a, P>>,
}

#[derive(Serialize)]
struct PredictionEntry<'a, P> {
    id: &'a str,
    prediction: &'a P,
    #[serde(skip_serializing_if = "Option::is_none")]
    probabilities: Option<&'a [f64]>,
}
