//! Classification: default metrics, label/probability evaluation and ROC analysis.

use mlexp_metrics::{
    Average, ClassificationReport, ConfusionMatrix, MetricError, MetricValue, Prediction,
    ProbabilityMatrix, RocCurve, Scorer, accuracy, balanced_accuracy, f1_score, log_loss, one_hot,
    roc_auc_ovr_weighted, roc_curve,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::ExperimentError;
use crate::registry::{Evaluation, MetricRegistry};
use crate::task::Task;

/// An averaged label metric, evaluated once per [`Average`].
pub type AveragedFn = fn(&[usize], &[usize], Average) -> Result<f64, MetricError>;

/// A metric that scores either hard labels or class probabilities.
pub type ScalarFn =
    Box<dyn Fn(&[usize], Prediction<'_, usize>) -> Result<MetricValue, MetricError> + Send + Sync>;

/// A classification registry entry.
pub enum ClassificationMetric {
    /// Reported as `<name>_macro`, `<name>_micro` and `<name>_weighted`.
    Averaged(AveragedFn),
    /// Reported under its own name. Scored on labels first, then on class
    /// probabilities if the labels are rejected.
    Scalar(ScalarFn),
}

impl ClassificationMetric {
    /// Wrap an arbitrary scoring closure.
    pub fn scalar<F>(func: F) -> Self
    where
        F: Fn(&[usize], Prediction<'_, usize>) -> Result<MetricValue, MetricError> + Send + Sync + 'static,
    {
        Self::Scalar(Box::new(func))
    }

    /// A metric defined on hard labels only.
    #[must_use]
    pub fn labels(metric: &'static str, func: fn(&[usize], &[usize]) -> Result<f64, MetricError>) -> Self {
        Self::scalar(move |truth, prediction| match prediction {
            Prediction::Labels(predicted) => func(truth, predicted).map(MetricValue::Scalar),
            Prediction::Probabilities(_) => Err(MetricError::LabelsRequired { metric }),
        })
    }

    /// A metric defined on class probabilities only.
    #[must_use]
    pub fn probabilities(
        metric: &'static str,
        func: fn(&[usize], &ProbabilityMatrix) -> Result<f64, MetricError>,
    ) -> Self {
        Self::scalar(move |truth, prediction| match prediction {
            Prediction::Probabilities(probabilities) => func(truth, probabilities).map(MetricValue::Scalar),
            Prediction::Labels(_) => Err(MetricError::ProbabilitiesRequired { metric }),
        })
    }
}

/// Supervised classification over class labels `0..n_classes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classification;

impl Classification {
    /// Scorer ranking search candidates by default.
    pub const STANDARD_METRIC: &'static str = "f1_macro";
}

impl Task for Classification {
    type Label = usize;
    type Metric = ClassificationMetric;

    fn name(&self) -> &'static str {
        "classification"
    }

    fn standard_metric(&self) -> Option<&'static str> {
        Some(Self::STANDARD_METRIC)
    }

    fn scorer(&self, name: &str) -> Result<Scorer<usize>, MetricError> {
        Scorer::classification(name)
    }

    fn default_metrics(&self) -> MetricRegistry<ClassificationMetric> {
        let mut metrics = MetricRegistry::new();
        metrics.insert("f1", ClassificationMetric::Averaged(f1_score));
        metrics.insert("log_loss", ClassificationMetric::probabilities("log_loss", log_loss));
        metrics.insert(
            "balanced_accuracy",
            ClassificationMetric::labels("balanced_accuracy", balanced_accuracy),
        );
        metrics.insert("accuracy", ClassificationMetric::labels("accuracy", accuracy));
        metrics.insert(
            "confusion_matrix",
            ClassificationMetric::scalar(|truth, prediction| match prediction {
                Prediction::Labels(predicted) => {
                    ConfusionMatrix::from_predictions(truth, predicted).map(MetricValue::ConfusionMatrix)
                }
                Prediction::Probabilities(_) => Err(MetricError::LabelsRequired {
                    metric: "confusion_matrix",
                }),
            }),
        );
        metrics.insert(
            "classification_report",
            ClassificationMetric::scalar(|truth, prediction| match prediction {
                Prediction::Labels(predicted) => {
                    ClassificationReport::from_predictions(truth, predicted).map(MetricValue::Report)
                }
                Prediction::Probabilities(_) => Err(MetricError::LabelsRequired {
                    metric: "classification_report",
                }),
            }),
        );
        metrics
    }

    #[instrument(skip_all, fields(n_metrics = metrics.len(), n_samples = labels.len()))]
    fn evaluate_predictions(
        &self,
        metrics: &MetricRegistry<ClassificationMetric>,
        labels: &[usize],
        predictions: &[usize],
        class_probabilities: Option<&ProbabilityMatrix>,
    ) -> Result<Evaluation, ExperimentError> {
        let mut evaluation = Evaluation::new();
        for (name, metric) in metrics.iter() {
            match metric {
                ClassificationMetric::Averaged(func) => {
                    for average in Average::ALL {
                        let value = func(labels, predictions, average)?;
                        evaluation.insert(format!("{name}_{}", average.suffix()), value.into());
                    }
                }
                ClassificationMetric::Scalar(func) => {
                    match score_with_fallback(func, labels, predictions, class_probabilities) {
                        Ok(value) => evaluation.insert(name, value),
                        Err(e) => {
                            warn!(metric = name, error = %e, "metric could not be computed, skipping");
                            evaluation.mark_unresolved(name);
                        }
                    }
                }
            }
        }

        for (name, value) in evaluation.iter() {
            info!("{name}: {value}");
        }
        Ok(evaluation)
    }
}

/// Score on labels; on a domain error retry on probabilities when available.
fn score_with_fallback(
    func: &ScalarFn,
    labels: &[usize],
    predictions: &[usize],
    class_probabilities: Option<&ProbabilityMatrix>,
) -> Result<MetricValue, MetricError> {
    match func(labels, Prediction::Labels(predictions)) {
        Ok(value) => Ok(value),
        Err(e) if e.is_domain_error() => match class_probabilities {
            Some(probabilities) => {
                debug!(error = %e, "retrying metric on class probabilities");
                func(labels, Prediction::Probabilities(probabilities))
            }
            None => Err(e),
        },
        Err(e) => Err(e),
    }
}

/// ROC curve and AUC of one class against the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRoc {
    /// The positive class.
    pub class: usize,
    /// Number of test samples of this class.
    pub support: usize,
    /// Area under `curve`.
    pub auc: f64,
    /// The curve itself.
    pub curve: RocCurve,
}

/// Result of ROC analysis on a test set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocEvaluation {
    /// Binary AUC, or support-weighted one-vs-rest AUC for multiclass.
    pub roc_auc_score: f64,
    /// Whether the one-vs-rest branch was taken.
    pub multiclass: bool,
    /// One curve for binary problems, one per present class otherwise.
    pub curves: Vec<ClassRoc>,
}

/// ROC analysis of class probabilities against true labels.
///
/// With at most two probability columns the problem is binary: class 1 is
/// the positive class and only column 1 is used. Wider matrices get a
/// support-weighted one-vs-rest AUC plus one curve per class present in
/// `labels`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ExperimentError::InsufficientData`] | One or fewer probability rows |
/// | [`ExperimentError::Metric`] | Length mismatch, a label without a column, or a single class |
#[instrument(skip_all, fields(n_samples = labels.len(), n_classes = class_probabilities.n_classes()))]
pub fn evaluate_roc(
    labels: &[usize],
    class_probabilities: &ProbabilityMatrix,
) -> Result<RocEvaluation, ExperimentError> {
    if class_probabilities.n_rows() <= 1 {
        return Err(ExperimentError::InsufficientData {
            records: class_probabilities.n_rows(),
        });
    }
    let n_classes = class_probabilities.n_classes();

    let evaluation = if n_classes <= 2 {
        if n_classes < 2 {
            return Err(MetricError::ClassOutOfRange { label: 1, n_classes }.into());
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(MetricError::ClassOutOfRange { label, n_classes }.into());
        }
        let truth: Vec<bool> = labels.iter().map(|&l| l == 1).collect();
        let curve = roc_curve(&truth, &class_probabilities.column(1))?;
        let auc = curve.auc();
        RocEvaluation {
            roc_auc_score: auc,
            multiclass: false,
            curves: vec![ClassRoc {
                class: 1,
                support: truth.iter().filter(|&&t| t).count(),
                auc,
                curve,
            }],
        }
    } else {
        let roc_auc_score = roc_auc_ovr_weighted(labels, class_probabilities)?;
        let mut curves = Vec::with_capacity(n_classes);
        for (class, truth) in one_hot(labels, n_classes).iter().enumerate() {
            let support = truth.iter().filter(|&&t| t).count();
            if support == 0 {
                debug!(class, "class absent from labels, no ROC curve");
                continue;
            }
            let curve = roc_curve(truth, &class_probabilities.column(class))?;
            curves.push(ClassRoc {
                class,
                support,
                auc: curve.auc(),
                curve,
            });
        }
        RocEvaluation {
            roc_auc_score,
            multiclass: true,
            curves,
        }
    };

    info!(roc_auc_score = evaluation.roc_auc_score, "ROC AUC computed");
    for class_roc in &evaluation.curves {
        debug!(class = class_roc.class, auc = class_roc.auc, "class ROC AUC");
    }
    Ok(evaluation)
}
