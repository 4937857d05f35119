//! Receiver operating characteristic curves and area under the curve.

use serde::Serialize;
use tracing::debug;

use crate::error::{MetricError, check_lengths};
use crate::probability::ProbabilityMatrix;

/// A ROC curve: false- and true-positive rates at each distinct score threshold.
///
/// The first point is always `(0, 0)` at an infinite threshold, the last is
/// `(1, 1)` at the smallest score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    /// False-positive rate per threshold, non-decreasing.
    pub fpr: Vec<f64>,
    /// True-positive rate per threshold, non-decreasing.
    pub tpr: Vec<f64>,
    /// Decreasing score thresholds. The leading infinity serialises as `null`.
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Area under this curve.
    #[must_use]
    pub fn auc(&self) -> f64 {
        auc(&self.fpr, &self.tpr)
    }
}

/// Compute the ROC curve of scores against binary truth.
///
/// Samples with equal scores are grouped into a single threshold.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MetricError::EmptyInput`] | Zero samples |
/// | [`MetricError::LengthMismatch`] | Lengths differ |
/// | [`MetricError::NonFiniteValue`] | A score is NaN or infinite |
/// | [`MetricError::SingleClass`] | Truth is all positive or all negative |
pub fn roc_curve(truth: &[bool], scores: &[f64]) -> Result<RocCurve, MetricError> {
    check_lengths(truth.len(), scores.len())?;
    if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
        return Err(MetricError::NonFiniteValue { index });
    }
    let positives = truth.iter().filter(|&&t| t).count();
    let negatives = truth.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(MetricError::SingleClass);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    let (mut tp, mut fp) = (0usize, 0usize);

    for (rank, &idx) in order.iter().enumerate() {
        if truth[idx] {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_group = order
            .get(rank + 1)
            .is_none_or(|&next| scores[next] != scores[idx]);
        if last_of_group {
            fpr.push(fp as f64 / negatives as f64);
            tpr.push(tp as f64 / positives as f64);
            thresholds.push(scores[idx]);
        }
    }

    Ok(RocCurve {
        fpr,
        tpr,
        thresholds,
    })
}

/// Trapezoidal area under a curve given by monotonic `x` and matching `y`.
#[must_use]
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum::<f64>()
        .abs()
}

/// Area under the ROC curve of scores against binary truth.
///
/// # Errors
///
/// Same as [`roc_curve`].
pub fn roc_auc_score(truth: &[bool], scores: &[f64]) -> Result<f64, MetricError> {
    roc_curve(truth, scores).map(|c| c.auc())
}

/// One boolean column per class: `encoded[c][i]` is `labels[i] == c`.
#[must_use]
pub fn one_hot(labels: &[usize], n_classes: usize) -> Vec<Vec<bool>> {
    (0..n_classes)
        .map(|c| labels.iter().map(|&l| l == c).collect())
        .collect()
}

/// Per-class one-vs-rest AUC alongside each class's true support.
///
/// Classes absent from the truth have no defined AUC and are reported as
/// `None`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MetricError::LengthMismatch`] | Row count differs from label count |
/// | [`MetricError::ClassOutOfRange`] | A label has no probability column |
/// | [`MetricError::SingleClass`] | Every sample belongs to one class |
pub fn one_vs_rest_auc(
    labels: &[usize],
    probabilities: &ProbabilityMatrix,
) -> Result<Vec<(Option<f64>, usize)>, MetricError> {
    check_lengths(labels.len(), probabilities.n_rows())?;
    let n_classes = probabilities.n_classes();
    if let Some(&label) = labels.iter().find(|&&l| l >= n_classes) {
        return Err(MetricError::ClassOutOfRange { label, n_classes });
    }
    let encoded = one_hot(labels, n_classes);
    let mut per_class = Vec::with_capacity(n_classes);
    for (class, truth) in encoded.iter().enumerate() {
        let support = truth.iter().filter(|&&t| t).count();
        if support == labels.len() {
            return Err(MetricError::SingleClass);
        }
        let auc = if support == 0 {
            None
        } else {
            Some(roc_auc_score(truth, &probabilities.column(class))?)
        };
        per_class.push((auc, support));
    }
    Ok(per_class)
}

/// Support-weighted mean of the one-vs-rest AUCs.
///
/// Columns for classes absent from `labels` carry zero weight.
///
/// # Errors
///
/// Same as [`one_vs_rest_auc`].
pub fn roc_auc_ovr_weighted(
    labels: &[usize],
    probabilities: &ProbabilityMatrix,
) -> Result<f64, MetricError> {
    let per_class = one_vs_rest_auc(labels, probabilities)?;
    let absent: Vec<usize> = per_class
        .iter()
        .enumerate()
        .filter_map(|(class, &(auc, _))| auc.is_none().then_some(class))
        .collect();
    if !absent.is_empty() {
        debug!(
            ?absent,
            n_columns = probabilities.n_classes(),
            "probability columns without true samples excluded from ROC AUC"
        );
    }
    let weighted: f64 = per_class
        .iter()
        .filter_map(|&(auc, support)| auc.map(|a| a * support as f64))
        .sum();
    Ok(weighted / labels.len() as f64)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    const TOL: f64 = 1e-12;

    /// Fraction of (positive, negative) pairs ranked correctly, ties count half.
    fn pairwise_auc(truth: &[bool], scores: &[f64]) -> f64 {
        let mut wins = 0.0;
        let mut pairs = 0.0;
        for (i, &ti) in truth.iter().enumerate() {
            for (j, &tj) in truth.iter().enumerate() {
                if ti && !tj {
                    pairs += 1.0;
                    if scores[i] > scores[j] {
                        wins += 1.0;
                    } else if scores[i] == scores[j] {
                        wins += 0.5;
                    }
                }
            }
        }
        wins / pairs
    }

    #[test]
    fn perfect_separation() {
        let truth = [false, false, true, true];
        let scores = [0.1, 0.2, 0.8, 0.9];
        assert!((roc_auc_score(&truth, &scores).unwrap() - 1.0).abs() < TOL);
    }

    #[test]
    fn known_curve() {
        let truth = [false, false, true, true];
        let scores = [0.1, 0.4, 0.35, 0.8];
        let curve = roc_curve(&truth, &scores).unwrap();
        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(curve.thresholds[0].is_infinite());
        assert!((curve.auc() - 0.75).abs() < TOL);
    }

    #[test]
    fn ties_are_grouped() {
        let truth = [true, false, true, false];
        let scores = [0.5, 0.5, 0.5, 0.5];
        let curve = roc_curve(&truth, &scores).unwrap();
        assert_eq!(curve.fpr.len(), 2);
        assert!((curve.auc() - 0.5).abs() < TOL);
    }

    #[test]
    fn matches_pairwise_ranking() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let truth: Vec<bool> = (0..60).map(|i| i % 3 == 0).collect();
        let scores: Vec<f64> = (0..60)
            .map(|_| (rng.r#gen::<f64>() * 10.0).round() / 10.0)
            .collect();
        let auc = roc_auc_score(&truth, &scores).unwrap();
        assert!((auc - pairwise_auc(&truth, &scores)).abs() < 1e-9);
    }

    #[test]
    fn single_class_rejected() {
        let err = roc_auc_score(&[true, true], &[0.1, 0.9]).unwrap_err();
        assert!(matches!(err, MetricError::SingleClass));
    }

    #[test]
    fn weighted_ovr_is_support_weighted_mean() {
        let labels = vec![0, 0, 0, 1, 1, 2];
        let probs = ProbabilityMatrix::from_rows(vec![
            vec![0.7, 0.2, 0.1],
            vec![0.3, 0.4, 0.3],
            vec![0.5, 0.1, 0.4],
            vec![0.2, 0.6, 0.2],
            vec![0.4, 0.3, 0.3],
            vec![0.1, 0.2, 0.7],
        ])
        .unwrap();
        let per_class = one_vs_rest_auc(&labels, &probs).unwrap();
        let expected: f64 = per_class
            .iter()
            .map(|&(auc, support)| auc.unwrap() * support as f64)
            .sum::<f64>()
            / 6.0;
        let weighted = roc_auc_ovr_weighted(&labels, &probs).unwrap();
        assert!((weighted - expected).abs() < TOL);
    }

    #[test]
    fn absent_class_has_no_auc() {
        let labels = vec![0, 1, 0, 1];
        let probs = ProbabilityMatrix::from_rows(vec![
            vec![0.6, 0.3, 0.1],
            vec![0.2, 0.7, 0.1],
            vec![0.5, 0.4, 0.1],
            vec![0.3, 0.6, 0.1],
        ])
        .unwrap();
        let per_class = one_vs_rest_auc(&labels, &probs).unwrap();
        assert_eq!(per_class[2], (None, 0));

        let column_0 = roc_auc_score(&[true, false, true, false], &probs.column(0)).unwrap();
        let column_1 = roc_auc_score(&[false, true, false, true], &probs.column(1)).unwrap();
        let weighted = roc_auc_ovr_weighted(&labels, &probs).unwrap();
        assert!((weighted - (column_0 + column_1) / 2.0).abs() < TOL);
    }

    #[test]
    fn one_hot_columns() {
        let encoded = one_hot(&[0, 2, 1], 3);
        assert_eq!(encoded[0], vec![true, false, false]);
        assert_eq!(encoded[2], vec![false, true, false]);
    }
}
