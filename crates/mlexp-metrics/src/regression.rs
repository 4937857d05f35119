//! Regression error metrics.

use crate::error::{MetricError, check_lengths};

fn residuals<'a>(
    truth: &'a [f64],
    predicted: &'a [f64],
) -> Result<impl Iterator<Item = f64> + 'a, MetricError> {
    check_lengths(truth.len(), predicted.len())?;
    if let Some(index) = truth
        .iter()
        .chain(predicted)
        .position(|v| !v.is_finite())
    {
        return Err(MetricError::NonFiniteValue {
            index: index % truth.len(),
        });
    }
    Ok(truth.iter().zip(predicted).map(|(t, p)| t - p))
}

/// Mean of squared residuals.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MetricError::EmptyInput`] | Zero samples |
/// | [`MetricError::LengthMismatch`] | Lengths differ |
/// | [`MetricError::NonFiniteValue`] | A value is NaN or infinite |
pub fn mean_squared_error(truth: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
    let sum: f64 = residuals(truth, predicted)?.map(|r| r * r).sum();
    Ok(sum / truth.len() as f64)
}

/// Mean of absolute residuals.
///
/// # Errors
///
/// Same as [`mean_squared_error`].
pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
    let sum: f64 = residuals(truth, predicted)?.map(f64::abs).sum();
    Ok(sum / truth.len() as f64)
}

/// Square root of [`mean_squared_error`].
///
/// # Errors
///
/// Same as [`mean_squared_error`].
pub fn root_mean_squared_error(truth: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
    mean_squared_error(truth, predicted).map(f64::sqrt)
}

/// Coefficient of determination.
///
/// A constant truth scores 1.0 for a perfect fit and 0.0 otherwise.
///
/// # Errors
///
/// Same as [`mean_squared_error`].
pub fn r2_score(truth: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
    let ss_res: f64 = residuals(truth, predicted)?.map(|r| r * r).sum();
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}
