use mlexp_core::{ModelError, Observations, ParamValue};

/// Reject empty training sets and label/row count mismatches.
pub(crate) fn check_training<L>(observations: &Observations, labels: &[L]) -> Result<(), ModelError> {
    if observations.n_rows() == 0 {
        return Err(ModelError::InvalidInput {
            reason: "cannot fit on zero samples".to_string(),
        });
    }
    if labels.len() != observations.n_rows() {
        return Err(ModelError::InvalidInput {
            reason: format!("{} labels for {} rows", labels.len(), observations.n_rows()),
        });
    }
    Ok(())
}

/// Reject prediction input whose width differs from the training width.
pub(crate) fn check_width(observations: &Observations, expected: usize) -> Result<(), ModelError> {
    if observations.n_features() != expected {
        return Err(ModelError::InvalidInput {
            reason: format!(
                "model was fitted on {expected} features, got {}",
                observations.n_features()
            ),
        });
    }
    Ok(())
}

pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

pub(crate) fn invalid_parameter(name: &str, value: &ParamValue) -> ModelError {
    ModelError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}
