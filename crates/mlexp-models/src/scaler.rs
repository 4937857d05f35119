//! Column standardization with fitted state persisted next to the models.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use mlexp_core::{ExperimentError, FeatureProcessor, Observations, make_directory};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// File name of the persisted state inside the state directory.
pub const SCALER_STATE_FILE: &str = "standard_scaler.json";

/// Fitted column statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    /// Column names the statistics were fitted on, in order.
    pub columns: Vec<String>,
    /// Per-column mean.
    pub means: Vec<f64>,
    /// Per-column population standard deviation, with zero replaced by one.
    pub stds: Vec<f64>,
}

impl ScalerState {
    fn fit(features: &Observations) -> Self {
        let n = features.n_rows() as f64;
        let n_features = features.n_features();
        let mut means = vec![0.0; n_features];
        for row in features.rows() {
            for (m, &v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut stds = vec![0.0; n_features];
        for row in features.rows() {
            for ((s, &v), &m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        let stds = stds
            .into_iter()
            .map(|s| {
                let std = (s / n).sqrt();
                if std > 0.0 { std } else { 1.0 }
            })
            .collect();

        Self {
            columns: features.columns().to_vec(),
            means,
            stds,
        }
    }

    fn apply(&self, features: &Observations) -> Result<Observations, ExperimentError> {
        if features.columns() != self.columns.as_slice() {
            return Err(ExperimentError::Processing {
                reason: format!(
                    "scaler was fitted on columns {:?}, got {:?}",
                    self.columns,
                    features.columns()
                ),
            });
        }
        let rows = features
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.means)
                    .zip(&self.stds)
                    .map(|((v, m), s)| (v - m) / s)
                    .collect()
            })
            .collect();
        features.with_features(self.columns.clone(), rows)
    }
}

/// Standardizes every column to zero mean and unit variance.
///
/// Fitting writes the statistics to `<state_dir>/standard_scaler.json`, so a
/// scaler created later over the same directory can transform without being
/// fitted again. Constant columns are centered but not scaled.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    state_dir: PathBuf,
    state: Option<ScalerState>,
}

impl StandardScaler {
    /// Create an unfitted scaler persisting into `state_dir`.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            state: None,
        }
    }

    /// Directory holding the persisted state.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Path of the persisted state file.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(SCALER_STATE_FILE)
    }

    /// The in-memory fitted state, if this instance was fitted.
    #[must_use]
    pub fn state(&self) -> Option<&ScalerState> {
        self.state.as_ref()
    }

    fn save(&self, state: &ScalerState) -> Result<(), ExperimentError> {
        make_directory(&self.state_dir)?;
        let path = self.state_path();
        let file = File::create(&path).map_err(|source| ExperimentError::WriteModel {
            path: path.clone(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), state).map_err(|e| ExperimentError::Processing {
            reason: format!("cannot write scaler state to {}: {e}", path.display()),
        })?;
        info!(path = %path.display(), "scaler state stored");
        Ok(())
    }

    fn load(&self) -> Result<ScalerState, ExperimentError> {
        let path = self.state_path();
        if !path.exists() {
            return Err(ExperimentError::Processing {
                reason: format!("scaler is not fitted and {} does not exist", path.display()),
            });
        }
        let file = File::open(&path).map_err(|source| ExperimentError::ReadModel {
            path: path.clone(),
            source,
        })?;
        let state = serde_json::from_reader(BufReader::new(file)).map_err(|e| ExperimentError::Processing {
            reason: format!("cannot read scaler state from {}: {e}", path.display()),
        })?;
        debug!(path = %path.display(), "scaler state loaded");
        Ok(state)
    }

    /// Remove the persisted state file, if present.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::WriteModel`] if the file exists but cannot be removed.
    pub fn clear(&mut self) -> Result<(), ExperimentError> {
        self.state = None;
        let path = self.state_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|source| ExperimentError::WriteModel { path, source })?;
        }
        Ok(())
    }
}

impl FeatureProcessor for StandardScaler {
    fn fit_model_based_features(&mut self, features: &Observations) -> Result<(), ExperimentError> {
        if features.n_rows() == 0 {
            return Err(ExperimentError::Processing {
                reason: "cannot fit a scaler on zero rows".to_string(),
            });
        }
        let state = ScalerState::fit(features);
        self.save(&state)?;
        self.state = Some(state);
        Ok(())
    }

    fn transform_model_based_features(&self, features: &Observations) -> Result<Observations, ExperimentError> {
        match &self.state {
            Some(state) => state.apply(features),
            None => self.load()?.apply(features),
        }
    }
}
