//! Reference estimators and feature processors for mlexp experiments.
//!
//! Provides k-nearest-neighbors classification and regression (persisted
//! through the generic binary format), a nearest-centroid classifier with
//! its own JSON format, and a standard scaler whose fitted state survives
//! across processes.

mod centroid;
mod common;
mod knn;
mod scaler;

pub use centroid::NearestCentroid;
pub use knn::{KNeighborsClassifier, KNeighborsRegressor, Weights};
pub use scaler::{SCALER_STATE_FILE, ScalerState, StandardScaler};
