//! Pluggable model persistence.
//!
//! Models are stored as `<model_dir>/<model_tag>.<ext>`. Types that declare a
//! native format through [`Model::persistence`] use it; everything else is
//! written with bincode under the `bin` extension.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::error::ExperimentError;
use crate::model::{Model, Persistence};

/// Extension used by the generic bincode format.
pub const GENERIC_EXTENSION: &str = "bin";

/// Where a model lives on disk: a directory plus a file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLocation {
    dir: PathBuf,
    tag: String,
}

impl ModelLocation {
    /// Create a location.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::InvalidTag`] if the tag is empty, `.`/`..`,
    /// or contains a path separator.
    pub fn new(dir: impl Into<PathBuf>, tag: impl Into<String>) -> Result<Self, ExperimentError> {
        let tag = tag.into();
        validate_tag(&tag)?;
        Ok(Self {
            dir: dir.into(),
            tag,
        })
    }

    /// Directory holding the model file.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem of the model.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Full path for the given extension.
    #[must_use]
    pub fn path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{extension}", self.tag))
    }
}

/// Reject tags that would not stay a single path component.
pub(crate) fn validate_tag(tag: &str) -> Result<(), ExperimentError> {
    if tag.is_empty() || tag == "." || tag == ".." || tag.contains(['/', '\\']) {
        return Err(ExperimentError::InvalidTag {
            tag: tag.to_string(),
        });
    }
    Ok(())
}

/// Create a directory and its parents. Succeeds if it already exists.
///
/// # Errors
///
/// Returns [`ExperimentError::CreateModelDir`] if creation fails.
pub fn make_directory(path: &Path) -> Result<(), ExperimentError> {
    std::fs::create_dir_all(path).map_err(|e| ExperimentError::CreateModelDir {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Store with an explicit persistence strategy.
fn store_with<M: Serialize>(
    persistence: Persistence<M>,
    model: &M,
    location: &ModelLocation,
) -> Result<PathBuf, ExperimentError> {
    make_directory(location.dir())?;
    match persistence {
        Persistence::Native { extension, save, .. } => {
            let path = location.path(extension);
            save(model, &path)?;
            info!(path = %path.display(), format = extension, "model stored");
            Ok(path)
        }
        Persistence::Generic => {
            let path = location.path(GENERIC_EXTENSION);
            let bytes = bincode::serialize(model).map_err(|e| ExperimentError::SerializeModel { source: e })?;
            std::fs::write(&path, &bytes).map_err(|e| ExperimentError::WriteModel {
                path: path.clone(),
                source: e,
            })?;
            info!(path = %path.display(), size_bytes = bytes.len(), "model stored");
            Ok(path)
        }
    }
}

/// Load with an explicit persistence strategy.
fn load_with<M: DeserializeOwned>(
    persistence: Persistence<M>,
    location: &ModelLocation,
) -> Result<M, ExperimentError> {
    match persistence {
        Persistence::Native { extension, load, .. } => {
            let path = location.path(extension);
            let model = load(&path)?;
            debug!(path = %path.display(), format = extension, "model loaded");
            Ok(model)
        }
        Persistence::Generic => {
            let path = location.path(GENERIC_EXTENSION);
            let bytes = std::fs::read(&path).map_err(|e| ExperimentError::ReadModel {
                path: path.clone(),
                source: e,
            })?;
            let model = bincode::deserialize(&bytes).map_err(|e| ExperimentError::DeserializeModel {
                path: path.clone(),
                source: e,
            })?;
            debug!(path = %path.display(), size_bytes = bytes.len(), "model loaded");
            Ok(model)
        }
    }
}

/// Store a model in its default format, creating the directory if needed.
///
/// Returns the path written.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ExperimentError::CreateModelDir`] | Directory creation failed |
/// | [`ExperimentError::SerializeModel`] | bincode encoding failed |
/// | [`ExperimentError::WriteModel`] | File write failed |
/// | [`ExperimentError::Model`] | The native save routine failed |
#[instrument(skip_all, fields(dir = %location.dir().display(), tag = location.tag()))]
pub fn default_store_model<M: Model + Serialize>(
    model: &M,
    location: &ModelLocation,
) -> Result<PathBuf, ExperimentError> {
    store_with(M::persistence(), model, location)
}

/// Load a model stored by [`default_store_model`].
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ExperimentError::ReadModel`] | File read failed |
/// | [`ExperimentError::DeserializeModel`] | bincode decoding failed |
/// | [`ExperimentError::Model`] | The native load routine failed |
#[instrument(skip_all, fields(dir = %location.dir().display(), tag = location.tag()))]
pub fn default_load_model<M: Model + DeserializeOwned>(location: &ModelLocation) -> Result<M, ExperimentError> {
    load_with(M::persistence(), location)
}

/// A store routine: write the model, return the path written.
pub type StoreFn<M> = Box<dyn Fn(&M, &ModelLocation) -> Result<PathBuf, ExperimentError> + Send + Sync>;

/// A load routine: read a model back from its location.
pub type LoadFn<M> = Box<dyn Fn(&ModelLocation) -> Result<M, ExperimentError> + Send + Sync>;

/// The store/load pair an experiment persists models with.
///
/// The two slots are independent: replacing one keeps the other.
pub struct ModelIo<M> {
    store: StoreFn<M>,
    load: LoadFn<M>,
}

impl<M: Model + Serialize + DeserializeOwned + 'static> ModelIo<M> {
    /// Default routines, with the model's persistence strategy resolved once.
    #[must_use]
    pub fn with_defaults() -> Self {
        let persistence = M::persistence();
        debug!(?persistence, "model persistence resolved");
        Self {
            store: Box::new(move |model: &M, location: &ModelLocation| {
                store_with(persistence, model, location)
            }),
            load: Box::new(move |location: &ModelLocation| load_with(persistence, location)),
        }
    }
}

impl<M: Model + Serialize + DeserializeOwned + 'static> Default for ModelIo<M> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<M> ModelIo<M> {
    /// Custom routines for models that are not serde-serializable.
    #[must_use]
    pub fn custom<S, L>(store: S, load: L) -> Self
    where
        S: Fn(&M, &ModelLocation) -> Result<PathBuf, ExperimentError> + Send + Sync + 'static,
        L: Fn(&ModelLocation) -> Result<M, ExperimentError> + Send + Sync + 'static,
    {
        Self {
            store: Box::new(store),
            load: Box::new(load),
        }
    }

    /// Replace only the store routine.
    #[must_use]
    pub fn with_store<S>(mut self, store: S) -> Self
    where
        S: Fn(&M, &ModelLocation) -> Result<PathBuf, ExperimentError> + Send + Sync + 'static,
    {
        self.store = Box::new(store);
        self
    }

    /// Replace only the load routine.
    #[must_use]
    pub fn with_load<L>(mut self, load: L) -> Self
    where
        L: Fn(&ModelLocation) -> Result<M, ExperimentError> + Send + Sync + 'static,
    {
        self.load = Box::new(load);
        self
    }

    /// Store a model.
    ///
    /// # Errors
    ///
    /// Whatever the store routine returns.
    pub fn store(&self, model: &M, location: &ModelLocation) -> Result<PathBuf, ExperimentError> {
        (self.store)(model, location)
    }

    /// Load a model.
    ///
    /// # Errors
    ///
    /// Whatever the load routine returns.
    pub fn load(&self, location: &ModelLocation) -> Result<M, ExperimentError> {
        (self.load)(location)
    }
}

impl<M> std::fmt::Debug for ModelIo<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelIo").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use mlexp_metrics::ProbabilityMatrix;
    use serde::Deserialize;
    use tempfile::TempDir;

    use super::*;
    use crate::error::ModelError;
    use crate::model::ParamValue;
    use crate::setup::Observations;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Constant {
        value: usize,
    }

    impl Model for Constant {
        type Label = usize;

        fn fit(&mut self, _: &Observations, labels: &[usize]) -> Result<(), ModelError> {
            self.value = labels.first().copied().unwrap_or(0);
            Ok(())
        }

        fn predict(&self, observations: &Observations) -> Result<Vec<usize>, ModelError> {
            Ok(vec![self.value; observations.n_rows()])
        }

        fn predict_proba(&self, _: &Observations) -> Result<ProbabilityMatrix, ModelError> {
            Err(ModelError::Unsupported { operation: "predict_proba" })
        }

        fn set_param(&mut self, name: &str, _: &ParamValue) -> Result<(), ModelError> {
            Err(ModelError::UnknownParameter { name: name.to_string() })
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Textual {
        value: usize,
    }

    fn save_text(model: &Textual, path: &Path) -> Result<(), ModelError> {
        std::fs::write(path, model.value.to_string()).map_err(|e| ModelError::NativePersistence {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }

    fn load_text(path: &Path) -> Result<Textual, ModelError> {
        let text = std::fs::read_to_string(path).map_err(|e| ModelError::NativePersistence {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        let value = text.trim().parse().map_err(|e| ModelError::NativePersistence {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        Ok(Textual { value })
    }

    impl Model for Textual {
        type Label = usize;

        fn fit(&mut self, _: &Observations, _: &[usize]) -> Result<(), ModelError> {
            Ok(())
        }

        fn predict(&self, observations: &Observations) -> Result<Vec<usize>, ModelError> {
            Ok(vec![self.value; observations.n_rows()])
        }

        fn set_param(&mut self, name: &str, _: &ParamValue) -> Result<(), ModelError> {
            Err(ModelError::UnknownParameter { name: name.to_string() })
        }

        fn persistence() -> Persistence<Self> {
            Persistence::Native {
                extension: "txt",
                save: save_text,
                load: load_text,
            }
        }
    }

    #[test]
    fn generic_round_trip_creates_directory() {
        let dir = TempDir::new().unwrap();
        let location = ModelLocation::new(dir.path().join("nested/run"), "model").unwrap();
        let path = default_store_model(&Constant { value: 4 }, &location).unwrap();
        assert_eq!(path, dir.path().join("nested/run/model.bin"));
        let loaded: Constant = default_load_model(&location).unwrap();
        assert_eq!(loaded, Constant { value: 4 });
    }

    #[test]
    fn native_format_used_when_declared() {
        let dir = TempDir::new().unwrap();
        let io = ModelIo::<Textual>::with_defaults();
        let location = ModelLocation::new(dir.path(), "m").unwrap();
        let path = io.store(&Textual { value: 9 }, &location).unwrap();
        assert_eq!(path.extension().unwrap(), "txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "9");
        assert_eq!(io.load(&location).unwrap(), Textual { value: 9 });
    }

    #[test]
    fn replacing_store_keeps_load() {
        let dir = TempDir::new().unwrap();
        let location = ModelLocation::new(dir.path(), "m").unwrap();
        default_store_model(&Constant { value: 2 }, &location).unwrap();

        let io = ModelIo::<Constant>::with_defaults()
            .with_store(|_, _| Err(ExperimentError::NotImplemented { operation: "store_model" }));
        assert!(io.store(&Constant { value: 1 }, &location).is_err());
        assert_eq!(io.load(&location).unwrap(), Constant { value: 2 });
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let location = ModelLocation::new(dir.path(), "absent").unwrap();
        let err = default_load_model::<Constant>(&location).unwrap_err();
        assert!(matches!(err, ExperimentError::ReadModel { .. }));
    }

    #[test]
    fn corrupt_file_is_deserialize_error() {
        let dir = TempDir::new().unwrap();
        let location = ModelLocation::new(dir.path(), "corrupt").unwrap();
        std::fs::write(location.path(GENERIC_EXTENSION), b"").unwrap();
        let err = default_load_model::<Constant>(&location).unwrap_err();
        assert!(matches!(err, ExperimentError::DeserializeModel { .. }));
    }

    #[test]
    fn make_directory_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b");
        make_directory(&target).unwrap();
        make_directory(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn tags_must_be_single_components() {
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(ModelLocation::new("x", bad).is_err(), "{bad:?} accepted");
        }
        assert!(ModelLocation::new("x", "_development").is_ok());
    }
}
