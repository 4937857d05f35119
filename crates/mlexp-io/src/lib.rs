//! Dataset reading, validation, and result serialization for mlexp experiments.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{Dataset, ExperimentName};
pub use error::IoError;
pub use reader::DatasetReader;
pub use writer::ResultWriter;
