//! CSV dataset reader with full input validation.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use mlexp_core::{MLSetup, Observations, Target};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::Dataset;

/// Reads a labeled feature table from a CSV file.
///
/// Expected CSV format:
/// - Header row required
/// - One label column, chosen by name
/// - Optionally one ID column, chosen by name
/// - Every other column is a numeric feature, kept in file order
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingColumn`] | Label or ID column not in the header |
/// | [`IoError::NoFeatureColumns`] | No columns besides label and ID |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Feature (or regression target) is NaN, Inf, or unparseable |
/// | [`IoError::EmptyLabel`] | Class label cell is empty |
/// | [`IoError::DuplicateRowId`] | Same ID appears twice |
pub struct DatasetReader {
    path: PathBuf,
    label_column: String,
    id_column: Option<String>,
}

/// Parsed table before labels are interpreted.
struct RawTable {
    ids: Vec<String>,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    labels: Vec<String>,
}

impl DatasetReader {
    /// Create a reader for the given CSV file and label column.
    pub fn new(path: &Path, label_column: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            label_column: label_column.into(),
            id_column: None,
        }
    }

    /// Use a column as row IDs instead of treating it as a feature.
    #[must_use]
    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = Some(id_column.into());
        self
    }

    /// Read a classification dataset.
    ///
    /// Labels are arbitrary strings; they are encoded as indices into the
    /// sorted set of distinct labels.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_classification(&self) -> Result<Dataset<usize>, IoError> {
        let table = self.read_table()?;
        for (row_index, label) in table.labels.iter().enumerate() {
            if label.is_empty() {
                return Err(IoError::EmptyLabel {
                    path: self.path.clone(),
                    row_index,
                });
            }
        }
        let class_names: Vec<String> = table
            .labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let encoding: HashMap<&str, usize> = class_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let labels = table.labels.iter().map(|l| encoding[l.as_str()]).collect();

        info!(
            n_samples = table.rows.len(),
            n_features = table.columns.len(),
            n_classes = class_names.len(),
            "classification dataset loaded"
        );
        self.assemble(table.ids, table.columns, table.rows, labels, class_names)
    }

    /// Read a regression dataset with a numeric target column.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_regression(&self) -> Result<Dataset<f64>, IoError> {
        let table = self.read_table()?;
        let targets = table
            .labels
            .iter()
            .enumerate()
            .map(|(row_index, raw)| self.parse_finite(raw, row_index, &self.label_column))
            .collect::<Result<Vec<f64>, IoError>>()?;

        info!(
            n_samples = table.rows.len(),
            n_features = table.columns.len(),
            "regression dataset loaded"
        );
        self.assemble(table.ids, table.columns, table.rows, targets, Vec::new())
    }

    fn assemble<L: Target>(
        &self,
        ids: Vec<String>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
        labels: Vec<L>,
        class_names: Vec<String>,
    ) -> Result<Dataset<L>, IoError> {
        let dataset_error = |source| IoError::Dataset {
            path: self.path.clone(),
            source,
        };
        let observations = Observations::new(columns, rows).map_err(dataset_error)?;
        let data = MLSetup::new(observations, labels).map_err(dataset_error)?;
        Ok(Dataset::new(ids, data, class_names))
    }

    fn parse_finite(&self, raw: &str, row_index: usize, column: &str) -> Result<f64, IoError> {
        let non_finite = || IoError::NonFiniteValue {
            path: self.path.clone(),
            row_index,
            column: column.to_string(),
            raw: raw.to_string(),
        };
        let value: f64 = raw.trim().parse().map_err(|_| non_finite())?;
        if !value.is_finite() {
            return Err(non_finite());
        }
        Ok(value)
    }

    fn column_position(&self, header: &csv::StringRecord, column: &str) -> Result<usize, IoError> {
        header
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| IoError::MissingColumn {
                path: self.path.clone(),
                column: column.to_string(),
            })
    }

    fn read_table(&self) -> Result<RawTable, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so that InconsistentRowLength fires instead of CsvParse.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr
            .headers()
            .map_err(|e| IoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?
            .clone();
        let expected_cols = header.len();

        let label_pos = self.column_position(&header, &self.label_column)?;
        let id_pos = self
            .id_column
            .as_deref()
            .map(|column| self.column_position(&header, column))
            .transpose()?;
        let feature_positions: Vec<usize> = (0..expected_cols)
            .filter(|&i| i != label_pos && Some(i) != id_pos)
            .collect();
        if feature_positions.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        let columns: Vec<String> = feature_positions
            .iter()
            .map(|&i| header.get(i).unwrap_or_default().to_string())
            .collect();
        debug!(expected_cols, n_features = columns.len(), "read CSV header");

        let mut ids = Vec::new();
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| IoError::CsvParse {
                path: self.path.clone(),
                offset: e.position().map_or(0, |p| p.byte()),
                source: e,
            })?;

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let id = match id_pos {
                Some(pos) => record.get(pos).unwrap_or_default().to_string(),
                None => row_index.to_string(),
            };
            if let Some(&first_row) = seen.get(&id) {
                return Err(IoError::DuplicateRowId {
                    path: self.path.clone(),
                    id,
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(id.clone(), row_index);

            let row = feature_positions
                .iter()
                .zip(&columns)
                .map(|(&pos, column)| self.parse_finite(record.get(pos).unwrap_or_default(), row_index, column))
                .collect::<Result<Vec<f64>, IoError>>()?;

            ids.push(id);
            rows.push(row);
            labels.push(record.get(label_pos).unwrap_or_default().trim().to_string());
        }

        if rows.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        Ok(RawTable {
            ids,
            columns,
            rows,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_classification_encodes_sorted_classes() {
        let csv = "id,petal,sepal,species\nr1,1.0,2.0,virginica\nr2,1.5,2.5,setosa\nr3,0.5,1.0,versicolor\nr4,0.7,1.1,setosa\n";
        let f = write_csv(csv);
        let ds = DatasetReader::new(f.path(), "species")
            .with_id_column("id")
            .read_classification()
            .unwrap();
        assert_eq!(ds.n_samples(), 4);
        assert_eq!(ds.class_names(), &["setosa", "versicolor", "virginica"]);
        assert_eq!(ds.data().labels(), &[2, 0, 1, 0]);
        assert_eq!(ds.data().observations().columns(), &["petal", "sepal"]);
        assert_eq!(ds.ids()[2], "r3");
        assert_eq!(ds.class_name(1), Some("versicolor"));
    }

    #[test]
    fn label_column_anywhere_in_header() {
        let csv = "target,x\n1.5,10.0\n2.5,20.0\n";
        let f = write_csv(csv);
        let ds = DatasetReader::new(f.path(), "target").read_regression().unwrap();
        assert_eq!(ds.data().labels(), &[1.5, 2.5]);
        assert_eq!(ds.data().observations().rows(), &[vec![10.0], vec![20.0]]);
        assert_eq!(ds.ids(), &["0", "1"]);
        assert!(ds.class_names().is_empty());
    }

    #[test]
    fn missing_label_column_error() {
        let f = write_csv("x,y\n1.0,2.0\n");
        let err = DatasetReader::new(f.path(), "label").read_classification().unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { .. }));
    }

    #[test]
    fn missing_id_column_error() {
        let f = write_csv("x,label\n1.0,a\n");
        let err = DatasetReader::new(f.path(), "label")
            .with_id_column("id")
            .read_classification()
            .unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { column, .. } if column == "id"));
    }

    #[test]
    fn no_feature_columns_error() {
        let f = write_csv("id,label\nr1,a\n");
        let err = DatasetReader::new(f.path(), "label")
            .with_id_column("id")
            .read_classification()
            .unwrap_err();
        assert!(matches!(err, IoError::NoFeatureColumns { .. }));
    }

    #[test]
    fn empty_dataset_error() {
        let f = write_csv("x,label\n");
        let err = DatasetReader::new(f.path(), "label").read_classification().unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn inconsistent_row_length_error() {
        let f = write_csv("x,y,label\n1.0,2.0,a\n1.0,b\n");
        let err = DatasetReader::new(f.path(), "label").read_classification().unwrap_err();
        assert!(matches!(err, IoError::InconsistentRowLength { row_index: 1, .. }));
    }

    #[test]
    fn non_finite_feature_error() {
        let f = write_csv("x,label\nNaN,a\n");
        let err = DatasetReader::new(f.path(), "label").read_classification().unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { column, .. } if column == "x"));
    }

    #[test]
    fn unparseable_target_error() {
        let f = write_csv("x,y\n1.0,abc\n");
        let err = DatasetReader::new(f.path(), "y").read_regression().unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { column, .. } if column == "y"));
    }

    #[test]
    fn empty_label_error() {
        let f = write_csv("x,label\n1.0,a\n2.0,\n");
        let err = DatasetReader::new(f.path(), "label").read_classification().unwrap_err();
        assert!(matches!(err, IoError::EmptyLabel { row_index: 1, .. }));
    }

    #[test]
    fn duplicate_row_id_error() {
        let f = write_csv("id,x,label\nr1,1.0,a\nr1,2.0,b\n");
        let err = DatasetReader::new(f.path(), "label")
            .with_id_column("id")
            .read_classification()
            .unwrap_err();
        assert!(matches!(err, IoError::DuplicateRowId { .. }));
    }

    #[test]
    fn missing_file_error() {
        let err = DatasetReader::new(Path::new("/nonexistent/data.csv"), "label")
            .read_classification()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}
