//! The two data-shape contracts around the clustering core: narrowing an
//! uploaded table with named columns down to two numeric feature columns,
//! and writing the table back out as CSV with an appended label column.
//!
//! Cells are kept as text, since uploaded schemas are arbitrary and only
//! the two columns the caller selects ever need to parse as numbers.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use ndarray::{Array2, ArrayBase, Data, Ix1};
use std::fs::File;
use std::io::{Read, Write};
use std::iter;
use std::path::Path;
use thiserror::Error;

/// An error when reading, projecting or exporting a table.
#[derive(Error, Debug)]
pub enum TableError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("table has no data rows")]
    Empty,
    #[error("no column named {0:?}")]
    NoSuchColumn(String),
    #[error("the two feature columns must be distinct, got {0:?} twice")]
    DuplicateColumn(String),
    #[error("column {column:?} holds a non-numeric or non-finite value at row {row}")]
    NotNumeric { column: String, row: usize },
    #[error("{n_labels} labels cannot annotate {n_rows} rows")]
    LabelMismatch { n_labels: usize, n_rows: usize },
}

/// A tabular dataset with named columns, as uploaded by a user.
///
/// Row order is preserved everywhere: the i-th row of a
/// [projection](Table::project) is the i-th record of the table, so labels
/// computed from the projection re-attach to the original rows by position.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl Table {
    /// Read a comma-separated table with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = reader.headers()?.iter().map(String::from).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?);
        }
        if rows.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(Table { headers, rows })
    }

    /// Read a comma-separated file with a header row.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// The column names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Names of the columns in which every cell parses as a number. These
    /// are the columns a caller may offer as clustering features.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                self.rows.iter().all(|row| {
                    row.get(*index)
                        .map_or(false, |cell| cell.trim().parse::<f64>().is_ok())
                })
            })
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Project the table onto two distinct columns, producing the
    /// `(n_rows, 2)` point matrix the clustering core consumes.
    ///
    /// Every selected cell must parse as a finite number; the projection is
    /// all-or-nothing, no row is silently dropped.
    pub fn project(&self, feature_x: &str, feature_y: &str) -> Result<Array2<f64>, TableError> {
        if feature_x == feature_y {
            return Err(TableError::DuplicateColumn(feature_x.to_string()));
        }
        let columns = [
            (self.require_column(feature_x)?, feature_x),
            (self.require_column(feature_y)?, feature_y),
        ];

        let mut points = Array2::zeros((self.rows.len(), 2));
        for (row_index, record) in self.rows.iter().enumerate() {
            for (slot, &(column, name)) in columns.iter().enumerate() {
                let cell = record.get(column).unwrap_or_default();
                let value = cell
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| TableError::NotNumeric {
                        column: name.to_string(),
                        row: row_index,
                    })?;
                points[[row_index, slot]] = value;
            }
        }
        Ok(points)
    }

    /// Serialize the table as UTF-8 CSV with one appended integer column
    /// holding each row's cluster label: a header row, the original columns
    /// in order, no index column.
    pub fn to_csv_with_labels<W: Write>(
        &self,
        writer: W,
        label_column: &str,
        labels: &ArrayBase<impl Data<Elem = usize>, Ix1>,
    ) -> Result<(), TableError> {
        if labels.len() != self.rows.len() {
            return Err(TableError::LabelMismatch {
                n_labels: labels.len(),
                n_rows: self.rows.len(),
            });
        }

        let mut writer = WriterBuilder::new().from_writer(writer);
        writer.write_record(
            self.headers
                .iter()
                .map(String::as_str)
                .chain(iter::once(label_column)),
        )?;
        for (record, label) in self.rows.iter().zip(labels.iter()) {
            let label = label.to_string();
            writer.write_record(record.iter().chain(iter::once(label.as_str())))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::NoSuchColumn(name.to_string()))
    }
}
