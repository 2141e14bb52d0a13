//! Typed table store for persisted analysis state.
//!
//! A [`TableFile`] is a set of named tables in a single JSON document.
//! Each table has a fixed, typed column layout, rows checked against
//! that layout on append, and free-form string/float attributes.
//! Table names may use `/` separators to group related tables
//! (`data/parameters`, `data/significances`).
//!
//! serde_json writes floats in shortest round-trip form, so stored
//! f64 values reload bit-for-bit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed store document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no table named '{0}'")]
    MissingTable(String),
    #[error("table '{0}' already exists")]
    DuplicateTable(String),
    #[error("table '{table}': {message}")]
    Shape { table: String, message: String },
}

/// Cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    F64(f64),
    I32(i32),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    fn kind(&self) -> ColumnKind {
        match self {
            Value::Str(_) => ColumnKind::Str,
            Value::F64(_) => ColumnKind::F64,
            Value::I32(_) => ColumnKind::I32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Str,
    F64,
    I32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Table attribute, attached to the table rather than any row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Str(String),
    F64(f64),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    attributes: BTreeMap<String, Attribute>,
}

impl Table {
    fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: Attribute) {
        self.attributes.insert(name.into(), value);
    }

    fn check_row(&self, table: &str, row: &[Value]) -> Result<(), StoreError> {
        if row.len() != self.columns.len() {
            return Err(StoreError::Shape {
                table: table.to_string(),
                message: format!(
                    "row has {} cells, layout has {} columns",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        for (cell, column) in row.iter().zip(&self.columns) {
            if cell.kind() != column.kind {
                return Err(StoreError::Shape {
                    table: table.to_string(),
                    message: format!(
                        "column '{}' expects {:?}, got {:?}",
                        column.name,
                        column.kind,
                        cell.kind()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Named tables persisted together as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableFile {
    tables: BTreeMap<String, Table>,
}

impl TableFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with the given column layout.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<(), StoreError> {
        if self.tables.contains_key(name) {
            return Err(StoreError::DuplicateTable(name.to_string()));
        }
        self.tables.insert(name.to_string(), Table::new(columns));
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&Table, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::MissingTable(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table, StoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingTable(name.to_string()))
    }

    /// Append a row after checking it against the table layout.
    pub fn append(&mut self, name: &str, row: Vec<Value>) -> Result<(), StoreError> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingTable(name.to_string()))?;
        table.check_row(name, &row)?;
        table.rows.push(row);
        Ok(())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Write the document to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Parse a document from raw bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parameter_layout() -> Vec<Column> {
        vec![
            Column::new("name", ColumnKind::Str),
            Column::new("min", ColumnKind::F64),
            Column::new("max", ColumnKind::F64),
            Column::new("nuisance", ColumnKind::I32),
        ]
    }

    #[test]
    fn create_append_read_back() {
        let mut file = TableFile::new();
        file.create_table("parameters", parameter_layout()).unwrap();
        file.append(
            "parameters",
            vec![
                Value::str("mass::b"),
                Value::F64(3.8),
                Value::F64(5.0),
                Value::I32(0),
            ],
        )
        .unwrap();

        let table = file.table("parameters").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0][0].as_str(), Some("mass::b"));
        assert_eq!(table.rows()[0][1].as_f64(), Some(3.8));
        assert_eq!(table.rows()[0][3].as_i32(), Some(0));
    }

    #[test]
    fn duplicate_table_rejected() {
        let mut file = TableFile::new();
        file.create_table("t", vec![]).unwrap();
        assert!(matches!(
            file.create_table("t", vec![]),
            Err(StoreError::DuplicateTable(_))
        ));
    }

    #[test]
    fn missing_table_is_an_error() {
        let file = TableFile::new();
        assert!(matches!(
            file.table("nope"),
            Err(StoreError::MissingTable(_))
        ));
    }

    #[test]
    fn append_checks_width_and_kinds() {
        let mut file = TableFile::new();
        file.create_table("parameters", parameter_layout()).unwrap();

        // too short
        assert!(file
            .append("parameters", vec![Value::str("x")])
            .is_err());
        // kind mismatch in column 1
        assert!(file
            .append(
                "parameters",
                vec![
                    Value::str("x"),
                    Value::I32(0),
                    Value::F64(1.0),
                    Value::I32(0)
                ],
            )
            .is_err());
        // rejected rows leave the table empty
        assert!(file.table("parameters").unwrap().is_empty());
    }

    #[test]
    fn attributes_round_trip() {
        let mut file = TableFile::new();
        file.create_table("data/significances", vec![]).unwrap();
        let table = file.table_mut("data/significances").unwrap();
        table.set_attribute("chi2_significance", Attribute::F64(12.5));
        table.set_attribute("version", Attribute::Str("0.1.0".to_string()));

        let table = file.table("data/significances").unwrap();
        assert_eq!(
            table.attribute("chi2_significance"),
            Some(&Attribute::F64(12.5))
        );
        assert_eq!(
            table.attribute("version"),
            Some(&Attribute::Str("0.1.0".to_string()))
        );
        assert!(table.attribute("missing").is_none());
    }

    #[test]
    fn save_and_load_preserves_floats_exactly() {
        let mut file = TableFile::new();
        file.create_table("t", vec![Column::new("v", ColumnKind::F64)])
            .unwrap();
        // values with no short decimal representation
        let awkward = [0.1 + 0.2, f64::MIN_POSITIVE, 1.0 / 3.0, -1.5e300];
        for &v in &awkward {
            file.append("t", vec![Value::F64(v)]).unwrap();
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("store.json");
        file.save(&path).unwrap();
        let reloaded = TableFile::load(&path).unwrap();

        let table = reloaded.table("t").unwrap();
        for (row, &expected) in table.rows().iter().zip(&awkward) {
            assert_eq!(row[0].as_f64(), Some(expected));
        }
        crate::test_assert_eq!(
            file,
            reloaded,
            "reloaded document should match the saved one",
            test = "save_and_load_preserves_floats_exactly"
        );
    }

    #[test]
    fn from_json_slice_rejects_garbage() {
        assert!(TableFile::from_json_slice(b"not json").is_err());
        assert!(TableFile::from_json_slice(b"{\"tables\": 3}").is_err());
        assert!(TableFile::from_json_slice(b"{\"tables\": {}}").is_ok());
    }
}
