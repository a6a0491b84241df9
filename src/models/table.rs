//! Loosely-typed tabular data as it arrives from an upload
//!
//! Cells keep whatever type the ingest layer could infer so that exports
//! can write them back unchanged; canonical fields are derived from them
//! by the schema reconciler.

use chrono::NaiveDateTime;
use serde_json::Value;
use std::fmt;

/// Literals treated as missing values on ingest
const NA_LITERALS: &[&str] = &["", "NA", "N/A", "#N/A", "NaN", "nan", "null", "NULL", "None"];

/// A single raw table cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Infer a typed cell from its textual form.
    ///
    /// Numbers are only typed when their canonical rendering equals the
    /// input, so values like `007` or `1.50` stay text and survive an
    /// export unchanged.
    pub fn infer(raw: &str) -> Self {
        if NA_LITERALS.contains(&raw) {
            return CellValue::Null;
        }

        match raw {
            "true" | "True" | "TRUE" => return CellValue::Bool(true),
            "false" | "False" | "FALSE" => return CellValue::Bool(false),
            _ => {}
        }

        if let Ok(i) = raw.parse::<i64>() {
            if i.to_string() == raw {
                return CellValue::Int(i);
            }
        }

        let numeric_chars = raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
        if numeric_chars {
            if let Ok(f) = raw.parse::<f64>() {
                if f.is_finite() && f.to_string() == raw {
                    return CellValue::Float(f);
                }
            }
        }

        CellValue::Text(raw.to_string())
    }

    /// Null, or a float that is not a number
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// String form used for canonical fields; missing values become empty.
    pub fn to_field_string(&self) -> String {
        if self.is_missing() {
            String::new()
        } else {
            self.to_string()
        }
    }

    /// Convert to a JSON primitive.
    ///
    /// Date-times become ISO-8601 strings and non-finite floats become null.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Int(i) => Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => f.write_str(s),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Rows of named columns, in upload order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        RawTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with nulls and dropping cells past
    /// the last column.
    pub fn push_row(&mut self, mut cells: Vec<CellValue>) {
        cells.resize(self.columns.len(), CellValue::Null);
        self.rows.push(cells);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}
