//! Augmented table export
//!
//! Rebuilds the uploaded table with the reconciled canonical columns and
//! the per-row predictions appended. The same column layout backs the CSV
//! download and JSON Lines row records.

use serde_json::{Map, Value};
use std::path::Path;

use super::OutputError;
use crate::engine::AnalyzedBatch;
use crate::models::{CanonicalField, CellValue};
use crate::schema::ROW_ID_COLUMN;

/// UTF-8 byte-order mark, so spreadsheet tools detect the encoding
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const DEFAULT_EXPORT_STEM: &str = "result";

/// Columns appended after the source and canonical columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionColumn {
    AttackType,
    Severity,
    RiskLevel,
    Confidence,
}

impl PredictionColumn {
    pub const ALL: [PredictionColumn; 4] = [
        PredictionColumn::AttackType,
        PredictionColumn::Severity,
        PredictionColumn::RiskLevel,
        PredictionColumn::Confidence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PredictionColumn::AttackType => "attack_type_pred",
            PredictionColumn::Severity => "severity",
            PredictionColumn::RiskLevel => "risk_level",
            PredictionColumn::Confidence => "confidence",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

/// Where the values of one export column come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    RowId,
    Source(usize),
    Canonical(CanonicalField),
    Prediction(PredictionColumn),
}

/// Ordered export columns of a batch.
///
/// A source column that already carries a prediction name is overwritten
/// in place rather than duplicated.
pub fn export_columns(batch: &AnalyzedBatch) -> Vec<(String, ColumnSource)> {
    let mut columns = Vec::new();
    if !batch.has_row_id_column {
        columns.push((ROW_ID_COLUMN.to_string(), ColumnSource::RowId));
    }

    let mut replaced = Vec::new();
    for (idx, name) in batch.source.columns().iter().enumerate() {
        match PredictionColumn::from_name(name) {
            Some(prediction) => {
                replaced.push(prediction);
                columns.push((name.clone(), ColumnSource::Prediction(prediction)));
            }
            None => columns.push((name.clone(), ColumnSource::Source(idx))),
        }
    }

    for field in &batch.added_columns {
        columns.push((field.name().to_string(), ColumnSource::Canonical(*field)));
    }

    for prediction in PredictionColumn::ALL {
        if !replaced.contains(&prediction) {
            columns.push((prediction.name().to_string(), ColumnSource::Prediction(prediction)));
        }
    }

    columns
}

fn cell_value(batch: &AnalyzedBatch, row: usize, source: ColumnSource) -> CellValue {
    let scored = &batch.rows[row];
    match source {
        ColumnSource::RowId => CellValue::Int(scored.row.row_id as i64),
        ColumnSource::Source(idx) => batch.source.cell(row, idx).cloned().unwrap_or(CellValue::Null),
        ColumnSource::Canonical(field) => CellValue::Text(scored.row.get(field).to_string()),
        ColumnSource::Prediction(PredictionColumn::AttackType) => {
            CellValue::Text(scored.attack_type_pred.clone())
        }
        ColumnSource::Prediction(PredictionColumn::Severity) => {
            CellValue::Int(i64::from(scored.severity.level()))
        }
        ColumnSource::Prediction(PredictionColumn::RiskLevel) => {
            CellValue::Text(scored.risk_level().to_string())
        }
        ColumnSource::Prediction(PredictionColumn::Confidence) => {
            scored.confidence.map(CellValue::Float).unwrap_or(CellValue::Null)
        }
    }
}

/// Render the augmented table as BOM-prefixed UTF-8 CSV
pub fn export_csv(batch: &AnalyzedBatch) -> Result<Vec<u8>, OutputError> {
    let columns = export_columns(batch);
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());

    writer.write_record(columns.iter().map(|(name, _)| name.as_str()))?;
    for row in 0..batch.rows.len() {
        let record: Vec<String> = columns
            .iter()
            .map(|(_, source)| cell_value(batch, row, *source).to_field_string())
            .collect();
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| OutputError::Io(e.into_error()))
}

/// One JSON object per row, keyed by export column name
pub fn row_records(batch: &AnalyzedBatch) -> Vec<Value> {
    let columns = export_columns(batch);
    (0..batch.rows.len())
        .map(|row| {
            let record: Map<String, Value> = columns
                .iter()
                .map(|(name, source)| (name.clone(), cell_value(batch, row, *source).to_json()))
                .collect();
            Value::Object(record)
        })
        .collect()
}

/// Download name for an upload: `pred_<stem>.csv`
pub fn export_filename(upload_name: Option<&str>) -> String {
    let stem = upload_name
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(DEFAULT_EXPORT_STEM);
    format!("pred_{}.csv", stem)
}
