//! Excel workbook ingest
//!
//! Reads the first worksheet of an `.xlsx`/`.xls` upload. The first row
//! names the columns and fully blank rows are skipped.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use std::io::Cursor;

use super::upload::{dedupe_headers, IngestError};
use crate::models::{CellValue, RawTable};

/// 2^53, the largest magnitude below which every whole float is exact
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        // spreadsheets store every number as a float
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => CellValue::Int(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::infer(s),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) => s
            .parse::<NaiveDateTime>()
            .map(CellValue::DateTime)
            .unwrap_or_else(|_| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Read the first worksheet of a workbook into a table
pub fn read_workbook(raw: &[u8]) -> Result<RawTable, IngestError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(raw)).map_err(|e| IngestError::Workbook(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Workbook("workbook has no worksheets".to_string()))?
        .map_err(|e| IngestError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|cell| cell_value(cell).to_field_string()).collect(),
        None => return Err(IngestError::Empty),
    };

    let mut table = RawTable::new(dedupe_headers(headers));
    for row in rows {
        let cells: Vec<CellValue> = row.iter().map(cell_value).collect();
        if cells.iter().all(CellValue::is_missing) {
            continue;
        }
        table.push_row(cells);
    }

    log::debug!(
        "Read {} rows x {} columns from worksheet",
        table.len(),
        table.columns().len()
    );
    Ok(table)
}
