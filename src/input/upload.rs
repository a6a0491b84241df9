//! Uploaded table ingest
//!
//! Turns the raw bytes of an uploaded file into a [`RawTable`]. Excel
//! workbooks go to the workbook reader. Delimited text comes from tools in
//! many locales, so several encodings are tried strictly before falling
//! back to a lossy UTF-8 decode.

use encoding_rs::{Encoding, GB18030, GBK, UTF_8, WINDOWS_1252};
use std::borrow::Cow;
use std::collections::HashMap;
use thiserror::Error;

use super::workbook::read_workbook;
use crate::models::{CellValue, RawTable};

/// Errors that can occur while reading an upload
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload is empty")]
    Empty,

    #[error("Failed to read Excel workbook: {0}")]
    Workbook(String),

    #[error("CSV parse failed for every encoding. Last error: {last}; fallback error: {fallback}")]
    Parse { last: String, fallback: String },
}

fn is_spreadsheet(raw: &[u8], filename: &str) -> bool {
    let name = filename.to_lowercase();
    name.ends_with(".xlsx") || name.ends_with(".xls") || raw.starts_with(b"PK")
}

fn delimiter_for(filename: &str) -> u8 {
    if filename.to_lowercase().ends_with(".tsv") {
        b'\t'
    } else {
        b','
    }
}

/// Give blank headers a positional name and suffix repeated ones, so every
/// column can be addressed by name.
pub(crate) fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(i, header)| {
            let header = if header.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                header
            };
            let count = seen.entry(header.clone()).or_insert(0);
            let name = if *count == 0 {
                header
            } else {
                format!("{}.{}", header, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Parse decoded CSV text into a table
pub fn parse_csv(text: &str, delimiter: u8) -> Result<RawTable, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err("no columns to parse from file".to_string());
    }

    let mut table = RawTable::new(dedupe_headers(headers));
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        if record.len() > table.columns().len() {
            return Err(format!(
                "Expected {} fields in row {}, saw {}",
                table.columns().len(),
                line + 1,
                record.len()
            ));
        }
        table.push_row(record.iter().map(CellValue::infer).collect());
    }

    Ok(table)
}

/// Read an uploaded file into a table.
///
/// `filename` is only a hint used to spot workbooks and pick the
/// delimiter; content decides everything else. Anything named `.xlsx` or
/// `.xls`, or starting with a zip header, is read as a workbook.
pub fn read_uploaded_table(raw: &[u8], filename: Option<&str>) -> Result<RawTable, IngestError> {
    let name = filename.unwrap_or("");
    if is_spreadsheet(raw, name) {
        return read_workbook(raw);
    }

    let (bom_encoding, body) = match Encoding::for_bom(raw) {
        Some((encoding, bom_len)) => (Some(encoding), &raw[bom_len..]),
        None => (None, raw),
    };
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(IngestError::Empty);
    }

    let delimiter = delimiter_for(name);
    // BOM-declared encoding first, then the usual suspects for exported logs
    let candidates = bom_encoding
        .into_iter()
        .chain([UTF_8, GB18030, GBK, WINDOWS_1252]);

    let mut last_error = String::from("no encoding attempted");
    for encoding in candidates {
        let text = match decode_strict(encoding, body) {
            Some(text) => text,
            None => {
                log::debug!("Upload is not valid {}", encoding.name());
                last_error = format!("invalid {} byte sequence", encoding.name());
                continue;
            }
        };
        match parse_csv(&text, delimiter) {
            Ok(table) => {
                log::debug!("Parsed {} rows as {}", table.len(), encoding.name());
                return Ok(table);
            }
            Err(e) => last_error = e,
        }
    }

    log::warn!("All strict decodes failed ({}), retrying with lossy UTF-8", last_error);
    let lossy = String::from_utf8_lossy(body);
    parse_csv(&lossy, delimiter).map_err(|fallback| IngestError::Parse {
        last: last_error,
        fallback,
    })
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}
