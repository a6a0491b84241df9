//! Schema reconciliation
//!
//! Uploaded tables name their columns however the exporting tool likes.
//! The reconciler maps them onto the canonical fields through a static
//! alias table. A field with no matching column is filled with empty
//! strings instead of failing the upload.

use crate::models::{CanonicalField, CanonicalRow, CanonicalTable, RawTable};

/// Name of the synthetic row identifier column
pub const ROW_ID_COLUMN: &str = "row_id";

/// Acceptable source column names per field, in priority order
pub fn aliases(field: CanonicalField) -> &'static [&'static str] {
    match field {
        CanonicalField::Method => &["method", "http_method", "request_method"],
        CanonicalField::UrlPath => &["url_path", "path", "uri", "url", "request_uri", "endpoint"],
        CanonicalField::RequestBody => &[
            "request_body",
            "body",
            "payload",
            "post_data",
            "data",
            "query",
            "params",
        ],
        CanonicalField::UserAgent => &["user_agent", "ua", "agent"],
        CanonicalField::SrcIp => &["src_ip", "source_ip", "client_ip", "ip", "remote_addr"],
        CanonicalField::DstIp => &["dst_ip", "dest_ip", "server_ip", "host_ip"],
        CanonicalField::Timestamp => &["timestamp", "time", "datetime", "date"],
    }
}

/// Locate the source column for a field.
///
/// Aliases are tried in order and compared case-insensitively. When
/// several columns match the same alias, the right-most one wins, even
/// over an exact-case match further left.
pub fn find_column(columns: &[String], field: CanonicalField) -> Option<usize> {
    aliases(field)
        .iter()
        .find_map(|alias| columns.iter().rposition(|c| c.to_lowercase() == *alias))
}

/// Map a raw table onto the canonical schema.
///
/// The raw table is copied, never modified. Every output row carries all
/// canonical fields and a dense `row_id` in upload order.
pub fn reconcile(raw: &RawTable) -> CanonicalTable {
    let columns = raw.columns();
    let mut rows: Vec<CanonicalRow> = (0..raw.len()).map(CanonicalRow::new).collect();
    let mut added_columns = Vec::new();

    for field in CanonicalField::ALL {
        let source = find_column(columns, field);

        match source {
            Some(idx) => {
                log::debug!("Column '{}' mapped to field '{}'", columns[idx], field);
                for (row, cells) in rows.iter_mut().zip(raw.rows()) {
                    row.set(field, cells[idx].to_field_string());
                }
            }
            None => {
                log::debug!("No column for field '{}', defaulting to empty", field);
            }
        }

        if raw.column_index(field.name()).is_none() {
            added_columns.push(field);
        }
    }

    CanonicalTable {
        source: raw.clone(),
        added_columns,
        has_row_id_column: raw.column_index(ROW_ID_COLUMN).is_some(),
        rows,
    }
}
