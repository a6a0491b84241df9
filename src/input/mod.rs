pub mod upload;
pub mod workbook;

pub use upload::{parse_csv, read_uploaded_table, IngestError};
pub use workbook::read_workbook;

use std::path::Path;

use crate::models::RawTable;

/// Read a table from a local file, with the same rules as an upload
pub fn read_table_file(path: &Path) -> Result<RawTable, IngestError> {
    let raw = std::fs::read(path)?;
    let name = path.file_name().and_then(|n| n.to_str());
    read_uploaded_table(&raw, name)
}
