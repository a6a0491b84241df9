pub mod record;
pub mod table;

pub use record::{CanonicalField, CanonicalRow, CanonicalTable, ScoredRow};
pub use table::{CellValue, RawTable};
