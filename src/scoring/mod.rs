//! Per-row severity scoring and whole-batch risk aggregation

pub mod aggregate;
pub mod severity;

pub use aggregate::{
    aggregate, grade, high_risk_preview, top_values, type_counts, Aggregates, BatchStats,
    FrequencyTable, PreviewRow, RiskGrade, EMPTY_SENTINEL,
};
pub use severity::{risk_tier_name, severity_of, Severity, UNKNOWN_LABEL_SEVERITY};
