pub mod classifier;
pub mod config;
pub mod engine;
pub mod input;
pub mod models;
pub mod normalize;
pub mod output;
pub mod report;
pub mod schema;
pub mod scoring;
pub mod server;

// Re-export commonly used types
pub use classifier::{ModelBundle, RowClassifier};
pub use config::Config;
pub use engine::{AnalyzedBatch, TriageEngine};
pub use models::{CanonicalField, CanonicalRow, RawTable, ScoredRow};
pub use report::RiskReport;
pub use scoring::{RiskGrade, Severity};
