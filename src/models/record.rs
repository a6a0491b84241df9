use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::table::RawTable;
use crate::scoring::Severity;

/// Logical request fields every reconciled row carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Method,
    UrlPath,
    RequestBody,
    UserAgent,
    SrcIp,
    DstIp,
    Timestamp,
}

impl CanonicalField {
    /// All fields, in the order their columns are appended on export
    pub const ALL: [CanonicalField; 7] = [
        CanonicalField::Method,
        CanonicalField::UrlPath,
        CanonicalField::RequestBody,
        CanonicalField::UserAgent,
        CanonicalField::SrcIp,
        CanonicalField::DstIp,
        CanonicalField::Timestamp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Method => "method",
            CanonicalField::UrlPath => "url_path",
            CanonicalField::RequestBody => "request_body",
            CanonicalField::UserAgent => "user_agent",
            CanonicalField::SrcIp => "src_ip",
            CanonicalField::DstIp => "dst_ip",
            CanonicalField::Timestamp => "timestamp",
        }
    }

    /// Case-insensitive lookup by canonical name
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_lowercase();
        Self::ALL.iter().copied().find(|f| f.name() == lowered)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reconciled row. Absent source columns are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRow {
    pub row_id: usize,
    pub method: String,
    pub url_path: String,
    pub request_body: String,
    pub user_agent: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub timestamp: String,
}

impl CanonicalRow {
    pub fn new(row_id: usize) -> Self {
        CanonicalRow {
            row_id,
            ..Default::default()
        }
    }

    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Method => &self.method,
            CanonicalField::UrlPath => &self.url_path,
            CanonicalField::RequestBody => &self.request_body,
            CanonicalField::UserAgent => &self.user_agent,
            CanonicalField::SrcIp => &self.src_ip,
            CanonicalField::DstIp => &self.dst_ip,
            CanonicalField::Timestamp => &self.timestamp,
        }
    }

    pub fn set(&mut self, field: CanonicalField, value: String) {
        let slot = match field {
            CanonicalField::Method => &mut self.method,
            CanonicalField::UrlPath => &mut self.url_path,
            CanonicalField::RequestBody => &mut self.request_body,
            CanonicalField::UserAgent => &mut self.user_agent,
            CanonicalField::SrcIp => &mut self.src_ip,
            CanonicalField::DstIp => &mut self.dst_ip,
            CanonicalField::Timestamp => &mut self.timestamp,
        };
        *slot = value;
    }
}

/// Result of schema reconciliation over an uploaded table
#[derive(Debug, Clone)]
pub struct CanonicalTable {
    /// Copy of the upload, kept for exports
    pub source: RawTable,
    /// Canonical fields with no exact-name column in the source
    pub added_columns: Vec<CanonicalField>,
    /// Whether the source already carried a `row_id` column
    pub has_row_id_column: bool,
    pub rows: Vec<CanonicalRow>,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A reconciled row together with its prediction columns
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub row: CanonicalRow,
    pub attack_type_pred: String,
    pub severity: Severity,
    /// Maximum class probability, when the model provides one
    pub confidence: Option<f64>,
}

impl ScoredRow {
    pub fn risk_level(&self) -> &'static str {
        self.severity.tier_name()
    }
}
