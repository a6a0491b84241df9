//! Batch-level risk aggregation
//!
//! Combines per-row severities into an overall grade and computes the
//! descriptive tables shown in a report: label histogram, top source and
//! destination addresses, top paths and a preview of high-severity rows.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

use crate::models::{CanonicalField, ScoredRow};
use crate::scoring::Severity;

/// Stand-in for empty values in top-N tables
pub const EMPTY_SENTINEL: &str = "(empty)";

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_PREVIEW_LIMIT: usize = 20;

const HIGH_RATIO_THRESHOLD: f64 = 0.05;
const HIGH_COUNT_THRESHOLD: u64 = 20;
const ELEVATED_COUNT_THRESHOLD: u64 = 30;
const MID_RATIO_THRESHOLD: f64 = 0.10;

/// Overall grade of an uploaded batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskGrade {
    Low,
    Mid,
    High,
}

impl RiskGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskGrade::Low => "low",
            RiskGrade::Mid => "mid",
            RiskGrade::High => "high",
        }
    }

    /// Name rendered in reports
    pub fn localized(self) -> &'static str {
        match self {
            RiskGrade::Low => "低",
            RiskGrade::Mid => "中",
            RiskGrade::High => "高",
        }
    }
}

impl Serialize for RiskGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.localized())
    }
}

/// Severity distribution of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: u64,
    /// Severity 0
    pub normal: u64,
    /// Severity 0 or 1
    pub low: u64,
    pub mid: u64,
    pub high: u64,
    pub high_ratio: f64,
    pub mid_ratio: f64,
}

/// Grade a batch of scored rows.
///
/// Thresholds are applied in order and the first match wins:
/// a high ratio of at least 5% or 20+ high rows is `High`; 30+ rows at
/// medium or above, or a medium ratio of at least 10%, is `Mid`.
pub fn grade(rows: &[ScoredRow]) -> (RiskGrade, BatchStats) {
    let mut stats = BatchStats {
        total: rows.len() as u64,
        ..Default::default()
    };

    for row in rows {
        match row.severity {
            Severity::None => {
                stats.normal += 1;
                stats.low += 1;
            }
            Severity::Low => stats.low += 1,
            Severity::Medium => stats.mid += 1,
            Severity::High => stats.high += 1,
        }
    }

    if stats.total > 0 {
        stats.high_ratio = stats.high as f64 / stats.total as f64;
        stats.mid_ratio = stats.mid as f64 / stats.total as f64;
    }

    let grade = if stats.high_ratio >= HIGH_RATIO_THRESHOLD || stats.high >= HIGH_COUNT_THRESHOLD {
        RiskGrade::High
    } else if stats.high + stats.mid >= ELEVATED_COUNT_THRESHOLD
        || stats.mid_ratio >= MID_RATIO_THRESHOLD
    {
        RiskGrade::Mid
    } else {
        RiskGrade::Low
    };

    (grade, stats)
}

/// Value counts ordered by descending count, ties in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencyTable {
    entries: Vec<(String, u64)>,
}

impl FrequencyTable {
    /// Count values, keeping at most `limit` entries when given
    pub fn from_values<I, S>(values: I, limit: Option<usize>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<(String, u64)> = Vec::new();

        for value in values {
            let value = value.as_ref();
            match index.get(value) {
                Some(&i) => entries[i].1 += 1,
                None => {
                    index.insert(value.to_string(), entries.len());
                    entries.push((value.to_string(), 1));
                }
            }
        }

        // stable: equal counts keep first-seen order
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }

        FrequencyTable { entries }
    }

    pub fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, c)| *c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FrequencyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, count) in &self.entries {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

/// Histogram of every predicted label
pub fn type_counts(rows: &[ScoredRow]) -> FrequencyTable {
    FrequencyTable::from_values(rows.iter().map(|r| r.attack_type_pred.as_str()), None)
}

/// Most frequent values of one canonical field
pub fn top_values(rows: &[ScoredRow], field: CanonicalField, n: usize) -> FrequencyTable {
    let values = rows.iter().map(|r| {
        let value = r.row.get(field);
        if value.is_empty() {
            EMPTY_SENTINEL
        } else {
            value
        }
    });
    FrequencyTable::from_values(values, Some(n))
}

/// Fixed-column view of a high-severity row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    pub timestamp: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub method: String,
    pub url_path: String,
    pub attack_type_pred: String,
    pub risk_level: String,
    pub confidence: Option<f64>,
}

impl PreviewRow {
    fn from_scored(row: &ScoredRow) -> Self {
        PreviewRow {
            timestamp: row.row.timestamp.clone(),
            src_ip: row.row.src_ip.clone(),
            dst_ip: row.row.dst_ip.clone(),
            method: row.row.method.clone(),
            url_path: row.row.url_path.clone(),
            attack_type_pred: row.attack_type_pred.clone(),
            risk_level: row.risk_level().to_string(),
            confidence: row.confidence,
        }
    }
}

/// First `limit` severity-3 rows, in row order
pub fn high_risk_preview(rows: &[ScoredRow], limit: usize) -> Vec<PreviewRow> {
    rows.iter()
        .filter(|r| r.severity == Severity::High)
        .take(limit)
        .map(PreviewRow::from_scored)
        .collect()
}

/// Descriptive tables of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub type_counts: FrequencyTable,
    pub top_src_ip: FrequencyTable,
    pub top_dst_ip: FrequencyTable,
    pub top_url_path: FrequencyTable,
    pub high_risk_preview: Vec<PreviewRow>,
}

pub fn aggregate(rows: &[ScoredRow], top_n: usize, preview_limit: usize) -> Aggregates {
    Aggregates {
        type_counts: type_counts(rows),
        top_src_ip: top_values(rows, CanonicalField::SrcIp, top_n),
        top_dst_ip: top_values(rows, CanonicalField::DstIp, top_n),
        top_url_path: top_values(rows, CanonicalField::UrlPath, top_n),
        high_risk_preview: high_risk_preview(rows, preview_limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalRow;

    fn scored(row_id: usize, label: &str) -> ScoredRow {
        ScoredRow {
            row: CanonicalRow::new(row_id),
            attack_type_pred: label.to_string(),
            severity: Severity::of_label(label),
            confidence: None,
        }
    }

    fn batch(high: usize, mid: usize, low: usize, normal: usize) -> Vec<ScoredRow> {
        let mut rows = Vec::new();
        let labels = [
            ("远程命令执行攻击", high),
            ("SQL注入攻击", mid),
            ("XSS跨站脚本攻击", low),
            ("正常访问", normal),
        ];
        for (label, count) in labels {
            for _ in 0..count {
                rows.push(scored(rows.len(), label));
            }
        }
        rows
    }

    #[test]
    fn test_empty_batch() {
        let (tier, stats) = grade(&[]);
        assert_eq!(tier, RiskGrade::Low);
        assert_eq!(stats, BatchStats::default());
        assert_eq!(stats.high_ratio, 0.0);

        let aggregates = aggregate(&[], DEFAULT_TOP_N, DEFAULT_PREVIEW_LIMIT);
        assert!(aggregates.type_counts.is_empty());
        assert!(aggregates.top_src_ip.is_empty());
        assert!(aggregates.high_risk_preview.is_empty());
    }

    #[test]
    fn test_single_normal_row() {
        let rows = batch(0, 0, 0, 1);
        let (tier, stats) = grade(&rows);
        assert_eq!(tier, RiskGrade::Low);
        assert_eq!(stats.normal, 1);
        assert_eq!(stats.low, 1);
        assert_eq!(type_counts(&rows).get("正常访问"), Some(1));
        assert!(high_risk_preview(&rows, 20).is_empty());
    }

    #[test]
    fn test_high_ratio_triggers_high() {
        let rows = batch(6, 0, 0, 94);
        let (tier, stats) = grade(&rows);
        assert_eq!(stats.high, 6);
        assert_eq!(stats.total, 100);
        assert!((stats.high_ratio - 0.06).abs() < 1e-12);
        assert_eq!(tier, RiskGrade::High);
    }

    #[test]
    fn test_high_ratio_boundary_is_inclusive() {
        let (tier, _) = grade(&batch(5, 0, 0, 95));
        assert_eq!(tier, RiskGrade::High);

        let (tier, _) = grade(&batch(4, 0, 0, 96));
        assert_eq!(tier, RiskGrade::Low);
    }

    #[test]
    fn test_high_count_triggers_high() {
        // 20 / 1000 = 2%, below the ratio threshold
        let (tier, _) = grade(&batch(20, 0, 0, 980));
        assert_eq!(tier, RiskGrade::High);
    }

    #[test]
    fn test_mid_tiers() {
        // 30 medium-or-above rows in a large batch
        let (tier, _) = grade(&batch(10, 20, 0, 1000));
        assert_eq!(tier, RiskGrade::Mid);

        // 10% medium ratio
        let (tier, stats) = grade(&batch(0, 10, 0, 90));
        assert!((stats.mid_ratio - 0.10).abs() < 1e-12);
        assert_eq!(tier, RiskGrade::Mid);

        let (tier, _) = grade(&batch(0, 9, 5, 86));
        assert_eq!(tier, RiskGrade::Low);
    }

    #[test]
    fn test_low_counts_include_normal() {
        let (_, stats) = grade(&batch(0, 0, 3, 4));
        assert_eq!(stats.low, 7);
        assert_eq!(stats.normal, 4);
    }

    #[test]
    fn test_grade_monotonic_in_high_count() {
        let total = 200;
        for mid in [0, 5, 15, 25] {
            let mut previous = RiskGrade::Low;
            for high in 0..=(total - mid) {
                let rows = batch(high, mid, 0, total - mid - high);
                let (tier, _) = grade(&rows);
                assert!(tier >= previous, "grade dropped at high={} mid={}", high, mid);
                previous = tier;
            }
        }
    }

    #[test]
    fn test_frequency_ties_keep_first_seen_order() {
        let table = FrequencyTable::from_values(["b", "a", "c", "a", "b", "d"], None);
        let keys: Vec<&str> = table.entries().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_top_values_limit_and_empty_sentinel() {
        let mut rows = Vec::new();
        for i in 0..15 {
            let mut row = scored(i, "正常访问");
            row.row.src_ip = if i < 3 { String::new() } else { format!("10.0.0.{}", i) };
            rows.push(row);
        }

        let top = top_values(&rows, CanonicalField::SrcIp, 10);
        assert_eq!(top.len(), 10);
        assert_eq!(top.entries()[0], (EMPTY_SENTINEL.to_string(), 3));
        assert_eq!(top.entries()[1].0, "10.0.0.3");
    }

    #[test]
    fn test_preview_is_bounded_and_ordered() {
        let mut rows = Vec::new();
        for i in 0..50 {
            let label = if i % 2 == 0 { "文件上传攻击" } else { "正常访问" };
            let mut row = scored(i, label);
            row.row.url_path = format!("/upload/{}", i);
            rows.push(row);
        }

        let preview = high_risk_preview(&rows, DEFAULT_PREVIEW_LIMIT);
        assert_eq!(preview.len(), 20);
        assert_eq!(preview[0].url_path, "/upload/0");
        assert_eq!(preview[1].url_path, "/upload/2");
        assert_eq!(preview[0].risk_level, "高风险");
        assert_eq!(preview[0].confidence, None);
        assert_eq!(preview[0].timestamp, "");
    }

    #[test]
    fn test_frequency_table_serializes_in_rank_order() {
        let table = FrequencyTable::from_values(["x", "y", "y"], None);
        assert_eq!(serde_json::to_string(&table).unwrap(), r#"{"y":2,"x":1}"#);
    }

    #[test]
    fn test_grade_serializes_localized() {
        assert_eq!(serde_json::to_string(&RiskGrade::High).unwrap(), "\"高\"");
        assert_eq!(RiskGrade::Mid.as_str(), "mid");
    }
}
