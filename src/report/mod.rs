//! Risk report assembly
//!
//! Shapes the grade, stats and aggregate tables into the payload returned
//! to clients. Every field is a plain serializable value, so the report can
//! always be encoded as JSON.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::ScoredRow;
use crate::scoring::{aggregate, grade, Aggregates, BatchStats, FrequencyTable, PreviewRow, RiskGrade};

/// Date-time layouts accepted in timestamp columns
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%d/%b/%Y:%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Normalize a timestamp to `YYYY-MM-DD HH:MM:SS`.
///
/// Values written with a UTC offset keep their wall-clock time and gain a
/// `+HH:MM` suffix. Date-only values keep `YYYY-MM-DD`. Values that match no known layout
/// are returned unchanged.
pub fn coerce_timestamp(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return value.to_string();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return format_with_offset(&dt);
    }
    // access-log style with offset, e.g. 10/Oct/2023:13:55:36 +0800
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%d/%b/%Y:%H:%M:%S %z") {
        return format_with_offset(&dt);
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return format_datetime(&dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    log::debug!("Unparseable timestamp kept as-is: {}", value);
    value.to_string()
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_with_offset(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

/// Report payload for one analyzed batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub overall_risk_grade: RiskGrade,
    pub stats: BatchStats,
    pub type_counts: FrequencyTable,
    pub top_src_ip: FrequencyTable,
    pub top_dst_ip: FrequencyTable,
    pub top_url_path: FrequencyTable,
    pub high_risk_preview: Vec<PreviewRow>,
}

impl RiskReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Combine grading and aggregation output into a report
pub fn assemble(grade: RiskGrade, stats: BatchStats, aggregates: Aggregates) -> RiskReport {
    let high_risk_preview = aggregates
        .high_risk_preview
        .into_iter()
        .map(|mut row| {
            row.timestamp = coerce_timestamp(&row.timestamp);
            row
        })
        .collect();

    RiskReport {
        overall_risk_grade: grade,
        stats,
        type_counts: aggregates.type_counts,
        top_src_ip: aggregates.top_src_ip,
        top_dst_ip: aggregates.top_dst_ip,
        top_url_path: aggregates.top_url_path,
        high_risk_preview,
    }
}

/// Grade, aggregate and assemble in one pass
pub fn build_report(rows: &[ScoredRow], top_n: usize, preview_limit: usize) -> RiskReport {
    let (overall, stats) = grade(rows);
    assemble(overall, stats, aggregate(rows, top_n, preview_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalRow;
    use crate::scoring::Severity;
    use serde_json::{json, Value};

    fn scored(row_id: usize, label: &str, src_ip: &str, timestamp: &str) -> ScoredRow {
        let mut row = CanonicalRow::new(row_id);
        row.src_ip = src_ip.to_string();
        row.timestamp = timestamp.to_string();
        row.url_path = "/x".to_string();
        ScoredRow {
            row,
            attack_type_pred: label.to_string(),
            severity: Severity::of_label(label),
            confidence: None,
        }
    }

    #[test]
    fn test_coerce_timestamp_layouts() {
        assert_eq!(coerce_timestamp("2024-03-01 08:30:00"), "2024-03-01 08:30:00");
        assert_eq!(coerce_timestamp("2024-03-01T08:30:00"), "2024-03-01 08:30:00");
        assert_eq!(coerce_timestamp("2024-03-01T08:30:00.250"), "2024-03-01 08:30:00");
        assert_eq!(coerce_timestamp("2024/03/01 08:30:00"), "2024-03-01 08:30:00");
        assert_eq!(coerce_timestamp("2024-03-01"), "2024-03-01");
    }

    #[test]
    fn test_coerce_timestamp_keeps_offset() {
        assert_eq!(coerce_timestamp("2024-03-01T08:30:00+08:00"), "2024-03-01 08:30:00+08:00");
        assert_eq!(coerce_timestamp("2024-03-01T08:30:00Z"), "2024-03-01 08:30:00+00:00");
        assert_eq!(coerce_timestamp("01/Mar/2024:08:30:00 -0500"), "2024-03-01 08:30:00-05:00");
    }

    #[test]
    fn test_coerce_timestamp_keeps_unparseable() {
        assert_eq!(coerce_timestamp("yesterday"), "yesterday");
        assert_eq!(coerce_timestamp(""), "");
        assert_eq!(coerce_timestamp("2024-13-45"), "2024-13-45");
    }

    #[test]
    fn test_empty_batch_has_every_key() {
        let report = build_report(&[], 10, 20);
        let value: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["overall_risk_grade"], "低");
        assert_eq!(value["stats"]["total"], 0);
        assert_eq!(value["stats"]["high_ratio"], 0.0);
        for key in ["type_counts", "top_src_ip", "top_dst_ip", "top_url_path"] {
            assert_eq!(value[key], json!({}), "{}", key);
        }
        assert_eq!(value["high_risk_preview"], json!([]));
    }

    #[test]
    fn test_single_normal_row() {
        let report = build_report(&[scored(0, "正常访问", "1.1.1.1", "")], 10, 20);
        assert_eq!(report.overall_risk_grade, RiskGrade::Low);
        assert_eq!(report.stats.normal, 1);
        assert_eq!(report.type_counts.get("正常访问"), Some(1));
        assert!(report.high_risk_preview.is_empty());
    }

    #[test]
    fn test_high_batch_preview_timestamps() {
        let mut rows: Vec<ScoredRow> = (0..94)
            .map(|i| scored(i, "正常访问", "10.0.0.1", "2024-03-01"))
            .collect();
        for i in 94..100 {
            rows.push(scored(i, "远程命令执行攻击", "6.6.6.6", "2024-03-01T10:00:00"));
        }

        let report = build_report(&rows, 10, 20);
        assert_eq!(report.overall_risk_grade, RiskGrade::High);
        assert_eq!(report.stats.high, 6);
        assert!((report.stats.high_ratio - 0.06).abs() < 1e-12);
        assert_eq!(report.high_risk_preview.len(), 6);
        assert_eq!(report.high_risk_preview[0].timestamp, "2024-03-01 10:00:00");
        assert_eq!(report.high_risk_preview[0].risk_level, "高风险");
        assert_eq!(report.high_risk_preview[0].confidence, None);
    }

    #[test]
    fn test_ranking_order_preserved_in_json() {
        let rows = vec![
            scored(0, "正常访问", "b", ""),
            scored(1, "正常访问", "a", ""),
            scored(2, "正常访问", "a", ""),
            scored(3, "正常访问", "", ""),
        ];
        let json = build_report(&rows, 10, 20).to_json().unwrap();
        let a = json.find("\"a\":2").unwrap();
        let b = json.find("\"b\":1").unwrap();
        let empty = json.find("\"(empty)\":1").unwrap();
        assert!(a < b && b < empty);
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let rows = vec![
            scored(0, "SQL注入攻击", "1.1.1.1", "2024-03-01 01:02:03"),
            scored(1, "文件上传攻击", "2.2.2.2", "not a time"),
            scored(2, "CSRF攻击", "1.1.1.1", ""),
        ];
        let first = build_report(&rows, 10, 20);
        let second = build_report(&rows, 10, 20);
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
        assert_eq!(first.high_risk_preview[0].timestamp, "not a time");
    }
}
