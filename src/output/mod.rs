pub mod export;

pub use export::{export_csv, export_filename, row_records, UTF8_BOM};

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::engine::AnalyzedBatch;
use crate::report::RiskReport;

/// Errors that can occur while writing results
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed report
    Json,
    /// One JSON record per analyzed row
    Jsonl,
    /// Human-readable summary
    Console,
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "jsonl" => Ok(OutputFormat::Jsonl),
            "console" => Ok(OutputFormat::Console),
            other => Err(OutputError::UnknownFormat(other.to_string())),
        }
    }
}

/// Writes analysis results to a file or stdout
pub struct ReportWriter {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

impl ReportWriter {
    /// Create a writer. Console output always goes to stdout; JSON Lines
    /// output appends to an existing file.
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Result<Self, OutputError> {
        let writer: Option<Box<dyn Write + Send>> = match (format, file_path) {
            (OutputFormat::Console, _) => None,
            (OutputFormat::Jsonl, Some(path)) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            (OutputFormat::Json, Some(path)) => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            (_, None) => None,
        };

        Ok(ReportWriter { format, writer })
    }

    /// Writer over an arbitrary sink
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        ReportWriter {
            format,
            writer: Some(writer),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write the results of one analyzed upload
    pub fn write(&mut self, batch: &AnalyzedBatch, report: &RiskReport) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let json = report.to_json_pretty()?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Jsonl => {
                let mut lines = String::new();
                for record in row_records(batch) {
                    lines.push_str(&serde_json::to_string(&record)?);
                    lines.push('\n');
                }
                self.write_output(&lines)?;
            }
            OutputFormat::Console => {
                let summary = render_summary(report);
                self.write_output(&summary)?;
            }
        }
        Ok(())
    }

    fn write_output(&mut self, data: &str) -> Result<(), OutputError> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", data);
                std::io::stdout().flush()?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

fn render_summary(report: &RiskReport) -> String {
    let stats = &report.stats;
    let mut out = format!(
        "Overall risk grade: {} ({})\n\
         Rows: {} (normal {}, low {}, mid {}, high {}), high ratio {:.2}%, mid ratio {:.2}%\n",
        report.overall_risk_grade.localized(),
        report.overall_risk_grade.as_str(),
        stats.total,
        stats.normal,
        stats.low,
        stats.mid,
        stats.high,
        stats.high_ratio * 100.0,
        stats.mid_ratio * 100.0,
    );

    let tables = [
        ("Attack types", &report.type_counts),
        ("Top source IPs", &report.top_src_ip),
        ("Top destination IPs", &report.top_dst_ip),
        ("Top URL paths", &report.top_url_path),
    ];
    for (title, table) in tables {
        out.push_str(&format!("{}:\n", title));
        for (value, count) in table.entries() {
            out.push_str(&format!("  {:<40} {}\n", value, count));
        }
    }

    if !report.high_risk_preview.is_empty() {
        out.push_str("High-risk rows:\n");
        for row in &report.high_risk_preview {
            let confidence = row
                .confidence
                .map(|c| format!("{:.3}", c))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "  [{}] {} -> {} {} {} => {} ({}, confidence {})\n",
                row.timestamp,
                row.src_ip,
                row.dst_ip,
                row.method,
                row.url_path,
                row.attack_type_pred,
                row.risk_level,
                confidence
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalRow, RawTable, ScoredRow};
    use crate::report::build_report;
    use crate::scoring::Severity;
    use std::sync::{Arc, Mutex};

    /// Cloneable in-memory sink
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn sample() -> (AnalyzedBatch, RiskReport) {
        let mut row = CanonicalRow::new(0);
        row.src_ip = "6.6.6.6".to_string();
        row.url_path = "/cmd".to_string();
        let rows = vec![ScoredRow {
            row,
            attack_type_pred: "远程命令执行攻击".to_string(),
            severity: Severity::High,
            confidence: Some(0.875),
        }];
        let report = build_report(&rows, 10, 20);
        let batch = AnalyzedBatch {
            source: RawTable::new(vec!["path".to_string()]),
            added_columns: vec![],
            has_row_id_column: false,
            rows,
        };
        (batch, report)
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert_eq!("console".parse::<OutputFormat>().unwrap(), OutputFormat::Console);
        assert!(matches!("xml".parse::<OutputFormat>(), Err(OutputError::UnknownFormat(_))));
    }

    #[test]
    fn test_json_writes_report() {
        let (batch, report) = sample();
        let sink = SharedBuffer::default();
        let mut writer = ReportWriter::with_writer(OutputFormat::Json, Box::new(sink.clone()));
        writer.write(&batch, &report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&sink.contents()).unwrap();
        assert_eq!(value["overall_risk_grade"], "高");
        assert_eq!(value["high_risk_preview"][0]["confidence"], 0.875);
    }

    #[test]
    fn test_jsonl_writes_one_line_per_row() {
        let (batch, report) = sample();
        let sink = SharedBuffer::default();
        let mut writer = ReportWriter::with_writer(OutputFormat::Jsonl, Box::new(sink.clone()));
        writer.write(&batch, &report).unwrap();

        let contents = sink.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["attack_type_pred"], "远程命令执行攻击");
        assert_eq!(record["severity"], 3);
        assert_eq!(record["row_id"], 0);
    }

    #[test]
    fn test_console_summary() {
        let (_, report) = sample();
        let summary = render_summary(&report);
        assert!(summary.starts_with("Overall risk grade: 高 (high)"));
        assert!(summary.contains("6.6.6.6"));
        assert!(summary.contains("confidence 0.875"));
    }

    #[test]
    fn test_jsonl_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        let (batch, report) = sample();

        for _ in 0..2 {
            let mut writer = ReportWriter::new(OutputFormat::Jsonl, Some(path.clone())).unwrap();
            writer.write(&batch, &report).unwrap();
            writer.flush().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
