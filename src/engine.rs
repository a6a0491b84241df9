//! End-to-end analysis of one uploaded table
//!
//! Reconciles the schema, builds classifier input, predicts labels and
//! scores each row. Every input row yields exactly one scored row, in
//! order.

use std::time::Instant;

use crate::classifier::{check_len, ClassifierError, ModelBundle};
use crate::config::ReportConfig;
use crate::models::{CanonicalField, RawTable, ScoredRow};
use crate::normalize::build_texts;
use crate::report::{build_report, RiskReport};
use crate::schema::reconcile;
use crate::scoring::Severity;

/// Scored rows plus what an export needs to rebuild the upload
#[derive(Debug, Clone)]
pub struct AnalyzedBatch {
    pub source: RawTable,
    pub added_columns: Vec<CanonicalField>,
    pub has_row_id_column: bool,
    pub rows: Vec<ScoredRow>,
}

impl AnalyzedBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Loaded model plus report settings, shared read-only across requests
#[derive(Debug, Clone)]
pub struct TriageEngine {
    bundle: ModelBundle,
    report: ReportConfig,
}

impl TriageEngine {
    pub fn new(bundle: ModelBundle, report: ReportConfig) -> Self {
        TriageEngine { bundle, report }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn report_config(&self) -> ReportConfig {
        self.report
    }

    /// Classify and score every row of `raw`
    pub fn analyze(&self, raw: &RawTable) -> Result<AnalyzedBatch, ClassifierError> {
        let started = Instant::now();
        let table = reconcile(raw);
        let texts = build_texts(&table.rows, &self.bundle.text_fields);

        let predictions = self.bundle.classifier.predict_all(&texts)?;
        let labels = predictions.labels;
        check_len(texts.len(), &labels)?;

        let confidences = match predictions.confidences {
            Some(values) => match check_len(texts.len(), &values) {
                Ok(()) => values.into_iter().map(|c| Some(c).filter(|c| c.is_finite())).collect(),
                Err(e) => {
                    log::warn!("Ignoring confidence scores: {}", e);
                    vec![None; texts.len()]
                }
            },
            None => vec![None; texts.len()],
        };

        let rows: Vec<ScoredRow> = table
            .rows
            .into_iter()
            .zip(labels)
            .zip(confidences)
            .map(|((row, label), confidence)| ScoredRow {
                severity: Severity::of_label(&label),
                row,
                attack_type_pred: label,
                confidence,
            })
            .collect();

        log::debug!("Scored {} rows in {:?}", rows.len(), started.elapsed());

        Ok(AnalyzedBatch {
            source: table.source,
            added_columns: table.added_columns,
            has_row_id_column: table.has_row_id_column,
            rows,
        })
    }

    /// Build the risk report of an analyzed batch
    pub fn report(&self, batch: &AnalyzedBatch) -> RiskReport {
        build_report(&batch.rows, self.report.top_n, self.report.preview_limit)
    }

    /// Analyze and report in one step
    pub fn analyze_report(&self, raw: &RawTable) -> Result<(AnalyzedBatch, RiskReport), ClassifierError> {
        let started = Instant::now();
        let batch = self.analyze(raw)?;
        let report = self.report(&batch);
        log::info!(
            "Analyzed {} rows: grade {} ({} high, {} mid) in {:?}",
            report.stats.total,
            report.overall_risk_grade.as_str(),
            report.stats.high,
            report.stats.mid,
            started.elapsed()
        );
        Ok((batch, report))
    }
}
