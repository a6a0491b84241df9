//! HTTP handlers for the triage API

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::engine::{AnalyzedBatch, TriageEngine};
use crate::input::read_uploaded_table;
use crate::output::{export_csv, export_filename};
use crate::report::RiskReport;

/// Name of the multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "file";

/// An uploaded file read from a multipart body
#[derive(Debug)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Bytes,
}

/// Take the `file` field from a multipart body, ignoring other fields
pub async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        log::debug!("Received upload {:?} ({} bytes)", filename, bytes.len());
        return Ok(Upload { filename, bytes });
    }
    Err(ApiError::MissingFile)
}

/// Parse and analyze an upload on the blocking pool
async fn run_pipeline<T, F>(engine: Arc<TriageEngine>, upload: Upload, finish: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(AnalyzedBatch, RiskReport) -> ApiResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> ApiResult<T> {
        let table = read_uploaded_table(&upload.bytes, upload.filename.as_deref())?;
        let (batch, report) = engine.analyze_report(&table)?;
        finish(batch, report)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("analysis task failed: {}", e)))?
}

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<RiskReport>> {
    let upload = read_upload(multipart?).await?;
    let report = run_pipeline(state.engine.clone(), upload, |_, report| Ok(report)).await?;
    Ok(Json(report))
}

/// POST /api/download_csv
pub async fn download_csv(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let upload = read_upload(multipart?).await?;
    let filename = export_filename(upload.filename.as_deref());
    let csv = run_pipeline(state.engine.clone(), upload, |batch, _| Ok(export_csv(&batch)?)).await?;

    let disposition = HeaderValue::from_str(&content_disposition(&filename))
        .map_err(|e| ApiError::Internal(format!("invalid Content-Disposition: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_path: String,
    version: &'static str,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_path: state.model_path.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `attachment` disposition with an ASCII fallback name and the exact
/// UTF-8 name in `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == filename {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            encode_ext_value(filename)
        )
    }
}

fn encode_ext_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~');
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_disposition() {
        assert_eq!(
            content_disposition("pred_access.csv"),
            "attachment; filename=\"pred_access.csv\""
        );
    }

    #[test]
    fn test_utf8_disposition() {
        assert_eq!(
            content_disposition("pred_日志.csv"),
            "attachment; filename=\"pred___.csv\"; filename*=UTF-8''pred_%E6%97%A5%E5%BF%97.csv"
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        let value = content_disposition("pred_a\"b.csv");
        assert!(value.starts_with("attachment; filename=\"pred_a_b.csv\""));
        assert!(value.ends_with("pred_a%22b.csv"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }
}
