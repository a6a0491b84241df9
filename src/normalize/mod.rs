//! Text canonicalization of request fields
//!
//! Every field the classifier reads, except the HTTP method, is decoded,
//! case-folded and masked so that numeric IDs and hashes collapse into
//! shared placeholder tokens.

pub mod decode;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{CanonicalField, CanonicalRow};

pub use decode::{html_unescape, percent_decode_plus};

pub const NUM_TOKEN: &str = "<num>";
pub const HEX_TOKEN: &str = "<hex>";

/// Percent-decoding passes, enough for doubly-encoded payloads
const PERCENT_DECODE_PASSES: usize = 2;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2,}").expect("valid digit regex"));
static HEX_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-f0-9]{16,}\b").expect("valid hex regex"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Canonicalize a single field value
pub fn normalize_text(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let mut text = value.to_string();
    for _ in 0..PERCENT_DECODE_PASSES {
        let decoded = percent_decode_plus(&text);
        if decoded == text {
            break;
        }
        text = decoded;
    }

    let text = html_unescape(&text).to_lowercase();
    let text = DIGIT_RUN.replace_all(&text, NUM_TOKEN);
    let text = HEX_RUN.replace_all(&text, HEX_TOKEN);
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    text.trim().to_string()
}

/// Classifier input for one row: normalized fields in `fields` order,
/// empty ones skipped, joined by single spaces.
pub fn build_text(row: &CanonicalRow, fields: &[CanonicalField]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(fields.len());
    for &field in fields {
        let part = match field {
            CanonicalField::Method => row.method.clone(),
            other => normalize_text(row.get(other)),
        };
        if !part.is_empty() {
            parts.push(part);
        }
    }
    parts.join(" ")
}

pub fn build_texts(rows: &[CanonicalRow], fields: &[CanonicalField]) -> Vec<String> {
    rows.iter().map(|row| build_text(row, fields)).collect()
}
