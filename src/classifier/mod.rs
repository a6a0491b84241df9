//! Attack-type classification
//!
//! The pipeline only consumes a fitted model. Anything that can turn
//! canonical text into labels implements [`RowClassifier`]; the bundled
//! implementation evaluates a TF-IDF + linear model exported to JSON.

pub mod bundle;
pub mod linear;
pub mod tfidf;

pub use bundle::{ModelBundle, TextPipeline, DEFAULT_TEXT_FIELDS};
pub use linear::{EstimatorKind, LinearEstimator};
pub use tfidf::{Analyzer, Norm, TfidfVectorizer};

use thiserror::Error;

/// Errors raised while running a classifier
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier returned {actual} results for {expected} inputs")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Errors raised while loading a model artifact
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown text column in model bundle: {0}")]
    UnknownField(String),

    #[error("Invalid model: {0}")]
    Invalid(String),
}

/// Labels and confidences for one batch of texts
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub labels: Vec<String>,
    /// `None` when the model has no probability estimates or they failed
    pub confidences: Option<Vec<f64>>,
}

/// Opaque text classifier
///
/// Implementations are loaded once and shared read-only between requests.
pub trait RowClassifier: Send + Sync {
    /// Predict one label per input text
    fn predict(&self, texts: &[String]) -> Result<Vec<String>, ClassifierError>;

    /// Maximum class probability per input text.
    ///
    /// Models without probability estimates return `Ok(None)`.
    fn predict_confidence(&self, _texts: &[String]) -> Result<Option<Vec<f64>>, ClassifierError> {
        Ok(None)
    }

    /// Labels plus confidences. Only a label failure is an error; a failed
    /// confidence estimate is logged and dropped.
    ///
    /// Implementations that can score both from one pass over the inputs
    /// should override this.
    fn predict_all(&self, texts: &[String]) -> Result<Predictions, ClassifierError> {
        let labels = self.predict(texts)?;
        let confidences = match self.predict_confidence(texts) {
            Ok(confidences) => confidences,
            Err(e) => {
                log::warn!("Confidence estimation failed, continuing without it: {}", e);
                None
            }
        };
        Ok(Predictions { labels, confidences })
    }
}

/// Check that a classifier produced exactly one result per input
pub(crate) fn check_len<T>(expected: usize, results: &[T]) -> Result<(), ClassifierError> {
    if results.len() == expected {
        Ok(())
    } else {
        Err(ClassifierError::LengthMismatch {
            expected,
            actual: results.len(),
        })
    }
}
