//! Model artifact loading
//!
//! A bundle is a JSON document holding the fitted text pipeline and the
//! ordered list of fields the model was trained on:
//!
//! ```json
//! {
//!   "text_cols": ["method", "url_path", "request_body", "user_agent"],
//!   "pipeline": {
//!     "vectorizer": { "vocabulary": {"select": 0}, "idf": [1.0] },
//!     "estimator": {
//!       "kind": "logistic_regression",
//!       "classes": ["SQL注入攻击", "正常访问"],
//!       "coef": [[-2.0]],
//!       "intercept": [0.1]
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ClassifierError, LinearEstimator, ModelError, Predictions, RowClassifier, TfidfVectorizer};
use crate::models::CanonicalField;

/// Field order used when a bundle does not name one
pub const DEFAULT_TEXT_FIELDS: [CanonicalField; 4] = [
    CanonicalField::Method,
    CanonicalField::UrlPath,
    CanonicalField::RequestBody,
    CanonicalField::UserAgent,
];

/// Vectorizer followed by a linear estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPipeline {
    pub vectorizer: TfidfVectorizer,
    pub estimator: LinearEstimator,
}

impl TextPipeline {
    pub fn validate(&self) -> Result<(), ModelError> {
        self.vectorizer.validate()?;
        self.estimator.validate(self.vectorizer.n_features())
    }
}

impl RowClassifier for TextPipeline {
    fn predict(&self, texts: &[String]) -> Result<Vec<String>, ClassifierError> {
        Ok(texts
            .iter()
            .map(|text| {
                let x = self.vectorizer.transform(text);
                self.estimator.predict_label(&x).to_string()
            })
            .collect())
    }

    fn predict_confidence(&self, texts: &[String]) -> Result<Option<Vec<f64>>, ClassifierError> {
        Ok(self.predict_all(texts)?.confidences)
    }

    fn predict_all(&self, texts: &[String]) -> Result<Predictions, ClassifierError> {
        let mut labels = Vec::with_capacity(texts.len());
        let mut confidences = Vec::with_capacity(texts.len());
        for text in texts {
            let x = self.vectorizer.transform(text);
            labels.push(self.estimator.predict_label(&x).to_string());
            if let Some(probs) = self.estimator.probabilities(&x) {
                confidences.push(max_probability(probs));
            }
        }

        Ok(Predictions {
            labels,
            confidences: self.estimator.has_probabilities().then_some(confidences),
        })
    }
}

fn max_probability(probs: Vec<f64>) -> f64 {
    probs.into_iter().fold(0.0, f64::max)
}

#[derive(Deserialize)]
struct BundleFile {
    #[serde(default)]
    text_cols: Option<Vec<String>>,
    pipeline: TextPipeline,
}

/// A loaded classifier together with its input field order
#[derive(Clone)]
pub struct ModelBundle {
    pub text_fields: Vec<CanonicalField>,
    pub classifier: Arc<dyn RowClassifier>,
    /// Where the bundle was loaded from, if it came from disk
    pub source_path: Option<PathBuf>,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("text_fields", &self.text_fields)
            .field("source_path", &self.source_path)
            .finish_non_exhaustive()
    }
}

impl ModelBundle {
    /// Wrap an already-constructed classifier
    pub fn new(classifier: Arc<dyn RowClassifier>, text_fields: Vec<CanonicalField>) -> Self {
        ModelBundle {
            text_fields,
            classifier,
            source_path: None,
        }
    }

    /// Parse a bundle from its JSON text
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let file: BundleFile = serde_json::from_str(json)?;
        file.pipeline.validate()?;

        let text_fields = match file.text_cols {
            Some(cols) => cols
                .iter()
                .map(|c| CanonicalField::from_name(c).ok_or_else(|| ModelError::UnknownField(c.clone())))
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_TEXT_FIELDS.to_vec(),
        };

        Ok(ModelBundle::new(Arc::new(file.pipeline), text_fields))
    }

    /// Load a bundle from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let mut bundle = Self::from_json(&contents)?;
        bundle.source_path = Some(path.to_path_buf());

        log::info!(
            "Model loaded: {} (text fields: {:?})",
            path.display(),
            bundle.text_fields.iter().map(|f| f.name()).collect::<Vec<_>>()
        );
        Ok(bundle)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Three-class word model used across the crate's tests
    pub(crate) const SAMPLE_BUNDLE: &str = r#"{
        "text_cols": ["method", "url_path", "request_body", "user_agent"],
        "pipeline": {
            "vectorizer": {
                "vocabulary": {"select": 0, "union": 1, "script": 2, "get": 3},
                "idf": [1.0, 1.0, 1.0, 1.0],
                "analyzer": "word"
            },
            "estimator": {
                "kind": "logistic_regression",
                "classes": ["SQL注入攻击", "XSS跨站脚本攻击", "正常访问"],
                "coef": [[2.0, 2.0, 0.0, 0.0], [0.0, 0.0, 3.0, 0.0], [0.0, 0.0, 0.0, 1.0]],
                "intercept": [0.0, 0.0, 0.5]
            }
        }
    }"#;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_predict_labels() {
        let bundle = ModelBundle::from_json(SAMPLE_BUNDLE).unwrap();
        let labels = bundle
            .classifier
            .predict(&texts(&[
                "GET /a?id=1 union select",
                "GET /index.html",
                "<script>alert(1)</script>",
                "",
            ]))
            .unwrap();
        assert_eq!(labels, vec!["SQL注入攻击", "正常访问", "XSS跨站脚本攻击", "正常访问"]);
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let bundle = ModelBundle::from_json(SAMPLE_BUNDLE).unwrap();
        let confidences = bundle
            .classifier
            .predict_confidence(&texts(&["union select", "hello"]))
            .unwrap()
            .unwrap();
        assert_eq!(confidences.len(), 2);
        for c in confidences {
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn test_predict_all_matches_separate_calls() {
        let bundle = ModelBundle::from_json(SAMPLE_BUNDLE).unwrap();
        let inputs = texts(&["GET /a?id=1 union select", "<script>", "GET /"]);

        let all = bundle.classifier.predict_all(&inputs).unwrap();
        assert_eq!(all.labels, bundle.classifier.predict(&inputs).unwrap());
        assert_eq!(
            all.confidences,
            bundle.classifier.predict_confidence(&inputs).unwrap()
        );
        assert_eq!(all.confidences.map(|c| c.len()), Some(3));
    }

    #[test]
    fn test_svc_bundle_has_no_confidence() {
        let json = SAMPLE_BUNDLE.replace("logistic_regression", "linear_svc");
        let bundle = ModelBundle::from_json(&json).unwrap();
        assert!(bundle.classifier.predict_confidence(&texts(&["x"])).unwrap().is_none());
        let all = bundle.classifier.predict_all(&texts(&["union select", "x"])).unwrap();
        assert_eq!(all.labels, vec!["SQL注入攻击", "正常访问"]);
        assert_eq!(all.confidences, None);
    }

    #[test]
    fn test_default_text_fields() {
        let json = SAMPLE_BUNDLE.replace(
            r#""text_cols": ["method", "url_path", "request_body", "user_agent"],"#,
            "",
        );
        let bundle = ModelBundle::from_json(&json).unwrap();
        assert_eq!(bundle.text_fields, DEFAULT_TEXT_FIELDS.to_vec());
    }

    #[test]
    fn test_custom_text_field_order() {
        let json = SAMPLE_BUNDLE.replace(
            r#"["method", "url_path", "request_body", "user_agent"]"#,
            r#"["URL_PATH", "method"]"#,
        );
        let bundle = ModelBundle::from_json(&json).unwrap();
        assert_eq!(bundle.text_fields, vec![CanonicalField::UrlPath, CanonicalField::Method]);
    }

    #[test]
    fn test_unknown_text_field_rejected() {
        let json = SAMPLE_BUNDLE.replace(r#""request_body""#, r#""referer""#);
        match ModelBundle::from_json(&json) {
            Err(ModelError::UnknownField(name)) => assert_eq!(name, "referer"),
            other => panic!("expected unknown field error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_BUNDLE.as_bytes()).unwrap();

        let bundle = ModelBundle::from_file(file.path()).unwrap();
        assert_eq!(bundle.source_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ModelBundle::from_file("/nonexistent/model.json"),
            Err(ModelError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(ModelBundle::from_json("{"), Err(ModelError::Json(_))));
    }
}
