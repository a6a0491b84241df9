//! Linear estimator over sparse features

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Estimator family, which decides whether probabilities are available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    LogisticRegression,
    LinearSvc,
}

/// Fitted one-row-per-class linear model.
///
/// Binary models carry a single coefficient row scoring the second class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearEstimator {
    pub kind: EstimatorKind,
    pub classes: Vec<String>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearEstimator {
    fn is_binary(&self) -> bool {
        self.classes.len() == 2 && self.coef.len() == 1
    }

    pub fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.classes.len() < 2 {
            return Err(ModelError::Invalid(format!(
                "estimator needs at least two classes, found {}",
                self.classes.len()
            )));
        }
        if !self.is_binary() && self.coef.len() != self.classes.len() {
            return Err(ModelError::Invalid(format!(
                "{} coefficient rows for {} classes",
                self.coef.len(),
                self.classes.len()
            )));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(ModelError::Invalid(format!(
                "{} intercepts for {} coefficient rows",
                self.intercept.len(),
                self.coef.len()
            )));
        }
        if let Some(row) = self.coef.iter().find(|row| row.len() != n_features) {
            return Err(ModelError::Invalid(format!(
                "coefficient row has {} weights, vectorizer has {} features",
                row.len(),
                n_features
            )));
        }
        Ok(())
    }

    /// Raw decision score per coefficient row
    pub fn decision(&self, x: &[(usize, f64)]) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, bias)| bias + x.iter().map(|(idx, v)| row[*idx] * v).sum::<f64>())
            .collect()
    }

    /// Index into `classes` of the predicted label
    pub fn predict_index(&self, x: &[(usize, f64)]) -> usize {
        let scores = self.decision(x);
        if self.is_binary() {
            return usize::from(scores[0] > 0.0);
        }

        let mut best = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = i;
            }
        }
        best
    }

    pub fn predict_label(&self, x: &[(usize, f64)]) -> &str {
        &self.classes[self.predict_index(x)]
    }

    pub fn has_probabilities(&self) -> bool {
        self.kind == EstimatorKind::LogisticRegression
    }

    /// Class probabilities, or `None` for margin-only estimators
    pub fn probabilities(&self, x: &[(usize, f64)]) -> Option<Vec<f64>> {
        if !self.has_probabilities() {
            return None;
        }

        let scores = self.decision(x);
        if self.is_binary() {
            let p = 1.0 / (1.0 + (-scores[0]).exp());
            return Some(vec![1.0 - p, p]);
        }

        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exp.iter().sum();
        Some(exp.into_iter().map(|e| e / total).collect())
    }
}
