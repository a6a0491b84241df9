//! TF-IDF feature extraction for a fitted text model

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ModelError;

static WORD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid token regex"));

/// How text is split into terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analyzer {
    /// Word n-grams over tokens of two or more word characters
    #[default]
    Word,
    /// Character n-grams over the whitespace-normalized text
    Char,
    /// Character n-grams inside space-padded words
    CharWb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    #[default]
    L2,
    None,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_true() -> bool {
    true
}

/// Fitted TF-IDF vectorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term to feature column
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequency per feature column
    pub idf: Vec<f64>,
    #[serde(default)]
    pub analyzer: Analyzer,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default)]
    pub norm: Norm,
}

impl TfidfVectorizer {
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ModelError::Invalid(format!(
                "ngram_range ({}, {}) is not a valid range",
                min_n, max_n
            )));
        }
        if let Some((term, idx)) = self.vocabulary.iter().find(|(_, idx)| **idx >= self.idf.len()) {
            return Err(ModelError::Invalid(format!(
                "term '{}' maps to column {} but idf has {} entries",
                term,
                idx,
                self.idf.len()
            )));
        }
        Ok(())
    }

    /// Split a document into the terms the vocabulary was built from
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        match self.analyzer {
            Analyzer::Word => {
                let tokens: Vec<&str> = WORD_TOKEN.find_iter(&text).map(|m| m.as_str()).collect();
                self.word_ngrams(&tokens)
            }
            Analyzer::Char => {
                let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
                let chars: Vec<char> = normalized.chars().collect();
                self.char_ngrams(&chars)
            }
            Analyzer::CharWb => {
                let mut terms = Vec::new();
                for word in text.split_whitespace() {
                    let padded: Vec<char> = std::iter::once(' ')
                        .chain(word.chars())
                        .chain(std::iter::once(' '))
                        .collect();
                    for n in self.ngram_range.0..=self.ngram_range.1 {
                        // a padded word no longer than n is emitted once
                        if padded.len() <= n {
                            terms.push(padded.iter().collect());
                            break;
                        }
                        for window in padded.windows(n) {
                            terms.push(window.iter().collect());
                        }
                    }
                }
                terms
            }
        }
    }

    fn word_ngrams(&self, tokens: &[&str]) -> Vec<String> {
        let mut terms = Vec::new();
        for n in self.ngram_range.0..=self.ngram_range.1 {
            if tokens.len() < n {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    fn char_ngrams(&self, chars: &[char]) -> Vec<String> {
        let mut terms = Vec::new();
        for n in self.ngram_range.0..=self.ngram_range.1 {
            if chars.len() < n {
                break;
            }
            for window in chars.windows(n) {
                terms.push(window.iter().collect());
            }
        }
        terms
    }

    /// Sparse TF-IDF vector, sorted by column
    pub fn transform(&self, text: &str) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in self.analyze(text) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut features: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (idx, tf * self.idf[idx])
            })
            .collect();
        features.sort_by_key(|(idx, _)| *idx);

        if self.norm == Norm::L2 {
            let length = features.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            if length > 0.0 {
                for (_, v) in features.iter_mut() {
                    *v /= length;
                }
            }
        }

        features
    }
}
