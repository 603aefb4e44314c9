//! Pretrained TF-IDF vectorizer
//!
//! Vocabulary and IDF weights come from the text model artifact and are never
//! refit at inference time.

use authorscope_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

fn default_token_pattern() -> String {
    r"\b\w\w+\b".to_string()
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_true() -> bool {
    true
}

/// Row normalisation applied after IDF weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    #[default]
    L2,
    L1,
    None,
}

/// Serialized vectorizer parameters, as exported from training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfParams {
    /// Term (or space-joined n-gram) to column index
    pub vocabulary: HashMap<String, usize>,

    /// Inverse document frequency per column
    pub idf: Vec<f64>,

    #[serde(default = "default_true")]
    pub lowercase: bool,

    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),

    #[serde(default)]
    pub sublinear_tf: bool,

    #[serde(default)]
    pub norm: Norm,

    #[serde(default = "default_token_pattern")]
    pub token_pattern: String,
}

/// Fitted TF-IDF transform
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    params: TfidfParams,
    token_pattern: Regex,
}

impl TfidfVectorizer {
    /// Build from exported parameters, validating their shape
    pub fn from_params(params: TfidfParams) -> Result<Self> {
        let dim = params.vocabulary.len();
        if params.idf.len() != dim {
            return Err(Error::load(format!(
                "Vectorizer has {} vocabulary entries but {} IDF weights",
                dim,
                params.idf.len()
            )));
        }
        if let Some((term, idx)) = params.vocabulary.iter().find(|(_, idx)| **idx >= dim) {
            return Err(Error::load(format!(
                "Vocabulary term '{}' has column {} outside 0..{}",
                term, idx, dim
            )));
        }
        let (min_n, max_n) = params.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(Error::load(format!(
                "Invalid ngram_range ({}, {})",
                min_n, max_n
            )));
        }

        let token_pattern = Regex::new(&params.token_pattern).map_err(|e| {
            Error::load(format!(
                "Invalid token pattern '{}': {}",
                params.token_pattern, e
            ))
        })?;

        debug!(vocab_size = dim, "TfidfVectorizer ready");
        Ok(Self {
            params,
            token_pattern,
        })
    }

    pub fn num_features(&self) -> usize {
        self.params.idf.len()
    }

    pub fn params(&self) -> &TfidfParams {
        &self.params
    }

    /// Raw term counts for one document, sorted by column
    fn count_terms(&self, text: &str) -> BTreeMap<usize, f64> {
        let lowered;
        let text = if self.params.lowercase {
            lowered = text.to_lowercase();
            lowered.as_str()
        } else {
            text
        };

        let tokens: Vec<&str> = self
            .token_pattern
            .find_iter(text)
            .map(|m| m.as_str())
            .collect();

        let mut counts = BTreeMap::new();
        let (min_n, max_n) = self.params.ngram_range;
        for n in min_n..=max_n {
            if n == 1 {
                for token in &tokens {
                    if let Some(&idx) = self.params.vocabulary.get(*token) {
                        *counts.entry(idx).or_insert(0.0) += 1.0;
                    }
                }
            } else {
                for window in tokens.windows(n) {
                    if let Some(&idx) = self.params.vocabulary.get(&window.join(" ")) {
                        *counts.entry(idx).or_insert(0.0) += 1.0;
                    }
                }
            }
        }
        counts
    }

    /// Transform documents into a CSR matrix with one TF-IDF row per text
    pub fn transform<T: AsRef<str>>(&self, texts: &[T]) -> Result<CsMat<f64>> {
        debug!(num_texts = texts.len(), "Transforming texts using TfidfVectorizer");

        let mut indptr = Vec::with_capacity(texts.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        for text in texts {
            for (idx, count) in self.count_terms(text.as_ref()) {
                indices.push(idx);
                data.push(count);
            }
            indptr.push(indices.len());
        }

        let shape = (texts.len(), self.num_features());
        let mut matrix = CsMat::try_new(shape, indptr, indices, data)
            .map_err(|(_, _, _, e)| Error::inference(format!("Invalid TF-IDF matrix: {}", e)))?;

        for mut row_vec in matrix.outer_iterator_mut() {
            for (col_idx, val) in row_vec.iter_mut() {
                if self.params.sublinear_tf {
                    *val = 1.0 + val.ln();
                }
                *val *= self.params.idf[col_idx];
            }

            let norm = match self.params.norm {
                Norm::L2 => row_vec.iter().map(|(_, &v)| v * v).sum::<f64>().sqrt(),
                Norm::L1 => row_vec.iter().map(|(_, &v)| v.abs()).sum::<f64>(),
                Norm::None => 1.0,
            };
            if norm > 0.0 {
                for (_, val) in row_vec.iter_mut() {
                    *val /= norm;
                }
            }
        }

        Ok(matrix)
    }
}
