//! Feature assembly for the text model
//!
//! Each row is the TF-IDF lexical vector followed by the scaled linguistic
//! features, in that fixed column order.

use crate::linguistic::{LinguisticFeatureExtractor, FEATURE_COUNT};
use crate::scaler::StandardScaler;
use crate::vectorizer::TfidfVectorizer;
use authorscope_core::{Error, Result};

/// Dense model input for one text
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInput {
    values: Vec<f64>,
    lexical_width: usize,
}

impl ClassifierInput {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Lexical (TF-IDF) columns
    pub fn lexical(&self) -> &[f64] {
        &self.values[..self.lexical_width]
    }

    /// Scaled linguistic columns
    pub fn linguistic(&self) -> &[f64] {
        &self.values[self.lexical_width..]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Combines the pretrained vectorizer, the extractor and the pretrained scaler
pub struct FeatureAssembler {
    vectorizer: TfidfVectorizer,
    scaler: StandardScaler,
    extractor: LinguisticFeatureExtractor,
}

impl FeatureAssembler {
    pub fn new(
        vectorizer: TfidfVectorizer,
        scaler: StandardScaler,
        extractor: LinguisticFeatureExtractor,
    ) -> Self {
        Self {
            vectorizer,
            scaler,
            extractor,
        }
    }

    /// Total columns of every assembled row
    pub fn width(&self) -> usize {
        self.vectorizer.num_features() + FEATURE_COUNT
    }

    pub fn extractor(&self) -> &LinguisticFeatureExtractor {
        &self.extractor
    }

    /// Assemble one input per text
    pub fn assemble<T: AsRef<str>>(&self, texts: &[T]) -> Result<Vec<ClassifierInput>> {
        let lexical = self.vectorizer.transform(texts)?;
        let linguistic = self.extractor.extract_batch(texts);
        let lexical_width = self.vectorizer.num_features();

        if lexical.cols() != lexical_width {
            return Err(Error::inference(format!(
                "Lexical matrix has {} columns, expected {}",
                lexical.cols(),
                lexical_width
            )));
        }

        lexical
            .outer_iterator()
            .zip(linguistic)
            .map(|(row_vec, features)| {
                let mut values = vec![0.0; lexical_width + FEATURE_COUNT];
                for (col_idx, &value) in row_vec.iter() {
                    values[col_idx] = value;
                }

                let scaled = &mut values[lexical_width..];
                scaled.copy_from_slice(&features.to_array());
                self.scaler.transform_row(scaled)?;

                Ok(ClassifierInput {
                    values,
                    lexical_width,
                })
            })
            .collect()
    }
}
