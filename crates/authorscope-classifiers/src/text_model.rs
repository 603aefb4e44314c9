//! Text authorship classifier: TF-IDF + linguistic features + linear model
//!
//! The trained pipeline ships as a single JSON bundle holding the vectorizer,
//! the scaler and the estimator. The bundle is validated once at load time
//! so that a column-count drift between training and serving surfaces as a
//! load failure naming the mismatch.

use crate::assembler::FeatureAssembler;
use crate::classifier::AuthorshipClassifier;
use crate::estimator::Estimator;
use crate::linguistic::{LinguisticFeatureExtractor, FEATURE_COUNT, FEATURE_NAMES};
use crate::scaler::StandardScaler;
use crate::scoring::{self, TEXT_LABELS};
use crate::vectorizer::{TfidfParams, TfidfVectorizer};
use async_trait::async_trait;
use authorscope_core::{Error, PredictionResult, Result, TextSample};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Bundle layout versions this build can read
pub const SUPPORTED_BUNDLE_VERSIONS: [u32; 1] = [1];

fn default_format_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// On-disk text model bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextModelBundle {
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    pub vectorizer: TfidfParams,

    pub scaler: StandardScaler,

    pub model: Estimator,

    #[serde(default = "default_true")]
    pub is_trained: bool,

    /// Linguistic column names the scaler was fitted on
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

impl TextModelBundle {
    /// Load a bundle from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::load(format!(
                "Failed to read text model bundle {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents).map_err(|e| match e {
            Error::Load(msg) => Error::load(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::load(format!("Failed to parse text model bundle: {}", e)))
    }

    /// Check every width the serving pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_BUNDLE_VERSIONS.contains(&self.format_version) {
            return Err(Error::load(format!(
                "Unsupported text model bundle version {}",
                self.format_version
            )));
        }
        if !self.is_trained {
            return Err(Error::load("Text model bundle is marked as untrained"));
        }

        self.scaler.validate()?;
        if self.scaler.num_features() != FEATURE_COUNT {
            return Err(Error::load(format!(
                "Scaler was fitted on {} linguistic features but the extractor produces {}",
                self.scaler.num_features(),
                FEATURE_COUNT
            )));
        }

        if let Some(names) = &self.feature_names {
            if names.iter().map(String::as_str).ne(FEATURE_NAMES) {
                return Err(Error::load(format!(
                    "Bundle feature columns {:?} differ from extractor columns {:?}",
                    names, FEATURE_NAMES
                )));
            }
        }

        let expected = self.vectorizer.vocabulary.len() + FEATURE_COUNT;
        if self.model.num_features() != expected {
            return Err(Error::load(format!(
                "Estimator expects {} features but vocabulary ({}) + linguistic ({}) = {}",
                self.model.num_features(),
                self.vectorizer.vocabulary.len(),
                FEATURE_COUNT,
                expected
            )));
        }

        Ok(())
    }
}

/// Classical text authorship classifier
pub struct TextAuthorshipClassifier {
    name: String,
    assembler: FeatureAssembler,
    estimator: Estimator,
}

impl TextAuthorshipClassifier {
    /// Build a classifier from a bundle, validating it first
    pub fn from_bundle(name: impl Into<String>, bundle: TextModelBundle) -> Result<Self> {
        bundle.validate()?;

        let vectorizer = TfidfVectorizer::from_params(bundle.vectorizer)?;
        let extractor = LinguisticFeatureExtractor::new()?;
        let assembler = FeatureAssembler::new(vectorizer, bundle.scaler, extractor);

        Ok(Self {
            name: name.into(),
            assembler,
            estimator: bundle.model,
        })
    }

    /// Load and validate a bundle file
    pub fn load(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading text model bundle from {}", path.display());
        let classifier = Self::from_bundle(name, TextModelBundle::from_file(path)?)?;
        info!(
            "Text model loaded ({} input features)",
            classifier.assembler.width()
        );
        Ok(classifier)
    }

    pub fn assembler(&self) -> &FeatureAssembler {
        &self.assembler
    }

    /// Score a sample synchronously
    pub fn predict(&self, sample: &TextSample) -> Result<PredictionResult> {
        let start = Instant::now();

        let inputs = self.assembler.assemble(&[sample.as_str()])?;
        let input = inputs
            .first()
            .ok_or_else(|| Error::inference("Feature assembly produced no rows"))?;

        let predicted = self.estimator.predict(input.as_slice())?;
        let probabilities = self.estimator.predict_proba(input.as_slice())?;
        debug!(predicted, ?probabilities, "Estimator output");

        let mut result =
            scoring::from_prediction(predicted, &probabilities, &TEXT_LABELS, sample.char_len())?;
        result.latency_us = start.elapsed().as_micros() as u64;
        Ok(result)
    }
}

#[async_trait]
impl AuthorshipClassifier for TextAuthorshipClassifier {
    async fn classify(&self, sample: &TextSample) -> Result<PredictionResult> {
        self.predict(sample)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn labels(&self) -> &[&'static str] {
        &TEXT_LABELS
    }
}
