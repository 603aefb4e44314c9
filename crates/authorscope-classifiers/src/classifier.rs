//! Classifier trait and common types

use async_trait::async_trait;
use authorscope_core::{PredictionResult, Result, TextSample};
use serde::Serialize;

/// Trait for both authorship classifiers
#[async_trait]
pub trait AuthorshipClassifier: Send + Sync {
    /// Classify the given sample
    async fn classify(&self, sample: &TextSample) -> Result<PredictionResult>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Class labels by class index
    fn labels(&self) -> &[&'static str];

    /// Live model parameters, for classifiers backed by a neural network
    fn parameters(&self) -> &[ParameterInfo] {
        &[]
    }
}

/// Name and shape of one live model parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterInfo {
    pub name: String,
    pub shape: Vec<usize>,
}
