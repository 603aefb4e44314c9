//! Pretrained probabilistic classifier for the text path

use authorscope_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Binary probabilistic estimator exported from training.
///
/// Class 0 is human-written, class 1 is machine-written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Estimator {
    /// Binary logistic regression: `P(1) = sigmoid(w . x + b)`
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

impl Estimator {
    pub fn num_features(&self) -> usize {
        match self {
            Self::LogisticRegression { coefficients, .. } => coefficients.len(),
        }
    }

    /// Raw decision score for class 1
    pub fn decision_function(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.num_features() {
            return Err(Error::inference(format!(
                "Estimator expects {} features, got {}",
                self.num_features(),
                features.len()
            )));
        }

        match self {
            Self::LogisticRegression {
                coefficients,
                intercept,
            } => Ok(coefficients
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
                + intercept),
        }
    }

    /// Class probabilities `[P(0), P(1)]`
    pub fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2]> {
        let p1 = sigmoid(self.decision_function(features)?);
        Ok([1.0 - p1, p1])
    }

    /// Predicted class index
    pub fn predict(&self, features: &[f64]) -> Result<usize> {
        Ok(usize::from(self.decision_function(features)? > 0.0))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
