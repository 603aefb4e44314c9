//! Turning model output into predictions and response bodies

use authorscope_core::{ClassProbabilities, Error, PredictionResult, Result};
use serde::Serialize;

/// Labels for the code endpoint, by class index
pub const CODE_LABELS: [&str; 2] = ["HUMAN_GENERATED", "MACHINE_GENERATED"];

/// Labels for the text endpoint, by class index
pub const TEXT_LABELS: [&str; 2] = ["Human", "AI"];

/// Build a prediction from a probability distribution, taking the argmax.
///
/// Ties resolve to the lower class index.
pub fn from_distribution(
    probabilities: &[f64],
    labels: &[&str],
    input_length: usize,
) -> Result<PredictionResult> {
    let predicted = probabilities
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, &p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((idx, p)),
        })
        .map(|(idx, _)| idx)
        .ok_or_else(|| Error::inference("Model returned no class probabilities"))?;

    from_prediction(predicted, probabilities, labels, input_length)
}

/// Build a prediction when the estimator chose the class itself
pub fn from_prediction(
    predicted: usize,
    probabilities: &[f64],
    labels: &[&str],
    input_length: usize,
) -> Result<PredictionResult> {
    if probabilities.len() != labels.len() {
        return Err(Error::inference(format!(
            "Model returned {} probabilities for {} classes",
            probabilities.len(),
            labels.len()
        )));
    }
    if probabilities.iter().any(|p| !p.is_finite()) {
        return Err(Error::inference("Model returned non-finite probabilities"));
    }

    let label = labels
        .get(predicted)
        .ok_or_else(|| Error::inference(format!("Predicted class {} has no label", predicted)))?;

    Ok(PredictionResult {
        class_index: predicted,
        label: label.to_string(),
        confidence: probabilities[predicted],
        probabilities: ClassProbabilities::new(
            labels
                .iter()
                .zip(probabilities)
                .map(|(label, p)| (label.to_string(), *p))
                .collect(),
        ),
        input_length,
        latency_us: 0,
    })
}

/// Response body of the code endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CodePredictionResponse {
    pub prediction: usize,
    pub label: String,
    pub confidence: f64,
    pub probabilities: ClassProbabilities,
    pub input_length: usize,
}

impl From<PredictionResult> for CodePredictionResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.class_index,
            label: result.label,
            confidence: result.confidence,
            probabilities: result.probabilities,
            input_length: result.input_length,
        }
    }
}

/// Response body of the text endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TextPredictionResponse {
    pub prediction: String,
    pub confidence: f64,
    pub probabilities: ClassProbabilities,
    pub input_length: usize,
}

impl From<PredictionResult> for TextPredictionResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.label,
            confidence: result.confidence,
            probabilities: result.probabilities,
            input_length: result.input_length,
        }
    }
}
