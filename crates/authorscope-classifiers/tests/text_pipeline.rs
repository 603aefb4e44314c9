//! Text pipeline integration tests
//!
//! Writes a small bundle to disk and drives it through the classifier trait.

use authorscope_classifiers::linguistic::{FEATURE_COUNT, FEATURE_NAMES};
use authorscope_classifiers::{AuthorshipClassifier, TextAuthorshipClassifier};
use authorscope_core::{Error, TextSample};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

/// Vocabulary of three terms; "moreover" pushes towards AI, "lol" towards Human
fn bundle() -> serde_json::Value {
    let mut coefficients = vec![0.0; 3 + FEATURE_COUNT];
    coefficients[0] = 4.0;
    coefficients[1] = -4.0;
    json!({
        "format_version": 1,
        "vectorizer": {
            "vocabulary": {"moreover": 0, "lol": 1, "the": 2},
            "idf": [2.0, 2.0, 1.0],
            "ngram_range": [1, 1],
            "sublinear_tf": false,
            "norm": "l2"
        },
        "scaler": {
            "mean": vec![0.0; FEATURE_COUNT],
            "scale": vec![1.0; FEATURE_COUNT]
        },
        "model": {
            "type": "logistic-regression",
            "coefficients": coefficients,
            "intercept": 0.0
        },
        "feature_names": FEATURE_NAMES,
        "is_trained": true
    })
}

fn write_bundle(value: &serde_json::Value) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(value.to_string().as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_load_and_classify_through_trait() {
    let file = write_bundle(&bundle());
    let classifier: Arc<dyn AuthorshipClassifier> =
        Arc::new(TextAuthorshipClassifier::load("text", file.path()).unwrap());

    assert_eq!(classifier.name(), "text");
    assert_eq!(classifier.labels(), &["Human", "AI"]);
    assert!(classifier.parameters().is_empty());

    let ai = classifier
        .classify(&TextSample::new("Moreover, the results are conclusive.").unwrap())
        .await
        .unwrap();
    assert_eq!(ai.label, "AI");
    assert_eq!(ai.class_index, 1);

    let human = classifier
        .classify(&TextSample::new("lol that was wild").unwrap())
        .await
        .unwrap();
    assert_eq!(human.label, "Human");
    assert_eq!(human.class_index, 0);
    assert_eq!(human.confidence, human.probabilities.get("Human").unwrap());
}

#[tokio::test]
async fn test_response_shape() {
    let file = write_bundle(&bundle());
    let classifier = TextAuthorshipClassifier::load("text", file.path()).unwrap();
    let text = "Moreover, the final answer is ready.";
    let result = classifier
        .classify(&TextSample::new(text).unwrap())
        .await
        .unwrap();

    let response = authorscope_classifiers::TextPredictionResponse::from(result);
    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["prediction"], "AI");
    assert_eq!(body["input_length"], text.chars().count());
    let probabilities = body["probabilities"].as_object().unwrap();
    let keys: Vec<&str> = probabilities.keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"Human") && keys.contains(&"AI"));
}

#[test]
fn test_extracted_features_feed_scaler_in_order() {
    let file = write_bundle(&bundle());
    let classifier = TextAuthorshipClassifier::load("text", file.path()).unwrap();
    let inputs = classifier
        .assembler()
        .assemble(&["Hello world. This is great!"])
        .unwrap();

    let input = &inputs[0];
    assert_eq!(input.len(), 3 + FEATURE_COUNT);
    // identity scaler: linguistic block equals the raw features
    let linguistic = input.linguistic();
    assert_eq!(linguistic[0], 27.0);
    assert_eq!(linguistic[1], 5.0);
    assert_eq!(linguistic[2], 2.0);
    assert_eq!(linguistic[5], 1.0);
    assert_eq!(linguistic[8], 1.0);
}

#[test]
fn test_assembly_is_bit_identical_across_calls() {
    let file = write_bundle(&bundle());
    let classifier = TextAuthorshipClassifier::load("text", file.path()).unwrap();
    let assembler = classifier.assembler();
    let text = "Moreover, the lol results are clear. Are they? Yes!";

    let bits = |values: &[f64]| values.iter().map(|v| v.to_bits()).collect::<Vec<u64>>();

    let batch = assembler.assemble(&[text, text]).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(bits(batch[0].as_slice()), bits(batch[1].as_slice()));

    let again = assembler.assemble(&[text]).unwrap();
    assert_eq!(bits(batch[0].as_slice()), bits(again[0].as_slice()));
    assert!(batch[0].lexical().iter().any(|v| *v != 0.0));
}

#[test]
fn test_missing_bundle_is_load_error() {
    let err = TextAuthorshipClassifier::load("text", "/nonexistent/bundle.json")
        .err()
        .unwrap();
    assert!(matches!(err, Error::Load(_)));
}

#[test]
fn test_width_drift_is_reported_at_load() {
    let mut value = bundle();
    value["vectorizer"]["vocabulary"]["extra"] = json!(3);
    value["vectorizer"]["idf"] = json!([2.0, 2.0, 1.0, 1.0]);
    let file = write_bundle(&value);

    let err = TextAuthorshipClassifier::load("text", file.path())
        .err()
        .unwrap();
    let message = err.to_string();
    assert!(message.contains("Estimator expects 18 features"), "{}", message);
}
