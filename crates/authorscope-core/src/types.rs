//! Core types for AuthorScope

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};

/// Raw request text, guaranteed non-empty after trimming whitespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSample {
    text: String,
    char_len: usize,
}

impl TextSample {
    /// Validate and wrap request text
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        let char_len = text.chars().count();
        Ok(Self { text, char_len })
    }

    /// Decode an uploaded file as UTF-8 and validate it
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::invalid_input("Uploaded file must be UTF-8 text"))?;
        Self::new(text)
    }

    /// Borrow the text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters (Unicode scalar values), echoed as `input_length`
    pub fn char_len(&self) -> usize {
        self.char_len
    }
}

impl AsRef<str> for TextSample {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Per-class probabilities keyed by label, kept in class-index order.
///
/// Serializes as a JSON object whose keys appear in class order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassProbabilities(Vec<(String, f64)>);

impl ClassProbabilities {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self(entries)
    }

    /// Probability for a label, if present
    pub fn get(&self, label: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, p)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, p)| (name.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ClassProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, probability) in &self.0 {
            map.serialize_entry(label, probability)?;
        }
        map.end()
    }
}

/// Result of scoring one request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Predicted class index
    pub class_index: usize,

    /// Predicted class label
    pub label: String,

    /// Probability of the predicted class (0.0-1.0)
    pub confidence: f64,

    /// All class probabilities in class order
    pub probabilities: ClassProbabilities,

    /// Input length in characters
    pub input_length: usize,

    /// Latency in microseconds
    pub latency_us: u64,
}
