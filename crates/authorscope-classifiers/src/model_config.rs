//! Model configuration structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Models served by one process; either may be left out
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Neural code authorship model
    #[serde(default)]
    pub code_model: Option<CodeModelConfig>,

    /// Classical text authorship model
    #[serde(default)]
    pub text_model: Option<TextModelConfig>,
}

/// Configuration for the code model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeModelConfig {
    #[serde(default = "default_code_name")]
    pub name: String,

    /// Where to load weights, tokenizer and encoder config from
    pub source: ModelSource,

    #[serde(default)]
    pub inference: InferenceConfig,

    /// Width of the projection head
    #[serde(default = "default_projection_dim")]
    pub projection_dim: usize,

    /// Key mapping table; defaults to `key_mapping.json` in the model
    /// directory, then the built-in table
    #[serde(default)]
    pub key_mapping: Option<PathBuf>,
}

fn default_code_name() -> String {
    "code-authorship".to_string()
}

fn default_projection_dim() -> usize {
    256
}

/// Configuration for the text model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextModelConfig {
    #[serde(default = "default_text_name")]
    pub name: String,

    /// JSON bundle holding vectorizer, scaler and estimator
    pub bundle: PathBuf,
}

fn default_text_name() -> String {
    "text-authorship".to_string()
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from local filesystem
    Local { path: PathBuf },

    /// Download from HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

/// Compute device for the neural model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    /// GPU when one is available, otherwise CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
    #[serde(alias = "mps")]
    Metal,
}

/// Inference configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub device: DeviceSpec,

    /// Maximum sequence length in tokens
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_max_length() -> usize {
    512
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            device: DeviceSpec::default(),
            max_length: default_max_length(),
        }
    }
}
