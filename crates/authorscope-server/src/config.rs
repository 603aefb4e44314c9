//! Service configuration

use authorscope_classifiers::model_config::{
    CodeModelConfig, InferenceConfig, ModelSource, ModelsConfig, TextModelConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerSettings,

    /// `code_model` / `text_model` sections
    #[serde(flatten)]
    pub models: ModelsConfig,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<String>,
    pub port: Option<u16>,
    pub code_model_dir: Option<PathBuf>,
    pub text_model_bundle: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &Path, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content).map_err(|e| {
                anyhow::anyhow!("Invalid configuration {}: {}", config_path.display(), e)
            })?
        } else {
            tracing::warn!(
                "Configuration file {} not found, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply(overrides);
        Ok(config)
    }

    /// Apply CLI overrides
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(listen) = &overrides.listen {
            self.server.listen = listen.clone();
        }

        if let Some(port) = overrides.port {
            self.server.port = port;
        }

        if let Some(dir) = &overrides.code_model_dir {
            let source = ModelSource::Local { path: dir.clone() };
            match &mut self.models.code_model {
                Some(code) => code.source = source,
                None => {
                    self.models.code_model = Some(CodeModelConfig {
                        name: "code-authorship".to_string(),
                        source,
                        inference: InferenceConfig::default(),
                        projection_dim: 256,
                        key_mapping: None,
                    })
                }
            }
        }

        if let Some(bundle) = &overrides.text_model_bundle {
            match &mut self.models.text_model {
                Some(text) => text.bundle = bundle.clone(),
                None => {
                    self.models.text_model = Some(TextModelConfig {
                        name: "text-authorship".to_string(),
                        bundle: bundle.clone(),
                    })
                }
            }
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Browser origins allowed by CORS; empty disables the CORS layer
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Replace inference failure details with a generic message
    #[serde(default)]
    pub redact_internal_errors: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: Vec::new(),
            redact_internal_errors: false,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}
