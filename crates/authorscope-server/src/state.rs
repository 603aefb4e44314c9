//! Shared service state

use anyhow::Result;
use authorscope_classifiers::{
    AuthorshipClassifier, CodeAuthorshipClassifier, LinguisticFeatureExtractor,
    TextAuthorshipClassifier,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

use crate::config::{ServerConfig, ServerSettings};

/// Loaded models and settings, immutable once the listener is bound
#[derive(Clone)]
pub struct ServiceContext {
    /// Listener and error-reporting settings
    pub settings: Arc<ServerSettings>,

    /// Code classifier, if configured
    pub code: Option<Arc<dyn AuthorshipClassifier>>,

    /// Text classifier, if configured
    pub text: Option<Arc<dyn AuthorshipClassifier>>,

    /// Feature extractor for the features endpoint
    pub extractor: Arc<LinguisticFeatureExtractor>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: Option<PrometheusHandle>,
}

impl ServiceContext {
    /// Assemble a context from already-loaded classifiers
    pub fn new(
        settings: ServerSettings,
        code: Option<Arc<dyn AuthorshipClassifier>>,
        text: Option<Arc<dyn AuthorshipClassifier>>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Result<Self> {
        Ok(Self {
            settings: Arc::new(settings),
            code,
            text,
            extractor: Arc::new(LinguisticFeatureExtractor::new()?),
            metrics_handle,
        })
    }

    /// Load every configured model; any failure aborts startup
    pub async fn load(
        config: ServerConfig,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Result<Self> {
        info!("Initializing service context");

        let text: Option<Arc<dyn AuthorshipClassifier>> = match &config.models.text_model {
            Some(text_config) => {
                let classifier =
                    TextAuthorshipClassifier::load(text_config.name.clone(), &text_config.bundle)?;
                Some(Arc::new(classifier))
            }
            None => {
                info!("No text model configured, /v1/text/predict will answer 503");
                None
            }
        };

        let code: Option<Arc<dyn AuthorshipClassifier>> = match config.models.code_model.clone() {
            Some(code_config) => {
                // Weight loading and hub downloads block
                let classifier = tokio::task::spawn_blocking(move || {
                    CodeAuthorshipClassifier::load(&code_config)
                })
                .await??;
                Some(Arc::new(classifier))
            }
            None => {
                info!("No code model configured, /v1/code/predict will answer 503");
                None
            }
        };

        Self::new(config.server, code, text, metrics_handle)
    }
}
