//! AuthorScope Classifiers
//!
//! Two authorship classifiers share one trait:
//! - Text: TF-IDF lexical features plus 15 hand-engineered linguistic
//!   features, standardised and scored by a linear model
//! - Code: a BERT-family encoder with a projection head, loaded through a
//!   versioned key mapping so training-time checkpoints line up with the
//!   serving module tree
//!
//! The linguistic extractor is the single definition of those features; the
//! `authorscope features` command exposes it to training tooling.

pub mod assembler;
pub mod classifier;
#[cfg(feature = "ml-models")]
pub mod code_model;
pub mod estimator;
pub mod key_remap;
pub mod linguistic;
pub mod model_config;
pub mod scaler;
pub mod scoring;
pub mod text_model;
pub mod vectorizer;

pub use assembler::{ClassifierInput, FeatureAssembler};
pub use classifier::{AuthorshipClassifier, ParameterInfo};
#[cfg(feature = "ml-models")]
pub use code_model::{CodeAuthorshipClassifier, CodeAuthorshipModel};
pub use estimator::Estimator;
pub use key_remap::{KeyMappingTable, KeyRemapper, LoadReport, LoadStrategy, ParameterTarget};
pub use linguistic::{LinguisticFeatureExtractor, LinguisticFeatures, FEATURE_COUNT, FEATURE_NAMES};
pub use model_config::{
    CodeModelConfig, DeviceSpec, InferenceConfig, ModelSource, ModelsConfig, TextModelConfig,
};
pub use scaler::StandardScaler;
pub use scoring::{CodePredictionResponse, TextPredictionResponse, CODE_LABELS, TEXT_LABELS};
pub use text_model::{TextAuthorshipClassifier, TextModelBundle};
pub use vectorizer::{Norm, TfidfParams, TfidfVectorizer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{AuthorshipClassifier, ParameterInfo};
    #[cfg(feature = "ml-models")]
    pub use crate::code_model::CodeAuthorshipClassifier;
    pub use crate::linguistic::{LinguisticFeatureExtractor, LinguisticFeatures};
    pub use crate::model_config::ModelsConfig;
    pub use crate::text_model::TextAuthorshipClassifier;
}
