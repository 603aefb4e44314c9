//! AuthorScope Core
//!
//! Core types and error handling shared across AuthorScope components.
//!
//! This crate provides:
//! - The error taxonomy (invalid input, load failures, inference failures)
//! - Validated request text (`TextSample`)
//! - Prediction results and ordered per-class probabilities

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ClassProbabilities, PredictionResult, TextSample};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ClassProbabilities, PredictionResult, TextSample};
}
