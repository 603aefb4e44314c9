//! AuthorScope HTTP service
//!
//! Exposes the code and text authorship classifiers over HTTP. Models are
//! loaded once into a [`ServiceContext`] before the listener binds and are
//! shared read-only by every handler.

pub mod config;
pub mod error;
pub mod input;
pub mod routes;
pub mod state;

pub use config::{ConfigOverrides, ServerConfig, ServerSettings};
pub use error::AppError;
pub use routes::create_router;
pub use state::ServiceContext;
