//! Stowage API Library
//!
//! HTTP routes, handlers, error mapping and application setup for the upload
//! service. `main.rs` only loads configuration and serves what `setup` builds.

mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;
pub mod telemetry;

pub mod error;
pub mod state;

// Re-exports
pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
