//! service-core: Shared infrastructure for subscription platform services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod utils;

pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;
