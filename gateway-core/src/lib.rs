//! gateway-core: shared infrastructure for the genai gateway.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod utils;

pub use axum;
pub use tracing;
pub use validator;
