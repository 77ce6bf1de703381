//! genai-gateway: HTTP gateway over the Gemini API that recovers structured
//! JSON from free-form model output.

pub mod config;
pub mod dtos;
pub mod extraction;
pub mod handlers;
pub mod services;
pub mod startup;

pub use startup::{build_router, AppState, Application};
