use gateway_core::config as core_config;
use gateway_core::error::AppError;
use secrecy::{ExposeSecret, Secret};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::providers::gemini::{GeminiConfig, GEMINI_API_BASE};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// 10 MiB, enough for base64 images sent to `/vision`.
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub models: ModelConfig,
    pub google: GoogleConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Used when a request does not name a model.
    pub default_model: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Option<Secret<String>>,
    pub api_base: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_body_bytes: usize,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(GatewayConfig {
            common,
            models: ModelConfig {
                default_model: get_env("GENAI_DEFAULT_MODEL", DEFAULT_MODEL),
            },
            google: GoogleConfig {
                api_key: api_key_from_env(),
                api_base: get_env("GENAI_API_BASE", GEMINI_API_BASE),
                request_timeout_secs: parse_env(
                    "GENAI_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?,
            },
            http: HttpConfig {
                max_body_bytes: parse_env("GENAI_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            },
        })
    }

    /// Whether a non-empty API key is present.
    pub fn is_configured(&self) -> bool {
        self.google
            .api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty())
    }

    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.google.api_key.clone(),
            api_base: self.google.api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.google.request_timeout_secs),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            models: ModelConfig {
                default_model: DEFAULT_MODEL.to_string(),
            },
            google: GoogleConfig {
                api_key: None,
                api_base: GEMINI_API_BASE.to_string(),
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            http: HttpConfig {
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
        }
    }
}

/// `GOOGLE_API_KEY` wins over `GEMINI_API_KEY`; blank values count as unset.
fn api_key_from_env() -> Option<Secret<String>> {
    ["GOOGLE_API_KEY", "GEMINI_API_KEY"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .map(Secret::new)
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} is not valid ({}): {}", key, value, e))
        }),
        _ => Ok(default),
    }
}
