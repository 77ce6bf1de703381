//! Recovery of structured JSON from free-form model output.
//!
//! Two entry points with different failure policies:
//!
//! - [`Extractor::extract`] runs the tolerant fallback chain (fence stripping,
//!   escape normalization, brace span, line filtering) and always returns an
//!   [`Extraction`].
//! - [`extract_json_block`] and friends only look inside ```json fenced
//!   blocks and fail closed when there is none.
//!
//! [`project_operation`] reshapes a recovered `{result, operacion}` object into
//! the operation view served by `/query`.

pub mod fallback;
pub mod fenced;
pub mod observer;
pub mod operation;
pub mod report;

pub use fallback::{extract, is_valid_json_response, Extractor};
pub use fenced::{extract_all_json_blocks, extract_and_parse_json_block, extract_json_block};
pub use observer::{ExtractionEvent, ExtractionObserver, NoopObserver, TracingObserver};
pub use operation::{extract_html, process_operation, project_operation, OperationOutcome, OperationResult};
pub use report::{PatternCount, ResponseReport};

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Number of characters kept at each end of a failed response.
pub const SAMPLE_CHARS: usize = 100;

/// Which tier of the fallback chain produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Direct,
    Escaped,
    Regex,
    Aggressive,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Direct => "direct",
            ExtractionMethod::Escaped => "escaped",
            ExtractionMethod::Regex => "regex",
            ExtractionMethod::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value recovered by one of the tiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recovered {
    pub data: Value,
    pub method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Bounded view of a response none of the tiers could parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub raw_length: usize,
    pub cleaned_length: usize,
    /// First [`SAMPLE_CHARS`] characters of the fence-stripped text.
    pub head: String,
    /// Last [`SAMPLE_CHARS`] characters of the fence-stripped text.
    pub tail: String,
}

impl Diagnostics {
    pub fn new(raw: &str, cleaned: &str) -> Self {
        let cleaned_length = cleaned.chars().count();
        Self {
            raw_length: raw.chars().count(),
            cleaned_length,
            head: cleaned.chars().take(SAMPLE_CHARS).collect(),
            tail: cleaned
                .chars()
                .skip(cleaned_length.saturating_sub(SAMPLE_CHARS))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionFailure {
    pub error: String,
    pub diagnostics: Diagnostics,
}

/// Outcome of the fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Recovered(Recovered),
    Failed(ExtractionFailure),
}

impl Extraction {
    pub fn is_recovered(&self) -> bool {
        matches!(self, Extraction::Recovered(_))
    }

    pub fn method(&self) -> Option<ExtractionMethod> {
        match self {
            Extraction::Recovered(recovered) => Some(recovered.method),
            Extraction::Failed(_) => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Extraction::Recovered(recovered) => Some(&recovered.data),
            Extraction::Failed(_) => None,
        }
    }

    /// Metrics label: the tier name, or `failed`.
    pub fn label(&self) -> &'static str {
        self.method().map(|m| m.as_str()).unwrap_or("failed")
    }
}

/// Serializes `T` with a leading `success` flag, the shape clients of the
/// gateway have always received.
#[derive(Serialize)]
pub(crate) struct Flagged<'a, T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub body: &'a T,
}

impl Serialize for Extraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Extraction::Recovered(body) => Flagged {
                success: true,
                body,
            }
            .serialize(serializer),
            Extraction::Failed(body) => Flagged {
                success: false,
                body,
            }
            .serialize(serializer),
        }
    }
}
