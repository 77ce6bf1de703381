//! Tolerant JSON recovery: an ordered chain of parsing strategies.
//!
//! Tiers run in order and the first one that parses wins:
//!
//! 1. `direct`: strip code fences, trim, parse.
//! 2. `escaped`: turn literal `\n`, `\t`, `\"`, `\\`, `\r` into the real
//!    characters, parse.
//! 3. `regex`: parse the span from the first `{` to the last `}` of the
//!    untouched input.
//! 4. `aggressive`: keep only JSON-looking lines, parse.

use super::observer::{ExtractionEvent, ExtractionObserver, NoopObserver, TracingObserver};
use super::{Diagnostics, Extraction, ExtractionFailure, ExtractionMethod, Recovered};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\n?").expect("json fence pattern is valid"));
static ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\n?").expect("fence pattern is valid"));

const PREVIEW_CHARS: usize = 200;

/// Why a tier produced nothing.
#[derive(Debug, Error)]
enum TierMiss {
    #[error("no brace-delimited span")]
    NoCandidate,
    #[error("{0}")]
    Parse(#[from] serde_json::Error),
}

/// Input as seen by the tiers: the raw text and its fence-stripped form.
struct Candidate<'a> {
    raw: &'a str,
    cleaned: String,
}

impl<'a> Candidate<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            cleaned: strip_fences(raw),
        }
    }
}

type Strategy = fn(&Candidate<'_>) -> Result<Value, TierMiss>;

struct Tier {
    method: ExtractionMethod,
    strategy: Strategy,
    warning: Option<&'static str>,
}

const TIERS: [Tier; 4] = [
    Tier {
        method: ExtractionMethod::Direct,
        strategy: parse_direct,
        warning: None,
    },
    Tier {
        method: ExtractionMethod::Escaped,
        strategy: parse_unescaped,
        warning: None,
    },
    Tier {
        method: ExtractionMethod::Regex,
        strategy: parse_brace_span,
        warning: Some("JSON extracted using brace matching"),
    },
    Tier {
        method: ExtractionMethod::Aggressive,
        strategy: parse_filtered_lines,
        warning: Some("JSON recovered with aggressive line filtering"),
    },
];

fn parse(text: &str) -> Result<Value, TierMiss> {
    Ok(serde_json::from_str(text)?)
}

fn parse_direct(candidate: &Candidate<'_>) -> Result<Value, TierMiss> {
    parse(&candidate.cleaned)
}

fn parse_unescaped(candidate: &Candidate<'_>) -> Result<Value, TierMiss> {
    parse(&unescape_literals(&candidate.cleaned))
}

fn parse_brace_span(candidate: &Candidate<'_>) -> Result<Value, TierMiss> {
    brace_span(candidate.raw)
        .ok_or(TierMiss::NoCandidate)
        .and_then(parse)
}

fn parse_filtered_lines(candidate: &Candidate<'_>) -> Result<Value, TierMiss> {
    parse(&filter_json_lines(&candidate.cleaned))
}

/// Removes code fence markers and trims.
///
/// When a ```json marker is present every ```json marker goes first, then
/// every bare fence; each marker takes one trailing newline with it.
pub(crate) fn strip_fences(raw: &str) -> String {
    let stripped = if raw.contains("```json") {
        let untagged = JSON_FENCE.replace_all(raw, "");
        ANY_FENCE.replace_all(&untagged, "").into_owned()
    } else if raw.contains("```") {
        ANY_FENCE.replace_all(raw, "").into_owned()
    } else {
        raw.to_string()
    };

    trim_text(&stripped).to_string()
}

/// Trims whitespace and byte order marks from both ends.
pub(crate) fn trim_text(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Replaces literal two-character escapes with the characters they denote.
///
/// Applied in sequence, so `\\n` ends up as a backslash followed by a newline.
pub(crate) fn unescape_literals(text: &str) -> String {
    text.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
        .replace("\\r", "\r")
}

/// Span from the first `{` to the last `}`, inclusive.
pub(crate) fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Keeps lines that start with `{`, `}` or `"`, or contain a `:`.
///
/// Prose with a colon slips through and continuation lines of multi-line
/// strings are dropped; callers rely on exactly this behaviour.
pub(crate) fn filter_json_lines(text: &str) -> String {
    text.split('\n')
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.starts_with('{')
                || trimmed.starts_with('}')
                || trimmed.contains(':')
                || trimmed.starts_with('"')
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Runs the fallback chain, reporting progress to an observer.
#[derive(Clone)]
pub struct Extractor {
    observer: Arc<dyn ExtractionObserver>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(Arc::new(TracingObserver))
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor").finish_non_exhaustive()
    }
}

impl Extractor {
    pub fn new(observer: Arc<dyn ExtractionObserver>) -> Self {
        Self { observer }
    }

    /// Extractor that emits nothing.
    pub fn silent() -> Self {
        Self::new(Arc::new(NoopObserver))
    }

    pub(crate) fn observe(&self, event: ExtractionEvent<'_>) {
        self.observer.observe(&event);
    }

    /// Recovers a JSON value from `raw`. Never fails; unrecoverable input
    /// yields [`Extraction::Failed`] with bounded samples.
    pub fn extract(&self, raw: &str) -> Extraction {
        let candidate = Candidate::new(raw);

        self.observe(ExtractionEvent::Started {
            raw_len: raw.len(),
            cleaned_len: candidate.cleaned.len(),
            preview: preview(&candidate.cleaned),
        });

        for tier in TIERS.iter() {
            match (tier.strategy)(&candidate) {
                Ok(data) => {
                    self.observe(ExtractionEvent::Recovered {
                        method: tier.method,
                    });
                    return Extraction::Recovered(Recovered {
                        data,
                        method: tier.method,
                        warning: tier.warning.map(str::to_string),
                    });
                }
                Err(miss) => self.observe(ExtractionEvent::TierMissed {
                    method: tier.method,
                    reason: &miss,
                }),
            }
        }

        self.observe(ExtractionEvent::Exhausted { raw_len: raw.len() });

        Extraction::Failed(ExtractionFailure {
            error: "no tier could parse the response as JSON".to_string(),
            diagnostics: Diagnostics::new(raw, &candidate.cleaned),
        })
    }
}

/// [`Extractor::extract`] with the default tracing observer.
pub fn extract(raw: &str) -> Extraction {
    Extractor::default().extract(raw)
}

/// Whether the fallback chain recovers anything from `raw`.
pub fn is_valid_json_response(raw: &str) -> bool {
    Extractor::silent().extract(raw).is_recovered()
}
