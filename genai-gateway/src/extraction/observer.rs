//! Diagnostic hooks for the extractors.
//!
//! Extraction itself is pure; anything it wants to say about its progress goes
//! through an [`ExtractionObserver`] chosen by the caller.

use super::ExtractionMethod;
use std::error::Error;

/// Progress events emitted while recovering JSON from model output.
#[derive(Debug)]
pub enum ExtractionEvent<'a> {
    /// Fallback chain started; `cleaned_len` is the fence-stripped length.
    Started {
        raw_len: usize,
        cleaned_len: usize,
        preview: &'a str,
    },
    /// A tier could not produce a value.
    TierMissed {
        method: ExtractionMethod,
        reason: &'a dyn Error,
    },
    Recovered {
        method: ExtractionMethod,
    },
    /// Every tier failed.
    Exhausted {
        raw_len: usize,
    },
    /// Strict mode found no ```json block.
    BlockMissing,
    /// Strict mode found a block that is not valid JSON.
    BlockUnparseable {
        error: &'a serde_json::Error,
    },
}

pub trait ExtractionObserver: Send + Sync {
    fn observe(&self, event: &ExtractionEvent<'_>);
}

/// Forwards events to `tracing`; misses at debug, hard failures at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExtractionObserver for TracingObserver {
    fn observe(&self, event: &ExtractionEvent<'_>) {
        match event {
            ExtractionEvent::Started {
                raw_len,
                cleaned_len,
                preview,
            } => tracing::debug!(raw_len, cleaned_len, preview, "Extracting JSON from model output"),
            ExtractionEvent::TierMissed { method, reason } => {
                tracing::debug!(method = %method, reason = %reason, "Extraction tier missed")
            }
            ExtractionEvent::Recovered { method } => {
                tracing::debug!(method = %method, "Extraction tier recovered JSON")
            }
            ExtractionEvent::Exhausted { raw_len } => {
                tracing::warn!(raw_len, "No extraction tier could parse the model output")
            }
            ExtractionEvent::BlockMissing => tracing::debug!("No ```json block in model output"),
            ExtractionEvent::BlockUnparseable { error } => {
                tracing::warn!(error = %error, "```json block is not valid JSON")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExtractionObserver for NoopObserver {
    fn observe(&self, _event: &ExtractionEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_debug_formatted_with_their_reason() {
        let error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let event = ExtractionEvent::TierMissed {
            method: ExtractionMethod::Direct,
            reason: &error,
        };

        let rendered = format!("{event:?}");
        assert!(rendered.starts_with("TierMissed"));
        assert!(rendered.contains("EOF"));
    }
}
