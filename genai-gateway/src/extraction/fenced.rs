//! Strict extraction: content of ```json fenced blocks, nothing else.
//!
//! No repair is attempted. Text without a ```json block yields nothing even
//! when it contains perfectly good JSON elsewhere.

use super::fallback::Extractor;
use super::observer::ExtractionEvent;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("json block pattern is valid"));

/// Inner text of the first ```json block, trimmed. `None` for no block or an
/// empty one.
pub fn extract_json_block(text: &str) -> Option<String> {
    JSON_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|inner| !inner.is_empty())
        .map(|inner| inner.trim().to_string())
}

/// Inner text of every ```json block in source order; empty blocks are skipped.
pub fn extract_all_json_blocks(text: &str) -> Vec<String> {
    JSON_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|inner| !inner.is_empty())
        .map(|inner| inner.trim().to_string())
        .collect()
}

/// Parsed first ```json block, using the default tracing observer.
pub fn extract_and_parse_json_block(text: &str) -> Option<Value> {
    Extractor::default().extract_and_parse_json_block(text)
}

impl Extractor {
    /// Parses the first ```json block. Missing or malformed blocks yield `None`.
    pub fn extract_and_parse_json_block(&self, text: &str) -> Option<Value> {
        let Some(block) = extract_json_block(text) else {
            self.observe(ExtractionEvent::BlockMissing);
            return None;
        };

        match serde_json::from_str(&block) {
            Ok(value) => Some(value),
            Err(error) => {
                self.observe(ExtractionEvent::BlockUnparseable { error: &error });
                None
            }
        }
    }
}
