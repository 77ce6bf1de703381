use serde::Serialize;

const REPORT_SAMPLE_CHARS: usize = 500;

/// Literal sequences that usually explain why a response did not parse.
const SUSPICIOUS_PATTERNS: [&str; 4] = ["\\n", "\\\"", "\\\\", "```"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternCount {
    pub pattern: &'static str,
    pub occurrences: usize,
}

/// Debugging snapshot of a problematic model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReport {
    pub length: usize,
    pub head: String,
    pub tail: String,
    /// Only patterns that occur at least once.
    pub patterns: Vec<PatternCount>,
}

impl ResponseReport {
    pub fn inspect(raw: &str) -> Self {
        let length = raw.chars().count();
        let patterns = SUSPICIOUS_PATTERNS
            .iter()
            .map(|&pattern| PatternCount {
                pattern,
                occurrences: raw.matches(pattern).count(),
            })
            .filter(|count| count.occurrences > 0)
            .collect();

        Self {
            length,
            head: raw.chars().take(REPORT_SAMPLE_CHARS).collect(),
            tail: raw
                .chars()
                .skip(length.saturating_sub(REPORT_SAMPLE_CHARS))
                .collect(),
            patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_literal_escapes_and_fences() {
        let report = ResponseReport::inspect(r#"```json {\"a\": \"x\ny\"} ``` \\"#);

        let count = |p: &str| {
            report
                .patterns
                .iter()
                .find(|c| c.pattern == p)
                .map(|c| c.occurrences)
        };
        assert_eq!(count("```"), Some(2));
        assert_eq!(count("\\\""), Some(4));
        assert_eq!(count("\\n"), Some(1));
        assert_eq!(count("\\\\"), Some(1));
    }

    #[test]
    fn omits_absent_patterns_and_keeps_short_text_whole() {
        let report = ResponseReport::inspect("hello");
        assert!(report.patterns.is_empty());
        assert_eq!(report.head, "hello");
        assert_eq!(report.tail, "hello");
        assert_eq!(report.length, 5);
    }
}
