//! Recovers a JSON object from free-text model output.
//!
//! Models wrap JSON in prose or code fences even when told not to, so the
//! extractor tries an ordered chain of strategies and takes the first hit.
//! No shape validation happens here beyond "it parsed".

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Max characters of raw output carried in an extraction failure.
pub const SNIPPET_CHARS: usize = 200;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no valid JSON found in model output: {snippet}")]
    NoStructuredData { snippet: String },

    #[error("model output is not a valid {expected}: {source}")]
    UnexpectedShape {
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One way of locating JSON in model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// The whole text is a JSON object or array.
    WholeText,
    /// The interior of a ```json fenced block.
    FencedBlock,
    /// First `{` through last `}`.
    BraceSpan,
}

impl ExtractionStrategy {
    /// Strategies in the order they are attempted.
    pub const CHAIN: [ExtractionStrategy; 3] = [
        ExtractionStrategy::WholeText,
        ExtractionStrategy::FencedBlock,
        ExtractionStrategy::BraceSpan,
    ];

    pub fn apply(self, text: &str) -> Option<Value> {
        match self {
            ExtractionStrategy::WholeText => whole_text(text),
            ExtractionStrategy::FencedBlock => fenced_block(text),
            ExtractionStrategy::BraceSpan => brace_span(text),
        }
    }
}

/// Runs the strategy chain over `text`.
pub fn extract_json(text: &str) -> Result<Value, ExtractionError> {
    for strategy in ExtractionStrategy::CHAIN {
        if let Some(value) = strategy.apply(text) {
            debug!("Extracted JSON from model output via {strategy:?}");
            return Ok(value);
        }
    }

    Err(ExtractionError::NoStructuredData {
        snippet: snippet(text),
    })
}

/// Extracts JSON and reads it as `T`. `expected` names `T` in the error.
pub fn extract_as<T: DeserializeOwned>(
    text: &str,
    expected: &'static str,
) -> Result<T, ExtractionError> {
    let value = extract_json(text)?;
    serde_json::from_value(value)
        .map_err(|source| ExtractionError::UnexpectedShape { expected, source })
}

fn whole_text(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

fn fenced_block(text: &str) -> Option<Value> {
    let mut rest = text;

    while let Some(start) = rest.find(JSON_FENCE) {
        let body = &rest[start + JSON_FENCE.len()..];
        let close = body.find(FENCE)?;
        let inner = body[..close].trim();

        if inner.starts_with('{') && inner.ends_with('}') {
            if let Some(value) = parse_object(inner) {
                return Some(value);
            }
        }

        rest = &body[close + FENCE.len()..];
    }

    None
}

fn brace_span(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&text[start..=end])
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_bare_document() {
        let value = extract_json("{\"a\": 1}").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_block_with_prose() {
        let value = extract_json("Sure! ```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_brace_span_inside_prose() {
        let value = extract_json("Here you go: {\"a\": 1} hope that helps").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_equivalent_content_extracts_identically() {
        let bare = extract_json("{\"status\": \"ok\", \"n\": [1, 2]}").unwrap();
        let fenced = extract_json("결과입니다.\n```json\n{\"status\": \"ok\", \"n\": [1, 2]}\n```\n").unwrap();
        let prose = extract_json("결과: {\"status\": \"ok\", \"n\": [1, 2]} 끝").unwrap();
        assert_eq!(bare, fenced);
        assert_eq!(bare, prose);
    }

    #[test]
    fn test_no_structure_fails() {
        let err = extract_json("no structure here").unwrap_err();
        match err {
            ExtractionError::NoStructuredData { snippet } => {
                assert_eq!(snippet, "no structure here")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_snippet_is_capped_in_characters() {
        let raw = "가".repeat(500);
        match extract_json(&raw).unwrap_err() {
            ExtractionError::NoStructuredData { snippet } => {
                assert_eq!(snippet.chars().count(), SNIPPET_CHARS)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_whole_text_rejects_scalars() {
        assert!(ExtractionStrategy::WholeText.apply("42").is_none());
        assert!(ExtractionStrategy::WholeText.apply("\"text\"").is_none());
        assert!(ExtractionStrategy::WholeText.apply("[1, 2]").is_some());
    }

    #[test]
    fn test_fenced_block_skips_unparseable_block() {
        let raw = "```json\n{broken}\n```\nthen\n```json\n{\"ok\": true}\n```";
        assert_eq!(
            ExtractionStrategy::FencedBlock.apply(raw),
            Some(json!({"ok": true}))
        );
    }

    #[test]
    fn test_fenced_block_requires_json_label() {
        assert!(ExtractionStrategy::FencedBlock
            .apply("```\n{\"a\": 1}\n```")
            .is_none());
    }

    #[test]
    fn test_unlabeled_fence_recovered_by_brace_span() {
        let value = extract_json("```\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_brace_span_is_greedy_across_nesting() {
        let raw = "prefix {\"outer\": {\"inner\": 2}} suffix";
        assert_eq!(
            ExtractionStrategy::BraceSpan.apply(raw),
            Some(json!({"outer": {"inner": 2}}))
        );
    }

    #[test]
    fn test_brace_span_fails_on_two_separate_objects() {
        assert!(ExtractionStrategy::BraceSpan
            .apply("{\"a\": 1} and {\"b\": 2}")
            .is_none());
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    #[test]
    fn test_extract_as_reads_target_type() {
        let named: Named = extract_as("```json\n{\"name\": \"세종\"}\n```", "named").unwrap();
        assert_eq!(named.name, "세종");
    }

    #[test]
    fn test_extract_as_reports_shape_mismatch() {
        let err = extract_as::<Named>("[1, 2, 3]", "named").unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::UnexpectedShape {
                expected: "named",
                ..
            }
        ));
    }
}
