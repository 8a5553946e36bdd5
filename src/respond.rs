//! Raw model response post-processing.
//!
//! Reasoning-capable models wrap their chain of thought in
//! `<think>...</think>` ahead of the actual answer. The parser splits the
//! first such pair out so the two segments can be logged under separate
//! roles; everything after the first pair is treated as answer text.

/// A raw response split into the user-facing answer and the optional
/// reasoning segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub answer: String,
    pub reasoning: Option<String>,
}

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Split the first `<think>...</think>` pair out of `raw`.
///
/// Only the first complete pair counts; later pairs stay in the answer
/// verbatim. An opening tag with no close is left in place. Both segments
/// are trimmed; reasoning that trims to empty is reported as absent.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let Some(open) = raw.find(THINK_OPEN) else {
        return ParsedResponse {
            answer: raw.trim().to_string(),
            reasoning: None,
        };
    };
    let body_start = open + THINK_OPEN.len();
    let Some(close_rel) = raw[body_start..].find(THINK_CLOSE) else {
        // Unterminated tag: treat the whole response as answer text.
        return ParsedResponse {
            answer: raw.trim().to_string(),
            reasoning: None,
        };
    };
    let close = body_start + close_rel;

    let reasoning = raw[body_start..close].trim();
    let mut answer = String::new();
    answer.push_str(&raw[..open]);
    answer.push_str(&raw[close + THINK_CLOSE.len()..]);

    ParsedResponse {
        answer: answer.trim().to_string(),
        reasoning: if reasoning.is_empty() {
            None
        } else {
            Some(reasoning.to_string())
        },
    }
}
