//! Language Model bridge — the external `LanguageModel` collaborator.
//!
//! The prompt template and wire format are an external contract, not this
//! crate's concern: this module owns just enough prompt construction and
//! response parsing to turn a `ContextBundle` into `Vec<Finding>`, wrapping
//! `ai_llm_service::LlmServiceProfiles::generate_fast` the same way
//! `review::llm` used to wrap a raw Ollama client, minus the duplicate HTTP
//! plumbing `ai-llm-service` already owns.
//!
//! Enum-dispatch, not `Box<dyn Trait>`: today there is exactly one
//! `LanguageModel` realization, so `LanguageModel` is a thin newtype rather
//! than a trait with one impl.

use std::sync::Arc;

use ai_llm_service::service_profiles::LlmServiceProfiles;
use serde::Deserialize;

use crate::errors::{Error, MrResult};
use crate::model::{ContextBundle, Finding};

const SYSTEM_PROMPT: &str = "You are an automated code reviewer. Given the JSON context for a merge \
request, respond with a JSON array of findings. Each finding is an object with \
fields: file_path, start_line, end_line (nullable), issue_kind, impact, \
priority, confidence (0.0-1.0), title, description, suggestion (nullable), \
code_snippet (nullable). Only report issues grounded in the given context. \
Respond with the JSON array and nothing else.";

/// Thin wrapper around the shared LLM client the rest of the backend already
/// constructs and passes around as an `Arc`.
pub struct LanguageModel {
    profiles: Arc<LlmServiceProfiles>,
}

impl LanguageModel {
    pub fn new(profiles: Arc<LlmServiceProfiles>) -> Self {
        Self { profiles }
    }

    /// Analyses one `ContextBundle` and returns whatever findings the model
    /// reported, in the order it gave them. Per spec §7, `model-error`
    /// (unavailable LLM *or* a malformed response) is a hard failure for the
    /// whole pipeline — a caller seeing `Err` here must post no comments at
    /// all, not a partial/empty set.
    pub async fn analyse(&self, bundle: &ContextBundle) -> MrResult<Vec<Finding>> {
        let prompt = build_prompt(bundle)?;
        let raw = self
            .profiles
            .generate_fast(&prompt, Some(SYSTEM_PROMPT))
            .await
            .map_err(|e| Error::Other(format!("language model call failed: {e}")))?;

        parse_findings(&raw).map_err(|reason| {
            Error::Other(format!("language model returned an unparsable response: {reason}"))
        })
    }

    /// Generates the markdown body for one description section from the
    /// merge request's full diff text. Unlike `analyse`, a failure here is
    /// surfaced to the caller: the orchestrator treats description generation
    /// as an optional, feature-flagged enrichment and simply skips the update
    /// rather than retrying or failing the review.
    pub async fn generate_description(&self, full_diff_text: &str) -> MrResult<String> {
        let prompt = format!(
            "Summarise the following merge request diff as a concise markdown section \
             (a few sentences plus bullet points where useful). Respond with markdown only, \
             no surrounding commentary:\n\n{full_diff_text}"
        );
        self.profiles
            .generate_fast(&prompt, Some(DESCRIPTION_SYSTEM_PROMPT))
            .await
            .map_err(|e| Error::Other(format!("language model call failed: {e}")))
    }
}

const DESCRIPTION_SYSTEM_PROMPT: &str =
    "You write short, factual merge-request description sections from a diff. \
     Never invent behaviour the diff doesn't show.";

fn build_prompt(bundle: &ContextBundle) -> MrResult<String> {
    serde_json::to_string(bundle)
        .map(|json| format!("Review this merge request context:\n{json}"))
        .map_err(|e| Error::Other(format!("failed to serialise context bundle: {e}")))
}

/// Parses the model's response as a JSON findings array. Tolerates a response
/// wrapped in a markdown code fence (a common model habit) by stripping the
/// fence before parsing.
fn parse_findings(raw: &str) -> Result<Vec<Finding>, String> {
    let trimmed = strip_code_fence(raw.trim());
    let wire: Vec<WireFinding> =
        serde_json::from_str(trimmed).map_err(|e| format!("invalid findings JSON: {e}"))?;
    Ok(wire.into_iter().map(WireFinding::into_finding).collect())
}

fn strip_code_fence(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Deserialisation target for one model-reported finding. Kept distinct from
/// `model::Finding` so a model emitting a slightly different shape (extra
/// fields, different casing via `serde(default)`) doesn't bleed into the
/// pipeline's own type.
#[derive(Debug, Deserialize)]
struct WireFinding {
    file_path: String,
    start_line: usize,
    #[serde(default)]
    end_line: Option<usize>,
    #[serde(default = "default_issue_kind")]
    issue_kind: String,
    #[serde(default = "default_impact")]
    impact: String,
    #[serde(default = "default_priority")]
    priority: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    code_snippet: Option<String>,
}

fn default_issue_kind() -> String {
    "other".to_string()
}
fn default_impact() -> String {
    "unknown".to_string()
}
fn default_priority() -> String {
    "minor".to_string()
}
fn default_confidence() -> f32 {
    0.5
}

impl WireFinding {
    fn into_finding(self) -> Finding {
        Finding {
            file_path: self.file_path,
            start_line: self.start_line,
            end_line: self.end_line,
            issue_kind: self.issue_kind,
            impact: self.impact,
            priority: self.priority,
            confidence: self.confidence,
            title: self.title,
            description: self.description,
            suggestion: self.suggestion,
            code_snippet: self.code_snippet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_array() {
        let raw = r#"[{"file_path":"a.rs","start_line":3,"title":"t","description":"d"}]"#;
        let findings = parse_findings(raw).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file_path, "a.rs");
        assert_eq!(findings[0].priority, "minor");
    }

    #[test]
    fn parses_response_wrapped_in_code_fence() {
        let raw = "```json\n[{\"file_path\":\"a.rs\",\"start_line\":1,\"title\":\"t\",\"description\":\"d\"}]\n```";
        let findings = parse_findings(raw).unwrap();
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn malformed_json_is_reported_as_an_error_not_a_panic() {
        assert!(parse_findings("not json").is_err());
    }
}
