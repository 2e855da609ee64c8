//! Synthesizer - merges subtask results into one final response.
//!
//! The model is only consulted when there is genuinely something to merge:
//! zero successful results return a fixed message, and a single successful
//! result is returned directly (minus any leading section heading). Both
//! short-circuits skip the model call entirely.

use crate::llm::{ChatMessage, LlmClient, Role};
use crate::task::WorkerResult;

/// Returned when no subtask produced a usable result.
pub const NO_RESULTS_MESSAGE: &str =
    "No subtask produced a result to synthesize. Please review the errors and try again.";

/// Returned when the synthesis model call fails or comes back empty.
pub const SYNTHESIS_FAILED_MESSAGE: &str =
    "I completed the subtasks but could not combine their results into a final answer.";

const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You combine the results of several completed coding subtasks into one unified answer.
Address the user's original request directly, merge overlapping findings, and keep
code snippets intact. Do not mention the subtask structure.";

/// Outcome of the synthesis step.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub final_result: String,
    /// Set when synthesis itself failed; `final_result` then carries a
    /// best-effort placeholder, never nothing.
    pub error: Option<String>,
}

impl SynthesisOutcome {
    fn ok(final_result: impl Into<String>) -> Self {
        Self {
            final_result: final_result.into(),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            final_result: SYNTHESIS_FAILED_MESSAGE.to_string(),
            error: Some(error.into()),
        }
    }
}

/// Merges labeled subtask results into the final response.
pub struct Synthesizer {
    model: String,
}

impl Synthesizer {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    /// Combine `results` (label, result) into one final answer for `query`.
    ///
    /// Only successful results participate. The model is called exactly once,
    /// and only when two or more results survive the filter.
    pub async fn combine(
        &self,
        query: &str,
        results: &[(String, WorkerResult)],
        llm: &dyn LlmClient,
    ) -> SynthesisOutcome {
        let successful: Vec<&(String, WorkerResult)> =
            results.iter().filter(|(_, r)| r.success).collect();

        match successful.len() {
            0 => {
                tracing::info!("Nothing to synthesize: no successful results");
                SynthesisOutcome::ok(NO_RESULTS_MESSAGE)
            }
            1 => {
                tracing::debug!("Single result short-circuit, skipping synthesis call");
                SynthesisOutcome::ok(strip_leading_heading(&successful[0].1.result))
            }
            n => {
                tracing::info!("Synthesizing {} results", n);
                self.synthesize_many(query, &successful, llm).await
            }
        }
    }

    async fn synthesize_many(
        &self,
        query: &str,
        successful: &[&(String, WorkerResult)],
        llm: &dyn LlmClient,
    ) -> SynthesisOutcome {
        let sections = successful
            .iter()
            .map(|(label, result)| format!("## {}\n\n{}\n", label, result.result))
            .collect::<Vec<_>>()
            .join("\n---\n\n");

        let prompt = format!(
            "Original request: {}\n\nResults from the completed subtasks:\n\n{}\n\n\
             Produce one unified answer to the original request.",
            query, sections
        );

        let messages = vec![
            ChatMessage::new(Role::System, SYNTHESIS_SYSTEM_PROMPT),
            ChatMessage::new(Role::User, prompt),
        ];

        match llm.chat_completion(&self.model, &messages, None).await {
            Ok(response) => match response.content {
                Some(content) if !content.trim().is_empty() => SynthesisOutcome::ok(content),
                _ => {
                    tracing::error!("Synthesis model call returned empty output");
                    SynthesisOutcome::failed("Synthesis produced empty output")
                }
            },
            Err(e) => {
                tracing::error!("Synthesis model call failed: {}", e);
                SynthesisOutcome::failed(format!("Synthesis call failed: {}", e))
            }
        }
    }
}

/// Strip a leading `## …` section heading (and the blank line after it) from
/// a single passed-through result.
fn strip_leading_heading(text: &str) -> String {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix("## ") {
        if let Some(newline) = rest.find('\n') {
            return rest[newline..].trim_start().to_string();
        }
        // Heading with no body
        return String::new();
    }
    text.to_string()
}
