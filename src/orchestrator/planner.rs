//! Planner: turns the user request into a routing decision.
//!
//! Two strategies, either valid:
//! - **Classification**: one model call maps the query onto a fixed token
//!   vocabulary; unrecognized or unparseable output falls back to
//!   `Irrelevant` (fail-safe, not fail-loud).
//! - **Decomposition**: one model call emits a JSON plan with typed,
//!   dependency-linked subtasks; parsing is tolerant (see `parse`), and a
//!   plan that still cannot be parsed is a terminal planning error for the
//!   run.

use serde::Deserialize;
use thiserror::Error;

use crate::llm::{ChatMessage, ChatOptions, LlmClient, Role};
use crate::task::{SubTask, Task};

use super::parse::{extract_json, Extracted};

/// The fixed classification vocabulary. Token strings are part of the
/// LLM-facing contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    AnalysisTask,
    GenerationTask,
    AnalysisWithGeneration,
    Irrelevant,
}

impl Classification {
    pub fn token(&self) -> &'static str {
        match self {
            Self::AnalysisTask => "executeAnalysisTask",
            Self::GenerationTask => "executeGenerationTask",
            Self::AnalysisWithGeneration => "executeAnalysisWithGeneration",
            Self::Irrelevant => "handleIrrelevantQuery",
        }
    }

    /// Parse a model-produced token. Anything outside the fixed vocabulary
    /// maps to `Irrelevant`.
    pub fn from_token(raw: &str) -> Self {
        let token = raw.trim().trim_matches(&['"', '\'', '`', '.'][..]).trim();
        match token {
            "executeAnalysisTask" => Self::AnalysisTask,
            "executeGenerationTask" => Self::GenerationTask,
            "executeAnalysisWithGeneration" => Self::AnalysisWithGeneration,
            "handleIrrelevantQuery" => Self::Irrelevant,
            _ => {
                tracing::debug!("Unrecognized classification token: {:?}", token);
                Self::Irrelevant
            }
        }
    }
}

/// Which planning strategy the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlannerStrategy {
    #[default]
    Classification,
    Decomposition,
}

/// What the planner decided.
#[derive(Debug)]
pub enum PlanOutcome {
    Classified(Classification),
    Decomposed {
        plan: Option<String>,
        subtasks: Vec<SubTask>,
    },
}

/// Terminal planning failures.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("could not parse a plan from the model output: {0}")]
    Malformed(String),
    #[error("planning call failed: {0}")]
    ModelCall(String),
    #[error("the planner returned an empty subtask list")]
    EmptyPlan,
}

/// Query words that indicate the user wants code changed, not just explained.
/// Used only when the classification model call itself fails.
const GENERATION_KEYWORDS: &[&str] = &[
    "fix", "add", "implement", "write", "create", "refactor", "generate",
];

const CLASSIFY_SYSTEM_PROMPT: &str = "\
You classify coding requests. Respond with exactly one of these tokens and nothing else:
- executeAnalysisTask: the user wants code explained, reviewed, or investigated
- executeGenerationTask: the user wants new code written with no prior analysis needed
- executeAnalysisWithGeneration: the user wants existing code understood and then changed
- handleIrrelevantQuery: the request is not about code at all";

const DECOMPOSE_SYSTEM_PROMPT: &str =
    "You are a precise task planner for coding work. Respond only with JSON.";

/// The planner. Holds the model it plans with; the client is passed per call
/// so the scheduler owns the collaborator.
pub struct Planner {
    model: String,
}

impl Planner {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    /// Produce a routing decision for `task` using the given strategy.
    pub async fn plan(
        &self,
        task: &Task,
        llm: &dyn LlmClient,
        strategy: PlannerStrategy,
    ) -> Result<PlanOutcome, PlanError> {
        match strategy {
            PlannerStrategy::Classification => {
                Ok(PlanOutcome::Classified(self.classify(task, llm).await))
            }
            PlannerStrategy::Decomposition => {
                let (plan, subtasks) = self.decompose(task, llm).await?;
                Ok(PlanOutcome::Decomposed { plan, subtasks })
            }
        }
    }

    /// Classify the query onto the fixed token vocabulary.
    ///
    /// A transport-level failure degrades to the keyword heuristic instead
    /// of killing the run; unparseable output maps to `Irrelevant`.
    async fn classify(&self, task: &Task, llm: &dyn LlmClient) -> Classification {
        let messages = vec![
            ChatMessage::new(Role::System, CLASSIFY_SYSTEM_PROMPT),
            ChatMessage::new(Role::User, task.query.clone()),
        ];

        let response = llm
            .chat_completion_with_options(&self.model, &messages, None, ChatOptions::deterministic())
            .await;

        match response {
            Ok(response) => {
                let classification =
                    Classification::from_token(response.content.as_deref().unwrap_or(""));
                tracing::info!("Classified query as {}", classification.token());
                classification
            }
            Err(e) => {
                let fallback = Self::keyword_fallback(&task.query);
                tracing::warn!(
                    "Classification call failed ({}), keyword fallback chose {}",
                    e,
                    fallback.token()
                );
                fallback
            }
        }
    }

    /// Keyword heuristic for when the classification call fails: queries
    /// that name a change get the analysis-then-generation path, everything
    /// else gets plain analysis.
    fn keyword_fallback(query: &str) -> Classification {
        let lowered = query.to_lowercase();
        if GENERATION_KEYWORDS
            .iter()
            .any(|kw| lowered.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *kw))
        {
            Classification::AnalysisWithGeneration
        } else {
            Classification::AnalysisTask
        }
    }

    /// Ask the model for a full dependency-linked subtask plan.
    async fn decompose(
        &self,
        task: &Task,
        llm: &dyn LlmClient,
    ) -> Result<(Option<String>, Vec<SubTask>), PlanError> {
        let prompt = format!(
            r#"Break this coding request into ordered subtasks.

Request: {}

Respond with a JSON object:
{{
    "plan": "One-paragraph summary of the approach",
    "subTasks": [
        {{
            "id": "a1",
            "type": "analysis",
            "description": "What this subtask accomplishes",
            "task": "The instruction to execute",
            "dependsOn": []
        }}
    ]
}}

Guidelines:
- "type" must be one of: analysis, generation, test
- "dependsOn" lists ids of subtasks whose results this one needs
- Keep subtasks focused and independently executable

Respond ONLY with the JSON object."#,
            task.query
        );

        let messages = vec![
            ChatMessage::new(Role::System, DECOMPOSE_SYSTEM_PROMPT),
            ChatMessage::new(Role::User, prompt),
        ];

        let response = llm
            .chat_completion(&self.model, &messages, None)
            .await
            .map_err(|e| PlanError::ModelCall(e.to_string()))?;

        let content = response.content.unwrap_or_default();
        let value = match extract_json(&content) {
            Extracted::Parsed(value) => value,
            Extracted::Malformed(reason) => return Err(PlanError::Malformed(reason)),
        };

        let parsed: PlannerOutput =
            serde_json::from_value(value).map_err(|e| PlanError::Malformed(e.to_string()))?;

        if parsed.sub_tasks.is_empty() {
            return Err(PlanError::EmptyPlan);
        }

        tracing::info!("Planner produced {} subtasks", parsed.sub_tasks.len());
        Ok((parsed.plan, parsed.sub_tasks))
    }
}

/// The planner JSON contract.
#[derive(Debug, Deserialize)]
struct PlannerOutput {
    #[serde(default)]
    plan: Option<String>,
    #[serde(rename = "subTasks", default)]
    sub_tasks: Vec<SubTask>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::{text_response, MockLlm};
    use crate::task::SubtaskKind;

    #[test]
    fn token_parsing_covers_the_vocabulary() {
        assert_eq!(
            Classification::from_token("executeAnalysisTask"),
            Classification::AnalysisTask
        );
        assert_eq!(
            Classification::from_token("\"executeGenerationTask\""),
            Classification::GenerationTask
        );
        assert_eq!(
            Classification::from_token("  executeAnalysisWithGeneration  "),
            Classification::AnalysisWithGeneration
        );
        assert_eq!(
            Classification::from_token("handleIrrelevantQuery"),
            Classification::Irrelevant
        );
    }

    #[test]
    fn unrecognized_token_falls_back_to_irrelevant() {
        assert_eq!(
            Classification::from_token("executeEverything"),
            Classification::Irrelevant
        );
        assert_eq!(Classification::from_token(""), Classification::Irrelevant);
        assert_eq!(
            Classification::from_token("I think this is analysis"),
            Classification::Irrelevant
        );
    }

    #[tokio::test]
    async fn classification_uses_model_token() {
        let llm = MockLlm::with_texts(vec!["executeGenerationTask"]);
        let planner = Planner::new("test-model");
        let task = Task::new("write a fizzbuzz");

        let outcome = planner
            .plan(&task, &llm, PlannerStrategy::Classification)
            .await
            .unwrap();
        match outcome {
            PlanOutcome::Classified(c) => assert_eq!(c, Classification::GenerationTask),
            _ => panic!("expected classification"),
        }
    }

    #[tokio::test]
    async fn failed_classification_call_uses_keyword_fallback() {
        let llm = MockLlm::with_responses(vec![Err("connection refused".to_string())]);
        let planner = Planner::new("test-model");

        let task = Task::new("please fix the login bug");
        let outcome = planner
            .plan(&task, &llm, PlannerStrategy::Classification)
            .await
            .unwrap();
        match outcome {
            PlanOutcome::Classified(c) => {
                assert_eq!(c, Classification::AnalysisWithGeneration)
            }
            _ => panic!("expected classification"),
        }

        let llm = MockLlm::with_responses(vec![Err("connection refused".to_string())]);
        let task = Task::new("explain how the scheduler works");
        let outcome = planner
            .plan(&task, &llm, PlannerStrategy::Classification)
            .await
            .unwrap();
        match outcome {
            PlanOutcome::Classified(c) => assert_eq!(c, Classification::AnalysisTask),
            _ => panic!("expected classification"),
        }
    }

    #[tokio::test]
    async fn decomposition_parses_typed_subtasks() {
        let plan_json = r#"{
            "plan": "Analyze then generate",
            "subTasks": [
                {"id": "a1", "type": "analysis", "description": "Understand", "task": "Read the code", "dependsOn": []},
                {"id": "g1", "type": "generation", "description": "Change", "task": "Apply the fix", "dependsOn": ["a1"]},
                {"id": "x1", "type": "mystery", "description": "Odd", "task": "Unknown kind", "dependsOn": []}
            ]
        }"#;
        let llm = MockLlm::with_responses(vec![Ok(text_response(plan_json))]);
        let planner = Planner::new("test-model");

        let outcome = planner
            .plan(&Task::new("fix it"), &llm, PlannerStrategy::Decomposition)
            .await
            .unwrap();

        match outcome {
            PlanOutcome::Decomposed { plan, subtasks } => {
                assert_eq!(plan.as_deref(), Some("Analyze then generate"));
                assert_eq!(subtasks.len(), 3);
                assert_eq!(subtasks[1].depends_on, vec!["a1"]);
                // Unknown type defaults to analysis handling
                assert_eq!(subtasks[2].kind, SubtaskKind::Analysis);
            }
            _ => panic!("expected decomposition"),
        }
    }

    #[tokio::test]
    async fn unparseable_plan_is_a_typed_error() {
        let llm = MockLlm::with_texts(vec!["I would rather not produce JSON."]);
        let planner = Planner::new("test-model");

        let err = planner
            .plan(&Task::new("fix it"), &llm, PlannerStrategy::Decomposition)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Malformed(_)));
    }

    #[tokio::test]
    async fn empty_subtask_list_is_rejected() {
        let llm = MockLlm::with_texts(vec![r#"{"plan": "nothing", "subTasks": []}"#]);
        let planner = Planner::new("test-model");

        let err = planner
            .plan(&Task::new("fix it"), &llm, PlannerStrategy::Decomposition)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::EmptyPlan));
    }
}
