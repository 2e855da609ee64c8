//! Subtask orchestration: the state machine that turns one user query into
//! a routed sequence of LLM-executed subtasks and a single merged answer.
//!
//! Control flow is owned by the [`Scheduler`]: it asks the [`Planner`] to
//! classify or decompose the query, routes each subtask through the
//! [`SubtaskExecutor`] (which runs the bounded tool-call loop), and hands the
//! accumulated results to the [`Synthesizer`]. The [`RunState`] threaded
//! through a run is only ever touched from this single sequential control
//! flow.

mod executor;
mod parse;
mod planner;
mod scheduler;
mod state;
mod synthesizer;

pub use executor::{SubtaskExecutor, DEFAULT_MAX_TOOL_ROUNDS};
pub use parse::{extract_json, Extracted};
pub use planner::{Classification, PlanError, PlanOutcome, Planner, PlannerStrategy};
pub use scheduler::{ExecuteOutcome, Scheduler};
pub use state::{NextStep, RunState};
pub use synthesizer::{SynthesisOutcome, Synthesizer};

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted LLM client and minimal tools for orchestration tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::llm::{
        ChatMessage, ChatResponse, FunctionCall, LlmClient, ToolCall, ToolDefinition,
    };
    use crate::tools::Tool;

    /// An LLM client that replays a script of responses.
    ///
    /// When the script runs dry it either repeats the final entry
    /// (`repeating`) or returns a plain "done" text response.
    pub struct MockLlm {
        script: Mutex<VecDeque<Result<ChatResponse, String>>>,
        repeat_last: Option<ChatResponse>,
        calls: AtomicUsize,
    }

    impl MockLlm {
        pub fn with_responses(responses: Vec<Result<ChatResponse, String>>) -> Self {
            Self {
                script: Mutex::new(responses.into()),
                repeat_last: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// A client that returns the same response on every call.
        pub fn repeating(response: ChatResponse) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                repeat_last: Some(response),
                calls: AtomicUsize::new(0),
            }
        }

        /// Convenience: a script of plain-text assistant turns.
        pub fn with_texts(texts: Vec<&str>) -> Self {
            Self::with_responses(texts.into_iter().map(|t| Ok(text_response(t))).collect())
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
        ) -> anyhow::Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next.map_err(|e| anyhow::anyhow!("{}", e));
            }
            if let Some(ref repeated) = self.repeat_last {
                return Ok(repeated.clone());
            }
            Ok(text_response("done"))
        }
    }

    /// Build a plain text response with no tool calls.
    pub fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            content: Some(text.to_string()),
            tool_calls: None,
            finish_reason: Some("stop".to_string()),
            usage: None,
            model: None,
        }
    }

    /// Build a response requesting the named tool calls.
    pub fn tool_call_response(calls: &[(&str, Value)]) -> ChatResponse {
        let tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("call_{}", i),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: args.to_string(),
                },
            })
            .collect();
        ChatResponse {
            content: None,
            tool_calls: Some(tool_calls),
            finish_reason: Some("tool_calls".to_string()),
            usage: None,
            model: None,
        }
    }

    /// A tool that echoes its arguments back.
    pub struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments back"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(&self, args: Value) -> anyhow::Result<String> {
            Ok(args.to_string())
        }
    }

    /// A tool that always fails.
    pub struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: Value) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("tool exploded"))
        }
    }
}
