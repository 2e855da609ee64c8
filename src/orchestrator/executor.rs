//! Subtask executor - runs one subtask to completion through the tool-call
//! loop.
//!
//! # Algorithm
//! 1. Build the message list: role-specific system prompt, optional context
//!    message, then the subtask instruction
//! 2. Call the model with the full tool schema
//! 3. If tool calls were requested: execute each sequentially, feed results
//!    back, and loop
//! 4. Terminate when the model answers with text only, or fail hard at the
//!    round cap
//!
//! A failure inside one tool call never aborts the subtask; the error is
//! returned to the model as tool-result data. Transport failures and the
//! round cap convert to a failed `WorkerResult` - nothing is thrown past
//! this boundary.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::llm::{ChatMessage, LlmClient, Role, TokenUsage};
use crate::task::{SubTask, SubtaskKind, WorkerResult};
use crate::tools::ToolInvoker;

/// Default cap on tool-call rounds (model calls) per subtask.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Runs one subtask against the model with tools.
pub struct SubtaskExecutor {
    llm: Arc<dyn LlmClient>,
    invoker: ToolInvoker,
    model: String,
    max_tool_rounds: usize,
}

impl SubtaskExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, invoker: ToolInvoker, model: impl Into<String>) -> Self {
        Self {
            llm,
            invoker,
            model: model.into(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Override the tool-round cap.
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Role-specific system prompt. The three roles differ in focus but
    /// share structure.
    fn system_prompt(&self, kind: SubtaskKind) -> String {
        let role = match kind {
            SubtaskKind::Analysis => {
                "You are a code analyst. Investigate the request using the available tools, \
                 read the relevant files, and explain what you find. Do not modify anything."
            }
            SubtaskKind::Generation => {
                "You are a code generator. Implement the requested change using the available \
                 tools. Read files before editing them, and keep changes minimal and focused."
            }
            SubtaskKind::Test => {
                "You are a test engineer. Verify the changes described in the context: run the \
                 relevant tests or write new ones using the available tools, and report the outcome."
            }
        };

        let tool_descriptions = self
            .invoker
            .registry()
            .list_tools()
            .iter()
            .map(|t| format!("- **{}**: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{role}\n\n## Available Tools\n{tool_descriptions}\n\n## Rules\n\
             1. Use tools to ground your answer - don't guess at file contents\n\
             2. If a tool call fails, adapt rather than repeating it verbatim\n\
             3. When done, respond with a clear summary and no further tool calls"
        )
    }

    /// Run `subtask` to completion.
    ///
    /// A missing subtask is an immediate input error - no model call is
    /// made. Cancellation is checked before every model call and every tool
    /// call; the transport itself cannot be aborted mid-flight.
    pub async fn run(
        &self,
        subtask: Option<&SubTask>,
        cancel: Option<&CancellationToken>,
    ) -> WorkerResult {
        let Some(subtask) = subtask else {
            return WorkerResult::failed("No subtask to execute");
        };

        tracing::info!(
            "Executing subtask '{}' ({}): {}",
            subtask.id,
            subtask.kind,
            subtask.description
        );

        let mut messages = vec![ChatMessage::new(
            Role::System,
            self.system_prompt(subtask.kind),
        )];
        if let Some(context) = &subtask.context {
            messages.push(ChatMessage::new(
                Role::User,
                format!("Context:\n{}", context),
            ));
        }
        messages.push(ChatMessage::new(Role::User, subtask.task.clone()));

        let tool_schemas = self.invoker.registry().get_tool_schemas();
        let mut tools_used: Vec<String> = Vec::new();
        let mut usage: Option<TokenUsage> = None;

        for round in 0..self.max_tool_rounds {
            if cancel.is_some_and(|t| t.is_cancelled()) {
                return WorkerResult::failed("Cancelled before model call")
                    .with_tools(tools_used)
                    .with_usage(usage);
            }

            tracing::debug!("Subtask '{}' round {}", subtask.id, round + 1);

            let response = match self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    return WorkerResult::failed(format!("Model call failed: {}", e))
                        .with_tools(tools_used)
                        .with_usage(usage);
                }
            };

            if let Some(reported) = response.usage {
                usage.get_or_insert_with(TokenUsage::default).add(reported);
            }

            let tool_calls = response.tool_calls.clone().unwrap_or_default();
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: response.content.clone(),
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls.clone())
                },
                tool_call_id: None,
            });

            if tool_calls.is_empty() {
                return match response.content {
                    Some(content) if !content.trim().is_empty() => WorkerResult::ok(content)
                        .with_tools(tools_used)
                        .with_usage(usage),
                    _ => WorkerResult::failed("Model returned an empty response")
                        .with_tools(tools_used)
                        .with_usage(usage),
                };
            }

            // Tool calls run sequentially, in the order the model returned
            // them; workspace side effects make concurrency unsafe here.
            for call in &tool_calls {
                if cancel.is_some_and(|t| t.is_cancelled()) {
                    return WorkerResult::failed("Cancelled before tool call")
                        .with_tools(tools_used)
                        .with_usage(usage);
                }

                let outcome = self
                    .invoker
                    .invoke(&call.function.name, &call.function.arguments)
                    .await;

                if outcome.found {
                    tools_used.push(outcome.tool.clone());
                }

                messages.push(ChatMessage::tool_result(call.id.clone(), outcome.payload()));
            }
        }

        WorkerResult::failed(format!(
            "Maximum tool call rounds ({}) exceeded",
            self.max_tool_rounds
        ))
        .with_tools(tools_used)
        .with_usage(usage)
    }
}
