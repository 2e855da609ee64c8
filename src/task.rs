//! Core data model: tasks, subtasks, and worker results.
//!
//! A `Task` is the root user request; the planner either classifies it onto
//! the fixed analysis/generation/test pipeline or decomposes it into a
//! dependency-linked list of `SubTask`s. Each executed subtask produces one
//! `WorkerResult`, keyed by subtask id in a grow-only results map.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::llm::TokenUsage;

/// The root user request.
///
/// Immutable after creation except for `requires_generation`, which the
/// planner may set exactly once when analysis must be chained into
/// generation.
#[derive(Debug, Clone)]
pub struct Task {
    pub query: String,
    pub context: Option<String>,
    requires_generation: bool,
}

impl Task {
    /// Create a task from the user's query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: None,
            requires_generation: false,
        }
    }

    /// Attach prior workspace context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Mark that analysis must be followed by generation. Set-once.
    pub fn mark_requires_generation(&mut self) {
        self.requires_generation = true;
    }

    pub fn requires_generation(&self) -> bool {
        self.requires_generation
    }
}

/// The role a subtask plays in the pipeline.
///
/// Unknown type strings from the planner deserialize to `Analysis`, the
/// fail-safe handling path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubtaskKind {
    Analysis,
    Generation,
    Test,
}

impl SubtaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Generation => "generation",
            Self::Test => "test",
        }
    }

    /// Parse a planner-supplied type string; anything unrecognized is
    /// treated as analysis.
    pub fn from_planner_type(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "generation" => Self::Generation,
            "test" => Self::Test,
            "analysis" => Self::Analysis,
            _ => Self::Analysis,
        }
    }
}

impl Serialize for SubtaskKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubtaskKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_planner_type(&s))
    }
}

impl std::fmt::Display for SubtaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of executable work.
///
/// Created by the planner (or by routing when analysis spawns a follow-up);
/// never mutated after creation except to attach the resolved `context`
/// immediately before execution. A subtask may only execute once every id in
/// `depends_on` has a recorded result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SubtaskKind,
    pub description: String,
    /// Instruction text sent to the model.
    pub task: String,
    /// Assembled from dependency results just before execution.
    #[serde(skip)]
    pub context: Option<String>,
    #[serde(rename = "dependsOn", default)]
    pub depends_on: Vec<String>,
    /// Execution bookkeeping, initialized false when the plan is parsed.
    #[serde(skip)]
    pub assigned: bool,
    #[serde(skip)]
    pub completed: bool,
}

impl SubTask {
    /// Create a subtask with no dependencies.
    pub fn new(
        id: impl Into<String>,
        kind: SubtaskKind,
        description: impl Into<String>,
        task: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            description: description.into(),
            task: task.into(),
            context: None,
            depends_on: Vec::new(),
            assigned: false,
            completed: false,
        }
    }

    /// Add a dependency on another subtask id.
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Attach static context supplied by the planner.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Outcome of one subtask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub success: bool,
    /// Output text; empty on failure.
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Names of tools invoked, in call order. Duplicates allowed.
    pub tools_used: Vec<String>,
    /// Aggregated token usage across the subtask's model calls, if the
    /// provider reported any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl WorkerResult {
    /// Create a successful result.
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
            error: None,
            tools_used: Vec::new(),
            usage: None,
        }
    }

    /// Create a failure result.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: String::new(),
            error: Some(error.into()),
            tools_used: Vec::new(),
            usage: None,
        }
    }

    /// Attach the tool call history.
    pub fn with_tools(mut self, tools_used: Vec<String>) -> Self {
        self.tools_used = tools_used;
        self
    }

    /// Attach aggregated token usage.
    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }
}
