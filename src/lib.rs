//! # codeloom
//!
//! Task-orchestration layer for coding requests: classifies or decomposes a
//! natural-language query into typed subtasks (analysis, generation, test),
//! runs each against an LLM with a constrained workspace tool set, and
//! merges the results into one answer.
//!
//! ## Task Flow
//! 1. `Scheduler::execute(query)` guards against concurrent runs
//! 2. The planner classifies the query (fast path) or emits a
//!    dependency-linked subtask plan
//! 3. Each subtask runs through the bounded tool-call loop
//! 4. The synthesizer merges the recorded results into the final response
//!
//! ## Modules
//! - `orchestrator`: scheduler, planner, subtask executor, synthesizer
//! - `llm`: chat types and the OpenRouter-backed `LlmClient` boundary
//! - `tools`: the fixed five-tool capability set and invocation envelope
//! - `workspace`: the stateful collaborator behind every tool
//! - `task`: tasks, subtasks, and worker results

pub mod config;
pub mod llm;
pub mod orchestrator;
pub mod task;
pub mod tools;
pub mod workspace;

pub use config::Config;
pub use orchestrator::{ExecuteOutcome, PlannerStrategy, Scheduler};
pub use task::{SubTask, SubtaskKind, Task, WorkerResult};
pub use tools::{ToolInvoker, ToolRegistry};
pub use workspace::{ApprovalPolicy, Workspace};
