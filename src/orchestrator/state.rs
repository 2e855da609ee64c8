//! Run state and routing tokens.

use uuid::Uuid;

use crate::task::{SubTask, Task, WorkerResult};

/// Routing token naming which component runs next.
///
/// This is the single source of truth for the active state; every node
/// returns (or is assigned by the fixed edge table) the next token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Plan,
    Analysis,
    Generation,
    Test,
    /// Dependency-scheduled variant: pick the next eligible subtask.
    SelectSubtask,
    /// Dependency-scheduled variant: run the selected subtask.
    ExecuteSubtask,
    Synthesize,
    End,
}

impl std::fmt::Display for NextStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Plan => "plan",
            Self::Analysis => "analysis",
            Self::Generation => "generation",
            Self::Test => "test",
            Self::SelectSubtask => "select-subtask",
            Self::ExecuteSubtask => "execute-subtask",
            Self::Synthesize => "synthesize",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// The mutable context threaded through one run.
///
/// Constructed fresh per user query and discarded once a terminal state is
/// reached. All mutation happens from the scheduler's single sequential
/// control flow.
pub struct RunState {
    pub run_id: Uuid,
    pub task: Task,
    /// Planner summary text, when the decomposition strategy produced one.
    pub plan: Option<String>,
    /// Ordered subtask list; empty when using direct single-subtask routing.
    pub subtasks: Vec<SubTask>,
    /// At most one subtask in flight.
    pub current_subtask: Option<SubTask>,
    results: Vec<(String, WorkerResult)>,
    pub final_result: Option<String>,
    pub next_step: NextStep,
    error: Option<String>,
}

impl RunState {
    pub fn new(task: Task) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task,
            plan: None,
            subtasks: Vec::new(),
            current_subtask: None,
            results: Vec::new(),
            final_result: None,
            next_step: NextStep::Plan,
            error: None,
        }
    }

    /// Record a subtask result. The results map only grows; a duplicate id
    /// keeps the first recording.
    pub fn record_result(&mut self, id: impl Into<String>, result: WorkerResult) {
        let id = id.into();
        if self.has_result(&id) {
            tracing::warn!("Ignoring duplicate result for subtask '{}'", id);
            return;
        }
        self.results.push((id, result));
    }

    pub fn has_result(&self, id: &str) -> bool {
        self.results.iter().any(|(k, _)| k == id)
    }

    pub fn get_result(&self, id: &str) -> Option<&WorkerResult> {
        self.results.iter().find(|(k, _)| k == id).map(|(_, r)| r)
    }

    /// All recorded results in recording order.
    pub fn results(&self) -> &[(String, WorkerResult)] {
        &self.results
    }

    /// Set the sticky run error. Once set, later calls are ignored so the
    /// first failure is the one surfaced.
    pub fn set_error(&mut self, error: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(error.into());
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
