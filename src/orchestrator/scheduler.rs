//! Scheduler - the state machine that owns a run.
//!
//! One scheduler handles one logical task at a time (`is_executing` guard;
//! concurrent requests are rejected, not queued). Within a run every model
//! call and tool call is awaited sequentially, so the `RunState` is only
//! ever mutated from this single control flow and needs no locking.
//!
//! Routing follows the graph
//! `Init → Plan → {Analysis | Generation | Irrelevant-End} → [Generation →]
//! [Test →] → Synthesize → End`, with the edges Generation → Test →
//! Synthesize fixed so generated code is always tested and every path
//! converges on synthesis. When the planner emits a full subtask list
//! instead of a classification, the dependency-scheduled variant
//! (`SelectSubtask` / `ExecuteSubtask`) runs over the same state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::llm::LlmClient;
use crate::task::{SubTask, SubtaskKind, Task, WorkerResult};
use crate::tools::{ToolInvoker, ToolRegistry};

use super::executor::SubtaskExecutor;
use super::planner::{Classification, PlanOutcome, Planner, PlannerStrategy};
use super::state::{NextStep, RunState};
use super::synthesizer::Synthesizer;

/// What the orchestrator returns to its caller. A failed run still carries a
/// best-effort response whenever one could be produced.
#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub success: bool,
    pub response: Option<String>,
    pub error: Option<String>,
}

impl ExecuteOutcome {
    fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }
}

/// The orchestration entry point.
pub struct Scheduler {
    llm: Arc<dyn LlmClient>,
    planner: Planner,
    executor: SubtaskExecutor,
    synthesizer: Synthesizer,
    strategy: PlannerStrategy,
    is_executing: AtomicBool,
    progress: broadcast::Sender<String>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let (progress, _) = broadcast::channel(64);
        Self {
            planner: Planner::new(model.clone()),
            executor: SubtaskExecutor::new(
                Arc::clone(&llm),
                ToolInvoker::new(registry),
                model.clone(),
            ),
            synthesizer: Synthesizer::new(model),
            llm,
            strategy: PlannerStrategy::default(),
            is_executing: AtomicBool::new(false),
            progress,
            cancel: CancellationToken::new(),
        }
    }

    /// Select the planning strategy (classification fast path by default).
    pub fn with_strategy(mut self, strategy: PlannerStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Override the executor's tool-round cap.
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.executor = self.executor.with_max_tool_rounds(max_tool_rounds);
        self
    }

    /// Subscribe to free-text progress events ("Executing: analysis...").
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.progress.subscribe()
    }

    /// Request cooperative cancellation. An outstanding model call cannot be
    /// aborted; this prevents the next step from starting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn emit(&self, message: impl Into<String>) {
        // No subscriber is fine; progress is best-effort
        let _ = self.progress.send(message.into());
    }

    /// Run one user query to completion.
    ///
    /// Rejected immediately (no model call) when the query is empty or when
    /// another run is still in flight.
    pub async fn execute(&self, query: &str) -> ExecuteOutcome {
        if query.trim().is_empty() {
            return ExecuteOutcome::rejected("Query must not be empty");
        }

        if self
            .is_executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return ExecuteOutcome::rejected("A task is already executing");
        }

        let outcome = self.run(query).await;
        self.is_executing.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run(&self, query: &str) -> ExecuteOutcome {
        let mut state = RunState::new(Task::new(query.trim()));
        tracing::info!("Run {} started", state.run_id);

        loop {
            let step = state.next_step;
            if step == NextStep::End {
                break;
            }

            // Cancellation prevents the next step from starting; synthesis
            // still runs so the caller gets a response.
            if self.cancel.is_cancelled() && step != NextStep::Synthesize {
                state.set_error("Execution was cancelled");
                state.next_step = NextStep::Synthesize;
                continue;
            }

            self.emit(format!("Executing: {}...", step));

            match step {
                NextStep::Plan => self.plan_node(&mut state).await,
                NextStep::Analysis => self.analysis_node(&mut state).await,
                NextStep::Generation => self.generation_node(&mut state).await,
                NextStep::Test => self.test_node(&mut state).await,
                NextStep::SelectSubtask => Self::select_next(&mut state),
                NextStep::ExecuteSubtask => self.execute_subtask_node(&mut state).await,
                NextStep::Synthesize => self.synthesize_node(&mut state).await,
                NextStep::End => unreachable!(),
            }
        }

        tracing::info!(
            "Run {} finished (error: {})",
            state.run_id,
            state.error().unwrap_or("none")
        );

        ExecuteOutcome {
            success: state.error().is_none(),
            response: state.final_result.clone(),
            error: state.error().map(String::from),
        }
    }

    /// Plan node: classify or decompose, then route.
    async fn plan_node(&self, state: &mut RunState) {
        match self
            .planner
            .plan(&state.task, &*self.llm, self.strategy)
            .await
        {
            Ok(PlanOutcome::Classified(classification)) => {
                state.next_step = match classification {
                    Classification::AnalysisTask => NextStep::Analysis,
                    Classification::GenerationTask => NextStep::Generation,
                    Classification::AnalysisWithGeneration => {
                        state.task.mark_requires_generation();
                        NextStep::Analysis
                    }
                    // Not a coding request: terminal, no result
                    Classification::Irrelevant => NextStep::End,
                };
            }
            Ok(PlanOutcome::Decomposed { plan, subtasks }) => {
                state.plan = plan;
                state.subtasks = subtasks;
                state.next_step = NextStep::SelectSubtask;
            }
            Err(e) => {
                // Planning errors are terminal: no partial synthesis
                tracing::error!("Planning failed: {}", e);
                state.set_error(format!("Planning failed: {}", e));
                state.final_result = Some(format!(
                    "I couldn't create a plan for this request: {}",
                    e
                ));
                state.next_step = NextStep::End;
            }
        }
    }

    /// Analysis node of the classification fast path.
    ///
    /// Conditional edge: on to generation when the plan requires it,
    /// otherwise straight to synthesis. A failed analysis always routes to
    /// synthesis.
    async fn analysis_node(&self, state: &mut RunState) {
        let mut subtask = SubTask::new(
            "analysis",
            SubtaskKind::Analysis,
            "Analysis",
            state.task.query.clone(),
        );
        if let Some(context) = &state.task.context {
            subtask = subtask.with_context(context.clone());
        }

        let result = self.run_current(state, subtask).await;
        let succeeded = result.success;
        if let Some(error) = &result.error {
            state.set_error(error.clone());
        }
        state.record_result("analysis", result);

        state.next_step = if succeeded && state.task.requires_generation() {
            NextStep::Generation
        } else {
            NextStep::Synthesize
        };
    }

    /// Generation node. Fixed edge: always on to test.
    async fn generation_node(&self, state: &mut RunState) {
        let mut subtask = SubTask::new(
            "generation",
            SubtaskKind::Generation,
            "Code generation",
            state.task.query.clone(),
        );
        if let Some(context) = Self::dependency_context(state, &["analysis"]) {
            subtask = subtask.with_context(context);
        }

        let result = self.run_current(state, subtask).await;
        if let Some(error) = &result.error {
            state.set_error(error.clone());
        }
        state.record_result("generation", result);

        state.next_step = NextStep::Test;
    }

    /// Test node. Fixed edge: always on to synthesis.
    async fn test_node(&self, state: &mut RunState) {
        let mut subtask = SubTask::new(
            "test",
            SubtaskKind::Test,
            "Testing",
            format!(
                "Verify the changes made for this request: {}",
                state.task.query
            ),
        );
        if let Some(context) = Self::dependency_context(state, &["analysis", "generation"]) {
            subtask = subtask.with_context(context);
        }

        let result = self.run_current(state, subtask).await;
        if let Some(error) = &result.error {
            state.set_error(error.clone());
        }
        state.record_result("test", result);

        state.next_step = NextStep::Synthesize;
    }

    /// Assemble context from previously recorded successful results.
    fn dependency_context(state: &RunState, ids: &[&str]) -> Option<String> {
        let mut context = String::new();
        for id in ids {
            if let Some(result) = state.get_result(id) {
                if result.success {
                    context.push_str(&format!("Result from {}:\n{}\n\n", id, result.result));
                }
            }
        }
        if context.is_empty() {
            None
        } else {
            Some(context)
        }
    }

    /// Dependency-scheduled variant: pick the first pending subtask whose
    /// dependencies all have recorded results (stable order = plan emission
    /// order). No eligible subtask while pending ones remain means a
    /// dependency cycle.
    fn select_next(state: &mut RunState) {
        let pending: Vec<usize> = (0..state.subtasks.len())
            .filter(|&i| !state.has_result(&state.subtasks[i].id))
            .collect();

        if pending.is_empty() {
            state.next_step = NextStep::Synthesize;
            return;
        }

        for idx in pending {
            let candidate = &state.subtasks[idx];
            if !candidate.depends_on.iter().all(|dep| state.has_result(dep)) {
                continue;
            }

            // Eligible: assemble its context from successful dependencies,
            // then its own static context.
            let mut context = String::new();
            for dep in &candidate.depends_on {
                if let Some(result) = state.get_result(dep) {
                    if result.success {
                        context.push_str(&format!(
                            "Result from {}:\n{}\n\n",
                            dep, result.result
                        ));
                    }
                }
            }
            if let Some(static_context) = &candidate.context {
                context.push_str(static_context);
            }

            let mut selected = candidate.clone();
            selected.context = if context.is_empty() {
                None
            } else {
                Some(context)
            };

            state.subtasks[idx].assigned = true;
            state.current_subtask = Some(selected);
            state.next_step = NextStep::ExecuteSubtask;
            return;
        }

        tracing::error!("Dependency cycle detected among pending subtasks");
        state.set_error("Dependency cycle detected among pending subtasks");
        state.next_step = NextStep::Synthesize;
    }

    /// Execute the subtask picked by `select_next`, record its result, and
    /// return to selection. Failures are recorded as results, not run
    /// errors - dependents only need a recorded outcome.
    async fn execute_subtask_node(&self, state: &mut RunState) {
        let result = self
            .executor
            .run(state.current_subtask.as_ref(), Some(&self.cancel))
            .await;

        let id = match state.current_subtask.take() {
            Some(subtask) => subtask.id,
            None => {
                // select_next never routes here without a selection
                state.set_error("No subtask selected for execution");
                state.next_step = NextStep::Synthesize;
                return;
            }
        };

        if let Some(entry) = state.subtasks.iter_mut().find(|s| s.id == id) {
            entry.completed = true;
        }
        state.record_result(id, result);
        state.next_step = NextStep::SelectSubtask;
    }

    /// Synthesis node: merge everything recorded so far and terminate.
    async fn synthesize_node(&self, state: &mut RunState) {
        let labeled: Vec<(String, WorkerResult)> = state
            .results()
            .iter()
            .map(|(id, result)| {
                let label = state
                    .subtasks
                    .iter()
                    .find(|s| &s.id == id)
                    .map(|s| s.description.clone())
                    .unwrap_or_else(|| id.clone());
                (label, result.clone())
            })
            .collect();

        let outcome = self
            .synthesizer
            .combine(&state.task.query, &labeled, &*self.llm)
            .await;

        if let Some(error) = outcome.error {
            state.set_error(error);
        }
        state.final_result = Some(outcome.final_result);
        state.next_step = NextStep::End;
    }

    /// Put `subtask` in flight and run it through the executor.
    async fn run_current(&self, state: &mut RunState, subtask: SubTask) -> WorkerResult {
        state.current_subtask = Some(subtask);
        let result = self
            .executor
            .run(state.current_subtask.as_ref(), Some(&self.cancel))
            .await;
        state.current_subtask = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::synthesizer::NO_RESULTS_MESSAGE;
    use crate::orchestrator::test_support::{text_response, MockLlm};
    use crate::task::Task;

    fn scheduler(llm: Arc<MockLlm>) -> Scheduler {
        Scheduler::new(llm, Arc::new(ToolRegistry::empty()), "test-model")
    }

    fn decomposing_scheduler(llm: Arc<MockLlm>) -> Scheduler {
        scheduler(llm).with_strategy(PlannerStrategy::Decomposition)
    }

    // --- select_next properties -------------------------------------------

    fn planned_state(subtasks: Vec<SubTask>) -> RunState {
        let mut state = RunState::new(Task::new("q"));
        state.subtasks = subtasks;
        state.next_step = NextStep::SelectSubtask;
        state
    }

    #[test]
    fn subtask_without_dependencies_is_immediately_eligible() {
        let mut state = planned_state(vec![SubTask::new(
            "a1",
            SubtaskKind::Analysis,
            "d",
            "t",
        )]);

        Scheduler::select_next(&mut state);

        assert_eq!(state.next_step, NextStep::ExecuteSubtask);
        assert_eq!(state.current_subtask.as_ref().unwrap().id, "a1");
    }

    #[test]
    fn subtask_with_unrecorded_dependency_is_never_selected() {
        let mut state = planned_state(vec![
            SubTask::new("g1", SubtaskKind::Generation, "d", "t").with_dependency("a1"),
            SubTask::new("a1", SubtaskKind::Analysis, "d", "t"),
        ]);

        Scheduler::select_next(&mut state);

        // g1 comes first in plan order but a1 has no recorded result yet
        assert_eq!(state.current_subtask.as_ref().unwrap().id, "a1");
    }

    #[test]
    fn selection_assembles_context_from_successful_dependencies() {
        let mut state = planned_state(vec![
            SubTask::new("a1", SubtaskKind::Analysis, "d", "t"),
            SubTask::new("a2", SubtaskKind::Analysis, "d", "t"),
            SubTask::new("g1", SubtaskKind::Generation, "d", "t")
                .with_dependency("a1")
                .with_dependency("a2")
                .with_context("static notes"),
        ]);
        state.record_result("a1", WorkerResult::ok("first finding"));
        state.record_result("a2", WorkerResult::failed("broke"));

        Scheduler::select_next(&mut state);

        let selected = state.current_subtask.unwrap();
        assert_eq!(selected.id, "g1");
        let context = selected.context.unwrap();
        assert!(context.contains("Result from a1:\nfirst finding\n\n"));
        // Failed dependency contributes nothing
        assert!(!context.contains("a2"));
        // Static context is appended last
        assert!(context.ends_with("static notes"));
    }

    #[test]
    fn mutual_dependency_is_reported_as_a_cycle() {
        let mut state = planned_state(vec![
            SubTask::new("x", SubtaskKind::Analysis, "d", "t").with_dependency("y"),
            SubTask::new("y", SubtaskKind::Analysis, "d", "t").with_dependency("x"),
        ]);

        Scheduler::select_next(&mut state);

        assert_eq!(state.next_step, NextStep::Synthesize);
        assert!(state.error().unwrap().contains("cycle"));
    }

    #[test]
    fn exhausted_plan_routes_to_synthesis() {
        let mut state = planned_state(vec![SubTask::new("a1", SubtaskKind::Analysis, "d", "t")]);
        state.record_result("a1", WorkerResult::ok("done"));

        Scheduler::select_next(&mut state);

        assert_eq!(state.next_step, NextStep::Synthesize);
        assert!(state.error().is_none());
    }

    // --- input and guard errors -------------------------------------------

    #[tokio::test]
    async fn empty_query_short_circuits_without_model_call() {
        let llm = Arc::new(MockLlm::with_texts(vec![]));
        let scheduler = scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("   ").await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("must not be empty"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_execution_is_rejected_not_queued() {
        use crate::llm::{ChatMessage, ChatResponse, ToolDefinition};
        use async_trait::async_trait;

        struct SlowLlm;

        #[async_trait]
        impl LlmClient for SlowLlm {
            async fn chat_completion(
                &self,
                _model: &str,
                _messages: &[ChatMessage],
                _tools: Option<&[ToolDefinition]>,
            ) -> anyhow::Result<ChatResponse> {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                Ok(text_response("handleIrrelevantQuery"))
            }
        }

        let scheduler = Arc::new(Scheduler::new(
            Arc::new(SlowLlm),
            Arc::new(ToolRegistry::empty()),
            "test-model",
        ));

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.execute("analyze this").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let second = scheduler.execute("another request").await;

        assert!(!second.success);
        assert!(second.error.unwrap().contains("already executing"));
        assert!(first.await.unwrap().success);
    }

    // --- classification fast path -----------------------------------------

    #[tokio::test]
    async fn analysis_only_run_short_circuits_synthesis() {
        let llm = Arc::new(MockLlm::with_texts(vec![
            "executeAnalysisTask",
            "## Analysis\n\nThe function is sound.",
        ]));
        let scheduler = scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("analyze this function").await;

        assert!(outcome.success);
        // Single-result short-circuit strips the heading, no synthesis call
        assert_eq!(outcome.response.as_deref(), Some("The function is sound."));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn analysis_with_generation_runs_the_full_pipeline() {
        let llm = Arc::new(MockLlm::with_texts(vec![
            "executeAnalysisWithGeneration",
            "analysis findings",
            "generated the fix",
            "tests pass",
            "Unified final answer.",
        ]));
        let scheduler = scheduler(Arc::clone(&llm));

        let outcome = scheduler
            .execute("add error handling and write tests")
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.response.as_deref(), Some("Unified final answer."));
        // classify + analysis + generation + test + synthesis
        assert_eq!(llm.call_count(), 5);
    }

    #[tokio::test]
    async fn generation_only_still_passes_through_test() {
        let llm = Arc::new(MockLlm::with_texts(vec![
            "executeGenerationTask",
            "wrote the code",
            "verified the code",
            "Combined answer.",
        ]));
        let scheduler = scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("write a fizzbuzz").await;

        assert!(outcome.success);
        assert_eq!(outcome.response.as_deref(), Some("Combined answer."));
        assert_eq!(llm.call_count(), 4);
    }

    #[tokio::test]
    async fn unrecognized_classification_routes_to_terminal_end() {
        let llm = Arc::new(MockLlm::with_texts(vec!["I enjoy poetry"]));
        let scheduler = scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("what's the weather like").await;

        assert!(outcome.success);
        assert!(outcome.response.is_none());
        assert!(outcome.error.is_none());
        // Only the classification call; no executor, no synthesis
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_analysis_routes_to_synthesis_not_generation() {
        let llm = Arc::new(MockLlm::with_responses(vec![
            Ok(text_response("executeAnalysisWithGeneration")),
            Err("model unavailable".to_string()),
        ]));
        let scheduler = scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("fix the bug").await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Model call failed"));
        // Best-effort response still present
        assert_eq!(outcome.response.as_deref(), Some(NO_RESULTS_MESSAGE));
        // classify + failed analysis; generation never starts
        assert_eq!(llm.call_count(), 2);
    }

    // --- dependency-scheduled path ----------------------------------------

    const DEP_PLAN: &str = r#"{
        "plan": "Analyze, then apply the fix",
        "subTasks": [
            {"id": "a1", "type": "analysis", "description": "Find the bug", "task": "Locate the bug", "dependsOn": []},
            {"id": "g1", "type": "generation", "description": "Fix the bug", "task": "Apply the fix", "dependsOn": ["a1"]}
        ]
    }"#;

    #[tokio::test]
    async fn decomposed_plan_executes_in_dependency_order() {
        let llm = Arc::new(MockLlm::with_texts(vec![
            DEP_PLAN,
            "found it in parser.rs",
            "patched parser.rs",
            "Both subtasks merged.",
        ]));
        let scheduler = decomposing_scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("fix the parser bug").await;

        assert!(outcome.success);
        assert_eq!(outcome.response.as_deref(), Some("Both subtasks merged."));
        // plan + a1 + g1 + synthesis
        assert_eq!(llm.call_count(), 4);
    }

    #[tokio::test]
    async fn dependency_cycle_still_produces_a_user_facing_response() {
        let cycle_plan = r#"{
            "plan": "impossible",
            "subTasks": [
                {"id": "x", "type": "analysis", "description": "X", "task": "t", "dependsOn": ["y"]},
                {"id": "y", "type": "analysis", "description": "Y", "task": "t", "dependsOn": ["x"]}
            ]
        }"#;
        let llm = Arc::new(MockLlm::with_texts(vec![cycle_plan]));
        let scheduler = decomposing_scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("do the impossible").await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("cycle"));
        // Synthesize still ran and returned its fixed message
        assert_eq!(outcome.response.as_deref(), Some(NO_RESULTS_MESSAGE));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn unparseable_plan_is_terminal_with_no_synthesis() {
        let llm = Arc::new(MockLlm::with_texts(vec!["no json here, sorry"]));
        let scheduler = decomposing_scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("fix something").await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Planning failed"));
        assert!(outcome
            .response
            .unwrap()
            .contains("couldn't create a plan"));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_subtask_does_not_block_dependents() {
        let llm = Arc::new(MockLlm::with_responses(vec![
            Ok(text_response(DEP_PLAN)),
            Err("analysis model down".to_string()),
            Ok(text_response("patched blind")),
        ]));
        let scheduler = decomposing_scheduler(Arc::clone(&llm));

        let outcome = scheduler.execute("fix the parser bug").await;

        // g1 still ran (its dependency has a recorded, failed result) and
        // its single success short-circuits synthesis.
        assert!(outcome.success);
        assert_eq!(outcome.response.as_deref(), Some("patched blind"));
        assert_eq!(llm.call_count(), 3);
    }

    // --- progress and cancellation ----------------------------------------

    #[tokio::test]
    async fn progress_events_name_each_node() {
        let llm = Arc::new(MockLlm::with_texts(vec![
            "executeAnalysisTask",
            "analysis text",
        ]));
        let scheduler = scheduler(Arc::clone(&llm));
        let mut events = scheduler.subscribe();

        scheduler.execute("analyze this").await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&"Executing: plan...".to_string()));
        assert!(seen.contains(&"Executing: analysis...".to_string()));
        assert!(seen.contains(&"Executing: synthesize...".to_string()));
    }

    #[tokio::test]
    async fn cancellation_prevents_the_next_step() {
        let llm = Arc::new(MockLlm::with_texts(vec!["executeAnalysisTask"]));
        let scheduler = scheduler(Arc::clone(&llm));

        scheduler.cancel();
        let outcome = scheduler.execute("analyze this").await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("cancelled"));
        // Plan never started; synthesis of nothing still answered
        assert_eq!(outcome.response.as_deref(), Some(NO_RESULTS_MESSAGE));
        assert_eq!(llm.call_count(), 0);
    }
}
