//! Tool system for the orchestrator.
//!
//! Tools are the "hands and eyes" of a subtask - they let the model read and
//! modify the workspace, search code, and run commands. The capability set is
//! fixed and its names and argument shapes are part of the LLM-facing
//! contract: `readFile(filePath)`, `writeFile(filePath, content)`,
//! `listFiles(directoryPath)`, `searchCode(query, filePattern?)`,
//! `runCommand(command)`. Changing them requires re-validating prompt
//! compatibility.
//!
//! Every tool is backed by the injected [`Workspace`](crate::workspace::Workspace)
//! collaborator; tools never touch the filesystem directly.

mod directory;
mod file_ops;
mod search;
mod terminal;

pub use directory::ListFiles;
pub use file_ops::{ReadFile, WriteFile};
pub use search::SearchCode;
pub use terminal::RunCommand;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::workspace::Workspace;

/// Information about a tool for display purposes.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a registry with the fixed capability set, backed by `workspace`.
    pub fn new(workspace: Arc<Workspace>) -> Self {
        let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();

        tools.insert(
            "readFile".to_string(),
            Arc::new(ReadFile::new(Arc::clone(&workspace))),
        );
        tools.insert(
            "writeFile".to_string(),
            Arc::new(WriteFile::new(Arc::clone(&workspace))),
        );
        tools.insert(
            "listFiles".to_string(),
            Arc::new(ListFiles::new(Arc::clone(&workspace))),
        );
        tools.insert(
            "searchCode".to_string(),
            Arc::new(SearchCode::new(Arc::clone(&workspace))),
        );
        tools.insert(
            "runCommand".to_string(),
            Arc::new(RunCommand::new(workspace)),
        );

        tracing::debug!("Tool registry initialized with {} tools", tools.len());
        Self { tools }
    }

    /// Create an empty registry (no built-in tools).
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// List all available tools.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get tool schemas in LLM-compatible format.
    pub fn get_tool_schemas(&self) -> Vec<ToolDefinition> {
        let mut schemas: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect();
        schemas.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        schemas
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}

/// Maximum characters of tool output fed back into the message list.
const MAX_TOOL_OUTPUT: usize = 10_000;

/// Outcome of one tool invocation, normalized into a uniform envelope.
///
/// A failed call (bad arguments, workspace error, declined write) is carried
/// as data the model can react to - it must never abort the enclosing
/// subtask.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool: String,
    /// False when the named tool is not registered at all.
    pub found: bool,
    pub success: bool,
    pub output: String,
}

impl ToolOutcome {
    /// Serialize this outcome as the content of a tool-role message.
    pub fn payload(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            json!({ "error": self.output }).to_string()
        }
    }
}

/// Executes named tool calls against a registry.
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this invoker dispatches against.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Invoke one named tool with raw (JSON string) arguments.
    ///
    /// Never returns an error: unknown tools, malformed arguments, and tool
    /// failures all come back inside the envelope.
    pub async fn invoke(&self, name: &str, raw_arguments: &str) -> ToolOutcome {
        let Some(tool) = self.registry.get(name) else {
            tracing::warn!("Model requested unknown tool: {}", name);
            return ToolOutcome {
                tool: name.to_string(),
                found: false,
                success: false,
                output: format!("Tool {} not found", name),
            };
        };

        let args: Value = serde_json::from_str(raw_arguments).unwrap_or(Value::Null);

        match tool.execute(args).await {
            Ok(mut output) => {
                if output.len() > MAX_TOOL_OUTPUT {
                    let mut cut = MAX_TOOL_OUTPUT;
                    while !output.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    output.truncate(cut);
                    output.push_str("\n... [output truncated]");
                }
                ToolOutcome {
                    tool: name.to_string(),
                    found: true,
                    success: true,
                    output,
                }
            }
            Err(e) => {
                tracing::debug!("Tool {} failed: {}", name, e);
                ToolOutcome {
                    tool: name.to_string(),
                    found: true,
                    success: false,
                    output: e.to_string(),
                }
            }
        }
    }
}
