//! Shell command execution tool.
//!
//! Commands run in the workspace root. Dangerous command patterns are
//! refused with a suggestion, and output is sanitized and capped before it
//! reaches the model.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::workspace::Workspace;

/// Run a shell command.
pub struct RunCommand {
    workspace: Arc<Workspace>,
}

impl RunCommand {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &str {
        "runCommand"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace. Use for running tests, builds, or inspecting the environment."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let command = args["command"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'command' argument"))?;

        let outcome = self.workspace.run_command(command).await;
        if outcome.success {
            Ok(outcome.data.unwrap_or_default())
        } else {
            Err(anyhow::anyhow!(
                "{}",
                outcome
                    .error
                    .unwrap_or_else(|| "Command failed".to_string())
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn command_output_includes_exit_code() {
        let dir = TempDir::new().unwrap();
        let tool = RunCommand::new(Arc::new(Workspace::new(dir.path())));

        let report = tool
            .execute(json!({"command": "echo orchestrated"}))
            .await
            .unwrap();
        assert!(report.starts_with("Exit code: 0"));
        assert!(report.contains("orchestrated"));
    }

    #[tokio::test]
    async fn blocked_command_is_refused() {
        let dir = TempDir::new().unwrap();
        let tool = RunCommand::new(Arc::new(Workspace::new(dir.path())));

        let err = tool
            .execute(json!({"command": "rm -rf /"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Blocked"));
    }
}
