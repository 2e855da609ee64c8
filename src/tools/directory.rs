//! Directory listing tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::workspace::Workspace;

/// List the entries of a workspace directory.
pub struct ListFiles {
    workspace: Arc<Workspace>,
}

impl ListFiles {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFiles {
    fn name(&self) -> &str {
        "listFiles"
    }

    fn description(&self) -> &str {
        "List files and directories. Use '.' for the workspace root or a relative path like 'src/'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directoryPath": {
                    "type": "string",
                    "description": "Directory path relative to the workspace root. Use '.' for the root."
                }
            },
            "required": ["directoryPath"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let path = args["directoryPath"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'directoryPath' argument"))?;

        let outcome = self.workspace.list(path).await;
        if outcome.success {
            Ok(outcome.data.unwrap_or_default())
        } else {
            Err(anyhow::anyhow!(
                "{}",
                outcome.error.unwrap_or_else(|| "List failed".to_string())
            ))
        }
    }
}
