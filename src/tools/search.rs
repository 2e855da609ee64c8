//! Code search tool: regex search over workspace file contents.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::workspace::Workspace;

/// Search file contents for a pattern.
pub struct SearchCode {
    workspace: Arc<Workspace>,
}

impl SearchCode {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for SearchCode {
    fn name(&self) -> &str {
        "searchCode"
    }

    fn description(&self) -> &str {
        "Search workspace file contents for a regex pattern. Good for finding definitions, usages, or TODOs."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "filePattern": {
                    "type": "string",
                    "description": "Optional: only search files whose name matches this glob (e.g., '*.rs')"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;
        let file_pattern = args["filePattern"].as_str();

        let outcome = self.workspace.search(query, file_pattern).await;
        if outcome.success {
            Ok(outcome.data.unwrap_or_default())
        } else {
            Err(anyhow::anyhow!(
                "{}",
                outcome.error.unwrap_or_else(|| "Search failed".to_string())
            ))
        }
    }
}
