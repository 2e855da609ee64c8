//! File operation tools: read and write workspace files.
//!
//! Paths resolve relative to the workspace root; absolute paths are an
//! escape hatch. Writes go through the workspace's confirmation flow, so a
//! user decline comes back as a failed tool result the model can react to.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::workspace::Workspace;

/// Read the contents of a file.
pub struct ReadFile {
    workspace: Arc<Workspace>,
}

impl ReadFile {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "readFile"
    }

    fn description(&self) -> &str {
        "Read a file's contents. Use paths relative to the workspace, like 'src/main.rs'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "Path of the file to read, relative to the workspace root"
                }
            },
            "required": ["filePath"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let path = args["filePath"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'filePath' argument"))?;

        let outcome = self.workspace.read(path).await;
        if outcome.success {
            Ok(outcome.data.unwrap_or_default())
        } else {
            Err(anyhow::anyhow!(
                "{}",
                outcome.error.unwrap_or_else(|| "Read failed".to_string())
            ))
        }
    }
}

/// Write content to a file (create or overwrite, subject to confirmation).
pub struct WriteFile {
    workspace: Arc<Workspace>,
}

impl WriteFile {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "writeFile"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. The user may decline the write."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "Path of the file to write, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write to the file"
                }
            },
            "required": ["filePath", "content"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let path = args["filePath"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'filePath' argument"))?;
        let content = args["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'content' argument"))?;

        let outcome = self.workspace.write(path, content, true).await;
        if outcome.success {
            Ok(outcome.data.unwrap_or_default())
        } else {
            Err(anyhow::anyhow!(
                "{}",
                outcome.error.unwrap_or_else(|| "Write failed".to_string())
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::ApprovalPolicy;
    use tempfile::TempDir;

    #[tokio::test]
    async fn declined_write_reports_the_decline() {
        let dir = TempDir::new().unwrap();
        let workspace = Arc::new(Workspace::with_approval(
            dir.path(),
            ApprovalPolicy::DeclineAll,
        ));
        let tool = WriteFile::new(workspace);

        let err = tool
            .execute(json!({"filePath": "x.txt", "content": "data"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("declined"));
    }

    #[tokio::test]
    async fn read_returns_raw_content() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "line1\nline2").unwrap();
        let tool = ReadFile::new(Arc::new(Workspace::new(dir.path())));

        let content = tool.execute(json!({"filePath": "f.txt"})).await.unwrap();
        assert_eq!(content, "line1\nline2");
    }
}
