//! Workspace collaborator - the only stateful external resource.
//!
//! All file reads/writes, directory listings, code search, and command
//! execution go through this type, and every operation returns a uniform
//! `{success, data?, error?}` envelope instead of raising. Writes that need
//! user confirmation flow through the pending-change registry, whose
//! `propose_change` / `accept` / `reject` / `list_pending` methods are the
//! only mutation surface for proposed edits. A declined write is reported as
//! `success = false` outcome data, never as an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::RwLock;
use uuid::Uuid;
use walkdir::WalkDir;

/// Uniform result envelope for every workspace operation.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkspaceOutcome {
    /// Successful operation carrying output data.
    pub fn ok(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    /// Failed operation carrying an error description.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Decision surface for confirmed writes.
///
/// The editor UI that asks the user lives outside this crate; the policy is
/// how that decision is injected.
#[derive(Clone)]
pub enum ApprovalPolicy {
    /// Apply every proposed change immediately.
    ApproveAll,
    /// Decline every proposed change (useful in tests and dry runs).
    DeclineAll,
    /// Leave proposals pending for out-of-band `accept`/`reject` calls.
    Hold,
    /// Delegate the decision to a callback.
    Callback(Arc<dyn Fn(&PendingChange) -> bool + Send + Sync>),
}

impl std::fmt::Debug for ApprovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApproveAll => write!(f, "ApproveAll"),
            Self::DeclineAll => write!(f, "DeclineAll"),
            Self::Hold => write!(f, "Hold"),
            Self::Callback(_) => write!(f, "Callback"),
        }
    }
}

/// A proposed file change awaiting confirmation. Keyed by workspace path;
/// re-proposing the same path replaces the earlier proposal.
#[derive(Debug, Clone, Serialize)]
pub struct PendingChange {
    pub id: Uuid,
    pub path: String,
    pub content: String,
    pub proposed_at: DateTime<Utc>,
}

/// Command patterns that are never executed.
/// These cause runaway scans or could damage the host.
const DANGEROUS_PATTERNS: &[(&str, &str)] = &[
    ("rm -rf /", "This would destroy the entire system"),
    ("rm -rf /*", "This would destroy the entire system"),
    ("find /", "Use a specific directory path instead of the filesystem root"),
    ("grep -r /", "Use a specific directory path instead of the filesystem root"),
    ("grep -rn /", "Use a specific directory path instead of the filesystem root"),
    ("ls -laR /", "Use a specific directory path instead of the filesystem root"),
    ("du -sh /", "Use a specific directory path instead of the filesystem root"),
    ("> /dev/", "Writing to device files is blocked"),
    ("dd if=/dev/", "Direct disk operations are blocked"),
];

/// Validate a command against dangerous patterns.
fn validate_command(cmd: &str) -> Result<(), String> {
    let cmd_trimmed = cmd.trim();

    for (pattern, suggestion) in DANGEROUS_PATTERNS {
        if cmd_trimmed.starts_with(pattern) {
            return Err(format!(
                "Blocked dangerous command pattern '{}'. {}",
                pattern, suggestion
            ));
        }
        // Also check for the pattern after common prefixes
        for prefix in ["sudo ", "time ", "nice ", "nohup "] {
            if let Some(after) = cmd_trimmed.strip_prefix(prefix) {
                if after.starts_with(pattern) {
                    return Err(format!(
                        "Blocked dangerous command pattern '{}'. {}",
                        pattern, suggestion
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Sanitize command output to be safe for LLM consumption.
/// Removes binary garbage while preserving valid text.
fn sanitize_output(bytes: &[u8]) -> String {
    let non_printable_count = bytes
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();

    // If more than 10% is non-printable (excluding newlines/tabs), it's likely binary
    if bytes.len() > 100 && non_printable_count > bytes.len() / 10 {
        return format!(
            "[Binary output detected - {} bytes, {}% non-printable]",
            bytes.len(),
            non_printable_count * 100 / bytes.len()
        );
    }

    let text = String::from_utf8_lossy(bytes);
    text.chars()
        .filter(|&c| c == '\n' || c == '\r' || c == '\t' || (c >= ' ' && c != '\u{FFFD}'))
        .collect()
}

/// Simple glob pattern matching for file-name filters (`*.rs`, `test_*`).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }

        match text[pos..].find(part) {
            Some(idx) => {
                if i == 0 && idx != 0 {
                    return false;
                }
                pos += idx + part.len();
            }
            None => return false,
        }
    }

    if !pattern.ends_with('*') && !parts.last().unwrap().is_empty() {
        return text.ends_with(parts.last().unwrap());
    }

    true
}

/// The workspace the orchestrator operates on.
pub struct Workspace {
    root: PathBuf,
    approval: ApprovalPolicy,
    pending: RwLock<HashMap<String, PendingChange>>,
    command_timeout: Duration,
}

impl Workspace {
    /// Create a workspace rooted at `root` that approves all writes.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_approval(root, ApprovalPolicy::ApproveAll)
    }

    /// Create a workspace with an explicit approval policy.
    pub fn with_approval(root: impl Into<PathBuf>, approval: ApprovalPolicy) -> Self {
        Self {
            root: root.into(),
            approval,
            pending: RwLock::new(HashMap::new()),
            command_timeout: Duration::from_secs(60),
        }
    }

    /// The workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the workspace root.
    /// Absolute paths are used as-is (escape hatch).
    fn resolve(&self, path_str: &str) -> PathBuf {
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Read a file's contents.
    pub async fn read(&self, path: &str) -> WorkspaceOutcome {
        let resolved = self.resolve(path);

        let bytes = match tokio::fs::read(&resolved).await {
            Ok(b) => b,
            Err(e) => {
                return WorkspaceOutcome::failed(format!(
                    "Cannot read {}: {}",
                    resolved.display(),
                    e
                ))
            }
        };

        match String::from_utf8(bytes) {
            Ok(text) => WorkspaceOutcome::ok(text),
            Err(_) => WorkspaceOutcome::failed(format!(
                "Binary file detected: {} - cannot display content",
                resolved.display()
            )),
        }
    }

    /// Write content to a file, creating parent directories as needed.
    ///
    /// With `needs_confirmation` the change goes through the pending-change
    /// registry and the approval policy; a decline comes back as
    /// `success = false`, which callers must treat as result data.
    pub async fn write(&self, path: &str, content: &str, needs_confirmation: bool) -> WorkspaceOutcome {
        if !needs_confirmation {
            return self.apply_write(path, content).await;
        }

        let change = self.propose_change(path, content).await;

        let approved = match &self.approval {
            ApprovalPolicy::ApproveAll => true,
            ApprovalPolicy::DeclineAll => false,
            ApprovalPolicy::Callback(decide) => decide(&change),
            ApprovalPolicy::Hold => {
                tracing::info!("Write to {} held for confirmation", path);
                return WorkspaceOutcome::failed(format!(
                    "Write to {} is pending user confirmation",
                    path
                ));
            }
        };

        if approved {
            self.accept(path).await
        } else {
            self.reject(path).await;
            tracing::info!("Write to {} declined", path);
            WorkspaceOutcome::failed(format!("Write to {} was declined by the user", path))
        }
    }

    /// Register a proposed change, replacing any earlier proposal for the
    /// same path.
    pub async fn propose_change(&self, path: &str, content: &str) -> PendingChange {
        let change = PendingChange {
            id: Uuid::new_v4(),
            path: path.to_string(),
            content: content.to_string(),
            proposed_at: Utc::now(),
        };
        self.pending
            .write()
            .await
            .insert(path.to_string(), change.clone());
        change
    }

    /// Apply the pending change for `path`, removing it from the registry.
    pub async fn accept(&self, path: &str) -> WorkspaceOutcome {
        let change = self.pending.write().await.remove(path);
        match change {
            Some(change) => self.apply_write(&change.path, &change.content).await,
            None => WorkspaceOutcome::failed(format!("No pending change for {}", path)),
        }
    }

    /// Discard the pending change for `path`. Returns true if one existed.
    pub async fn reject(&self, path: &str) -> bool {
        self.pending.write().await.remove(path).is_some()
    }

    /// List proposed changes awaiting confirmation, oldest first.
    pub async fn list_pending(&self) -> Vec<PendingChange> {
        let mut changes: Vec<PendingChange> = self.pending.read().await.values().cloned().collect();
        changes.sort_by_key(|c| c.proposed_at);
        changes
    }

    async fn apply_write(&self, path: &str, content: &str) -> WorkspaceOutcome {
        let resolved = self.resolve(path);

        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return WorkspaceOutcome::failed(format!(
                    "Cannot create {}: {}",
                    parent.display(),
                    e
                ));
            }
        }

        match tokio::fs::write(&resolved, content).await {
            Ok(()) => WorkspaceOutcome::ok(format!(
                "Wrote {} bytes to {}",
                content.len(),
                resolved.display()
            )),
            Err(e) => {
                WorkspaceOutcome::failed(format!("Cannot write {}: {}", resolved.display(), e))
            }
        }
    }

    /// List the entries of a directory, directories suffixed with `/`.
    pub async fn list(&self, path: &str) -> WorkspaceOutcome {
        let resolved = self.resolve(path);

        if !resolved.is_dir() {
            return WorkspaceOutcome::failed(format!("Not a directory: {}", resolved.display()));
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&resolved).max_depth(1).sort_by_file_name();

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if entry.depth() == 0 {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let suffix = if entry.path().is_dir() { "/" } else { "" };
            entries.push(format!("{}{}", name, suffix));
        }

        if entries.is_empty() {
            WorkspaceOutcome::ok("Directory is empty")
        } else {
            WorkspaceOutcome::ok(entries.join("\n"))
        }
    }

    /// Search file contents for a regex pattern, optionally filtered by a
    /// file-name glob. Results are `path:line: text`, capped at 100 matches.
    pub async fn search(&self, query: &str, file_pattern: Option<&str>) -> WorkspaceOutcome {
        // Invalid regex degrades to a literal search rather than failing
        let regex = match regex::Regex::new(query) {
            Ok(r) => r,
            Err(_) => match regex::Regex::new(&regex::escape(query)) {
                Ok(r) => r,
                Err(e) => return WorkspaceOutcome::failed(format!("Invalid pattern: {}", e)),
            },
        };

        let root = self.root.clone();
        let file_pattern = file_pattern.map(|p| p.to_lowercase());

        let result = tokio::task::spawn_blocking(move || {
            let mut matches = Vec::new();

            'files: for entry in WalkDir::new(&root)
                .into_iter()
                .filter_entry(|e| {
                    // Skip VCS and build output directories
                    let name = e.file_name().to_string_lossy();
                    !(e.path().is_dir() && (name == ".git" || name == "target" || name == "node_modules"))
                })
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }

                if let Some(ref pattern) = file_pattern {
                    let name = entry.file_name().to_string_lossy().to_lowercase();
                    if !glob_match(pattern, &name) {
                        continue;
                    }
                }

                let Ok(content) = std::fs::read_to_string(entry.path()) else {
                    continue; // binary or unreadable
                };

                let display = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .display()
                    .to_string();

                for (line_no, line) in content.lines().enumerate() {
                    if regex.is_match(line) {
                        matches.push(format!("{}:{}: {}", display, line_no + 1, line.trim_end()));
                        if matches.len() >= 100 {
                            matches.push("... (results truncated, showing first 100)".to_string());
                            break 'files;
                        }
                    }
                }
            }

            matches
        })
        .await;

        match result {
            Ok(matches) if matches.is_empty() => {
                WorkspaceOutcome::ok(format!("No matches found for pattern: {}", query))
            }
            Ok(matches) => WorkspaceOutcome::ok(matches.join("\n")),
            Err(e) => WorkspaceOutcome::failed(format!("Search failed: {}", e)),
        }
    }

    /// Run a shell command in the workspace root.
    pub async fn run_command(&self, command: &str) -> WorkspaceOutcome {
        if let Err(msg) = validate_command(command) {
            tracing::warn!("Blocked dangerous command: {}", command);
            return WorkspaceOutcome::failed(msg);
        }

        tracing::info!("Executing command in {:?}: {}", self.root, command);

        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("/bin/sh", "-c")
        };

        let output = match tokio::time::timeout(
            self.command_timeout,
            Command::new(shell)
                .arg(shell_arg)
                .arg(command)
                .current_dir(&self.root)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return WorkspaceOutcome::failed(format!("Failed to execute command: {}", e))
            }
            Err(_) => {
                return WorkspaceOutcome::failed(format!(
                    "Command timed out after {} seconds",
                    self.command_timeout.as_secs()
                ))
            }
        };

        let stdout = sanitize_output(&output.stdout);
        let stderr = sanitize_output(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let mut result = format!("Exit code: {}\n", exit_code);
        if !stdout.is_empty() {
            result.push_str("\n--- stdout ---\n");
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            result.push_str("\n--- stderr ---\n");
            result.push_str(&stderr);
        }

        if result.len() > 10_000 {
            let mut cut = 10_000;
            while !result.is_char_boundary(cut) {
                cut -= 1;
            }
            result.truncate(cut);
            result.push_str("\n... [output truncated]");
        }

        WorkspaceOutcome::ok(result)
    }
}
