//! Configuration management for codeloom.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `DEFAULT_MODEL` - Optional. The LLM model to use. Defaults to `anthropic/claude-sonnet-4.5`.
//! - `WORKSPACE_PATH` - Optional. The workspace directory. Defaults to the current directory.
//! - `MAX_TOOL_ROUNDS` - Optional. Cap on tool-call rounds per subtask. Defaults to `10`.

use std::path::PathBuf;
use thiserror::Error;

use crate::orchestrator::DEFAULT_MAX_TOOL_ROUNDS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// LLM model identifier (OpenRouter format)
    pub default_model: String,

    /// Workspace directory for file operations
    pub workspace_path: PathBuf,

    /// Maximum tool-call rounds per subtask
    pub max_tool_rounds: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not
    /// set. Checked before any network call is made.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let default_model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| "anthropic/claude-sonnet-4.5".to_string());

        let workspace_path = std::env::var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let max_tool_rounds = match std::env::var("MAX_TOOL_ROUNDS") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| ConfigError::InvalidValue("MAX_TOOL_ROUNDS".to_string(), format!("{}", e)))?,
            Err(_) => DEFAULT_MAX_TOOL_ROUNDS,
        };

        Ok(Self {
            api_key,
            default_model,
            workspace_path,
            max_tool_rounds,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, workspace_path: PathBuf) -> Self {
        Self {
            api_key,
            default_model,
            workspace_path,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}
