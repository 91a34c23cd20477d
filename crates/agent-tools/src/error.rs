//! Error Types for Agent Tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolsError>;

#[derive(Error, Debug)]
pub enum ToolsError {
    #[error("Timeout after {secs}s connecting to Ollama API at {url}.")]
    OllamaTimeout { secs: u64, url: String },

    #[error("Connection refused by Ollama API at {0}. Is Ollama running and accessible?")]
    OllamaUnreachable(String),

    #[error("Ollama API request failed with status {status}. Detail: {detail}")]
    OllamaStatus { status: u16, detail: String },

    #[error("Could not decode JSON response from Ollama API: {0}")]
    OllamaDecode(String),

    #[error("Unexpected error with the Ollama API request: {0}")]
    OllamaRequest(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Query did not finish within {0}s")]
    QueryTimeout(u64),

    #[error("duckdb exited with {status}: {stderr}")]
    QueryFailed { status: String, stderr: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ToolsError> for AgentError {
    fn from(err: ToolsError) -> Self {
        match err {
            ToolsError::Config(msg) => AgentError::Config(msg),
            ToolsError::InvalidIdentifier(_) | ToolsError::InvalidArgument(_) => {
                AgentError::ToolValidation(err.to_string())
            }
            other => AgentError::ToolExecution(other.to_string()),
        }
    }
}
