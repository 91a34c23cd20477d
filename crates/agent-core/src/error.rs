//! Error Types

use thiserror::Error;

use crate::reasoning::TerminationReason;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Transport-level failure classes for a provider call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Request exceeded its timeout
    Timeout,
    /// Endpoint refused or could not be reached
    ConnectionRefused,
    /// Endpoint answered with a non-success status
    HttpError { status: u16 },
    /// Body could not be decoded, or its envelope has the wrong shape
    MalformedJson,
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionRefused => write!(f, "connection-refused"),
            Self::HttpError { status } => write!(f, "http-error ({status})"),
            Self::MalformedJson => write!(f, "malformed-json"),
        }
    }
}

/// Typed failure of a provider round trip.
///
/// Every failure path of `send_turn` and `normalize_response` resolves to
/// this type; adapters never surface anything else to the loop.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct NetworkError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl NetworkError {
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::Timeout, message)
    }

    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::ConnectionRefused, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::HttpError { status }, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(NetworkErrorKind::MalformedJson, message)
    }
}

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Provider call failed; terminates the loop
    #[error("Provider error at iteration {iteration}: {source}")]
    Provider {
        iteration: usize,
        #[source]
        source: NetworkError,
    },

    /// Iteration budget used up without a final answer
    #[error("Maximum iterations ({max_iterations}) reached without a final answer")]
    BudgetExceeded { max_iterations: usize },

    /// A tool with this name is already registered
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// Tool not found in registry
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Tool arguments could not be decoded into an object
    #[error("malformed arguments for tool '{tool}': {reason}")]
    MalformedToolArguments { tool: String, reason: String },

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Transcript persistence failed
    #[error("Transcript error: {0}")]
    Transcript(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether this error ends an agent run.
    ///
    /// Tool-level errors are recorded as error results and never abort the loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Provider { .. } | AgentError::BudgetExceeded { .. }
        )
    }

    /// Termination reason for errors produced by the loop itself
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        match self {
            AgentError::Provider { .. } => Some(TerminationReason::ProviderError),
            AgentError::BudgetExceeded { .. } => Some(TerminationReason::BudgetExceeded),
            _ => None,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider { source, .. } => match source.kind {
                NetworkErrorKind::Timeout => "The AI service timed out.".into(),
                NetworkErrorKind::ConnectionRefused => {
                    "The AI service could not be reached. Is it running?".into()
                }
                NetworkErrorKind::HttpError { status } => {
                    format!("The AI service rejected the request (HTTP {status}).")
                }
                NetworkErrorKind::MalformedJson => {
                    "The AI service returned a response that could not be understood.".into()
                }
            },
            AgentError::BudgetExceeded { max_iterations } => format!(
                "Reached the maximum of {max_iterations} agent loops without a final answer."
            ),
            AgentError::Config(msg) => format!("Configuration problem: {msg}"),
            AgentError::UnknownTool(name) => format!("The tool '{name}' is not available."),
            AgentError::Transcript(msg) => format!("Transcript problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
