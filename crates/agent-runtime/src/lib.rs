//! # agent-runtime
//!
//! Backend adapters for the agent loop.
//!
//! ## Providers
//!
//! - **Anthropic**: Messages API with native tool use
//! - **Chat-completion**: OpenAI `/chat/completions`, also serving Ollama's `/v1`
//! - **Gemini**: `generateContent` with function calling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{ChatCompletionConfig, ChatCompletionProvider};
//!
//! let provider = ChatCompletionProvider::from_config(ChatCompletionConfig::ollama_from_env())?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .model("llama3.1")
//!     .build()?;
//! ```

pub mod anthropic;
pub mod chat;
pub mod gemini;
pub(crate) mod http;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use chat::{ChatCompletionConfig, ChatCompletionProvider, ChatFlavor};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use http::DEFAULT_TIMEOUT_SECS;

// Re-export core types for convenience
pub use agent_core::{Agent, AgentBuilder, AgentError, LlmProvider, NetworkError, Result, ToolRegistry};
