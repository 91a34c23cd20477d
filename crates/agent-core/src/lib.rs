//! # agent-core
//!
//! Provider-agnostic tool-calling agent loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │──│    Tool     │──│    ToolRegistry     │  │
//! │  │    Loop     │  │ Dispatcher  │  └─────────────────────┘  │
//! │  │             │  └─────────────┘  ┌─────────────────────┐  │
//! │  │             │───────────────────│   LlmProvider       │  │
//! │  └─────────────┘                   │   (Strategy)        │  │
//! │        │                           └─────────────────────┘  │
//! │   Conversation (append-only turns)                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait hides each backend's wire format behind
//! normalized [`ContentBlock`]s, so the loop is identical for Anthropic,
//! chat-completion and Gemini backends.

pub mod dispatch;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod tool;
pub mod transcript;

pub use dispatch::ToolDispatcher;
pub use error::{AgentError, NetworkError, NetworkErrorKind, Result};
pub use message::{Arguments, ContentBlock, Conversation, Role, ToolCallRequest, ToolCallResult, Turn};
pub use provider::{GenerationOptions, LlmProvider, RawResponse, TurnRequest};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, LoopState, RunOutcome, TerminationReason};
pub use tool::{ParamType, ParameterSpec, Tool, ToolArgs, ToolHandler, ToolRegistry, ToolSpec};
pub use transcript::{FileTranscriptStore, MemoryTranscriptStore, Transcript, TranscriptId, TranscriptStore};
