//! Conversation Turns
//!
//! The provider-neutral conversation model shared by every adapter. A
//! [`Conversation`] only ever grows; turns are never rewritten once appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Argument map carried by a tool call
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Role of a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// User input
    User,
    /// Backend (LLM) response
    Assistant,
    /// Results of the tool calls requested in the preceding assistant turn
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::ToolResult => write!(f, "tool-result"),
        }
    }
}

/// Argument payload the backend sent but that could not be decoded
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedArguments {
    /// Payload exactly as received
    pub raw: String,
    /// Decoder diagnostic
    pub reason: String,
}

/// Tool invocation requested by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call identifier, echoed back by the matching result
    pub id: String,

    /// Registered tool name
    pub tool_name: String,

    /// Decoded arguments (empty when `malformed_arguments` is set)
    #[serde(default)]
    pub arguments: Arguments,

    /// Present when the arguments arrived in an undecodable form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malformed_arguments: Option<MalformedArguments>,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
            malformed_arguments: None,
        }
    }

    /// A request whose argument payload failed to decode
    pub fn malformed(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments: Arguments::new(),
            malformed_arguments: Some(MalformedArguments {
                raw: raw.into(),
                reason: reason.into(),
            }),
        }
    }

    /// Arguments serialized the way chat-style backends expect them
    pub fn arguments_json(&self) -> String {
        match &self.malformed_arguments {
            Some(bad) => bad.raw.clone(),
            None => serde_json::Value::Object(self.arguments.clone()).to_string(),
        }
    }
}

/// Outcome of one tool call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Identifier of the request this answers
    pub tool_call_id: String,

    /// Handler output or diagnostic text
    pub content: String,

    /// Whether `content` describes a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// A tagged piece of a turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { value: String },
    ToolCallRequest(ToolCallRequest),
    ToolCallResult(ToolCallResult),
}

impl ContentBlock {
    pub fn text(value: impl Into<String>) -> Self {
        ContentBlock::Text {
            value: value.into(),
        }
    }

    /// Text content, if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { value } => Some(value),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallRequest> {
        match self {
            ContentBlock::ToolCallRequest(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolCallResult> {
        match self {
            ContentBlock::ToolCallResult(result) => Some(result),
            _ => None,
        }
    }
}

/// One appended unit of conversation history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            blocks,
            timestamp: Utc::now(),
        }
    }

    /// A user turn holding a single text block
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, blocks)
    }

    /// A tool-result turn answering a batch of calls
    pub fn tool_results(results: Vec<ToolCallResult>) -> Self {
        Self::new(
            Role::ToolResult,
            results.into_iter().map(ContentBlock::ToolCallResult).collect(),
        )
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRequest> {
        self.blocks.iter().filter_map(ContentBlock::as_tool_call)
    }

    pub fn tool_results_iter(&self) -> impl Iterator<Item = &ToolCallResult> {
        self.blocks.iter().filter_map(ContentBlock::as_tool_result)
    }

    /// Non-empty (after trimming) text segments
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .filter_map(ContentBlock::as_text)
            .filter(|t| !t.trim().is_empty())
    }

    /// All non-empty text segments joined by newlines
    pub fn joined_text(&self) -> Option<String> {
        let parts: Vec<&str> = self.texts().collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Append-only conversation history
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation with the user's initial prompt
    pub fn with_user_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.append(Turn::user(prompt));
        conv
    }

    /// Append a turn; earlier turns are never touched
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Full ordered history
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Text of the last assistant turn, if it has any
    pub fn final_text(&self) -> Option<String> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .and_then(Turn::joined_text)
    }

    /// Tool calls of the last turn that have not been answered yet
    pub fn pending_tool_calls(&self) -> Vec<&ToolCallRequest> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::Assistant => turn.tool_calls().collect(),
            _ => Vec::new(),
        }
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Find the tool name for a result at `turn_index` in a raw turn slice.
///
/// Backends that key results by function name rather than call id need this.
pub fn tool_name_for_result<'a>(
    history: &'a [Turn],
    turn_index: usize,
    tool_call_id: &str,
) -> Option<&'a str> {
    history[..turn_index.min(history.len())]
        .iter()
        .rev()
        .find(|t| t.role == Role::Assistant)
        .and_then(|t| t.tool_calls().find(|c| c.id == tool_call_id))
        .map(|c| c.tool_name.as_str())
}
