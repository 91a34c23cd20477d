//! LLM Provider Strategy Pattern
//!
//! Every backend is reached through [`LlmProvider`]: `send_turn` serializes
//! the conversation and tool declarations into one request, and
//! `normalize_response` maps whatever the backend returned onto
//! [`ContentBlock`]s. Everything downstream of the adapter only sees the
//! normalized form.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationOptions, LlmProvider, TurnRequest};
//!
//! let request = TurnRequest::new(conversation.snapshot(), &specs, &options);
//! let raw = provider.send_turn(request).await?;
//! let blocks = provider.normalize_response(raw)?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NetworkError;
use crate::message::{Arguments, ContentBlock, ToolCallRequest, Turn};
use crate::tool::ToolSpec;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "claude-3-haiku-20240307", "gpt-4o-mini", "llama3.1")
    pub model: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for sampling; backend default when unset
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".into(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

/// Everything an adapter needs for one request
#[derive(Clone, Copy, Debug)]
pub struct TurnRequest<'a> {
    /// Conversation so far, oldest first
    pub history: &'a [Turn],

    /// Tools the backend may call
    pub tools: &'a [ToolSpec],

    /// System prompt, sent the way the backend expects it
    pub system_prompt: Option<&'a str>,

    pub options: &'a GenerationOptions,
}

impl<'a> TurnRequest<'a> {
    pub fn new(history: &'a [Turn], tools: &'a [ToolSpec], options: &'a GenerationOptions) -> Self {
        Self {
            history,
            tools,
            system_prompt: None,
            options,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<&'a str>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn model(&self) -> &'a str {
        &self.options.model
    }
}

/// Decoded but not yet normalized response body
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub body: Value,
}

impl RawResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short backend name used in logs and transcripts
    fn name(&self) -> &str;

    /// Send the conversation and tool declarations as one request
    async fn send_turn(&self, request: TurnRequest<'_>) -> Result<RawResponse, NetworkError>;

    /// Map a backend response onto content blocks, preserving block order
    fn normalize_response(&self, raw: RawResponse) -> Result<Vec<ContentBlock>, NetworkError>;
}

/// Decode tool arguments that may arrive as an object or a JSON-encoded string.
///
/// Returns the raw payload and a reason when decoding fails, so the caller can
/// record a malformed request instead of dropping it.
pub fn decode_arguments(value: &Value) -> Result<Arguments, (String, String)> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Arguments::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Arguments::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err((s.clone(), format!("expected a JSON object, got {other}"))),
            Err(e) => Err((s.clone(), e.to_string())),
        },
        other => Err((other.to_string(), format!("expected a JSON object, got {other}"))),
    }
}

/// Build a [`ToolCallRequest`] from loosely typed arguments
pub fn tool_call_from_loose(id: String, name: String, arguments: &Value) -> ToolCallRequest {
    match decode_arguments(arguments) {
        Ok(args) => ToolCallRequest::new(id, name, args),
        Err((raw, reason)) => {
            tracing::warn!(tool = %name, %reason, "Could not decode tool arguments");
            ToolCallRequest::malformed(id, name, raw, reason)
        }
    }
}

/// Fresh identifier for backends that omit call ids
pub fn synthesize_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.max_tokens, 2048);
        assert!(opts.temperature.is_none());
    }

    #[test]
    fn decode_accepts_object_and_encoded_string() {
        let obj = decode_arguments(&json!({"sql_query": "SELECT 1"})).unwrap();
        assert_eq!(obj["sql_query"], "SELECT 1");

        let encoded = decode_arguments(&json!("{\"sql_query\": \"SELECT 1\"}")).unwrap();
        assert_eq!(encoded, obj);

        assert!(decode_arguments(&json!("")).unwrap().is_empty());
        assert!(decode_arguments(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        let (raw, reason) = decode_arguments(&json!("{not valid json")).unwrap_err();
        assert_eq!(raw, "{not valid json");
        assert!(!reason.is_empty());

        let (_, reason) = decode_arguments(&json!("[1, 2]")).unwrap_err();
        assert!(reason.contains("expected a JSON object"));
    }

    #[test]
    fn loose_tool_call_records_malformed_payload() {
        let call = tool_call_from_loose("id".into(), "t".into(), &json!("{oops"));
        assert!(call.malformed_arguments.is_some());
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn synthesized_ids_are_unique() {
        assert_ne!(synthesize_call_id(), synthesize_call_id());
    }
}
