//! Anthropic Messages API Provider
//!
//! Implementation of `LlmProvider` for Claude models with native tool use.
//!
//! Reference: <https://docs.anthropic.com/en/api/messages>

use std::time::Duration;

use agent_core::provider::{synthesize_call_id, tool_call_from_loose};
use agent_core::{
    ContentBlock, LlmProvider, NetworkError, RawResponse, Result, Role, ToolSpec, Turn, TurnRequest,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::{self, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

/// Anthropic provider configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: String,

    /// API root, without the `/v1/messages` suffix
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// `ANTHROPIC_API_KEY` (required) and `ANTHROPIC_BASE_URL`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(http::required_env("ANTHROPIC_API_KEY")?);
        if let Some(base_url) = http::optional_env("ANTHROPIC_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Anthropic Messages provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
    headers: HeaderMap,
}

impl AnthropicProvider {
    /// Create from configuration
    pub fn from_config(config: AnthropicConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", http::credential_header(&config.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(Self {
            client: http::build_client(Duration::from_secs(config.timeout_secs))?,
            config,
            headers,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(AnthropicConfig::from_env()?)
    }

    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", http::trim_base(&self.config.base_url))
    }

    /// Build the request body for one turn
    pub fn build_request(request: &TurnRequest<'_>) -> Value {
        let mut body = json!({
            "model": request.model(),
            "max_tokens": request.options.max_tokens,
            "messages": map_messages(request.history),
        });

        if let Some(system) = request.system_prompt {
            body["system"] = Value::from(system);
        }
        if let Some(temp) = request.options.temperature {
            body["temperature"] = Value::from(temp);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(map_tool).collect());
            body["tool_choice"] = json!({ "type": "auto" });
        }
        body
    }
}

fn map_tool(spec: &ToolSpec) -> Value {
    json!({
        "name": spec.name,
        "description": spec.description,
        "input_schema": spec.json_schema(),
    })
}

fn map_messages(history: &[Turn]) -> Vec<Value> {
    history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::Assistant => "assistant",
                // tool results travel in a user message
                Role::User | Role::ToolResult => "user",
            };
            let content: Vec<Value> = turn.blocks.iter().filter_map(map_block).collect();
            json!({ "role": role, "content": content })
        })
        .collect()
}

fn map_block(block: &ContentBlock) -> Option<Value> {
    match block {
        // the API rejects empty text blocks
        ContentBlock::Text { value } if value.trim().is_empty() => None,
        ContentBlock::Text { value } => Some(json!({ "type": "text", "text": value })),
        ContentBlock::ToolCallRequest(call) => Some(json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.tool_name,
            "input": Value::Object(call.arguments.clone()),
        })),
        ContentBlock::ToolCallResult(result) => {
            let mut block = json!({
                "type": "tool_result",
                "tool_use_id": result.tool_call_id,
                "content": result.content,
            });
            if result.is_error {
                block["is_error"] = Value::Bool(true);
            }
            Some(block)
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Value,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send_turn(&self, request: TurnRequest<'_>) -> std::result::Result<RawResponse, NetworkError> {
        let body = Self::build_request(&request);
        http::post_json(
            &self.client,
            &self.endpoint(),
            self.headers.clone(),
            &body,
            Duration::from_secs(self.config.timeout_secs),
        )
        .await
    }

    fn normalize_response(&self, raw: RawResponse) -> std::result::Result<Vec<ContentBlock>, NetworkError> {
        let response: MessagesResponse = http::decode_envelope(raw)?;

        let mut blocks = Vec::with_capacity(response.content.len());
        for block in response.content {
            match block.kind.as_str() {
                "text" => blocks.push(ContentBlock::text(block.text.unwrap_or_default())),
                "tool_use" => {
                    let name = block
                        .name
                        .ok_or_else(|| NetworkError::malformed("tool_use block without a name"))?;
                    let id = block.id.unwrap_or_else(synthesize_call_id);
                    blocks.push(ContentBlock::ToolCallRequest(tool_call_from_loose(id, name, &block.input)));
                }
                other => tracing::debug!(kind = other, "Ignoring content block"),
            }
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{GenerationOptions, ParamType, ParameterSpec, ToolCallRequest, ToolCallResult};

    fn provider() -> AnthropicProvider {
        AnthropicProvider::from_config(AnthropicConfig::new("sk-test")).unwrap()
    }

    #[test]
    fn key_with_control_characters_is_rejected_up_front() {
        let err = AnthropicProvider::from_config(AnthropicConfig::new("sk-\nx")).err().unwrap();
        assert!(matches!(err, agent_core::AgentError::Config(_)));
    }

    #[test]
    fn request_carries_system_tools_and_choice() {
        let history = vec![Turn::user("List the tables")];
        let tools = vec![ToolSpec::new("list_tables", "List tables")
            .param(ParameterSpec::required("reasoning", ParamType::String, "Why"))];
        let options = GenerationOptions::default();
        let request = TurnRequest::new(&history, &tools, &options).with_system_prompt(Some("Be brief"));

        let body = AnthropicProvider::build_request(&request);
        assert_eq!(body["model"], "claude-3-haiku-20240307");
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["system"], "Be brief");
        assert_eq!(body["tool_choice"]["type"], "auto");
        assert_eq!(body["tools"][0]["input_schema"]["required"][0], "reasoning");
        assert_eq!(body["messages"][0]["content"][0]["text"], "List the tables");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn tool_results_are_sent_as_user_blocks() {
        let mut args = agent_core::Arguments::new();
        args.insert("prompt".into(), json!("hi"));
        let history = vec![
            Turn::user("go"),
            Turn::assistant(vec![
                ContentBlock::text(""),
                ContentBlock::ToolCallRequest(ToolCallRequest::new("toolu_1", "run_ollama_generate", args)),
            ]),
            Turn::tool_results(vec![ToolCallResult::error("toolu_1", "Error: timeout")]),
        ];
        let options = GenerationOptions::default();
        let body = AnthropicProvider::build_request(&TurnRequest::new(&history, &[], &options));

        let assistant = &body["messages"][1];
        assert_eq!(assistant["role"], "assistant");
        assert_eq!(assistant["content"].as_array().unwrap().len(), 1);
        assert_eq!(assistant["content"][0]["input"]["prompt"], "hi");

        let results = &body["messages"][2];
        assert_eq!(results["role"], "user");
        assert_eq!(results["content"][0]["type"], "tool_result");
        assert_eq!(results["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(results["content"][0]["is_error"], true);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn normalize_preserves_order_and_ignores_unknown_blocks() {
        let raw = RawResponse::new(json!({
            "id": "msg_1",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Delegating."},
                {"type": "tool_use", "id": "toolu_9", "name": "run_ollama_generate",
                 "input": {"model_name": "llama3", "prompt": "Hi"}}
            ],
            "stop_reason": "tool_use"
        }));

        let blocks = provider().normalize_response(raw).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].as_text(), Some("Delegating."));
        let call = blocks[1].as_tool_call().unwrap();
        assert_eq!(call.id, "toolu_9");
        assert_eq!(call.tool_name, "run_ollama_generate");
        assert_eq!(call.arguments["model_name"], "llama3");
    }

    #[test]
    fn missing_content_is_malformed() {
        let err = provider()
            .normalize_response(RawResponse::new(json!({"type": "error"})))
            .unwrap_err();
        assert_eq!(err.kind, agent_core::NetworkErrorKind::MalformedJson);
    }

    #[test]
    fn round_trip_keeps_name_and_arguments() {
        let raw = RawResponse::new(json!({
            "content": [{"type": "tool_use", "id": "toolu_2", "name": "sample_table",
                         "input": {"table_name": "users", "row_sample_size": 3}}]
        }));
        let blocks = provider().normalize_response(raw).unwrap();
        let history = vec![Turn::user("x"), Turn::assistant(blocks)];
        let options = GenerationOptions::default();
        let body = AnthropicProvider::build_request(&TurnRequest::new(&history, &[], &options));

        let sent = &body["messages"][1]["content"][0];
        assert_eq!(sent["name"], "sample_table");
        assert_eq!(sent["input"], json!({"table_name": "users", "row_sample_size": 3}));
    }
}
