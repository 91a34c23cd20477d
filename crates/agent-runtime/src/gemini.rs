//! Gemini Provider
//!
//! Implementation of `LlmProvider` for the Gemini `generateContent` API with
//! function calling.

use std::time::Duration;

use agent_core::message::tool_name_for_result;
use agent_core::provider::{synthesize_call_id, tool_call_from_loose};
use agent_core::{
    ContentBlock, LlmProvider, NetworkError, RawResponse, Result, Role, ToolSpec, Turn, TurnRequest,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::{self, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,

    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// `GEMINI_API_KEY` (required) and `GEMINI_BASE_URL`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(http::required_env("GEMINI_API_KEY")?);
        if let Some(base_url) = http::optional_env("GEMINI_BASE_URL") {
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

/// Gemini provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
    headers: HeaderMap,
}

impl GeminiProvider {
    /// Create from configuration
    pub fn from_config(config: GeminiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", http::credential_header(&config.api_key)?);
        Ok(Self {
            client: http::build_client(Duration::from_secs(config.timeout_secs))?,
            config,
            headers,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            http::trim_base(&self.config.base_url)
        )
    }

    /// Build the request body for one turn
    pub fn build_request(request: &TurnRequest<'_>) -> Value {
        let contents: Vec<Value> = request
            .history
            .iter()
            .enumerate()
            .map(|(index, turn)| map_turn(request.history, index, turn))
            .collect();

        let mut generation = json!({ "maxOutputTokens": request.options.max_tokens });
        if let Some(temp) = request.options.temperature {
            generation["temperature"] = Value::from(temp);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if let Some(system) = request.system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request.tools.iter().map(map_tool).collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
            body["toolConfig"] = json!({ "functionCallingConfig": { "mode": "AUTO" } });
        }
        body
    }
}

fn map_turn(history: &[Turn], index: usize, turn: &Turn) -> Value {
    let role = match turn.role {
        Role::Assistant => "model",
        Role::User | Role::ToolResult => "user",
    };
    let parts: Vec<Value> = turn
        .blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { value } if value.trim().is_empty() => None,
            ContentBlock::Text { value } => Some(json!({ "text": value })),
            ContentBlock::ToolCallRequest(call) => Some(json!({
                "functionCall": {
                    "name": call.tool_name,
                    "args": Value::Object(call.arguments.clone()),
                }
            })),
            ContentBlock::ToolCallResult(result) => {
                // responses are matched by function name, not call id
                let name = tool_name_for_result(history, index, &result.tool_call_id).unwrap_or("unknown");
                let key = if result.is_error { "error" } else { "content" };
                Some(json!({
                    "functionResponse": {
                        "name": name,
                        "response": { key: result.content },
                    }
                }))
            }
        })
        .collect();
    json!({ "role": role, "parts": parts })
}

/// Gemini expects OpenAPI-style upper-case type names
fn map_tool(spec: &ToolSpec) -> Value {
    let mut declaration = json!({
        "name": spec.name,
        "description": spec.description,
    });
    if !spec.parameters.is_empty() {
        let mut schema = spec.json_schema();
        schema["type"] = Value::from("OBJECT");
        if let Some(properties) = schema["properties"].as_object_mut() {
            for property in properties.values_mut() {
                let upper = property["type"].as_str().map(str::to_uppercase);
                if let Some(upper) = upper {
                    property["type"] = Value::from(upper);
                }
            }
        }
        declaration["parameters"] = schema;
    }
    declaration
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    /// Absent when the candidate was blocked
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send_turn(&self, request: TurnRequest<'_>) -> std::result::Result<RawResponse, NetworkError> {
        let body = Self::build_request(&request);
        http::post_json(
            &self.client,
            &self.endpoint(request.model()),
            self.headers.clone(),
            &body,
            Duration::from_secs(self.config.timeout_secs),
        )
        .await
    }

    fn normalize_response(&self, raw: RawResponse) -> std::result::Result<Vec<ContentBlock>, NetworkError> {
        let response: GenerateResponse = http::decode_envelope(raw)?;
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| NetworkError::malformed("response has no candidates"))?;

        let Some(content) = candidate.content else {
            tracing::warn!(finish_reason = ?candidate.finish_reason, "Candidate has no content");
            return Ok(Vec::new());
        };

        let mut blocks = Vec::with_capacity(content.parts.len());
        for part in content.parts {
            if let Some(text) = part.text {
                blocks.push(ContentBlock::text(text));
            }
            if let Some(call) = part.function_call {
                let id = call.id.filter(|id| !id.is_empty()).unwrap_or_else(synthesize_call_id);
                blocks.push(ContentBlock::ToolCallRequest(tool_call_from_loose(id, call.name, &call.args)));
            }
        }
        Ok(blocks)
    }
}
