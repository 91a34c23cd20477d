//! Chat-completion Provider
//!
//! One adapter for the OpenAI `/chat/completions` wire format, used both for
//! OpenAI itself and for Ollama's OpenAI-compatible `/v1` endpoint.

use std::time::Duration;

use agent_core::provider::{synthesize_call_id, tool_call_from_loose};
use agent_core::{
    AgentError, ContentBlock, LlmProvider, NetworkError, RawResponse, Result, Role, ToolSpec, Turn,
    TurnRequest,
};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::{self, DEFAULT_TIMEOUT_SECS};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Which server speaks the chat-completion format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatFlavor {
    OpenAi,
    Ollama,
}

/// Chat-completion provider configuration
#[derive(Clone, Debug)]
pub struct ChatCompletionConfig {
    pub flavor: ChatFlavor,

    /// Bearer token; Ollama needs none
    pub api_key: Option<String>,

    /// API root including the version segment, e.g. `https://api.openai.com/v1`
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ChatCompletionConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            flavor: ChatFlavor::OpenAi,
            api_key: Some(api_key.into()),
            base_url: OPENAI_BASE_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Ollama server root (e.g. `http://localhost:11434`); `/v1` is appended
    pub fn ollama(server_url: &str) -> Self {
        Self {
            flavor: ChatFlavor::Ollama,
            api_key: None,
            base_url: format!("{}/v1", http::trim_base(server_url)),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// `OPENAI_API_KEY` (required) and `OPENAI_BASE_URL`
    pub fn openai_from_env() -> Result<Self> {
        let mut config = Self::openai(http::required_env("OPENAI_API_KEY")?);
        if let Some(base_url) = http::optional_env("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    /// `OLLAMA_BASE_URL`, defaulting to the local server
    pub fn ollama_from_env() -> Self {
        let server = http::optional_env("OLLAMA_BASE_URL").unwrap_or_else(|| OLLAMA_BASE_URL.into());
        Self::ollama(&server)
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

impl Default for ChatCompletionConfig {
    fn default() -> Self {
        Self::ollama(OLLAMA_BASE_URL)
    }
}

/// Chat-completion provider
pub struct ChatCompletionProvider {
    client: reqwest::Client,
    config: ChatCompletionConfig,
    headers: HeaderMap,
}

impl ChatCompletionProvider {
    /// Create from configuration
    pub fn from_config(config: ChatCompletionConfig) -> Result<Self> {
        if config.flavor == ChatFlavor::OpenAi && config.api_key.is_none() {
            return Err(AgentError::Config("OpenAI requires an API key".into()));
        }
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(AUTHORIZATION, http::credential_header(&format!("Bearer {key}"))?);
        }
        Ok(Self {
            client: http::build_client(Duration::from_secs(config.timeout_secs))?,
            config,
            headers,
        })
    }

    pub fn config(&self) -> &ChatCompletionConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", http::trim_base(&self.config.base_url))
    }

    /// Build the request body for one turn
    pub fn build_request(&self, request: &TurnRequest<'_>) -> Value {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        if let Some(system) = request.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        for turn in request.history {
            self.push_turn(&mut messages, turn);
        }

        let mut body = json!({
            "model": request.model(),
            "messages": messages,
            "max_tokens": request.options.max_tokens,
        });
        if let Some(temp) = request.options.temperature {
            body["temperature"] = Value::from(temp);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(map_tool).collect());
            body["tool_choice"] = Value::from("auto");
        }
        body
    }

    fn push_turn(&self, messages: &mut Vec<Value>, turn: &Turn) {
        match turn.role {
            Role::User => {
                messages.push(json!({ "role": "user", "content": turn.joined_text().unwrap_or_default() }));
            }
            Role::Assistant => {
                let mut message = json!({
                    "role": "assistant",
                    "content": turn.joined_text(),
                });
                let calls: Vec<Value> = turn
                    .tool_calls()
                    .map(|call| {
                        let arguments = match (self.config.flavor, &call.malformed_arguments) {
                            // Ollama re-parses the arguments and rejects invalid JSON
                            (ChatFlavor::Ollama, Some(_)) => "{}".to_string(),
                            _ => call.arguments_json(),
                        };
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": { "name": call.tool_name, "arguments": arguments },
                        })
                    })
                    .collect();
                if !calls.is_empty() {
                    message["tool_calls"] = Value::Array(calls);
                }
                messages.push(message);
            }
            Role::ToolResult => {
                for result in turn.tool_results_iter() {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": result.tool_call_id,
                        "content": result.content,
                    }));
                }
            }
        }
    }
}

fn map_tool(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.json_schema(),
        }
    })
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    /// Missing or `null` on plain text answers
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    /// Object or JSON-encoded string, depending on the server
    #[serde(default)]
    arguments: Value,
}

#[async_trait]
impl LlmProvider for ChatCompletionProvider {
    fn name(&self) -> &str {
        match self.config.flavor {
            ChatFlavor::OpenAi => "openai",
            ChatFlavor::Ollama => "ollama",
        }
    }

    async fn send_turn(&self, request: TurnRequest<'_>) -> std::result::Result<RawResponse, NetworkError> {
        let body = self.build_request(&request);
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
        let response: ChatResponse = http::decode_envelope(raw)?;
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| NetworkError::malformed("response has no choices"))?;

        let tool_calls = message.tool_calls.unwrap_or_default();
        let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
        if let Some(text) = message.content {
            blocks.push(ContentBlock::text(text));
        }
        for call in tool_calls {
            let id = call.id.filter(|id| !id.is_empty()).unwrap_or_else(synthesize_call_id);
            blocks.push(ContentBlock::ToolCallRequest(tool_call_from_loose(
                id,
                call.function.name,
                &call.function.arguments,
            )));
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{GenerationOptions, NetworkErrorKind, ToolCallRequest, ToolCallResult};

    fn openai() -> ChatCompletionProvider {
        ChatCompletionProvider::from_config(ChatCompletionConfig::openai("sk-test")).unwrap()
    }

    fn ollama() -> ChatCompletionProvider {
        ChatCompletionProvider::from_config(ChatCompletionConfig::ollama("http://localhost:11434/")).unwrap()
    }

    fn history_with_call(call: ToolCallRequest) -> Vec<Turn> {
        let id = call.id.clone();
        vec![
            Turn::user("Count the users"),
            Turn::assistant(vec![ContentBlock::text("Checking."), ContentBlock::ToolCallRequest(call)]),
            Turn::tool_results(vec![ToolCallResult::success(id, "42")]),
        ]
    }

    #[test]
    fn ollama_config_appends_v1() {
        assert_eq!(ollama().config().base_url, "http://localhost:11434/v1");
        assert_eq!(ollama().name(), "ollama");
    }

    #[test]
    fn openai_without_key_is_rejected() {
        let mut config = ChatCompletionConfig::openai("x");
        config.api_key = None;
        assert!(ChatCompletionProvider::from_config(config).is_err());
    }

    #[test]
    fn messages_are_flattened_with_system_first() {
        let mut args = agent_core::Arguments::new();
        args.insert("sql_query".into(), json!("SELECT count(*) FROM users"));
        let history = history_with_call(ToolCallRequest::new("call_1", "run_test_sql_query", args));
        let tools = vec![ToolSpec::new("list_tables", "List tables")];
        let options = GenerationOptions {
            model: "gpt-4o-mini".into(),
            ..Default::default()
        };
        let request = TurnRequest::new(&history, &tools, &options).with_system_prompt(Some("sys"));

        let body = openai().build_request(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["content"], "Checking.");
        let call = &messages[2]["tool_calls"][0];
        assert_eq!(call["function"]["name"], "run_test_sql_query");
        let args: Value = serde_json::from_str(call["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["sql_query"], "SELECT count(*) FROM users");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "list_tables");
    }

    #[test]
    fn tools_omitted_when_registry_is_empty() {
        let history = vec![Turn::user("hi")];
        let options = GenerationOptions::default();
        let body = openai().build_request(&TurnRequest::new(&history, &[], &options));
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn malformed_arguments_are_echoed_verbatim() {
        let call = ToolCallRequest::malformed("call_x", "run_final_sql_query", "{not valid json", "eof");
        let history = history_with_call(call);
        let options = GenerationOptions::default();

        let body = openai().build_request(&TurnRequest::new(&history, &[], &options));
        assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["arguments"], "{not valid json");

        let body = ollama().build_request(&TurnRequest::new(&history, &[], &options));
        assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["arguments"], "{}");
    }

    #[test]
    fn ollama_request_has_no_native_options() {
        let history = vec![Turn::user("hi")];
        let options = GenerationOptions {
            temperature: Some(0.2),
            ..Default::default()
        };
        let body = ollama().build_request(&TurnRequest::new(&history, &[], &options));
        assert!(body.get("options").is_none());
        assert_eq!(body["max_tokens"], 2048);
    }

    #[test]
    fn null_tool_calls_is_a_plain_answer() {
        let raw = RawResponse::new(json!({
            "choices": [{"message": {"role": "assistant", "content": "The answer is 4.", "tool_calls": null}}]
        }));
        let blocks = openai().normalize_response(raw).unwrap();
        assert_eq!(blocks, vec![ContentBlock::text("The answer is 4.")]);
    }

    #[test]
    fn key_with_control_characters_is_a_config_error() {
        let err = ChatCompletionProvider::from_config(ChatCompletionConfig::openai("sk-\r\nx")).err().unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn normalize_decodes_string_and_object_arguments() {
        let raw = RawResponse::new(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {"id": "call_a", "type": "function",
                     "function": {"name": "describe_table", "arguments": "{\"table_name\": \"users\"}"}},
                    {"type": "function",
                     "function": {"name": "list_tables", "arguments": {"reasoning": "start"}}}
                ]
            }}]
        }));

        let blocks = ollama().normalize_response(raw).unwrap();
        assert_eq!(blocks.len(), 2);
        let first = blocks[0].as_tool_call().unwrap();
        assert_eq!(first.id, "call_a");
        assert_eq!(first.arguments["table_name"], "users");
        let second = blocks[1].as_tool_call().unwrap();
        assert!(second.id.starts_with("call_"));
        assert_eq!(second.arguments["reasoning"], "start");
    }

    #[test]
    fn undecodable_arguments_are_kept_as_malformed() {
        let raw = RawResponse::new(json!({
            "choices": [{"message": {"tool_calls": [
                {"id": "c", "function": {"name": "run_final_sql_query", "arguments": "{not valid json"}}
            ]}}]
        }));
        let blocks = openai().normalize_response(raw).unwrap();
        let call = blocks[0].as_tool_call().unwrap();
        assert_eq!(call.malformed_arguments.as_ref().unwrap().raw, "{not valid json");
    }

    #[test]
    fn round_trip_keeps_name_and_arguments() {
        let raw = RawResponse::new(json!({
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "call_7", "type": "function",
                 "function": {"name": "sample_table",
                              "arguments": "{\"table_name\":\"users\",\"row_sample_size\":3}"}}
            ]}}]
        }));
        let blocks = openai().normalize_response(raw).unwrap();
        let history = vec![Turn::user("x"), Turn::assistant(blocks)];
        let options = GenerationOptions::default();
        let body = openai().build_request(&TurnRequest::new(&history, &[], &options));

        let sent = &body["messages"][1]["tool_calls"][0];
        assert_eq!(sent["id"], "call_7");
        assert_eq!(sent["function"]["name"], "sample_table");
        let args: Value = serde_json::from_str(sent["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args, json!({"table_name": "users", "row_sample_size": 3}));
    }

    #[test]
    fn missing_choices_is_malformed() {
        for body in [json!({"id": "x"}), json!({"choices": []})] {
            let err = openai().normalize_response(RawResponse::new(body)).unwrap_err();
            assert_eq!(err.kind, NetworkErrorKind::MalformedJson);
        }
    }
}
