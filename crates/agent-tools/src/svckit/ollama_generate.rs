//! Ollama Delegation Tool
//!
//! Hands a text-generation sub-task to a local Ollama model through
//! `/api/generate` and returns the generated text.

use std::time::Duration;

use agent_core::{ParamType, ParameterSpec, Result as CoreResult, Tool, ToolArgs, ToolHandler, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolsError};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const TIMEOUT_SECS: u64 = 120;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_ctx: i64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Tool for delegating generation to a local Ollama model
pub struct OllamaGenerateTool {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaGenerateTool {
    /// `base_url` is the Ollama server root, e.g. `http://localhost:11434`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolsError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Run one generation request
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        context_window: Option<i64>,
    ) -> Result<String> {
        let url = self.api_url();
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            system: system.filter(|s| !s.trim().is_empty()),
            options: context_window.map(|num_ctx| GenerateOptions { num_ctx }),
        };
        tracing::info!(%url, model, "Delegating to Ollama");

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolsError::OllamaTimeout {
                    secs: self.timeout.as_secs(),
                    url: url.clone(),
                }
            } else if e.is_connect() {
                ToolsError::OllamaUnreachable(url.clone())
            } else {
                ToolsError::OllamaRequest(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(text);
            return Err(ToolsError::OllamaStatus {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ToolsError::OllamaDecode(e.to_string()))?;
        tracing::debug!(model, chars = parsed.response.len(), "Ollama responded");
        Ok(parsed.response)
    }
}

#[async_trait]
impl ToolHandler for OllamaGenerateTool {
    async fn invoke(&self, args: ToolArgs<'_>) -> CoreResult<String> {
        let output = self
            .generate(
                args.str("model_name")?,
                args.str("prompt")?,
                args.opt_str("system_prompt"),
                args.opt_int("context_window"),
            )
            .await?;
        Ok(output)
    }
}

impl Tool for OllamaGenerateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "run_ollama_generate",
            "Delegates text generation to a local Ollama model. Use this for specific local models or tasks requiring local processing.",
        )
        .param(ParameterSpec::required(
            "model_name",
            ParamType::String,
            "The name of the Ollama model (e.g., 'llama3', 'mistral'). Must be available in the local Ollama instance.",
        ))
        .param(ParameterSpec::required("prompt", ParamType::String, "The prompt to send to the Ollama model."))
        .param(ParameterSpec::optional(
            "system_prompt",
            ParamType::String,
            "Optional system prompt for the Ollama model.",
        ))
        .param(ParameterSpec::optional(
            "context_window",
            ParamType::Integer,
            "Optional context window size for the Ollama model.",
        ))
        .param(ParameterSpec::optional(
            "reasoning",
            ParamType::String,
            "Why this sub-task is being delegated",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let tool = OllamaGenerateTool::new("http://localhost:11434/").unwrap();
        assert_eq!(tool.api_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn request_omits_absent_options() {
        let body = GenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
            system: None,
            options: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"model": "llama3", "prompt": "hi", "stream": false}));
    }

    #[test]
    fn spec_requires_model_and_prompt() {
        let spec = OllamaGenerateTool::new(DEFAULT_OLLAMA_URL).unwrap().spec();
        let required: Vec<&str> = spec
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(required, ["model_name", "prompt"]);
    }
}
