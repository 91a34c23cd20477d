//! Shared HTTP plumbing for the adapters.
//!
//! Every transport failure is classified into a [`NetworkError`] here, so the
//! adapters only deal with building bodies and reading envelopes.

use std::time::Duration;

use agent_core::{AgentError, NetworkError, RawResponse, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))
}

/// Read a required environment variable
pub(crate) fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AgentError::Config(format!("{name} environment variable is not set"))),
    }
}

/// Credential as a sensitive header value; rejected at construction time
pub(crate) fn credential_header(value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| AgentError::Config("API key contains invalid header characters".into()))?;
    header.set_sensitive(true);
    Ok(header)
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Classify a reqwest failure
pub(crate) fn map_reqwest_error(err: &reqwest::Error, timeout: Duration) -> NetworkError {
    if err.is_timeout() {
        NetworkError::timeout(format!("no response within {}s", timeout.as_secs()))
    } else if err.is_decode() {
        NetworkError::malformed(err.to_string())
    } else {
        // connect failures and anything else that never produced a response
        NetworkError::connection_refused(err.to_string())
    }
}

/// Pull a human-readable detail out of an error body.
///
/// Backends report errors as `{"error": "..."}` (Ollama) or
/// `{"error": {"message": "..."}}` (OpenAI, Anthropic, Gemini).
pub(crate) fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| match &v["error"] {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    });
    detail.unwrap_or_else(|| body.trim().to_string())
}

pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> NetworkError {
    NetworkError::http(status.as_u16(), format!("HTTP {status}: {}", error_detail(body)))
}

/// POST a JSON body and decode the JSON reply
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    body: &Value,
    timeout: Duration,
) -> std::result::Result<RawResponse, NetworkError> {
    tracing::debug!(%url, bytes = body.to_string().len(), "Sending provider request");

    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| map_reqwest_error(&e, timeout))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| map_reqwest_error(&e, timeout))?;

    if !status.is_success() {
        return Err(map_http_status(status, &text));
    }

    let body = serde_json::from_str(&text)
        .map_err(|e| NetworkError::malformed(format!("response is not valid JSON: {e}")))?;
    Ok(RawResponse::new(body))
}

/// Decode a response envelope into its typed form
pub(crate) fn decode_envelope<T: serde::de::DeserializeOwned>(
    raw: RawResponse,
) -> std::result::Result<T, NetworkError> {
    serde_json::from_value(raw.body)
        .map_err(|e| NetworkError::malformed(format!("unexpected response shape: {e}")))
}

pub(crate) fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::NetworkErrorKind;

    #[test]
    fn error_detail_reads_both_shapes() {
        assert_eq!(error_detail(r#"{"error": "model 'x' not found"}"#), "model 'x' not found");
        assert_eq!(
            error_detail(r#"{"error": {"type": "invalid_request_error", "message": "bad key"}}"#),
            "bad key"
        );
        assert_eq!(error_detail("  upstream down \n"), "upstream down");
    }

    #[test]
    fn http_status_keeps_code() {
        let err = map_http_status(reqwest::StatusCode::NOT_FOUND, r#"{"error": "no such model"}"#);
        assert_eq!(err.kind, NetworkErrorKind::HttpError { status: 404 });
        assert!(err.message.contains("no such model"));
    }

    #[test]
    fn envelope_shape_errors_are_malformed() {
        #[derive(serde::Deserialize)]
        struct Envelope {
            #[allow(dead_code)]
            choices: Vec<Value>,
        }
        let err = decode_envelope::<Envelope>(RawResponse::new(serde_json::json!({"id": "x"})))
            .err()
            .unwrap();
        assert_eq!(err.kind, NetworkErrorKind::MalformedJson);
    }

    #[test]
    fn credential_with_newline_is_a_config_error() {
        let err = credential_header("sk-abc\ndef").unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(credential_header("sk-abc").unwrap().is_sensitive());
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        assert_eq!(trim_base("http://localhost:11434/v1/"), "http://localhost:11434/v1");
    }
}
