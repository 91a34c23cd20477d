//! `run_ollama_generate` against a mocked Ollama server

use std::time::Duration;

use agent_core::{ToolArgs, ToolHandler};
use agent_tools::ToolsError;
use agent_tools::tools::OllamaGenerateTool;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn sends_non_streaming_request_with_options() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({
            "model": "llama3",
            "prompt": "Summarize: Rust is fast.",
            "stream": false,
            "system": "Be terse.",
            "options": {"num_ctx": 4096}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3",
            "response": "Rust is fast.",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tool = OllamaGenerateTool::new(server.uri()).unwrap();
    let raw = json!({
        "model_name": "llama3",
        "prompt": "Summarize: Rust is fast.",
        "system_prompt": "Be terse.",
        "context_window": 4096
    });
    let out = tool.invoke(ToolArgs::new(raw.as_object().unwrap())).await.unwrap();
    assert_eq!(out, "Rust is fast.");
}

#[tokio::test]
async fn http_error_includes_ollama_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model 'nope' not found"})),
        )
        .mount(&server)
        .await;

    let tool = OllamaGenerateTool::new(server.uri()).unwrap();
    let err = tool.generate("nope", "hi", None, None).await.unwrap_err();
    match err {
        ToolsError::OllamaStatus { status, detail } => {
            assert_eq!(status, 404);
            assert_eq!(detail, "model 'nope' not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn timeout_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"response": "late"})),
        )
        .mount(&server)
        .await;

    let tool = OllamaGenerateTool::with_timeout(server.uri(), Duration::from_secs(1)).unwrap();
    let err = tool.generate("llama3", "hi", None, None).await.unwrap_err();
    assert!(matches!(err, ToolsError::OllamaTimeout { secs: 1, .. }));
}

#[tokio::test]
async fn unreachable_server_is_connection_refused() {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let tool = OllamaGenerateTool::new(&uri).unwrap();
    let err = tool.generate("llama3", "hi", None, None).await.unwrap_err();
    assert!(matches!(err, ToolsError::OllamaUnreachable(_)));
    assert!(err.to_string().contains("Is Ollama running"));
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let tool = OllamaGenerateTool::new(server.uri()).unwrap();
    let err = tool.generate("llama3", "hi", None, None).await.unwrap_err();
    assert!(matches!(err, ToolsError::OllamaDecode(_)));
}
