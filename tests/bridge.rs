//! End-to-end runs over a scripted provider: discovery, signature
//! checking, capture rewriting, persistence, and budget exhaustion all
//! exercised through the public surface.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

use scout::error::Result;
use scout::llm::StubModel;
use scout::mcp::{JsonRpcRequest, JsonRpcResponse, McpTransport};
use scout::normalize::ContentNormalizer;
use scout::session::Session;
use scout::shell::{Mode, Shell};
use scout::storage::ArticleStore;
use scout::tools::article_toolkit;
use scout::{FinishReason, ScoutError};

/// Provider fake that answers by method and tool name rather than by
/// scripted order, and records every tools/call that reached it.
struct Provider {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Provider {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl McpTransport for Provider {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let result = match request.method.as_str() {
            "initialize" => Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "serverInfo": {"name": "scripted-provider", "version": "0"}
            })),
            "tools/list" => Some(json!({"tools": [
                {
                    "name": "browser_take_screenshot",
                    "description": "Capture the current page",
                    "inputSchema": {"type": "object"}
                },
                {
                    "name": "fetch_page",
                    "description": "Fetch a page by URL",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"url": {"type": "string"}},
                        "required": ["url"]
                    }
                }
            ]})),
            "tools/call" => {
                let params = request.params.clone().unwrap_or_default();
                let name = params["name"].as_str().unwrap_or_default().to_string();
                let arguments = params["arguments"].clone();
                self.calls.lock().unwrap().push((name.clone(), arguments));
                match name.as_str() {
                    "browser_take_screenshot" => Some(json!({"content": [
                        {"type": "image", "data": BASE64.encode(b"fake pixels"),
                         "mimeType": "image/png"},
                        {"type": "text", "text": "viewport 1280x720"},
                    ]})),
                    "fetch_page" => Some(json!({"content": [
                        {"type": "text", "text": "<h1>Example Daily</h1>"},
                    ]})),
                    _ => Some(json!({"content": [
                        {"type": "text", "text": "no such tool"}], "isError": true})),
                }
            }
            _ => None,
        };
        Ok(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: request.id,
            result,
            error: None,
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

async fn shell_over(
    model: StubModel,
    store: Arc<ArticleStore>,
) -> (Shell<Provider>, Arc<Mutex<Vec<(String, Value)>>>) {
    let provider = Provider::new();
    let calls = Arc::clone(&provider.calls);
    let model: Arc<StubModel> = Arc::new(model);
    let session = Session::over(provider).with_capture_normalizer(
        "browser_take_screenshot",
        ContentNormalizer::new(model.clone()),
    );
    let shell = Shell::new(session, model)
        .with_local_tools(article_toolkit(store))
        .with_max_steps(6);
    (shell, calls)
}

async fn memory_store() -> Arc<ArticleStore> {
    Arc::new(ArticleStore::connect("sqlite::memory:").await.unwrap())
}

#[tokio::test]
async fn mission_saves_articles_and_rewrites_captures() {
    let model = StubModel::new(vec![
        StubModel::call_completion("browser_take_screenshot", json!({})),
        StubModel::call_completion(
            "save_article",
            json!({"title": "Example Daily", "url": "https://example.com/daily"}),
        ),
        StubModel::text_completion("saved one article"),
    ])
    .with_description("front page of Example Daily with three headlines");

    let store = memory_store().await;
    let (shell, _) = shell_over(model, Arc::clone(&store)).await;

    let outcome = shell.run_prompt("collect today's news").await.unwrap();
    assert_eq!(outcome.finish_reason, FinishReason::Completed);
    assert_eq!(outcome.final_text.as_deref(), Some("saved one article"));

    // The capture came back as marked text; no image ever reached a step.
    let capture = &outcome.steps[0].tool_results[0];
    assert_eq!(
        capture.content[0].as_text(),
        Some("[screenshot summary] front page of Example Daily with three headlines")
    );
    assert_eq!(capture.content[1].as_text(), Some("viewport 1280x720"));
    for step in &outcome.steps {
        for result in &step.tool_results {
            assert!(result.content.iter().all(|item| !item.is_image()));
        }
    }

    assert!(store.exists("https://example.com/daily").await.unwrap());
}

#[tokio::test]
async fn invalid_arguments_are_rejected_before_the_wire() {
    let model = StubModel::new(vec![
        // fetch_page requires `url`.
        StubModel::call_completion("fetch_page", json!({})),
        StubModel::text_completion("could not fetch"),
    ]);

    let (shell, calls) = shell_over(model, memory_store().await).await;
    let outcome = shell.run_prompt("fetch something").await.unwrap();

    assert_eq!(outcome.finish_reason, FinishReason::Completed);
    let failed = &outcome.steps[0].tool_results[0];
    assert!(failed.is_error);
    assert!(failed.content[0].as_text().unwrap().contains("fetch_page"));
    // The provider never saw the malformed call.
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn step_budget_bounds_the_run() {
    let completions = (0..10)
        .map(|_| StubModel::call_completion("fetch_page", json!({"url": "https://example.com"})))
        .collect();
    let (shell, _) = shell_over(StubModel::new(completions), memory_store().await).await;

    let outcome = shell.run_prompt("loop").await.unwrap();
    assert_eq!(outcome.finish_reason, FinishReason::Exhausted);
    assert_eq!(outcome.steps.len(), 6);
}

#[tokio::test]
async fn duplicate_saves_refresh_instead_of_failing() {
    let article = json!({"title": "Repeat", "url": "https://example.com/repeat"});
    let model = StubModel::new(vec![
        StubModel::call_completion("save_article", article.clone()),
        StubModel::call_completion("save_article", article),
        StubModel::text_completion("done"),
    ]);
    let store = memory_store().await;
    let (shell, _) = shell_over(model, Arc::clone(&store)).await;

    let outcome = shell.run_prompt("save twice").await.unwrap();
    assert!(!outcome.steps[0].tool_results[0].is_error);
    assert!(!outcome.steps[1].tool_results[0].is_error);
    assert!(outcome.steps[1].tool_results[0].content[0]
        .as_text()
        .unwrap()
        .contains("already saved"));

    let rows = store.recent(10, None).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn model_failure_fails_the_run_and_still_closes_cleanly() {
    let (shell, _) = shell_over(StubModel::new(vec![]), memory_store().await).await;
    let err = shell.run(Mode::Once("anything".into())).await.unwrap_err();
    assert!(matches!(err, ScoutError::LanguageModel(_)));
}
