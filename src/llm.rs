//! Language model abstractions and the Anthropic client implementation.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::error::{Result, ScoutError};
use crate::message::{Message, Role, ToolCall};
use crate::tool::ToolDescription;

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Token accounting reported by the provider, accumulated per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// Result of one chat completion round.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

/// Minimal abstraction over a chat completion provider. The auxiliary
/// `describe_image` call backs the content normalizer and is deliberately
/// narrow: one image, one instruction, one text answer.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelCompletion>;

    async fn describe_image(
        &self,
        data: &str,
        mime_type: &str,
        instruction: &str,
    ) -> Result<String>;
}

fn coalesce_error(status: reqwest::StatusCode, body: &str) -> ScoutError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return ScoutError::LanguageModel(format!("rate limit exceeded: {body}"));
    }
    ScoutError::LanguageModel(format!("request failed with {status}: {body}"))
}

#[derive(Clone, Debug)]
pub struct AnthropicClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
    endpoint: String,
}

impl AnthropicClient {
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            ScoutError::Config("missing Anthropic API key (set SCOUT_API_KEY)".into())
        })?;
        let endpoint = cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".to_string());
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .map_err(|err| ScoutError::LanguageModel(format!("http client error: {err}")))?,
            model: cfg.model.clone(),
            api_key,
            endpoint,
        })
    }

    fn to_messages(&self, messages: &[Message]) -> Vec<Value> {
        let mut built: Vec<Value> = Vec::new();
        for message in messages {
            match message.role {
                Role::System => {}
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": message.content}));
                    }
                    if let Some(call) = &message.tool_call {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id.clone().unwrap_or_else(|| call.name.clone()),
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                    built.push(json!({"role": "assistant", "content": blocks}));
                }
                Role::Tool => {
                    let result = message.tool_result.as_ref();
                    let id = result
                        .and_then(|r| r.tool_call_id.clone())
                        .or_else(|| result.map(|r| r.name.clone()))
                        .unwrap_or_default();
                    let is_error = result.map(|r| r.is_error).unwrap_or(false);
                    built.push(json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": id,
                            "is_error": is_error,
                            "content": [{"type": "text", "text": message.content}],
                        }],
                    }));
                }
                Role::User => {
                    built.push(json!({
                        "role": "user",
                        "content": [{"type": "text", "text": message.content}],
                    }));
                }
            }
        }
        built
    }

    fn to_tools(&self, tools: &[ToolDescription]) -> Option<Vec<Value>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool
                            .parameters
                            .clone()
                            .unwrap_or_else(|| json!({"type": "object"})),
                    })
                })
                .collect(),
        )
    }

    /// Absent system prompt and empty tool set are omitted from the wire
    /// payload rather than sent as nulls.
    fn chat_payload(&self, messages: &[Message], tools: &[ToolDescription]) -> Value {
        let mut payload = json!({
            "model": self.model,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "messages": self.to_messages(messages),
        });
        if let Some(system) = messages.iter().find(|m| m.role == Role::System) {
            payload["system"] = Value::String(system.content.clone());
        }
        if let Some(tools) = self.to_tools(tools) {
            payload["tools"] = Value::Array(tools);
        }
        payload
    }

    async fn post(&self, payload: Value) -> Result<AnthropicResponse> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .map_err(|err| ScoutError::LanguageModel(format!("request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body));
        }

        resp.json()
            .await
            .map_err(|err| ScoutError::LanguageModel(format!("response parse error: {err}")))
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelCompletion> {
        let parsed = self.post(self.chat_payload(messages, tools)).await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in parsed.content {
            match block {
                AnthropicBlock::Text { text } => content.push_str(&text),
                AnthropicBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(name, input).with_id(id));
                }
                AnthropicBlock::Other(_) => {}
            }
        }

        Ok(ModelCompletion {
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            tool_calls,
            usage: parsed.usage.unwrap_or_default().into(),
        })
    }

    async fn describe_image(
        &self,
        data: &str,
        mime_type: &str,
        instruction: &str,
    ) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "max_tokens": 512,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": mime_type,
                            "data": data,
                        },
                    },
                    {"type": "text", "text": instruction},
                ],
            }],
        });

        let parsed = self.post(payload).await?;
        let description = parsed
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if description.is_empty() {
            return Err(ScoutError::LanguageModel(
                "model returned no description".into(),
            ));
        }
        Ok(description)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(untagged)]
    Other(Value),
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl From<AnthropicUsage> for Usage {
    fn from(usage: AnthropicUsage) -> Self {
        Usage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        }
    }
}

/// Scripted model for tests: pops one completion per round and answers
/// every image with a canned description.
pub struct StubModel {
    completions: Mutex<Vec<ModelCompletion>>,
    description: String,
    fail_descriptions: bool,
}

impl StubModel {
    pub fn new(completions: Vec<ModelCompletion>) -> Self {
        Self {
            completions: Mutex::new(completions),
            description: "a page with a headline and two links".to_string(),
            fail_descriptions: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn failing_descriptions(mut self) -> Self {
        self.fail_descriptions = true;
        self
    }

    /// Convenience completion carrying final text and no tool calls.
    pub fn text_completion(text: impl Into<String>) -> ModelCompletion {
        ModelCompletion {
            content: Some(text.into()),
            tool_calls: Vec::new(),
            usage: Usage::default(),
        }
    }

    /// Convenience completion requesting a single tool call.
    pub fn call_completion(name: impl Into<String>, arguments: Value) -> ModelCompletion {
        let name = name.into();
        ModelCompletion {
            content: None,
            tool_calls: vec![ToolCall::new(name.clone(), arguments)
                .with_id(format!("call_{name}"))],
            usage: Usage::default(),
        }
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete_chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescription],
    ) -> Result<ModelCompletion> {
        let mut completions = self.completions.lock().unwrap();
        if completions.is_empty() {
            return Err(ScoutError::LanguageModel("stub ran out of completions".into()));
        }
        Ok(completions.remove(0))
    }

    async fn describe_image(
        &self,
        _data: &str,
        _mime_type: &str,
        _instruction: &str,
    ) -> Result<String> {
        if self.fail_descriptions {
            return Err(ScoutError::LanguageModel("vision unavailable".into()));
        }
        Ok(self.description.clone())
    }
}
