//! The bounded model/tool loop. One executor instance drives one prompt
//! to completion, exhaustion, or failure, reporting each round through a
//! synchronous observer before the next round begins.

use std::sync::Arc;

use serde::Serialize;

use crate::content::ContentItem;
use crate::error::Result;
use crate::llm::{LanguageModel, Usage};
use crate::message::{Message, ToolResult};
use crate::tool::ToolRegistry;

/// How a run ended. A model transport failure is not a finish reason; it
/// propagates as an error and the run counts as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The model produced final text with no further tool calls.
    Completed,
    /// The step budget ran out first. Reported, never treated as an error.
    Exhausted,
}

/// One round of the loop: what the model asked for and what came back.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// 1-based round number.
    pub index: usize,
    pub tool_calls: Vec<crate::message::ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub final_text: Option<String>,
    pub steps: Vec<StepRecord>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

/// Fired once per completed round, in round order, before the next round
/// starts. The sole observability hook of the loop.
pub trait StepObserver: Send {
    fn on_step(&mut self, step: &StepRecord);
}

impl<F: FnMut(&StepRecord) + Send> StepObserver for F {
    fn on_step(&mut self, step: &StepRecord) {
        self(step)
    }
}

pub struct StepExecutor {
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    system_prompt: String,
    max_steps: usize,
}

impl StepExecutor {
    pub fn new(model: Arc<dyn LanguageModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            system_prompt: "You are a careful research agent. Use the available tools \
                to carry out the task, then answer with a final summary."
                .to_string(),
            max_steps: 10,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub async fn run(&self, prompt: impl Into<String>) -> Result<RunOutcome> {
        self.run_observed(prompt, &mut |_: &StepRecord| {}).await
    }

    /// Drive the loop. Recoverable tool failures (unknown tool, rejected
    /// arguments, a failed invocation) are absorbed into failed tool
    /// results and fed back to the model; fatal errors abort the run.
    pub async fn run_observed(
        &self,
        prompt: impl Into<String>,
        observer: &mut dyn StepObserver,
    ) -> Result<RunOutcome> {
        let descriptions = self.tools.descriptions();
        let mut messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(prompt),
        ];
        let mut steps: Vec<StepRecord> = Vec::new();
        let mut usage = Usage::default();
        let mut last_text: Option<String> = None;

        for index in 1..=self.max_steps {
            let completion = self.model.complete_chat(&messages, &descriptions).await?;
            usage.add(completion.usage);
            if completion.content.is_some() {
                last_text = completion.content.clone();
            }

            if completion.tool_calls.is_empty() {
                let record = StepRecord {
                    index,
                    tool_calls: Vec::new(),
                    tool_results: Vec::new(),
                    text: completion.content.clone(),
                };
                tracing::debug!(step = index, "run completed");
                observer.on_step(&record);
                steps.push(record);
                return Ok(RunOutcome {
                    final_text: completion.content,
                    steps,
                    finish_reason: FinishReason::Completed,
                    usage,
                });
            }

            if let Some(text) = &completion.content {
                messages.push(Message::assistant(text.clone()));
            }

            // Dispatch sequentially, preserving the order the model
            // requested the calls in.
            let mut results = Vec::with_capacity(completion.tool_calls.len());
            for call in &completion.tool_calls {
                messages.push(Message::tool_use(call.clone()));
                let result = match self.tools.call(&call.name, call.arguments.clone()).await {
                    Ok(content) => ToolResult {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        content,
                        is_error: false,
                    },
                    Err(err) if err.is_recoverable() => {
                        tracing::warn!(tool = %call.name, error = %err, "tool call failed");
                        ToolResult {
                            tool_call_id: call.id.clone(),
                            name: call.name.clone(),
                            content: vec![ContentItem::text(format!("tool call failed: {err}"))],
                            is_error: true,
                        }
                    }
                    Err(err) => return Err(err),
                };
                messages.push(Message::tool(result.clone()));
                results.push(result);
            }

            let record = StepRecord {
                index,
                tool_calls: completion.tool_calls,
                tool_results: results,
                text: completion.content,
            };
            tracing::debug!(step = index, calls = record.tool_calls.len(), "step complete");
            observer.on_step(&record);
            steps.push(record);
        }

        tracing::info!(max_steps = self.max_steps, "step budget exhausted");
        Ok(RunOutcome {
            final_text: last_text,
            steps,
            finish_reason: FinishReason::Exhausted,
            usage,
        })
    }
}
