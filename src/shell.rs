//! Outer drivers: one-shot, headless mission, and an interactive prompt
//! loop. Every path out of a driver, including an interrupt, funnels
//! through session teardown.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::Result;
use crate::executor::{FinishReason, RunOutcome, StepExecutor, StepRecord};
use crate::llm::LanguageModel;
use crate::mcp::McpTransport;
use crate::session::Session;
use crate::tool::ToolRegistry;

/// Mission used when no prompt is given on the command line.
pub const DEFAULT_MISSION: &str = "Visit the front pages of the configured news sources, \
    identify the most significant new articles, and persist each one with save_article. \
    Finish with a short digest of what you saved.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Run the default mission once and exit.
    Headless,
    /// Run one user-supplied prompt and exit.
    Once(String),
    /// Read prompts from stdin until EOF or `exit`.
    Interactive,
}

pub struct Shell<T: McpTransport + 'static> {
    session: Session<T>,
    model: Arc<dyn LanguageModel>,
    locals: ToolRegistry,
    system_prompt: Option<String>,
    max_steps: usize,
}

impl<T: McpTransport + 'static> Shell<T> {
    pub fn new(session: Session<T>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            session,
            model,
            locals: ToolRegistry::new(),
            system_prompt: None,
            max_steps: 10,
        }
    }

    pub fn with_local_tools(mut self, tools: ToolRegistry) -> Self {
        self.locals = tools;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Drive the chosen mode to completion, racing it against Ctrl-C. An
    /// interrupt abandons whatever call is in flight; the session is torn
    /// down either way.
    pub async fn run(&self, mode: Mode) -> Result<()> {
        let result = tokio::select! {
            result = self.drive(&mode) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                Ok(())
            }
        };
        let teardown = self.session.close().await;
        result.and(teardown)
    }

    async fn drive(&self, mode: &Mode) -> Result<()> {
        match mode {
            Mode::Headless => {
                let outcome = self.run_prompt(DEFAULT_MISSION).await?;
                self.report(&outcome).await
            }
            Mode::Once(prompt) => {
                let outcome = self.run_prompt(prompt).await?;
                self.report(&outcome).await
            }
            Mode::Interactive => self.interact().await,
        }
    }

    /// Rebuild the tool set and run one bounded loop over it. Discovery is
    /// repeated per prompt so provider-side tool changes are picked up.
    pub async fn run_prompt(&self, prompt: &str) -> Result<RunOutcome> {
        let mut remote = ToolRegistry::new();
        for proxy in self.session.list_tools().await? {
            remote.register_arc(Arc::new(proxy));
        }
        // On a name collision the provider's tool wins.
        let mut tools = self.locals.clone();
        tools.merge(remote);
        tracing::info!(tools = tools.len(), "starting run");

        let mut executor =
            StepExecutor::new(Arc::clone(&self.model), tools).with_max_steps(self.max_steps);
        if let Some(system_prompt) = &self.system_prompt {
            executor = executor.with_system_prompt(system_prompt.clone());
        }

        executor
            .run_observed(prompt, &mut |step: &StepRecord| {
                let calls: Vec<&str> = step.tool_calls.iter().map(|c| c.name.as_str()).collect();
                tracing::info!(step = step.index, tools = ?calls, "step complete");
            })
            .await
    }

    async fn interact(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all(b"scout> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            // One failed run ends that run, not the shell.
            match self.run_prompt(line).await {
                Ok(outcome) => self.report(&outcome).await?,
                Err(err) => {
                    tracing::error!(error = %err, "run failed");
                    stdout
                        .write_all(format!("run failed: {err}\n").as_bytes())
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn report(&self, outcome: &RunOutcome) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        if let Some(text) = &outcome.final_text {
            stdout.write_all(text.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        if outcome.finish_reason == FinishReason::Exhausted {
            stdout
                .write_all(b"(step budget exhausted before the task completed)\n")
                .await?;
        }
        tracing::info!(
            steps = outcome.steps.len(),
            input_tokens = outcome.usage.input_tokens,
            output_tokens = outcome.usage.output_tokens,
            "run finished"
        );
        stdout.flush().await?;
        Ok(())
    }
}
