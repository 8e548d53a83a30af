//! Scout is a command-line research agent. It connects to a remote
//! MCP-style tool provider, translates whatever tool schemas the provider
//! advertises into runtime-checked signatures, and drives a step-bounded
//! model loop over the combined remote and local tool set. Screen captures
//! coming back from the provider are rewritten into short text summaries
//! before the model ever sees them, and discovered articles are persisted
//! to SQLite with content fingerprinting.

pub mod config;
pub mod content;
pub mod error;
pub mod executor;
pub mod llm;
pub mod mcp;
pub mod message;
pub mod normalize;
pub mod proxy;
pub mod schema;
pub mod session;
pub mod shell;
pub mod storage;
pub mod tool;
pub mod tools;

pub use config::AppConfig;
pub use content::ContentItem;
pub use error::{Result, ScoutError};
pub use executor::{FinishReason, RunOutcome, StepExecutor, StepObserver, StepRecord};
pub use llm::{AnthropicClient, LanguageModel, ModelCompletion, StubModel, Usage};
pub use mcp::{HttpTransport, McpClient, McpTransport, ToolDescriptor};
pub use message::{Message, Role, ToolCall, ToolResult};
pub use normalize::ContentNormalizer;
pub use proxy::ToolProxy;
pub use schema::{Signature, SchemaViolation};
pub use session::Session;
pub use shell::{Mode, Shell};
pub use storage::{Article, ArticleStore, BatchReport, SaveOutcome};
pub use tool::{Tool, ToolDescription, ToolRegistry};
pub use tools::article_toolkit;
