use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoutError>;

/// Error taxonomy for the agent. Only `Config`, `Protocol` (at connect
/// time) and `LanguageModel` are allowed to end a run; everything else is
/// absorbed at the layer that produced it and fed back to the model.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider protocol error: {0}")]
    Protocol(String),

    #[error("tool `{0}` not found")]
    ToolNotFound(String),

    #[error("invalid arguments for tool `{tool}`: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool `{name}` invocation failed: {source}")]
    ToolInvocation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScoutError {
    /// Whether the step loop may keep running after reporting this error
    /// back to the model as a failed tool result.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScoutError::ToolNotFound(_)
                | ScoutError::InvalidArguments { .. }
                | ScoutError::ToolInvocation { .. }
                | ScoutError::Storage(_)
        )
    }
}
