use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

/// Where the remote tool provider lives and which of its tools takes
/// screen captures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub endpoint: String,
    #[serde(default = "default_capture_tool")]
    pub capture_tool: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8931/mcp".into(),
            capture_tool: default_capture_tool(),
        }
    }
}

fn default_capture_tool() -> String {
    "browser_take_screenshot".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            endpoint: None,
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            system_prompt: None,
        }
    }
}

fn default_max_steps() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:articles.db?mode=rwc".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|err| {
            ScoutError::Config(format!(
                "failed reading `{}`: {err}",
                path.as_ref().display()
            ))
        })?;
        toml::from_str(&raw)
            .map_err(|err| ScoutError::Config(format!("failed parsing configuration: {err}")))
    }

    /// Load from the file if it exists, fall back to defaults otherwise,
    /// then apply environment overrides on top.
    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        if let Ok(endpoint) = env::var("SCOUT_ENDPOINT") {
            cfg.provider.endpoint = endpoint;
        }
        if let Ok(tool) = env::var("SCOUT_CAPTURE_TOOL") {
            cfg.provider.capture_tool = tool;
        }
        if let Ok(key) = env::var("SCOUT_API_KEY") {
            cfg.model.api_key = Some(key);
        }
        if let Ok(model) = env::var("SCOUT_MODEL") {
            cfg.model.model = model;
        }
        if let Ok(steps) = env::var("SCOUT_MAX_STEPS") {
            if let Ok(parsed) = steps.parse::<usize>() {
                cfg.agent.max_steps = parsed.max(1);
            }
        }
        if let Ok(url) = env::var("SCOUT_DATABASE_URL") {
            cfg.storage.database_url = url;
        }
        Ok(cfg)
    }
}
