//! Proxies that turn remote tool descriptors into safely invocable
//! operations: arguments are checked against the translated signature
//! before anything crosses the wire, and screen captures are rewritten
//! into text on the way back.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::content::ContentItem;
use crate::error::{Result, ScoutError};
use crate::mcp::{McpClient, McpTransport, ToolDescriptor};
use crate::normalize::{ContentNormalizer, SUMMARY_PLACEHOLDER};
use crate::schema::{self, Signature};
use crate::tool::{Tool, ToolDescription};

pub struct ToolProxy<T: McpTransport> {
    descriptor: ToolDescriptor,
    signature: Signature,
    client: Arc<Mutex<McpClient<T>>>,
    /// Present only for the designated screen-capture tool.
    normalizer: Option<ContentNormalizer>,
}

impl<T: McpTransport> ToolProxy<T> {
    pub fn new(
        descriptor: ToolDescriptor,
        client: Arc<Mutex<McpClient<T>>>,
        normalizer: Option<ContentNormalizer>,
    ) -> Self {
        // Translated once at discovery time and reused for every call.
        let signature = schema::translate(descriptor.input_schema.as_ref());
        Self {
            descriptor,
            signature,
            client,
            normalizer,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    async fn rewrite_captures(&self, content: Vec<ContentItem>) -> Vec<ContentItem> {
        let Some(normalizer) = &self.normalizer else {
            return content;
        };
        let mut rewritten = Vec::with_capacity(content.len());
        for item in content {
            if !item.is_image() {
                rewritten.push(item);
                continue;
            }
            match normalizer.normalize(item).await {
                Ok(summary) => rewritten.push(summary),
                Err(err) => {
                    // One failed item never poisons its siblings.
                    tracing::warn!(tool = %self.descriptor.name, error = %err,
                        "capture normalization failed");
                    rewritten.push(ContentItem::text(SUMMARY_PLACEHOLDER));
                }
            }
        }
        rewritten
    }
}

#[async_trait]
impl<T: McpTransport + 'static> Tool for ToolProxy<T> {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: self.descriptor.name.clone(),
            description: self
                .descriptor
                .description
                .clone()
                .unwrap_or_else(|| format!("Remote tool `{}`", self.descriptor.name)),
            parameters: self.descriptor.input_schema.clone(),
        }
    }

    async fn call(&self, arguments: Value) -> Result<Vec<ContentItem>> {
        let effective = self
            .signature
            .check(&arguments)
            .map_err(|violation| ScoutError::InvalidArguments {
                tool: self.descriptor.name.clone(),
                reason: violation.to_string(),
            })?;

        let content = {
            let mut client = self.client.lock().await;
            client.call_tool(&self.descriptor.name, effective).await?
        };

        Ok(self.rewrite_captures(content).await)
    }
}
