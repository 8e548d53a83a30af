use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::content::ContentItem;
use crate::error::{Result, ScoutError};

/// What the model is told about one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Option<Value>,
}

/// An operation the step loop can invoke on the model's behalf. Remote
/// proxies and store-backed local tools share this seam.
#[async_trait]
pub trait Tool: Send + Sync {
    fn describe(&self) -> ToolDescription;

    async fn call(&self, arguments: Value) -> Result<Vec<ContentItem>>;
}

/// The live tool set for one run, keyed by unique name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let description = tool.describe();
        self.tools.insert(description.name, Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.describe().name, tool);
    }

    pub fn merge(&mut self, other: ToolRegistry) {
        self.tools.extend(other.tools);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn descriptions(&self) -> Vec<ToolDescription> {
        self.tools.values().map(|tool| tool.describe()).collect()
    }

    pub async fn call(&self, name: &str, arguments: Value) -> Result<Vec<ContentItem>> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ScoutError::ToolNotFound(name.to_string()))?;
        tool.call(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct CannedTool {
        name: &'static str,
        answer: &'static str,
    }

    #[async_trait]
    impl Tool for CannedTool {
        fn describe(&self) -> ToolDescription {
            ToolDescription {
                name: self.name.to_string(),
                description: "d".to_string(),
                parameters: None,
            }
        }

        async fn call(&self, _arguments: Value) -> Result<Vec<ContentItem>> {
            Ok(vec![ContentItem::text(self.answer)])
        }
    }

    #[tokio::test]
    async fn merge_combines_and_the_merged_side_wins_collisions() {
        let mut base = ToolRegistry::new();
        base.register(CannedTool {
            name: "shared",
            answer: "base",
        });
        base.register(CannedTool {
            name: "only_base",
            answer: "base",
        });

        let mut incoming = ToolRegistry::new();
        incoming.register(CannedTool {
            name: "shared",
            answer: "incoming",
        });

        base.merge(incoming);
        assert_eq!(base.len(), 2);
        let content = base.call("shared", json!({})).await.unwrap();
        assert_eq!(content[0].as_text(), Some("incoming"));
    }

    #[tokio::test]
    async fn unknown_name_is_tool_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.call("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ScoutError::ToolNotFound(_)));
    }
}
