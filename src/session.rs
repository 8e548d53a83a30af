//! Session lifecycle: exactly one live provider connection, the derived
//! tool proxies, and an always-reachable teardown path.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::mcp::{HttpTransport, McpClient, McpTransport};
use crate::normalize::ContentNormalizer;
use crate::proxy::ToolProxy;

pub struct Session<T: McpTransport> {
    client: Arc<Mutex<McpClient<T>>>,
    capture_tool: String,
    normalizer: Option<ContentNormalizer>,
}

impl Session<HttpTransport> {
    /// Establish the one transport-level connection to the provider.
    /// Failure here is fatal to the whole process; the provider is a
    /// prerequisite, not a transient dependency.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let mut client = McpClient::new(HttpTransport::new(endpoint));
        client.initialize().await?;
        tracing::info!(endpoint, "connected to tool provider");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            capture_tool: String::new(),
            normalizer: None,
        })
    }
}

impl<T: McpTransport + 'static> Session<T> {
    /// Build a session over an already-constructed transport. The
    /// handshake happens lazily on first use.
    pub fn over(transport: T) -> Self {
        Self {
            client: Arc::new(Mutex::new(McpClient::new(transport))),
            capture_tool: String::new(),
            normalizer: None,
        }
    }

    /// Designate the screen-capture tool whose image output gets rewritten
    /// through `normalizer`. All other tools pass content through as-is.
    pub fn with_capture_normalizer(
        mut self,
        capture_tool: impl Into<String>,
        normalizer: ContentNormalizer,
    ) -> Self {
        self.capture_tool = capture_tool.into();
        self.normalizer = Some(normalizer);
        self
    }

    /// Discover the provider's tool set and wrap each descriptor in a
    /// proxy. Re-issues discovery on every call rather than caching; the
    /// provider may change its tool set between calls.
    pub async fn list_tools(&self) -> Result<Vec<ToolProxy<T>>> {
        let descriptors = {
            let mut client = self.client.lock().await;
            client.list_tools().await?
        };
        tracing::debug!(count = descriptors.len(), "discovered tools");

        Ok(descriptors
            .into_iter()
            .map(|descriptor| {
                let normalizer = if descriptor.name == self.capture_tool {
                    self.normalizer.clone()
                } else {
                    None
                };
                ToolProxy::new(descriptor, Arc::clone(&self.client), normalizer)
            })
            .collect())
    }

    /// Tear down the connection. Idempotent, and safe even if the session
    /// was never used; every exit path of the shell funnels through here.
    pub async fn close(&self) -> Result<()> {
        let mut client = self.client.lock().await;
        if !client.is_closed() {
            tracing::info!("closing provider session");
        }
        client.close().await
    }
}
