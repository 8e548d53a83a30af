//! Article toolkit.
//!
//! Local tools backed by the article store, exposed to the model alongside
//! the remote proxies. Duplicates are reported as text, never as failures;
//! the model should keep going when it re-saves something it already found.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::content::ContentItem;
use crate::error::{Result, ScoutError};
use crate::storage::{Article, ArticleStore, SaveOutcome};
use crate::tool::{Tool, ToolDescription, ToolRegistry};

/// Create the article toolkit over a shared store.
pub fn article_toolkit(store: Arc<ArticleStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(SaveArticleTool {
        store: Arc::clone(&store),
    });
    registry.register(SaveArticlesTool {
        store: Arc::clone(&store),
    });
    registry.register(RecentArticlesTool { store });
    registry
}

fn invalid_input(tool: &str, err: serde_json::Error) -> ScoutError {
    ScoutError::InvalidArguments {
        tool: tool.to_string(),
        reason: err.to_string(),
    }
}

struct SaveArticleTool {
    store: Arc<ArticleStore>,
}

#[derive(Debug, Deserialize)]
struct SaveArticleInput {
    title: String,
    url: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl From<SaveArticleInput> for Article {
    fn from(input: SaveArticleInput) -> Self {
        Article {
            title: input.title,
            url: input.url,
            summary: input.summary,
            source: input.source,
        }
    }
}

#[async_trait]
impl Tool for SaveArticleTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "save_article".to_string(),
            description: "Persist one article. Re-saving a known article refreshes its \
                timestamp instead of creating a duplicate."
                .to_string(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "url": {"type": "string"},
                    "summary": {"type": "string"},
                    "source": {"type": "string", "description": "Site or feed the article came from"}
                },
                "required": ["title", "url"]
            })),
        }
    }

    async fn call(&self, arguments: Value) -> Result<Vec<ContentItem>> {
        let input: SaveArticleInput =
            serde_json::from_value(arguments).map_err(|err| invalid_input("save_article", err))?;
        let article: Article = input.into();
        let text = match self.store.save(&article).await? {
            SaveOutcome::Saved => format!("saved: {}", article.url),
            SaveOutcome::Duplicate => format!("already saved, timestamp refreshed: {}", article.url),
        };
        Ok(vec![ContentItem::text(text)])
    }
}

struct SaveArticlesTool {
    store: Arc<ArticleStore>,
}

#[derive(Debug, Deserialize)]
struct SaveArticlesInput {
    articles: Vec<SaveArticleInput>,
}

#[async_trait]
impl Tool for SaveArticlesTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "save_articles".to_string(),
            description: "Persist a batch of articles in one call. Items that fail are \
                reported without aborting the rest."
                .to_string(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "articles": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": {"type": "string"},
                                "url": {"type": "string"},
                                "summary": {"type": "string"},
                                "source": {"type": "string"}
                            },
                            "required": ["title", "url"]
                        }
                    }
                },
                "required": ["articles"]
            })),
        }
    }

    async fn call(&self, arguments: Value) -> Result<Vec<ContentItem>> {
        let input: SaveArticlesInput =
            serde_json::from_value(arguments).map_err(|err| invalid_input("save_articles", err))?;
        let articles: Vec<Article> = input.articles.into_iter().map(Article::from).collect();
        let report = self.store.save_batch(&articles).await;

        let mut text = format!(
            "saved {} new, refreshed {} existing, {} failed",
            report.saved, report.updated, report.failed
        );
        for error in &report.errors {
            text.push_str("\n  ");
            text.push_str(error);
        }
        Ok(vec![ContentItem::text(text)])
    }
}

struct RecentArticlesTool {
    store: Arc<ArticleStore>,
}

#[derive(Debug, Deserialize)]
struct RecentArticlesInput {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    since_days: Option<u32>,
}

fn default_limit() -> u32 {
    20
}

#[async_trait]
impl Tool for RecentArticlesTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "recent_articles".to_string(),
            description: "List recently saved articles, newest first.".to_string(),
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "number", "description": "Maximum rows to return"},
                    "since_days": {"type": "number", "description": "Only articles updated in the last N days"}
                }
            })),
        }
    }

    async fn call(&self, arguments: Value) -> Result<Vec<ContentItem>> {
        let input: RecentArticlesInput = serde_json::from_value(arguments)
            .map_err(|err| invalid_input("recent_articles", err))?;
        let rows = self.store.recent(input.limit, input.since_days).await?;

        if rows.is_empty() {
            return Ok(vec![ContentItem::text("no articles saved yet")]);
        }
        let listing = rows
            .iter()
            .map(|row| {
                format!(
                    "- {} <{}> ({})",
                    row.title,
                    row.url,
                    row.updated_at.format("%Y-%m-%d %H:%M")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(vec![ContentItem::text(listing)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn toolkit() -> ToolRegistry {
        let store = Arc::new(ArticleStore::connect("sqlite::memory:").await.unwrap());
        article_toolkit(store)
    }

    #[tokio::test]
    async fn registers_all_three_tools() {
        let tools = toolkit().await;
        let names: Vec<String> = tools
            .descriptions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["recent_articles", "save_article", "save_articles"]);
    }

    #[tokio::test]
    async fn duplicate_save_is_reported_not_failed() {
        let tools = toolkit().await;
        let arguments = json!({"title": "Hello", "url": "https://example.com/hello"});

        let first = tools.call("save_article", arguments.clone()).await.unwrap();
        assert_eq!(first[0].as_text(), Some("saved: https://example.com/hello"));

        let second = tools.call("save_article", arguments).await.unwrap();
        assert!(second[0].as_text().unwrap().contains("already saved"));
    }

    #[tokio::test]
    async fn missing_url_is_invalid_arguments() {
        let tools = toolkit().await;
        let err = tools
            .call("save_article", json!({"title": "No url"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoutError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn batch_save_tallies_outcomes() {
        let tools = toolkit().await;
        tools
            .call("save_article", json!({"title": "A", "url": "https://e.com/a"}))
            .await
            .unwrap();

        let out = tools
            .call(
                "save_articles",
                json!({"articles": [
                    {"title": "A", "url": "https://e.com/a"},
                    {"title": "B", "url": "https://e.com/b"},
                ]}),
            )
            .await
            .unwrap();
        assert_eq!(
            out[0].as_text(),
            Some("saved 1 new, refreshed 1 existing, 0 failed")
        );
    }

    #[tokio::test]
    async fn recent_lists_newest_first() {
        let tools = toolkit().await;
        tools
            .call("save_article", json!({"title": "First", "url": "https://e.com/1"}))
            .await
            .unwrap();
        tools
            .call("save_article", json!({"title": "Second", "url": "https://e.com/2"}))
            .await
            .unwrap();

        let out = tools.call("recent_articles", json!({})).await.unwrap();
        let listing = out[0].as_text().unwrap();
        assert!(listing.contains("First"));
        assert!(listing.contains("Second"));
    }

    #[tokio::test]
    async fn recent_on_empty_store_says_so() {
        let tools = toolkit().await;
        let out = tools.call("recent_articles", json!({})).await.unwrap();
        assert_eq!(out[0].as_text(), Some("no articles saved yet"));
    }
}
