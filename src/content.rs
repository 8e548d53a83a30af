use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of a tool result's payload, in the provider's wire shape.
/// Kinds this agent does not understand pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType", default = "default_mime")]
        mime_type: String,
    },
    #[serde(untagged)]
    Other(Value),
}

fn default_mime() -> String {
    "image/png".to_string()
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentItem::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<(&str, &str)> {
        match self {
            ContentItem::Image { data, mime_type } => Some((data, mime_type)),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentItem::Image { .. })
    }

    /// Flatten a content sequence into a single text block for the model
    /// transcript. Images are represented by a short tag; they should have
    /// been normalized away before this point for the capture tool.
    pub fn join_text(items: &[ContentItem]) -> String {
        items
            .iter()
            .map(|item| match item {
                ContentItem::Text { text } => text.clone(),
                ContentItem::Image { mime_type, .. } => format!("[image: {mime_type}]"),
                ContentItem::Other(value) => value.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
