//! Rewrites image content into a bounded textual surrogate.
//!
//! Raw screenshots are far too expensive to keep in the model's context,
//! so each one is traded for a short description produced by a single
//! auxiliary model call. The trade is one-way; the original bytes are
//! discarded.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::content::ContentItem;
use crate::error::{Result, ScoutError};
use crate::llm::LanguageModel;

/// Marker prefixed to every derived summary so it cannot be mistaken for
/// original tool output.
pub const SUMMARY_MARKER: &str = "[screenshot summary]";

/// Replacement text when a capture could not be summarized.
pub const SUMMARY_PLACEHOLDER: &str = "capture taken but could not be summarized";

const DESCRIBE_INSTRUCTION: &str =
    "Describe the headings, links, interactive elements, and key visible content in 3-4 sentences.";

#[derive(Clone)]
pub struct ContentNormalizer {
    model: Arc<dyn LanguageModel>,
}

impl ContentNormalizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Turn one image item into a text item carrying a derived summary.
    /// Non-image items are returned unchanged.
    pub async fn normalize(&self, item: ContentItem) -> Result<ContentItem> {
        let ContentItem::Image { data, mime_type } = item else {
            return Ok(item);
        };

        let payload = strip_data_uri(&data);
        // Round-trip through the decoder so a corrupt payload fails here
        // rather than inside the provider call.
        let decoded = BASE64
            .decode(payload)
            .map_err(|err| ScoutError::LanguageModel(format!("invalid image payload: {err}")))?;
        let encoded = BASE64.encode(decoded);

        let description = self
            .model
            .describe_image(&encoded, &mime_type, DESCRIBE_INSTRUCTION)
            .await?;

        Ok(ContentItem::text(format!("{SUMMARY_MARKER} {description}")))
    }
}

/// Accept both raw base64 strings and `data:<mime>;base64,<payload>` URIs.
fn strip_data_uri(data: &str) -> &str {
    if data.starts_with("data:") {
        data.split_once(',').map(|(_, rest)| rest).unwrap_or(data)
    } else {
        data
    }
}
