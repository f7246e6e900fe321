//! Deduplication and formatting of search results into prompt context

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use super::{SearchResponse, SourceDocument};

/// Approximate characters per token when truncating raw content
const CHARS_PER_TOKEN: usize = 4;

/// How much of each source is passed on to the model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceBudget {
    pub max_tokens_per_source: usize,
    pub include_raw_content: bool,
}

impl SourceBudget {
    pub fn new(max_tokens_per_source: usize, include_raw_content: bool) -> Self {
        Self { max_tokens_per_source, include_raw_content }
    }
}

/// Truncate to `limit` characters, marking the cut
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}... [truncated]", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Flatten, deduplicate by URL and render sources as one text block.
///
/// Duplicate URLs keep the position of their first occurrence and the value
/// of their last. Raw content is cut at `max_tokens_per_source * 4` chars.
pub fn deduplicate_and_format_sources(responses: &[SearchResponse], budget: SourceBudget) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut unique: HashMap<&str, &SourceDocument> = HashMap::new();

    for source in responses.iter().flat_map(|r| r.results.iter()) {
        if unique.insert(source.url.as_str(), source).is_none() {
            order.push(source.url.as_str());
        }
    }

    let char_limit = budget.max_tokens_per_source * CHARS_PER_TOKEN;
    let mut formatted = String::from("Sources:\n\n");

    for source in order.iter().filter_map(|url| unique.get(url)) {
        formatted.push_str(&format!("Source {}:\n===\n", source.title));
        formatted.push_str(&format!("URL: {}\n===\n", source.url));
        formatted.push_str(&format!("Most relevant content from source: {}\n===\n", source.content));

        if budget.include_raw_content {
            let raw = match source.raw_content.as_deref() {
                Some(raw) => truncate_chars(raw, char_limit),
                None => {
                    warn!(url = %source.url, "No raw_content found for source");
                    String::new()
                }
            };
            formatted.push_str(&format!(
                "Full source content limited to {} tokens: {}\n\n",
                budget.max_tokens_per_source, raw
            ));
        }
    }

    formatted.trim().to_string()
}
