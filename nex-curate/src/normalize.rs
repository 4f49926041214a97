//! Cleanup applied to ingested items before curation.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::item::{NewsItem, item_id, representative_order};

/// Collapse runs of whitespace (including newlines and tabs) to single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean text fields, lowercase tags, and drop items lacking a title or URL.
///
/// The `id` of every kept item is recomputed from its URL, so ids supplied
/// by ingestion are never trusted. Items repeating a URL collapse into one,
/// chosen by [`representative_order`] and kept at the URL's first position.
pub fn normalize_items(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let total = items.len();
    let cleaned = items
        .into_iter()
        .filter_map(|mut item| {
            item.title = clean_text(&item.title);
            item.url = item.url.trim().to_string();
            if item.title.is_empty() || item.url.is_empty() {
                warn!(id = %item.id, url = %item.url, "skipping item with missing title or URL");
                return None;
            }
            item.id = item_id(&item.url);
            item.summary_raw = clean_text(&item.summary_raw);
            item.content_snippet = clean_text(&item.content_snippet);
            item.tags = item
                .tags
                .iter()
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect();
            Some(item)
        });

    let mut normalized: Vec<NewsItem> = Vec::with_capacity(total);
    let mut position_of: HashMap<String, usize> = HashMap::new();
    for item in cleaned {
        match position_of.get(&item.url) {
            Some(&at) => {
                debug!(url = %item.url, "collapsed repeated URL");
                if representative_order(&item, &normalized[at]) == Ordering::Less {
                    normalized[at] = item;
                }
            }
            None => {
                position_of.insert(item.url.clone(), normalized.len());
                normalized.push(item);
            }
        }
    }

    info!(kept = normalized.len(), total, "normalized items");
    normalized
}
