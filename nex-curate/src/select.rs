//! Selection of the primary and secondary publication lists.
//!
//! All functions here take stories already in ranking order (see
//! [`Scorer::rank_at`](crate::Scorer::rank_at)) and never fail: an empty
//! selection is a valid outcome.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SelectionConfig;
use crate::item::{NewsItem, RankedStory};

/// The two publication lists of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Selection {
    pub top: Vec<RankedStory>,
    pub secondary: Vec<RankedStory>,
}

/// Stories sharing one `story_chain_id`, in ranking order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryChain {
    pub id: String,
    pub stories: Vec<RankedStory>,
}

/// The first `top_count` stories scoring at least `min_score`.
pub fn select_top(ranked: &[RankedStory], top_count: usize, min_score: f64) -> Vec<RankedStory> {
    let top: Vec<RankedStory> =
        ranked.iter().filter(|s| s.score >= min_score).take(top_count).cloned().collect();
    info!(selected = top.len(), total = ranked.len(), min_score, "selected top stories");
    top
}

/// The first `secondary_count` stories outside `top` scoring at least `min_score`.
pub fn select_secondary(
    ranked: &[RankedStory],
    top: &[RankedStory],
    secondary_count: usize,
    min_score: f64,
) -> Vec<RankedStory> {
    let top_ids: HashSet<&str> = top.iter().map(RankedStory::id).collect();
    let secondary: Vec<RankedStory> = ranked
        .iter()
        .filter(|s| !top_ids.contains(s.id()) && s.score >= min_score)
        .take(secondary_count)
        .cloned()
        .collect();
    info!(selected = secondary.len(), min_score, "selected secondary stories");
    secondary
}

/// Apply both selections with the configured sizes and floors.
pub fn select(ranked: &[RankedStory], config: &SelectionConfig) -> Selection {
    let top = select_top(ranked, config.top_count, config.min_score_top);
    let secondary =
        select_secondary(ranked, &top, config.secondary_count, config.min_score_secondary);
    Selection { top, secondary }
}

/// Keep items published no earlier than `hours` before `now`.
///
/// A window reaching past chrono's earliest date keeps every item.
pub fn filter_by_time_window(
    items: Vec<NewsItem>,
    hours: f64,
    now: DateTime<Utc>,
) -> Vec<NewsItem> {
    let total = items.len();
    let cutoff = Duration::try_milliseconds((hours * 3_600_000.0) as i64)
        .and_then(|window| now.checked_sub_signed(window));
    let Some(cutoff) = cutoff else {
        warn!(hours, "time window starts before the earliest representable date");
        return items;
    };
    let kept: Vec<NewsItem> = items.into_iter().filter(|i| i.published_at >= cutoff).collect();
    info!(kept = kept.len(), total, hours, "filtered to time window");
    kept
}

/// Group stories by `story_chain_id`, chains ordered by first appearance.
///
/// Stories without a chain are skipped.
pub fn group_story_chains(stories: &[RankedStory]) -> Vec<StoryChain> {
    let mut chains: Vec<StoryChain> = Vec::new();
    for story in stories {
        let Some(id) = story.news_item.story_chain_id.as_deref() else { continue };
        match chains.iter_mut().find(|c| c.id == id) {
            Some(chain) => chain.stories.push(story.clone()),
            None => chains.push(StoryChain { id: id.to_string(), stories: vec![story.clone()] }),
        }
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap()
    }

    fn story(url: &str, score: f64) -> RankedStory {
        RankedStory {
            news_item: NewsItem::new(url, "t", "s", now()),
            score,
            recency: 1.0,
            credibility: 0.5,
            engagement: 0.5,
            uniqueness: 1.0,
            relevance: 0.5,
            summary: None,
        }
    }

    fn urls(stories: &[RankedStory]) -> Vec<&str> {
        stories.iter().map(|s| s.news_item.url.as_str()).collect()
    }

    #[test]
    fn top_respects_count_and_floor() {
        let ranked = vec![story("a", 0.9), story("b", 0.8), story("c", 0.25), story("d", 0.1)];
        assert_eq!(urls(&select_top(&ranked, 5, 0.3)), ["a", "b"]);
        assert_eq!(urls(&select_top(&ranked, 1, 0.3)), ["a"]);
        assert!(select_top(&ranked, 0, 0.0).is_empty());
    }

    #[test]
    fn secondary_excludes_top() {
        let ranked = vec![story("a", 0.9), story("b", 0.8), story("c", 0.25), story("d", 0.1)];
        let selection = select(
            &ranked,
            &SelectionConfig {
                top_count: 1,
                secondary_count: 10,
                min_score_top: 0.3,
                min_score_secondary: 0.2,
            },
        );
        assert_eq!(urls(&selection.top), ["a"]);
        assert_eq!(urls(&selection.secondary), ["b", "c"]);
    }

    #[test]
    fn empty_input_selects_nothing() {
        let selection = select(&[], &SelectionConfig::default());
        assert!(selection.top.is_empty() && selection.secondary.is_empty());
    }

    #[test]
    fn time_window_keeps_boundary_item() {
        let items = vec![
            NewsItem::new("https://edge", "t", "s", now() - Duration::hours(24)),
            NewsItem::new("https://old", "t", "s", now() - Duration::hours(25)),
        ];
        let kept = filter_by_time_window(items, 24.0, now());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://edge");
    }

    #[test]
    fn unrepresentable_window_keeps_everything() {
        let items = vec![
            NewsItem::new("https://old", "t", "s", now() - Duration::days(3650)),
            NewsItem::new("https://new", "t", "s", now()),
        ];
        assert_eq!(filter_by_time_window(items.clone(), 1e10, now()), items);
        assert_eq!(filter_by_time_window(items.clone(), f64::MAX, now()), items);
    }

    #[test]
    fn groups_chains_in_first_appearance_order() {
        let mut stories = vec![story("a", 0.9), story("b", 0.8), story("c", 0.7), story("d", 0.6)];
        stories[0].news_item.story_chain_id = Some("y".into());
        stories[1].news_item.story_chain_id = Some("x".into());
        stories[3].news_item.story_chain_id = Some("y".into());

        let chains = group_story_chains(&stories);
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].id, "y");
        assert_eq!(urls(&chains[0].stories), ["a", "d"]);
        assert_eq!(chains[1].id, "x");
    }
}
