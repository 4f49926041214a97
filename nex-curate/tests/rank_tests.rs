//! Scoring and selection properties.

use chrono::{DateTime, Duration, TimeZone, Utc};
use nex_curate::{
    NewsItem, RankedStory, Scorer, ScoringConfig, SelectionConfig, select, uniqueness_score,
};
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap()
}

fn scorer(window_hours: f64) -> Scorer {
    Scorer::new(ScoringConfig { time_window_hours: window_hours, ..ScoringConfig::default() })
        .unwrap()
}

#[test]
fn recency_edge_is_fresh_and_one_second_later_decays() {
    let scorer = scorer(24.0);
    let edge_time = now() - Duration::hours(24);
    let edge = NewsItem::new("https://edge", "t", "s", edge_time);
    let past = NewsItem::new("https://past", "t", "s", edge_time - Duration::seconds(1));

    assert_eq!(scorer.score_at(edge, now()).recency, 1.0);
    let decayed = scorer.score_at(past, now()).recency;
    assert!(decayed < 1.0);
    assert!(decayed > 0.99);
}

#[test]
fn weekly_window_keeps_five_day_old_items_fresh() {
    let item = NewsItem::new("https://a", "t", "s", now() - Duration::days(5));
    assert_eq!(scorer(168.0).score_at(item.clone(), now()).recency, 1.0);
    assert!(scorer(24.0).score_at(item, now()).recency < 1e-6);
}

#[test]
fn missing_credibility_scores_neutral() {
    let story = scorer(24.0).score_at(NewsItem::new("https://a", "t", "s", now()), now());
    assert_eq!(story.credibility, 0.5);
}

#[test]
fn absorbed_duplicates_lower_the_score() {
    let scorer = scorer(24.0);
    let single = NewsItem::new("https://a", "t", "s", now());
    let mut clustered = NewsItem::new("https://b", "t", "s", now());
    clustered.duplicates = vec!["https://c".into(), "https://d".into(), "https://e".into()];

    let ranked = scorer.rank_at(vec![clustered, single], now());
    assert_eq!(ranked[0].news_item.url, "https://a");
    assert_eq!(ranked[1].uniqueness, 0.25);
    assert!(ranked[0].score > ranked[1].score);
}

/// **Property 1: Uniqueness bound**
/// *For any* item with `n` recorded duplicates, the uniqueness component SHALL
/// equal `1 / (n + 1)`.
mod prop_uniqueness {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn uniqueness_is_inverse_cluster_size(n in 0usize..200) {
            let mut item = NewsItem::new("https://a", "t", "s", now());
            item.duplicates = (0..n).map(|i| format!("https://dup/{i}")).collect();
            let story = scorer(24.0).score_at(item, now());
            prop_assert!((story.uniqueness - 1.0 / (n as f64 + 1.0)).abs() < 1e-12);
            prop_assert_eq!(story.uniqueness, uniqueness_score(n));
        }
    }
}

/// **Property 2: Ranking order**
/// *For any* batch, `rank_at` SHALL return stories with non-increasing scores
/// and every component in `[0, 1]`.
mod prop_rank_order {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn ranked_scores_never_increase(
            rows in proptest::collection::vec((0i64..400, 0.0f64..1.0, 0usize..5), 0..40),
        ) {
            let items: Vec<NewsItem> = rows
                .iter()
                .enumerate()
                .map(|(i, (hours, cred, dups))| {
                    let mut item = NewsItem::new(
                        format!("https://news.test/{i}"),
                        "t",
                        "s",
                        now() - Duration::hours(*hours),
                    )
                    .with_credibility(*cred);
                    item.duplicates = (0..*dups).map(|d| format!("https://dup/{i}/{d}")).collect();
                    item
                })
                .collect();

            let ranked = scorer(24.0).rank_at(items, now());
            prop_assert_eq!(ranked.len(), rows.len());
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for s in &ranked {
                for c in [s.recency, s.credibility, s.engagement, s.uniqueness, s.relevance] {
                    prop_assert!((0.0..=1.0).contains(&c));
                }
            }
        }
    }
}

fn story(i: usize, score: f64) -> RankedStory {
    RankedStory {
        news_item: NewsItem::new(format!("https://news.test/{i}"), "t", "s", now()),
        score,
        recency: 1.0,
        credibility: 0.5,
        engagement: 0.5,
        uniqueness: 1.0,
        relevance: 0.5,
        summary: None,
    }
}

/// **Property 3: Selection disjointness**
/// *For any* ranked list and selection policy, the top and secondary lists
/// SHALL share no id, respect their sizes, and respect their score floors.
mod prop_selection {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn top_and_secondary_are_disjoint(
            scores in proptest::collection::vec(0.0f64..1.0, 0..40),
            top_count in 0usize..8,
            secondary_count in 0usize..15,
            floor_top in 0.0f64..1.0,
            gap in 0.0f64..0.5,
        ) {
            let mut scores = scores;
            scores.sort_by(|a, b| b.total_cmp(a));
            let ranked: Vec<RankedStory> =
                scores.iter().enumerate().map(|(i, &s)| story(i, s)).collect();
            let config = SelectionConfig {
                top_count,
                secondary_count,
                min_score_top: floor_top,
                min_score_secondary: (floor_top - gap).max(0.0),
            };

            let selection = select(&ranked, &config);
            prop_assert!(selection.top.len() <= top_count);
            prop_assert!(selection.secondary.len() <= secondary_count);
            prop_assert!(selection.top.iter().all(|s| s.score >= config.min_score_top));
            prop_assert!(selection.secondary.iter().all(|s| s.score >= config.min_score_secondary));
            for s in &selection.secondary {
                prop_assert!(selection.top.iter().all(|t| t.id() != s.id()));
            }
        }
    }
}
