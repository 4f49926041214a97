//! Configuration for deduplication, scoring, and selection.
//!
//! Every section validates eagerly: an out-of-range threshold or weight is
//! rejected when the engine is built, never discovered mid-run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CurateError, Result};

/// Which look-back window a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One day of news, standard clustering.
    #[default]
    Daily,
    /// One week of news, story-chain detection enabled.
    Weekly,
}

impl RunMode {
    /// Whether multi-day story chains are detected in this mode.
    pub fn detects_story_chains(self) -> bool {
        matches!(self, Self::Weekly)
    }
}

impl std::str::FromStr for RunMode {
    type Err = CurateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(CurateError::ConfigurationError(format!(
                "unknown run mode '{other}' (expected 'daily' or 'weekly')"
            ))),
        }
    }
}

fn check_unit_open(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(CurateError::ConfigurationError(format!("{name} ({value}) must be in (0, 1)")))
    }
}

/// Longest accepted look-back window: one hundred years.
const MAX_WINDOW_HOURS: f64 = 24.0 * 366.0 * 100.0;

fn check_window(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= MAX_WINDOW_HOURS {
        Ok(())
    } else {
        Err(CurateError::ConfigurationError(format!(
            "{name} ({value}) must be positive and at most {MAX_WINDOW_HOURS} hours"
        )))
    }
}

/// Similarity thresholds for the clustering engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DedupeConfig {
    /// Cosine similarity at or above which two same-day items are duplicates.
    pub duplicate_threshold: f64,
    /// Lower bound for linking items on different days into a story chain.
    pub chain_threshold: f64,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self { duplicate_threshold: 0.85, chain_threshold: 0.75 }
    }
}

impl DedupeConfig {
    /// # Errors
    ///
    /// Returns [`CurateError::ConfigurationError`] unless both thresholds are
    /// in `(0, 1)` and `chain_threshold < duplicate_threshold`.
    pub fn validate(&self) -> Result<()> {
        check_unit_open("duplicate_threshold", self.duplicate_threshold)?;
        check_unit_open("chain_threshold", self.chain_threshold)?;
        if self.chain_threshold >= self.duplicate_threshold {
            return Err(CurateError::ConfigurationError(format!(
                "chain_threshold ({}) must be less than duplicate_threshold ({})",
                self.chain_threshold, self.duplicate_threshold
            )));
        }
        Ok(())
    }
}

/// Weights of the five score components.
///
/// They are designed to sum to 1 but are not required to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingWeights {
    pub recency: f64,
    pub credibility: f64,
    pub engagement: f64,
    pub uniqueness: f64,
    pub relevance: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            recency: 0.30,
            credibility: 0.25,
            engagement: 0.15,
            uniqueness: 0.15,
            relevance: 0.15,
        }
    }
}

impl RankingWeights {
    /// # Errors
    ///
    /// Returns [`CurateError::ConfigurationError`] if any weight is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("recency", self.recency),
            ("credibility", self.credibility),
            ("engagement", self.engagement),
            ("uniqueness", self.uniqueness),
            ("relevance", self.relevance),
        ];
        for (name, weight) in named {
            if !weight.is_finite() || weight < 0.0 {
                return Err(CurateError::ConfigurationError(format!(
                    "weight '{name}' ({weight}) must be a finite value >= 0"
                )));
            }
        }
        Ok(())
    }
}

/// Everything the scoring engine needs for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    pub weights: RankingWeights,
    /// Keywords matched case-insensitively against title and snippet.
    pub relevance_keywords: Vec<String>,
    /// Age in hours under which recency is 1.0.
    pub time_window_hours: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            relevance_keywords: Vec::new(),
            time_window_hours: 24.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        check_window("time_window_hours", self.time_window_hours)
    }
}

/// Sizes and score floors for the primary and secondary lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    pub top_count: usize,
    pub secondary_count: usize,
    pub min_score_top: f64,
    pub min_score_secondary: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { top_count: 5, secondary_count: 10, min_score_top: 0.3, min_score_secondary: 0.2 }
    }
}

impl SelectionConfig {
    /// # Errors
    ///
    /// Returns [`CurateError::ConfigurationError`] if a floor is not finite or
    /// `min_score_secondary > min_score_top`.
    pub fn validate(&self) -> Result<()> {
        if !self.min_score_top.is_finite() || !self.min_score_secondary.is_finite() {
            return Err(CurateError::ConfigurationError(
                "selection score floors must be finite".to_string(),
            ));
        }
        if self.min_score_secondary > self.min_score_top {
            return Err(CurateError::ConfigurationError(format!(
                "min_score_secondary ({}) must not exceed min_score_top ({})",
                self.min_score_secondary, self.min_score_top
            )));
        }
        Ok(())
    }
}

/// Look-back windows per run mode, in hours.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeWindows {
    pub daily_hours: f64,
    pub weekly_hours: f64,
}

impl Default for TimeWindows {
    fn default() -> Self {
        Self { daily_hours: 24.0, weekly_hours: 168.0 }
    }
}

impl TimeWindows {
    pub fn hours(&self, mode: RunMode) -> f64 {
        match mode {
            RunMode::Daily => self.daily_hours,
            RunMode::Weekly => self.weekly_hours,
        }
    }
}

/// Top-level configuration of a curation run.
///
/// Loadable from YAML; deserialized values are checked with
/// [`validate`](CurationConfig::validate) just like builder-made ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CurationConfig {
    pub dedupe: DedupeConfig,
    pub weights: RankingWeights,
    pub relevance_keywords: Vec<String>,
    pub selection: SelectionConfig,
    pub time_windows: TimeWindows,
    /// Drop items older than the mode's window before deduplication.
    pub filter_to_window: bool,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            dedupe: DedupeConfig::default(),
            weights: RankingWeights::default(),
            relevance_keywords: Vec::new(),
            selection: SelectionConfig::default(),
            time_windows: TimeWindows::default(),
            filter_to_window: true,
        }
    }
}

impl CurationConfig {
    /// Create a new builder for constructing a [`CurationConfig`].
    pub fn builder() -> CurationConfigBuilder {
        CurationConfigBuilder::default()
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| CurateError::ConfigurationError(format!("invalid YAML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.dedupe.validate()?;
        self.weights.validate()?;
        self.selection.validate()?;
        check_window("time_windows.daily_hours", self.time_windows.daily_hours)?;
        check_window("time_windows.weekly_hours", self.time_windows.weekly_hours)
    }

    /// The scoring configuration for a run mode.
    pub fn scoring(&self, mode: RunMode) -> ScoringConfig {
        ScoringConfig {
            weights: self.weights.clone(),
            relevance_keywords: self.relevance_keywords.clone(),
            time_window_hours: self.time_windows.hours(mode),
        }
    }
}

/// Builder for constructing a validated [`CurationConfig`].
#[derive(Debug, Clone, Default)]
pub struct CurationConfigBuilder {
    config: CurationConfig,
}

impl CurationConfigBuilder {
    /// Set the same-day duplicate similarity threshold.
    pub fn duplicate_threshold(mut self, threshold: f64) -> Self {
        self.config.dedupe.duplicate_threshold = threshold;
        self
    }

    /// Set the story-chain similarity threshold.
    pub fn chain_threshold(mut self, threshold: f64) -> Self {
        self.config.dedupe.chain_threshold = threshold;
        self
    }

    /// Set all five ranking weights.
    pub fn weights(mut self, weights: RankingWeights) -> Self {
        self.config.weights = weights;
        self
    }

    /// Set the keywords used for relevance scoring.
    pub fn relevance_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.relevance_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the primary/secondary selection policy.
    pub fn selection(mut self, selection: SelectionConfig) -> Self {
        self.config.selection = selection;
        self
    }

    /// Set the look-back window for daily runs.
    pub fn daily_window_hours(mut self, hours: f64) -> Self {
        self.config.time_windows.daily_hours = hours;
        self
    }

    /// Set the look-back window for weekly runs.
    pub fn weekly_window_hours(mut self, hours: f64) -> Self {
        self.config.time_windows.weekly_hours = hours;
        self
    }

    /// Enable or disable the pre-deduplication time-window filter.
    pub fn filter_to_window(mut self, enabled: bool) -> Self {
        self.config.filter_to_window = enabled;
        self
    }

    /// Build the [`CurationConfig`], validating every section.
    ///
    /// # Errors
    ///
    /// Returns [`CurateError::ConfigurationError`] on the first invalid value.
    pub fn build(self) -> Result<CurationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(CurationConfig::default().validate().is_ok());
        assert!(CurationConfig::builder().build().is_ok());
    }

    #[test]
    fn rejects_thresholds_outside_unit_interval() {
        for bad in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let err = CurationConfig::builder().duplicate_threshold(bad).build().unwrap_err();
            assert!(matches!(err, CurateError::ConfigurationError(_)), "{bad} accepted");
        }
    }

    #[test]
    fn rejects_chain_threshold_not_below_duplicate_threshold() {
        let err = CurationConfig::builder()
            .duplicate_threshold(0.8)
            .chain_threshold(0.8)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("chain_threshold"));
    }

    #[test]
    fn rejects_negative_weight() {
        let weights = RankingWeights { relevance: -0.1, ..RankingWeights::default() };
        let err = CurationConfig::builder().weights(weights).build().unwrap_err();
        assert!(err.to_string().contains("relevance"));
    }

    #[test]
    fn rejects_secondary_floor_above_top_floor() {
        let selection = SelectionConfig { min_score_secondary: 0.5, ..SelectionConfig::default() };
        assert!(CurationConfig::builder().selection(selection).build().is_err());
    }

    #[test]
    fn rejects_windows_beyond_a_century() {
        let err = CurationConfig::builder().daily_window_hours(1e10).build().unwrap_err();
        assert!(matches!(err, CurateError::ConfigurationError(_)));
        assert!(CurationConfig::builder().weekly_window_hours(f64::INFINITY).build().is_err());
        let century = CurationConfig::builder().weekly_window_hours(24.0 * 366.0 * 100.0);
        assert!(century.build().is_ok());

        let scoring = ScoringConfig { time_window_hours: 1e10, ..ScoringConfig::default() };
        assert!(scoring.validate().is_err());
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let yaml = "\
dedupe:
  duplicate_threshold: 0.9
relevance_keywords: [llm, chips]
selection:
  top_count: 3
";
        let config = CurationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.dedupe.duplicate_threshold, 0.9);
        assert_eq!(config.dedupe.chain_threshold, 0.75);
        assert_eq!(config.selection.top_count, 3);
        assert_eq!(config.selection.secondary_count, 10);
        assert_eq!(config.scoring(RunMode::Weekly).time_window_hours, 168.0);
    }

    #[test]
    fn yaml_is_validated() {
        let err = CurationConfig::from_yaml("weights:\n  recency: -1\n").unwrap_err();
        assert!(matches!(err, CurateError::ConfigurationError(_)));
    }

    #[test]
    fn parses_run_mode() {
        assert_eq!("Weekly".parse::<RunMode>().unwrap(), RunMode::Weekly);
        assert!("monthly".parse::<RunMode>().is_err());
        assert!(RunMode::Weekly.detects_story_chains());
        assert!(!RunMode::Daily.detects_story_chains());
    }
}
