//! Configuration loading, validation, and management for Chronicle.
//!
//! Loads configuration from `~/.chronicle/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.chronicle/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tier gathering (timeouts, window sizes)
    #[serde(default)]
    pub tiers: TierConfig,

    /// Token budgets and category percentages
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Query analyzer settings
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Long-term (semantic search) tier settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Integration service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Deadline for each of the short/mid/long-term gathers
    #[serde(default = "default_tier_timeout_ms")]
    pub tier_timeout_ms: u64,

    /// Deadline for the lore-bible synthesis call
    #[serde(default = "default_lore_timeout_ms")]
    pub lore_timeout_ms: u64,

    #[serde(default = "default_recent_chapter_count")]
    pub recent_chapter_count: usize,

    #[serde(default = "default_max_arc_memories")]
    pub max_arc_memories: usize,

    /// Length of the previous-chapter ending excerpt, in characters
    #[serde(default = "default_ending_excerpt_chars")]
    pub ending_excerpt_chars: usize,
}

fn default_tier_timeout_ms() -> u64 {
    10_000
}
fn default_lore_timeout_ms() -> u64 {
    5_000
}
fn default_recent_chapter_count() -> usize {
    3
}
fn default_max_arc_memories() -> usize {
    3
}
fn default_ending_excerpt_chars() -> usize {
    1_000
}

impl TierConfig {
    pub fn tier_timeout(&self) -> Duration {
        Duration::from_millis(self.tier_timeout_ms)
    }

    pub fn lore_timeout(&self) -> Duration {
        Duration::from_millis(self.lore_timeout_ms)
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            tier_timeout_ms: default_tier_timeout_ms(),
            lore_timeout_ms: default_lore_timeout_ms(),
            recent_chapter_count: default_recent_chapter_count(),
            max_arc_memories: default_max_arc_memories(),
            ending_excerpt_chars: default_ending_excerpt_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Default token budget for a full generation context
    #[serde(default = "default_total_tokens")]
    pub total_tokens: usize,

    /// Token budget used by the quick-context composition
    #[serde(default = "default_quick_tokens")]
    pub quick_tokens: usize,

    /// Extra room granted to the previous-chapter ending, in percent of the budget
    #[serde(default = "default_previous_ending_slack_pct")]
    pub previous_ending_slack_pct: usize,

    /// Lore bibles above this share of the budget are cut in half
    #[serde(default = "default_lore_bible_max_share_pct")]
    pub lore_bible_max_share_pct: usize,

    #[serde(default)]
    pub percentages: BudgetPercentages,
}

fn default_total_tokens() -> usize {
    16_000
}
fn default_quick_tokens() -> usize {
    8_000
}
fn default_previous_ending_slack_pct() -> usize {
    5
}
fn default_lore_bible_max_share_pct() -> usize {
    50
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_total_tokens(),
            quick_tokens: default_quick_tokens(),
            previous_ending_slack_pct: default_previous_ending_slack_pct(),
            lore_bible_max_share_pct: default_lore_bible_max_share_pct(),
            percentages: BudgetPercentages::default(),
        }
    }
}

/// Share of the total budget given to each context category, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetPercentages {
    pub continuity: u32,
    pub lore_bible: u32,
    pub characters: u32,
    pub plot: u32,
    pub world: u32,
    pub power: u32,
    pub chapters: u32,
    pub style: u32,
}

impl BudgetPercentages {
    pub fn sum(&self) -> u32 {
        self.continuity
            + self.lore_bible
            + self.characters
            + self.plot
            + self.world
            + self.power
            + self.chapters
            + self.style
    }
}

impl Default for BudgetPercentages {
    fn default() -> Self {
        Self {
            continuity: 20,
            lore_bible: 15,
            characters: 15,
            plot: 15,
            world: 10,
            power: 10,
            chapters: 10,
            style: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// How many trailing characters of the latest chapter to analyze
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
}

fn default_max_queries() -> usize {
    8
}
fn default_window_chars() -> usize {
    1_000
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_queries: default_max_queries(),
            window_chars: default_window_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_results_per_category")]
    pub max_results_per_category: usize,

    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

fn default_max_results_per_category() -> usize {
    5
}
fn default_min_score() -> f32 {
    0.2
}
fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_results_per_category: default_max_results_per_category(),
            min_score: default_min_score(),
        }
    }
}

/// How the integration service turns gathered tiers into the final string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStrategy {
    /// Fixed section order, greedy fill
    #[default]
    Tiered,
    /// Structural priorities with must-include continuity
    Prioritized,
}

impl std::str::FromStr for AssemblyStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tiered" => Ok(Self::Tiered),
            "prioritized" => Ok(Self::Prioritized),
            other => Err(ConfigError::ValidationError(format!(
                "unknown assembly strategy '{other}' (expected 'tiered' or 'prioritized')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub strategy: AssemblyStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.chronicle/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `CHRONICLE_TOKEN_BUDGET`: total token budget
    /// - `CHRONICLE_STRATEGY`: `tiered` or `prioritized`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_path(&Self::config_dir().join("config.toml"))
    }

    /// Load `path` the way [`load`](Self::load) loads the default file,
    /// environment overrides included.
    pub fn load_path(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_overrides(path, |key| std::env::var(key).ok())
    }

    /// Load configuration from a specific file path, without overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn load_with_overrides(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(budget) = lookup("CHRONICLE_TOKEN_BUDGET") {
            self.budget.total_tokens = budget.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "CHRONICLE_TOKEN_BUDGET must be a non-negative integer, got '{budget}'"
                ))
            })?;
        }

        if let Some(strategy) = lookup("CHRONICLE_STRATEGY") {
            self.service.strategy = strategy.parse()?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chronicle")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.tier_timeout_ms == 0 || self.tiers.lore_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tier and lore timeouts must be > 0".into(),
            ));
        }

        let sum = self.budget.percentages.sum();
        if sum != 100 {
            return Err(ConfigError::ValidationError(format!(
                "budget percentages must sum to 100, got {sum}"
            )));
        }

        if self.budget.lore_bible_max_share_pct > 100 || self.budget.previous_ending_slack_pct > 100
        {
            return Err(ConfigError::ValidationError(
                "budget shares are percentages and must be <= 100".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.search.min_score) {
            return Err(ConfigError::ValidationError(
                "search.min_score must be between 0.0 and 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
