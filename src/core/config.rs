use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;
use crate::core::providers::Provider;
use crate::core::quota::{LimitPolicy, ManagerConfig, Thresholds};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory for cache and quota ledger files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Flush caches every N processed subjects.
    #[serde(default = "default_save_frequency")]
    pub save_frequency: usize,
    /// Fixed pause between subjects, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    #[serde(default = "default_stop_threshold")]
    pub stop_threshold: f64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_save_frequency() -> usize {
    10
}
fn default_request_delay_ms() -> u64 {
    100
}
fn default_warning_threshold() -> f64 {
    0.8
}
fn default_stop_threshold() -> f64 {
    0.9
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            save_frequency: default_save_frequency(),
            request_delay_ms: default_request_delay_ms(),
            warning_threshold: default_warning_threshold(),
            stop_threshold: default_stop_threshold(),
            log_level: default_log_level(),
        }
    }
}

/// Integer weights per scorer. A zero weight disables the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerWeights {
    #[serde(default)]
    pub heuristics: u32,
    #[serde(default)]
    pub wikipedia: u32,
    #[serde(default)]
    pub youtube: u32,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            heuristics: 30,
            wikipedia: 70,
            youtube: 0,
        }
    }
}

impl ScorerWeights {
    /// Scorer ids with a non-zero weight.
    pub fn enabled(&self) -> Vec<(&'static str, u32)> {
        [
            ("heuristics", self.heuristics),
            ("wikipedia", self.wikipedia),
            ("youtube", self.youtube),
        ]
        .into_iter()
        .filter(|(_, weight)| *weight > 0)
        .collect()
    }

    pub fn total(&self) -> u32 {
        self.enabled().iter().map(|(_, weight)| weight).sum()
    }
}

/// Keyword tiers for the static prominence heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProminenceConfig {
    #[serde(default = "default_tier1_score")]
    pub tier1_score: u32,
    #[serde(default = "default_tier2_score")]
    pub tier2_score: u32,
    #[serde(default = "default_tier3_score")]
    pub tier3_score: u32,
    #[serde(default = "default_unknown_score")]
    pub unknown_score: u32,
    #[serde(default = "default_tier1")]
    pub tier1: Vec<String>,
    #[serde(default = "default_tier2")]
    pub tier2: Vec<String>,
    #[serde(default = "default_tier3")]
    pub tier3: Vec<String>,
}

fn default_tier1_score() -> u32 {
    90
}
fn default_tier2_score() -> u32 {
    70
}
fn default_tier3_score() -> u32 {
    50
}
fn default_unknown_score() -> u32 {
    30
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_tier1() -> Vec<String> {
    strings(&[
        "joe rogan",
        "the daily",
        "this american life",
        "cnn",
        "fox news",
        "msnbc",
        "abc",
        "nbc",
        "cbs",
        "bbc",
        "60 minutes",
        "daily mail",
        "buzzfeed",
        "huffpost",
        "new york times",
        "nytimes",
        "washington post",
        "usa today",
        "tmz",
        "reuters",
        "associated press",
        "ap news",
        "npr",
    ])
}

fn default_tier2() -> Vec<String> {
    strings(&[
        "politico",
        "vox",
        "axios",
        "the hill",
        "thehill",
        "slate",
        "anderson cooper",
        "rachel maddow",
        "morning joe",
        "tucker carlson",
        "pod save america",
        "radiolab",
        "serial",
        "pbs",
        "wapo",
        "ny times",
    ])
}

fn default_tier3() -> Vec<String> {
    strings(&["podcast", "show", "radio", "news", "television", "tv"])
}

impl Default for ProminenceConfig {
    fn default() -> Self {
        Self {
            tier1_score: default_tier1_score(),
            tier2_score: default_tier2_score(),
            tier3_score: default_tier3_score(),
            unknown_score: default_unknown_score(),
            tier1: default_tier1(),
            tier2: default_tier2(),
            tier3: default_tier3(),
        }
    }
}

impl ProminenceConfig {
    pub fn max_score(&self) -> u32 {
        [
            self.tier1_score,
            self.tier2_score,
            self.tier3_score,
            self.unknown_score,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    /// When set, the provider runs under a daily quota budget and
    /// `hourly_call_limit` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_quota_limit: Option<u64>,
    #[serde(default = "default_hourly_call_limit")]
    pub hourly_call_limit: u64,
    /// Environment variable whose presence enables the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

fn default_hourly_call_limit() -> u64 {
    100
}

impl ProviderConfig {
    pub fn policy(&self) -> LimitPolicy {
        LimitPolicy::from_limits(self.daily_quota_limit, self.hourly_call_limit)
    }

    pub fn has_credentials(&self) -> bool {
        match &self.api_key_env {
            Some(var) => std::env::var(var).is_ok_and(|value| !value.trim().is_empty()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub scorers: ScorerWeights,
    #[serde(default)]
    pub prominence: ProminenceConfig,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

fn default_providers() -> Vec<ProviderConfig> {
    Provider::all().iter().map(|p| p.default_config()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            scorers: ScorerWeights::default(),
            prominence: ProminenceConfig::default(),
            providers: default_providers(),
        }
    }
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("influence-tracker").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Serialize and write this config to the config file path.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Cache directory, respecting XDG_CACHE_HOME when not configured.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.settings.cache_dir {
            return dir.clone();
        }
        let base = std::env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".cache")
            });
        base.join("influence-tracker")
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            warning: self.settings.warning_threshold,
            stop: self.settings.stop_threshold,
        }
    }

    /// Provider settings from the file, or the built-in defaults when absent.
    pub fn provider(&self, provider: Provider) -> ProviderConfig {
        self.providers
            .iter()
            .find(|p| Provider::from_id(&p.id) == Some(provider))
            .cloned()
            .unwrap_or_else(|| provider.default_config())
    }

    pub fn manager_config(&self, provider: Provider) -> ManagerConfig {
        ManagerConfig::in_dir(
            &self.cache_dir(),
            provider.id(),
            provider.display_name(),
            self.provider(provider).policy(),
            self.thresholds(),
        )
    }

    /// Fatal configuration problems, raised before any cache or network activity.
    pub fn check(&self) -> Result<(), ConfigError> {
        let total = self.scorers.total();
        if total != 100 {
            return Err(ConfigError::WeightSum(total));
        }
        let max_score = self.prominence.max_score();
        if max_score > 100 {
            return Err(ConfigError::ScoreOutOfRange(max_score));
        }
        let thresholds = self.thresholds();
        if !thresholds.is_valid() {
            return Err(ConfigError::Thresholds {
                warning: thresholds.warning,
                stop: thresholds.stop,
            });
        }
        if let Some(p) = self
            .providers
            .iter()
            .find(|p| Provider::from_id(&p.id).is_none())
        {
            return Err(ConfigError::UnknownProvider(p.id.clone()));
        }
        Ok(())
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Err(e) = self.check() {
            issues.push(e.to_string());
        }
        if !["error", "warn", "info", "debug", "trace"].contains(&self.settings.log_level.as_str())
        {
            issues.push(format!(
                "Invalid log_level: '{}' (must be error|warn|info|debug|trace)",
                self.settings.log_level
            ));
        }
        if self.settings.save_frequency == 0 {
            issues.push("save_frequency must be at least 1".to_string());
        }
        for p in &self.providers {
            if p.daily_quota_limit.is_none() && p.hourly_call_limit == 0 {
                issues.push(format!(
                    "Provider '{}': hourly_call_limit must be positive when no daily_quota_limit is set",
                    p.id
                ));
            }
            if p.daily_quota_limit == Some(0) {
                issues.push(format!("Provider '{}': daily_quota_limit must be positive", p.id));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let issues = config.validate();
        assert!(issues.is_empty(), "Default config should be valid, got: {:?}", issues);
        assert!(config.check().is_ok());
    }

    #[test]
    fn default_providers_pick_their_regime() {
        let config = AppConfig::default();
        assert_eq!(
            config.provider(Provider::Wikipedia).policy(),
            LimitPolicy::RateLimited {
                hourly_call_limit: 500
            }
        );
        assert_eq!(
            config.provider(Provider::YouTube).policy(),
            LimitPolicy::QuotaLimited {
                daily_quota_limit: 10_000
            }
        );
    }

    #[test]
    fn enabled_scorers_skip_zero_weights() {
        let weights = ScorerWeights::default();
        assert_eq!(weights.enabled(), vec![("heuristics", 30), ("wikipedia", 70)]);
    }

    #[test]
    fn check_rejects_bad_weight_sum() {
        let mut config = AppConfig::default();
        config.scorers.youtube = 10;
        assert!(matches!(config.check(), Err(ConfigError::WeightSum(110))));
    }

    #[test]
    fn check_rejects_all_scorers_disabled() {
        let mut config = AppConfig::default();
        config.scorers = ScorerWeights {
            heuristics: 0,
            wikipedia: 0,
            youtube: 0,
        };
        assert!(matches!(config.check(), Err(ConfigError::WeightSum(0))));
    }

    #[test]
    fn check_rejects_score_above_100() {
        let mut config = AppConfig::default();
        config.prominence.tier1_score = 120;
        assert!(matches!(config.check(), Err(ConfigError::ScoreOutOfRange(120))));
    }

    #[test]
    fn check_rejects_inverted_thresholds() {
        let mut config = AppConfig::default();
        config.settings.warning_threshold = 0.95;
        assert!(matches!(config.check(), Err(ConfigError::Thresholds { .. })));
    }

    #[test]
    fn check_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        config.providers.push(ProviderConfig {
            id: "similarweb".to_string(),
            daily_quota_limit: None,
            hourly_call_limit: 100,
            api_key_env: None,
        });
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("Unknown provider")));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut config = AppConfig::default();
        config.settings.log_level = "loud".to_string();
        assert!(config.validate().iter().any(|i| i.contains("log_level")));
    }

    #[test]
    fn validate_catches_zero_hourly_limit() {
        let mut config = AppConfig::default();
        config.providers[0].daily_quota_limit = None;
        config.providers[0].hourly_call_limit = 0;
        assert!(config.validate().iter().any(|i| i.contains("hourly_call_limit")));
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[settings]
save_frequency = 25
stop_threshold = 0.85

[scorers]
heuristics = 20
wikipedia = 50
youtube = 30
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.settings.save_frequency, 25);
        assert!((config.settings.stop_threshold - 0.85).abs() < 1e-12);
        assert!((config.settings.warning_threshold - 0.8).abs() < 1e-12);
        assert_eq!(config.scorers.total(), 100);
        assert_eq!(config.providers.len(), Provider::all().len());
    }

    #[test]
    fn parse_provider_toml() {
        let toml = r#"
[[providers]]
id = "wikipedia"
daily_quota_limit = 2000
hourly_call_limit = 50
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(
            config.provider(Provider::Wikipedia).policy(),
            LimitPolicy::QuotaLimited {
                daily_quota_limit: 2000
            }
        );
        // Providers missing from the file fall back to defaults.
        assert_eq!(
            config.provider(Provider::YouTube).daily_quota_limit,
            Some(10_000)
        );
    }

    #[test]
    fn parse_empty_toml_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.settings.request_delay_ms, 100);
        assert_eq!(config.scorers.wikipedia, 70);
        assert_eq!(config.prominence.tier1_score, 90);
    }

    #[test]
    fn configured_cache_dir_wins() {
        let mut config = AppConfig::default();
        config.settings.cache_dir = Some(PathBuf::from("/data/cache_files"));
        let manager = config.manager_config(Provider::YouTube);
        assert_eq!(
            manager.ledger_path,
            PathBuf::from("/data/cache_files/youtube_quota.json")
        );
        assert_eq!(manager.provider_name, "YouTube");
    }

    #[test]
    fn missing_config_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.settings.save_frequency, 10);
    }

    #[test]
    fn credentials_follow_env_var() {
        let provider = ProviderConfig {
            id: "youtube".to_string(),
            daily_quota_limit: Some(10_000),
            hourly_call_limit: 100,
            api_key_env: Some("ITR_TEST_UNSET_KEY_VAR".to_string()),
        };
        assert!(!provider.has_credentials());
        let keyless = ProviderConfig {
            api_key_env: None,
            ..provider
        };
        assert!(keyless.has_credentials());
    }
}
