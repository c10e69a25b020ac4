//! Configuration loading and typed config structures for Civitas.
//!
//! The canonical configuration lives in `civitas-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Agent-level tunables (`behavior`, `memory`, `social`) are owned by
//! `civitas-agents` and embedded here as sections.

use std::collections::BTreeMap;
use std::path::Path;

use civitas_agents::{BehaviorConfig, MemoryConfig, SocialConfig};
use serde::Deserialize;
use validator::{Validate, ValidationError};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of range.
    #[error("invalid configuration: {source}")]
    Invalid {
        /// Every field that failed validation.
        #[from]
        source: validator::ValidationErrors,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `civitas-config.yaml`. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct SimulationConfig {
    /// City-level settings (name, seed, timing, weather).
    #[serde(default)]
    #[validate(nested)]
    pub city: CityConfig,

    /// Action timing, cooldowns, and state drift.
    #[serde(default)]
    #[validate(custom(function = "validate_behavior"))]
    pub behavior: BehaviorConfig,

    /// Memory capacities.
    #[serde(default)]
    #[validate(custom(function = "validate_memory"))]
    pub memory: MemoryConfig,

    /// Social interaction thresholds.
    #[serde(default)]
    #[validate(custom(function = "validate_social"))]
    pub social: SocialConfig,

    /// Decision oracle settings.
    #[serde(default)]
    #[validate(nested)]
    pub oracle: OracleConfig,

    /// Snapshot persistence.
    #[serde(default)]
    #[validate(nested)]
    pub persistence: PersistenceConfig,

    /// Run boundaries.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `CIVITAS_ORACLE_PROVIDER` moves that provider to the front of
    ///   `oracle.providers`
    /// - `CIVITAS_SNAPSHOT_DIR` overrides `persistence.directory`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("CIVITAS_ORACLE_PROVIDER") {
            self.oracle.prefer_provider(&provider);
        }
        if let Ok(dir) = std::env::var("CIVITAS_SNAPSHOT_DIR") {
            self.persistence.directory = dir;
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// City-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct CityConfig {
    /// Human-readable city name.
    #[serde(default = "default_city_name")]
    pub name: String,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    #[validate(range(min = 1))]
    pub tick_interval_ms: u64,

    /// Game hour the simulation starts at.
    #[serde(default = "default_start_hour")]
    #[validate(range(max = 23))]
    pub start_hour: u32,

    /// Initial time scale.
    #[serde(default = "default_time_scale")]
    #[validate(range(min = 0.5, max = 10.0))]
    pub time_scale: f64,

    /// Chance per tick that the weather changes.
    #[serde(default = "default_weather_change_chance")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub weather_change_chance: f64,

    /// Number of residents to seed when no snapshot exists.
    #[serde(default = "default_residents")]
    pub residents: u32,

    /// Records of each kind shown per agent in the render view.
    #[serde(default = "default_render_recent")]
    pub render_recent: usize,
}

impl Default for CityConfig {
    fn default() -> Self {
        Self {
            name: default_city_name(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            start_hour: default_start_hour(),
            time_scale: default_time_scale(),
            weather_change_chance: default_weather_change_chance(),
            residents: default_residents(),
            render_recent: default_render_recent(),
        }
    }
}

/// Per-provider request limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per rolling minute.
    pub per_minute: u32,
    /// Requests allowed per rolling hour.
    pub per_hour: u32,
    /// Minimum gap between requests in milliseconds.
    pub cooldown_ms: u64,
}

/// Decision oracle configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct OracleConfig {
    /// Whether to call a remote oracle at all. When off, every decision
    /// comes from the local fallback.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Providers in the order they are tried.
    #[serde(default = "default_providers")]
    #[validate(length(min = 1))]
    pub providers: Vec<String>,

    /// Hard timeout around every oracle call from the tick loop.
    #[serde(default = "default_oracle_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Delays before each retry, in milliseconds.
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,

    /// Attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: u32,

    /// Consecutive failures before switching provider.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// How long a cached decision stays valid.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Cache size above which expired entries are swept.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Minimum gap between decision requests. Requests inside it get the
    /// fallback decision.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Rate limits keyed by provider name.
    #[serde(default = "default_rate_limits")]
    pub rate_limits: BTreeMap<String, RateLimitConfig>,
}

impl OracleConfig {
    /// Move `provider` to the front of the provider order.
    pub fn prefer_provider(&mut self, provider: &str) {
        let name = provider.trim().to_lowercase();
        if name.is_empty() {
            return;
        }
        self.providers.retain(|p| *p != name);
        self.providers.insert(0, name);
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: default_providers(),
            timeout_ms: default_oracle_timeout_ms(),
            retry_delays_ms: default_retry_delays_ms(),
            max_attempts: default_max_attempts(),
            max_consecutive_failures: default_max_consecutive_failures(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_entries: default_cache_max_entries(),
            min_request_interval_ms: default_min_request_interval_ms(),
            rate_limits: default_rate_limits(),
        }
    }
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct PersistenceConfig {
    /// Whether snapshots are read and written.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding one JSON file per agent.
    #[serde(default = "default_snapshot_dir")]
    #[validate(length(min = 1))]
    pub directory: String,

    /// Snapshot every N ticks.
    #[serde(default = "default_snapshot_interval_ticks")]
    #[validate(range(min = 1))]
    pub interval_ticks: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_snapshot_dir(),
            interval_ticks: default_snapshot_interval_ticks(),
        }
    }
}

/// Simulation boundary configuration.
///
/// A value of 0 for either field means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Maximum number of ticks before the simulation ends.
    #[serde(default)]
    pub max_ticks: u64,

    /// Maximum wall-clock seconds before the simulation ends.
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation of embedded agent sections
// ---------------------------------------------------------------------------

fn validate_behavior(behavior: &BehaviorConfig) -> Result<(), ValidationError> {
    if behavior.action_timeout_ms == 0 {
        return Err(ValidationError::new("action_timeout_ms must be positive"));
    }
    if !(behavior.movement_speed.is_finite() && behavior.movement_speed > 0.0) {
        return Err(ValidationError::new("movement_speed must be positive"));
    }
    if !(behavior.arrival_tolerance.is_finite() && behavior.arrival_tolerance >= 0.0) {
        return Err(ValidationError::new("arrival_tolerance must not be negative"));
    }
    Ok(())
}

fn validate_memory(memory: &MemoryConfig) -> Result<(), ValidationError> {
    if memory.short_term_cap == 0 || memory.long_term_cap == 0 {
        return Err(ValidationError::new("memory caps must be positive"));
    }
    Ok(())
}

fn validate_social(social: &SocialConfig) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&social.compatibility_threshold) {
        return Err(ValidationError::new("compatibility_threshold must be in [0, 1]"));
    }
    if social.earliest_hour > 24 || social.latest_hour > 24 {
        return Err(ValidationError::new("social hours must be in 0..=24"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_city_name() -> String {
    "Civitas".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_start_hour() -> u32 {
    8
}

const fn default_time_scale() -> f64 {
    1.0
}

const fn default_weather_change_chance() -> f64 {
    0.001
}

const fn default_residents() -> u32 {
    8
}

const fn default_render_recent() -> usize {
    5
}

const fn default_true() -> bool {
    true
}

fn default_providers() -> Vec<String> {
    ["deepseek", "openai", "anthropic", "step"]
        .iter()
        .map(|p| (*p).to_owned())
        .collect()
}

const fn default_oracle_timeout_ms() -> u64 {
    8_000
}

fn default_retry_delays_ms() -> Vec<u64> {
    vec![2_000, 5_000, 10_000]
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_max_consecutive_failures() -> u32 {
    3
}

const fn default_cache_ttl_ms() -> u64 {
    30_000
}

const fn default_cache_max_entries() -> usize {
    1_000
}

const fn default_min_request_interval_ms() -> u64 {
    2_000
}

fn default_rate_limits() -> BTreeMap<String, RateLimitConfig> {
    BTreeMap::from([
        (
            "step".to_owned(),
            RateLimitConfig {
                per_minute: 20,
                per_hour: 200,
                cooldown_ms: 3_000,
            },
        ),
        (
            "deepseek".to_owned(),
            RateLimitConfig {
                per_minute: 30,
                per_hour: 300,
                cooldown_ms: 2_000,
            },
        ),
        (
            "openai".to_owned(),
            RateLimitConfig {
                per_minute: 50,
                per_hour: 500,
                cooldown_ms: 1_200,
            },
        ),
    ])
}

fn default_snapshot_dir() -> String {
    "snapshots".to_owned()
}

const fn default_snapshot_interval_ticks() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.city.seed, 42);
        assert_eq!(config.city.start_hour, 8);
        assert_eq!(config.oracle.providers.first().map(String::as_str), Some("deepseek"));
        assert_eq!(config.oracle.cache_ttl_ms, 30_000);
        assert_eq!(config.persistence.interval_ticks, 100);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
city:
  name: "Harbor Town"
  seed: 7
  tick_interval_ms: 250
  start_hour: 6
  time_scale: 2.0
  weather_change_chance: 0.01
  residents: 12

behavior:
  success_cooldown_ms: 4000
  think_interval_ms: 3000

memory:
  short_term_cap: 10
  long_term_cap: 50

social:
  search_radius: 80.0
  compatibility_threshold: 0.4

oracle:
  enabled: false
  providers: ["openai"]
  timeout_ms: 5000
  rate_limits:
    openai:
      per_minute: 10
      per_hour: 100
      cooldown_ms: 500

persistence:
  directory: "/tmp/civitas"
  interval_ticks: 20

simulation:
  max_ticks: 1000
  max_real_time_seconds: 60

logging:
  level: "debug"
  json: true
"#;
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.city.name, "Harbor Town");
        assert_eq!(config.city.residents, 12);
        assert!((config.city.time_scale - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.behavior.success_cooldown_ms, 4000);
        assert_eq!(config.behavior.failure_cooldown_ms, 8000);
        assert_eq!(config.memory.short_term_cap, 10);
        assert!(!config.oracle.enabled);
        assert_eq!(config.oracle.rate_limits.get("openai").unwrap().per_minute, 10);
        assert_eq!(config.persistence.interval_ticks, 20);
        assert_eq!(config.simulation.max_ticks, 1000);
        assert!(config.logging.json);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SimulationConfig::parse("").is_ok());
    }

    #[test]
    fn rejects_out_of_range_scale() {
        let result = SimulationConfig::parse("city:\n  time_scale: 25.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn rejects_zero_memory_cap() {
        let result = SimulationConfig::parse("memory:\n  short_term_cap: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn preferred_provider_moves_to_front() {
        let mut oracle = OracleConfig::default();
        oracle.prefer_provider("Step");
        assert_eq!(
            oracle.providers,
            vec!["step", "deepseek", "openai", "anthropic"]
        );
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("civitas-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
