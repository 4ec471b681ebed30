//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TollgateError};
use crate::ratelimit::{Policy, Strategy};

/// Prefix for environment variable overrides, e.g.
/// `TOLLGATE_LIMITER__MAX_REQUESTS=5`.
pub const ENV_PREFIX: &str = "TOLLGATE";

/// Main configuration for Tollgate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Console front-end configuration
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Limiter configuration, fixed for the lifetime of the limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Admission strategy
    #[serde(default)]
    pub strategy: Strategy,

    /// Requests admitted per window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Sliding window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Credits accrued per credit interval
    #[serde(default)]
    pub credit_rate: u64,

    /// Credit interval in seconds
    #[serde(default = "default_credit_interval_secs")]
    pub credit_interval_secs: f64,

    /// Maximum balance per key; unbounded when absent
    #[serde(default)]
    pub credit_cap: Option<u64>,

    /// Balance each key starts with
    #[serde(default)]
    pub initial_credits: u64,

    /// Evict keys idle for this many seconds; never when absent
    #[serde(default)]
    pub idle_ttl_secs: Option<f64>,

    /// How often the console sweeps idle keys, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            credit_rate: 0,
            credit_interval_secs: default_credit_interval_secs(),
            credit_cap: None,
            initial_credits: 0,
            idle_ttl_secs: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_max_requests() -> usize {
    10
}

fn default_window_secs() -> f64 {
    1.0
}

fn default_credit_interval_secs() -> f64 {
    1.0
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl LimiterConfig {
    /// Convert to a validated [`Policy`].
    pub fn to_policy(&self) -> Result<Policy> {
        let policy = Policy {
            strategy: self.strategy,
            max_requests: self.max_requests,
            window: secs_to_duration("window_secs", self.window_secs)?,
            credit_rate: self.credit_rate,
            credit_interval: secs_to_duration("credit_interval_secs", self.credit_interval_secs)?,
            credit_cap: self.credit_cap,
            initial_credits: self.initial_credits,
            idle_ttl: self
                .idle_ttl_secs
                .map(|secs| secs_to_duration("idle_ttl_secs", secs))
                .transpose()?,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Interval between idle sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn secs_to_duration(field: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(TollgateError::InvalidConfiguration(format!(
            "{} must be a positive number of seconds, got {}",
            field, secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| TollgateError::InvalidConfiguration(format!("{}: {}", field, e)))
}

/// Console front-end configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl TollgateConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> Result<Self> {
        info!(path = %path, "Loading configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from an optional YAML file overlaid with
    /// `TOLLGATE_`-prefixed environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path, "Loading configuration");
            builder = builder.add_source(config::File::new(path, config::FileFormat::Yaml));
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize::<TollgateConfig>())
            .map_err(|e| TollgateError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TollgateConfig::default();
        assert_eq!(config.limiter.strategy, Strategy::Window);
        assert_eq!(config.limiter.max_requests, 10);
        assert_eq!(config.console.log_format, LogFormat::Text);

        let policy = config.limiter.to_policy().unwrap();
        assert_eq!(policy, Policy::default());
    }

    #[test]
    fn test_parse_hybrid_config() {
        let yaml = r#"
limiter:
  strategy: hybrid
  max_requests: 5
  window_secs: 10
  credit_rate: 2
  credit_interval_secs: 0.5
  credit_cap: 20
  initial_credits: 3
  idle_ttl_secs: 300
console:
  log_format: json
"#;
        let config = TollgateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.console.log_format, LogFormat::Json);

        let policy = config.limiter.to_policy().unwrap();
        assert_eq!(policy.strategy, Strategy::Hybrid);
        assert_eq!(policy.max_requests, 5);
        assert_eq!(policy.window, Duration::from_secs(10));
        assert_eq!(policy.credit_interval, Duration::from_millis(500));
        assert_eq!(policy.credit_cap, Some(20));
        assert_eq!(policy.initial_credits, 3);
        assert_eq!(policy.idle_ttl, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = TollgateConfig::from_yaml("limiter:\n  max_requests: 3\n").unwrap();
        assert_eq!(config.limiter.max_requests, 3);
        assert_eq!(config.limiter.window_secs, 1.0);
        assert_eq!(config.limiter.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_non_positive_seconds_rejected() {
        let mut config = LimiterConfig::default();
        config.window_secs = 0.0;
        assert!(matches!(
            config.to_policy(),
            Err(TollgateError::InvalidConfiguration(_))
        ));

        config.window_secs = f64::NAN;
        assert!(config.to_policy().is_err());

        config.window_secs = 1.0;
        config.credit_interval_secs = -5.0;
        assert!(config.to_policy().is_err());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = TollgateConfig::from_yaml("limiter:\n  strategy: leaky\n");
        assert!(matches!(result, Err(TollgateError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir()
            .join(format!("tollgate-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "limiter:\n  strategy: credit\n  credit_rate: 7\n").unwrap();

        let config = TollgateConfig::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.limiter.strategy, Strategy::Credit);
        assert_eq!(config.limiter.credit_rate, 7);
    }

    #[test]
    fn test_load_layers_environment_over_file() {
        let path = std::env::temp_dir()
            .join(format!("tollgate-layered-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "limiter:\n  strategy: credit\n  max_requests: 3\n  credit_rate: 4\n",
        )
        .unwrap();

        // No other test reads TOLLGATE_* variables
        std::env::set_var("TOLLGATE_LIMITER__MAX_REQUESTS", "5");
        let loaded = TollgateConfig::load(path.to_str());
        std::env::remove_var("TOLLGATE_LIMITER__MAX_REQUESTS");
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.limiter.max_requests, 5);
        assert_eq!(config.limiter.strategy, Strategy::Credit);
        assert_eq!(config.limiter.credit_rate, 4);
        assert_eq!(config.limiter.window_secs, 1.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = TollgateConfig::from_file("/nonexistent/tollgate.yaml");
        assert!(matches!(result, Err(TollgateError::Io(_))));
    }
}
