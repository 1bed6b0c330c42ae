//! Application configuration structures.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::rule::RuleConfig;
use super::validation::ConfigError;
use crate::cache::DEFAULT_CACHE_TTL;
use crate::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::exporter::ExporterSettings;
use crate::query::{DEFAULT_DELAY, Granularity, MAX_DELAY, QueryWindow};
use crate::rule::Rule;

// =============================================================================
// Constants
// =============================================================================

/// Default listener of the exposition endpoint.
pub const DEFAULT_LISTENER: &str = "0.0.0.0:2112";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_listener() -> String {
    DEFAULT_LISTENER.to_string()
}

fn default_delay() -> Duration {
    DEFAULT_DELAY
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

// =============================================================================
// HTTP Configuration
// =============================================================================

/// Metrics API client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// API base URL (default: "https://api.telemetry.confluent.cloud/").
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout (default: 60s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

// =============================================================================
// General Configuration
// =============================================================================

/// Exporter-wide settings, the `config` block of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub http: HttpConfig,

    /// Exposition endpoint bind address (default: "0.0.0.0:2112").
    #[serde(default = "default_listener")]
    pub listener: String,

    /// How far in the past the query window starts (default: 120s).
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,

    /// Aggregation bucket width (default: PT1M).
    #[serde(default)]
    pub granularity: Granularity,

    /// How long a cycle's samples are served again (default: 30s, 0 disables).
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Drop data point timestamps (default: false).
    #[serde(default)]
    pub no_timestamp: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            listener: default_listener(),
            delay: DEFAULT_DELAY,
            granularity: Granularity::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            no_timestamp: false,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub config: GeneralConfig,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl AppConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a YAML file without validating it.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from YAML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid, or
    /// `ConfigError::Rule` if a rule violates its invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.config.http.base_url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "invalid http base_url '{}': {e}",
                self.config.http.base_url
            ))
        })?;

        if self.config.http.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "http timeout must be positive".to_string(),
            ));
        }

        if self.config.delay > MAX_DELAY {
            return Err(ConfigError::ValidationError(format!(
                "delay must not exceed {}",
                humantime::format_duration(MAX_DELAY)
            )));
        }

        self.listen_addr()?;

        if self.rules.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one rule is required".to_string(),
            ));
        }

        self.to_rules()?;
        Ok(())
    }

    /// Parsed listener address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.config.listener.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid listener address: '{}'",
                self.config.listener
            ))
        })
    }

    /// Add a default rule over `clusters` when no rule is configured.
    pub fn ensure_default_rule(&mut self, clusters: &[String]) {
        if self.rules.is_empty() && !clusters.is_empty() {
            self.rules.push(RuleConfig::for_clusters(clusters.to_vec()));
        }
    }

    /// Expand every rule entry into validated rules, ids by position.
    pub fn to_rules(&self) -> Result<Vec<Rule>, ConfigError> {
        let mut rules = Vec::new();
        for (id, rule) in self.rules.iter().enumerate() {
            rules.extend(rule.to_rules(id)?);
        }
        Ok(rules)
    }

    pub fn exporter_settings(&self) -> ExporterSettings {
        ExporterSettings {
            window: QueryWindow::new(self.config.delay, self.config.granularity),
            no_timestamp: self.config.no_timestamp,
            cache_ttl: self.config.cache_ttl,
        }
    }
}
