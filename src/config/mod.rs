//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Metrics API endpoint settings (base URL, timeout)
//! - Exporter settings (listener, delay, granularity, cache TTL)
//! - Collection rules

mod app;
mod rule;
mod validation;

pub use app::{AppConfig, DEFAULT_LISTENER, GeneralConfig, HttpConfig};
pub use rule::{DEFAULT_LABELS, DEFAULT_METRICS, RuleConfig};
pub use validation::{ConfigError, parse_duration};
