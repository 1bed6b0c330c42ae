//! ccloud-exporter - Confluent Cloud Metrics API exporter
//!
//! This crate queries the Confluent Cloud Metrics API for a set of
//! configured rules and republishes the results as Prometheus gauges.
//! It can be used as a library, or run as a standalone binary with the
//! `ccloud-exporter` executable.
//!
//! # Architecture
//!
//! - **Model**: resource kinds, descriptors and label naming
//! - **Rules**: validated collection units, with overlap resolution
//! - **Queries**: builder and group-by optimizer
//! - **Collection**: concurrent per (rule, metric) queries feeding samples
//! - **Cache**: short-TTL replay of the last cycle
//! - **Presentation**: Prometheus text exposition over HTTP

pub mod cache;
pub mod client;
pub mod collector;
pub mod config;
pub mod exporter;
pub mod model;
pub mod overlap;
pub mod query;
pub mod rule;
pub mod server;
pub mod sink;

pub use cache::ResultCache;
pub use client::{ApiError, Credentials, MetricsApi, MetricsApiClient};
pub use collector::{CollectionOrchestrator, FatalSignal, MetricCatalog};
pub use config::{AppConfig, ConfigError};
pub use exporter::{Exporter, ExporterError, ExporterSettings};
pub use model::{MetricDescriptor, ResourceDescriptor, ResourceKind};
pub use overlap::OverlapResolver;
pub use query::{Filter, Granularity, Query, QueryBuilder, QueryWindow};
pub use rule::{Rule, RuleError};
pub use sink::{MetricIdentity, Sample};
