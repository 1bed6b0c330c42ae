//! Collection Layer
//!
//! One collection cycle issues one query per (rule, metric) pair, each in its
//! own Tokio task, and streams the resulting samples into an MPSC channel.
//!
//! # Architecture
//!
//! - [`MetricCatalog`]: descriptors fetched at startup, keyed by resource kind
//! - [`CollectionOrchestrator`]: fans a cycle out over a `JoinSet` and joins it
//! - [`FatalSignal`]: raised when a query error must stop the process

mod cycle;
mod fatal;
mod metric;
mod response;

pub use cycle::{CollectionOrchestrator, CollectionSettings};
pub use fatal::FatalSignal;
pub use metric::{
    CollectedMetric, LATENCY_FAMILY, LATENCY_METRIC_LABEL, LATENCY_RULE_LABEL, MetricCatalog,
    latency_identity,
};
