//! Model errors.

use thiserror::Error;

/// Errors raised while mapping API descriptors onto exported metrics.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The metric name has no segment outside the API namespaces.
    #[error("invalid metric name: '{0}'")]
    InvalidMetricName(String),

    /// The descriptor endpoint does not expose a resource type we need.
    #[error("no matching resource type '{0}' exposed by the Metrics API")]
    MissingResourceType(String),
}
