//! Client side of the Confluent Cloud Metrics API.
//!
//! [`MetricsApi`] is the seam between the collection pipeline and the remote
//! service; [`MetricsApiClient`] is the reqwest implementation.

mod error;
mod http;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

pub use error::ApiError;
pub use http::{Credentials, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, MetricsApiClient};

use crate::model::{MetricDescriptor, ResourceDescriptor};
use crate::query::{Query, QueryResponse};

/// Endpoints of the Metrics API used by the exporter.
#[async_trait]
pub trait MetricsApi: Send + Sync + 'static {
    /// `GET v2/metrics/cloud/descriptors/resources`
    async fn resource_descriptors(&self) -> Result<Vec<ResourceDescriptor>, ApiError>;

    /// `GET v2/metrics/cloud/descriptors/metrics?resource_type=<type>`
    async fn metric_descriptors(
        &self,
        resource_type: &str,
    ) -> Result<Vec<MetricDescriptor>, ApiError>;

    /// `POST v2/metrics/cloud/query`
    async fn query(&self, query: &Query) -> Result<QueryResponse, ApiError>;
}
