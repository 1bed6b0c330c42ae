//! reqwest implementation of [`MetricsApi`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::{ApiError, MetricsApi};
use crate::model::{DescriptorResponse, MetricDescriptor, ResourceDescriptor};
use crate::query::{Query, QueryResponse};

/// Public Metrics API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.telemetry.confluent.cloud/";

/// Default request timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const RESOURCES_PATH: &str = "v2/metrics/cloud/descriptors/resources";
const METRICS_PATH: &str = "v2/metrics/cloud/descriptors/metrics";
const QUERY_PATH: &str = "v2/metrics/cloud/query";

const USER_AGENT: &str = concat!("ccloud-exporter/", env!("CARGO_PKG_VERSION"));
const CORRELATION_CONTEXT: HeaderName = HeaderName::from_static("correlation-context");
const CORRELATION_VALUE: &str = concat!(
    "service.name=ccloud-exporter,service.version=",
    env!("CARGO_PKG_VERSION")
);

/// Cloud API key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// HTTP client for the Metrics API.
#[derive(Clone)]
pub struct MetricsApiClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl MetricsApiClient {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    /// Returns [`ApiError::Url`] if the base URL does not parse, or
    /// [`ApiError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        // Without a trailing slash `join` would replace the last segment.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CORRELATION_CONTEXT, HeaderValue::from_static(CORRELATION_VALUE));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .basic_auth(&self.credentials.key, Some(&self.credentials.secret))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK {
            return Err(ApiError::from_status(status, String::from_utf8_lossy(&body)));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

impl fmt::Debug for MetricsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MetricsApi for MetricsApiClient {
    async fn resource_descriptors(&self) -> Result<Vec<ResourceDescriptor>, ApiError> {
        let url = self.endpoint(RESOURCES_PATH)?;
        let response: DescriptorResponse<ResourceDescriptor> =
            self.send(self.client.get(url)).await?;
        Ok(response.data)
    }

    async fn metric_descriptors(
        &self,
        resource_type: &str,
    ) -> Result<Vec<MetricDescriptor>, ApiError> {
        let mut url = self.endpoint(METRICS_PATH)?;
        url.query_pairs_mut()
            .append_pair("resource_type", resource_type);
        let response: DescriptorResponse<MetricDescriptor> =
            self.send(self.client.get(url)).await?;
        Ok(response.data)
    }

    async fn query(&self, query: &Query) -> Result<QueryResponse, ApiError> {
        let url = self.endpoint(QUERY_PATH)?;
        tracing::trace!(query = ?query, "Sending query");
        self.send(self.client.post(url).json(query)).await
    }
}
