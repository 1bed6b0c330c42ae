//! In-memory [`MetricsApi`] for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::{ApiError, MetricsApi};
use crate::model::{MetricDescriptor, ResourceDescriptor};
use crate::query::{Query, QueryResponse, Row};

#[derive(Debug, Clone)]
enum Reply {
    Rows(Vec<Row>),
    Status(u16),
}

#[derive(Debug, Default)]
pub(crate) struct MockApi {
    resources: Vec<ResourceDescriptor>,
    metrics: HashMap<String, Vec<MetricDescriptor>>,
    replies: HashMap<String, Reply>,
    queries: AtomicUsize,
    recorded: Mutex<Vec<Query>>,
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resources.push(resource);
        self
    }

    pub(crate) fn with_metric(mut self, resource_type: &str, metric: MetricDescriptor) -> Self {
        self.metrics
            .entry(resource_type.to_string())
            .or_default()
            .push(metric);
        self
    }

    /// Answer queries on `metric` with `rows` (JSON objects).
    pub(crate) fn respond(mut self, metric: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.replies.insert(metric.to_string(), Reply::Rows(rows));
        self
    }

    /// Answer queries on `metric` with an HTTP `status`.
    pub(crate) fn fail(mut self, metric: &str, status: u16) -> Self {
        self.replies.insert(metric.to_string(), Reply::Status(status));
        self
    }

    pub(crate) fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub(crate) fn recorded(&self) -> Vec<Query> {
        self.recorded
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetricsApi for MockApi {
    async fn resource_descriptors(&self) -> Result<Vec<ResourceDescriptor>, ApiError> {
        Ok(self.resources.clone())
    }

    async fn metric_descriptors(
        &self,
        resource_type: &str,
    ) -> Result<Vec<MetricDescriptor>, ApiError> {
        Ok(self.metrics.get(resource_type).cloned().unwrap_or_default())
    }

    async fn query(&self, query: &Query) -> Result<QueryResponse, ApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(query.clone());
        }

        let metric = query
            .aggregations
            .first()
            .map(|agg| agg.metric.as_str())
            .unwrap_or_default();

        match self.replies.get(metric) {
            Some(Reply::Rows(rows)) => Ok(QueryResponse { data: rows.clone() }),
            Some(Reply::Status(status)) => Err(ApiError::from_status(
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                "mock failure",
            )),
            None => Ok(QueryResponse::default()),
        }
    }
}
