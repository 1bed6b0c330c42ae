//! Descriptors of the metrics a cycle collects.

use std::collections::HashMap;

use crate::model::{
    ExportedLabel, MetricDescriptor, ModelError, ResourceDescriptor, ResourceKind,
    exported_labels, family_name,
};
use crate::sink::MetricIdentity;

/// Family of the per-query latency gauge.
pub const LATENCY_FAMILY: &str = "ccloud_metrics_api_request_latency";

/// Label holding the queried metric name.
pub const LATENCY_METRIC_LABEL: &str = "metric";

/// Label holding the rule number.
pub const LATENCY_RULE_LABEL: &str = "ruleNumber";

/// Identity of the latency gauge.
pub fn latency_identity() -> MetricIdentity {
    MetricIdentity::new(
        LATENCY_FAMILY,
        "Metrics API request latency in seconds",
        vec![
            LATENCY_METRIC_LABEL.to_string(),
            LATENCY_RULE_LABEL.to_string(),
        ],
    )
}

/// A metric exposed by the API together with its exported form.
#[derive(Debug, Clone)]
pub struct CollectedMetric {
    pub descriptor: MetricDescriptor,
    pub kind: ResourceKind,
    pub identity: MetricIdentity,
    /// Exported labels in identity order, with their API fields.
    pub labels: Vec<ExportedLabel>,
}

impl CollectedMetric {
    /// # Errors
    /// Returns [`ModelError::InvalidMetricName`] if no family name can be derived.
    pub fn new(
        kind: ResourceKind,
        resource: &ResourceDescriptor,
        descriptor: MetricDescriptor,
    ) -> Result<Self, ModelError> {
        let name = family_name(kind, &descriptor)?;
        let labels = exported_labels(resource, &descriptor);
        let help = if descriptor.description.is_empty() {
            descriptor.name.clone()
        } else {
            descriptor.description.clone()
        };
        let identity = MetricIdentity::new(
            name,
            help,
            labels.iter().map(|label| label.name.clone()).collect(),
        );

        Ok(Self {
            descriptor,
            kind,
            identity,
            labels,
        })
    }

    pub fn family(&self) -> &str {
        &self.identity.name
    }
}

/// Resource and metric descriptors, fetched once at startup.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    resources: HashMap<ResourceKind, ResourceDescriptor>,
    metrics: Vec<CollectedMetric>,
    index: HashMap<(ResourceKind, String), usize>,
}

impl MetricCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_resource(&mut self, kind: ResourceKind, resource: ResourceDescriptor) {
        self.resources.insert(kind, resource);
    }

    /// Register `descriptor` under `kind`. Registering a metric twice is a no-op.
    ///
    /// # Errors
    /// Returns [`ModelError::MissingResourceType`] if the kind's resource is
    /// unknown, or [`ModelError::InvalidMetricName`] for an unusable name.
    pub fn insert_metric(
        &mut self,
        kind: ResourceKind,
        descriptor: MetricDescriptor,
    ) -> Result<(), ModelError> {
        let key = (kind, descriptor.name.clone());
        if self.index.contains_key(&key) {
            return Ok(());
        }

        let resource = self
            .resources
            .get(&kind)
            .ok_or_else(|| ModelError::MissingResourceType(kind.to_string()))?;
        let metric = CollectedMetric::new(kind, resource, descriptor)?;

        self.index.insert(key, self.metrics.len());
        self.metrics.push(metric);
        Ok(())
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<&ResourceDescriptor> {
        self.resources.get(&kind)
    }

    pub fn metric(&self, kind: ResourceKind, name: &str) -> Option<&CollectedMetric> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&i| &self.metrics[i])
    }

    pub fn metrics(&self) -> &[CollectedMetric] {
        &self.metrics
    }

    /// Identities of every registered metric, then the latency gauge.
    pub fn identities(&self) -> Vec<MetricIdentity> {
        self.metrics
            .iter()
            .map(|metric| metric.identity.clone())
            .chain(std::iter::once(latency_identity()))
            .collect()
    }
}
