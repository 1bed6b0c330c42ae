//! Metric and resource descriptors returned by the descriptor endpoints.

use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::resource::{ResourceKind, exported_label_name, metric_field, resource_field};

/// Metric name segments that are namespaces rather than names.
const NAMESPACE_SEGMENTS: &[&str] = &[
    "io.confluent.kafka.server",
    "io.confluent.kafka.connect",
    "io.confluent.kafka.ksql",
    "io.confluent.kafka.schema_registry",
    "delta",
];

/// Envelope shared by both descriptor endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// A label declared by a metric or resource descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricLabel {
    pub key: String,
    #[serde(default)]
    pub description: String,
}

impl MetricLabel {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
        }
    }
}

/// A metric as declared by `v2/metrics/cloud/descriptors/metrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    /// Fully qualified name, e.g. `io.confluent.kafka.server/received_bytes`.
    pub name: String,
    #[serde(default, rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    /// Supported metric labels, in server order.
    #[serde(default)]
    pub labels: Vec<MetricLabel>,
}

impl MetricDescriptor {
    /// Create a descriptor with the given label keys.
    pub fn new(name: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            name: name.into(),
            metric_type: String::new(),
            unit: String::new(),
            description: String::new(),
            labels: labels.iter().map(|key| MetricLabel::new(*key)).collect(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the metric supports `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.key == label)
    }

    /// Human friendly name: the first segment of the name that is not a namespace.
    ///
    /// `io.confluent.kafka.server/retained_bytes` yields `retained_bytes`.
    pub fn nice_name(&self) -> Result<&str, ModelError> {
        self.name
            .split('/')
            .find(|segment| !segment.is_empty() && !NAMESPACE_SEGMENTS.contains(segment))
            .ok_or_else(|| ModelError::InvalidMetricName(self.name.clone()))
    }
}

/// A resource type as declared by `v2/metrics/cloud/descriptors/resources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource type, e.g. `kafka`.
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub description: String,
    /// Resource labels, e.g. `kafka.id`.
    #[serde(default)]
    pub labels: Vec<MetricLabel>,
}

impl ResourceDescriptor {
    /// Create a descriptor with the given label keys.
    pub fn new(resource_type: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            resource_type: resource_type.into(),
            description: String::new(),
            labels: labels.iter().map(|key| MetricLabel::new(*key)).collect(),
        }
    }

    /// Parse the resource type into a known kind.
    pub fn kind(&self) -> Option<ResourceKind> {
        self.resource_type.parse().ok()
    }

    /// Label key as declared, without a `resource.` prefix.
    fn normalized_keys(&self) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .map(|l| l.key.strip_prefix("resource.").unwrap_or(&l.key))
    }

    /// Find the declared key matching `label`.
    ///
    /// Dots and underscores are interchangeable so that both `kafka.id` and
    /// the exported `kafka_id` match.
    pub fn find_label(&self, label: &str) -> Option<&str> {
        let wanted = exported_label_name(label);
        self.normalized_keys()
            .find(|key| exported_label_name(key) == wanted)
    }

    /// Whether the resource declares `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.find_label(label).is_some()
    }
}

/// An exported label and the API field its value is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedLabel {
    /// Prometheus label name.
    pub name: String,
    /// Field name in query rows.
    pub field: String,
}

/// Exported labels of `metric`: resource labels first, then metric labels.
pub fn exported_labels(
    resource: &ResourceDescriptor,
    metric: &MetricDescriptor,
) -> Vec<ExportedLabel> {
    let resource_labels = resource.normalized_keys().map(|key| ExportedLabel {
        name: exported_label_name(key),
        field: resource_field(key),
    });
    let metric_labels = metric.labels.iter().map(|l| ExportedLabel {
        name: exported_label_name(&l.key),
        field: metric_field(&l.key),
    });

    let mut labels: Vec<ExportedLabel> = Vec::new();
    for label in resource_labels.chain(metric_labels) {
        if !labels.iter().any(|existing| existing.name == label.name) {
            labels.push(label);
        }
    }
    labels
}

/// Exported family name of `metric` for `kind`.
pub fn family_name(kind: ResourceKind, metric: &MetricDescriptor) -> Result<String, ModelError> {
    let nice = metric.nice_name()?;
    let sanitized: String = nice
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    Ok(format!("{}{}", kind.family_prefix(), sanitized))
}
