//! Label and resource model of the Metrics API.
//!
//! The API addresses every label through a namespaced field name:
//! resource labels live under `resource.*` (e.g. `resource.kafka.id`) while
//! metric labels live under `metric.*` (e.g. `metric.topic`).
//!
//! - [`ResourceKind`]: the resource types this exporter collects
//! - [`MetricDescriptor`] / [`ResourceDescriptor`]: server-declared descriptors
//! - [`ExportedLabel`]: mapping between an exported label and its API field

mod descriptor;
mod error;
mod resource;

pub use descriptor::{
    DescriptorResponse, ExportedLabel, MetricDescriptor, MetricLabel, ResourceDescriptor,
    exported_labels, family_name,
};
pub use error::ModelError;
pub use resource::{
    PARTITION_LABEL, ResourceKind, TOPIC_FIELD, TOPIC_LABEL, exported_label_name, metric_field,
    resource_field,
};
