//! Resource kinds and label field naming.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Metric label carrying the topic name.
pub const TOPIC_LABEL: &str = "topic";

/// Metric label carrying the partition number.
pub const PARTITION_LABEL: &str = "partition";

/// API field of the topic label.
pub const TOPIC_FIELD: &str = "metric.topic";

/// Resource types collected by the exporter.
///
/// The string form is the `type` used by the resource descriptor endpoint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResourceKind {
    /// Kafka cluster (`lkc-*`).
    Kafka,
    /// Managed connector (`lcc-*`).
    Connector,
    /// ksqlDB streaming application (`lksqlc-*`).
    Ksql,
    /// Schema Registry instance (`lsrc-*`).
    SchemaRegistry,
}

impl ResourceKind {
    /// All kinds in configuration order.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Kafka,
        ResourceKind::Connector,
        ResourceKind::Ksql,
        ResourceKind::SchemaRegistry,
    ];

    /// Metric namespace whose metrics belong to this kind.
    pub fn metric_namespace(&self) -> &'static str {
        match self {
            Self::Kafka => "io.confluent.kafka.server",
            Self::Connector => "io.confluent.kafka.connect",
            Self::Ksql => "io.confluent.kafka.ksql",
            Self::SchemaRegistry => "io.confluent.kafka.schema_registry",
        }
    }

    /// Resource label identifying one resource of this kind.
    pub fn id_label(&self) -> &'static str {
        match self {
            Self::Kafka => "kafka.id",
            Self::Connector => "connector.id",
            Self::Ksql => "ksql.id",
            Self::SchemaRegistry => "schema_registry.id",
        }
    }

    /// API field used to filter on the resource identifier.
    pub fn id_field(&self) -> String {
        resource_field(self.id_label())
    }

    /// Prefix of every exported family name for this kind.
    pub fn family_prefix(&self) -> &'static str {
        match self {
            Self::Kafka => "ccloud_metric_",
            Self::Connector => "ccloud_metric_connector_",
            Self::Ksql => "ccloud_metric_ksql_",
            Self::SchemaRegistry => "ccloud_metric_schema_registry_",
        }
    }

    /// Whether `metric` lives in this kind's namespace.
    pub fn owns_metric(&self, metric: &str) -> bool {
        metric
            .split_once('/')
            .is_some_and(|(namespace, _)| namespace == self.metric_namespace())
    }
}

/// API field name of a metric-scoped label.
pub fn metric_field(label: &str) -> String {
    format!("metric.{label}")
}

/// API field name of a resource-scoped label.
pub fn resource_field(label: &str) -> String {
    format!("resource.{}", label.strip_prefix("resource.").unwrap_or(label))
}

/// Exported (Prometheus) name of an API label: `kafka.id` becomes `kafka_id`.
pub fn exported_label_name(label: &str) -> String {
    label
        .strip_prefix("resource.")
        .unwrap_or(label)
        .replace('.', "_")
}
