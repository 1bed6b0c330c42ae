//! Rule entries of the configuration file.

use serde::{Deserialize, Serialize};

use super::validation::ConfigError;
use crate::model::ResourceKind;
use crate::rule::Rule;

/// Metrics collected when a rule does not list any.
pub const DEFAULT_METRICS: &[&str] = &[
    "io.confluent.kafka.server/received_bytes",
    "io.confluent.kafka.server/sent_bytes",
    "io.confluent.kafka.server/received_records",
    "io.confluent.kafka.server/sent_records",
    "io.confluent.kafka.server/retained_bytes",
    "io.confluent.kafka.server/active_connection_count",
    "io.confluent.kafka.server/request_count",
    "io.confluent.kafka.server/partition_count",
    "io.confluent.kafka.server/successful_authentication_count",
    "io.confluent.kafka.connect/sent_bytes",
    "io.confluent.kafka.connect/received_bytes",
    "io.confluent.kafka.connect/received_records",
    "io.confluent.kafka.connect/sent_records",
    "io.confluent.kafka.connect/dead_letter_queue_records",
    "io.confluent.kafka.ksql/streaming_unit_count",
    "io.confluent.kafka.schema_registry/schema_count",
];

/// Labels grouped by when a rule does not list any.
pub const DEFAULT_LABELS: &[&str] = &["kafka.id", "topic", "type"];

fn default_metrics() -> Vec<String> {
    DEFAULT_METRICS.iter().map(|m| m.to_string()).collect()
}

fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
}

/// One `rules` entry.
///
/// An entry may target several resource kinds at once; it then expands into
/// one [`Rule`] per kind, all sharing the entry's position as id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Kafka cluster ids (`lkc-*`).
    #[serde(default)]
    pub clusters: Vec<String>,
    /// Connector ids (`lcc-*`).
    #[serde(default)]
    pub connectors: Vec<String>,
    /// ksqlDB application ids (`lksqlc-*`).
    #[serde(default)]
    pub ksql: Vec<String>,
    /// Schema Registry ids (`lsrc-*`).
    #[serde(default)]
    pub schema_registries: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub exclude_topics: Vec<String>,
    #[serde(default)]
    pub exclude_topics_regex: Vec<String>,
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            connectors: Vec::new(),
            ksql: Vec::new(),
            schema_registries: Vec::new(),
            topics: Vec::new(),
            exclude_topics: Vec::new(),
            exclude_topics_regex: Vec::new(),
            metrics: default_metrics(),
            labels: default_labels(),
        }
    }
}

impl RuleConfig {
    /// Default rule over `clusters`.
    pub fn for_clusters(clusters: Vec<String>) -> Self {
        Self {
            clusters,
            ..Self::default()
        }
    }

    /// Targets of `kind`.
    pub fn targets(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Kafka => &self.clusters,
            ResourceKind::Connector => &self.connectors,
            ResourceKind::Ksql => &self.ksql,
            ResourceKind::SchemaRegistry => &self.schema_registries,
        }
    }

    /// Expand into one validated rule per targeted kind.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if no resource is targeted, or
    /// `ConfigError::Rule` if a rule invariant is violated.
    pub fn to_rules(&self, id: usize) -> Result<Vec<Rule>, ConfigError> {
        let mut rules = Vec::new();

        for kind in ResourceKind::ALL {
            let targets = self.targets(kind);
            if targets.is_empty() {
                continue;
            }

            let mut builder = Rule::builder(id, kind)
                .resources(targets.iter().cloned())
                .metrics(self.metrics.iter().cloned())
                .group_by(self.labels.iter().cloned());

            // Topics only exist on Kafka clusters.
            if kind == ResourceKind::Kafka {
                builder = builder
                    .topics(self.topics.iter().cloned())
                    .exclude_topics(self.exclude_topics.iter().cloned())
                    .exclude_topics_regex(self.exclude_topics_regex.iter().cloned());
            }

            rules.push(builder.build()?);
        }

        if rules.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "rule {id}: no cluster, connector, ksql application or schema registry specified"
            )));
        }
        Ok(rules)
    }
}
