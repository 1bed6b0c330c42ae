//! Collection rules.
//!
//! A [`Rule`] selects a set of resources of one [`ResourceKind`], a set of
//! metrics and the labels to group by. Rules are validated once at startup by
//! [`RuleBuilder::build`] and are immutable afterwards.

use regex::Regex;
use thiserror::Error;

use crate::model::{PARTITION_LABEL, ResourceKind};

/// Violations of the rule invariants.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule must target at least one resource.
    #[error("rule {id}: no {kind} resource specified")]
    NoResources { id: usize, kind: ResourceKind },

    /// A rule must collect at least one metric.
    #[error("rule {id}: no metric specified")]
    NoMetrics { id: usize },

    /// Partition cardinality is too high to leave unfiltered.
    #[error("rule {id}: grouping by partition requires a topic list")]
    PartitionWithoutTopics { id: usize },

    /// A topic literal cannot be both included and excluded.
    #[error("rule {id}: topic '{topic}' is both included and excluded")]
    TopicIncludedAndExcluded { id: usize, topic: String },

    /// An exclusion pattern does not compile.
    #[error("rule {id}: invalid exclude_topics_regex '{pattern}': {source}")]
    InvalidRegex {
        id: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A validated collection rule.
#[derive(Debug, Clone)]
pub struct Rule {
    id: usize,
    kind: ResourceKind,
    resources: Vec<String>,
    topics: Vec<String>,
    exclude_topics: Vec<String>,
    exclude_topics_regex: Vec<Regex>,
    metrics: Vec<String>,
    group_by_labels: Vec<String>,
}

impl Rule {
    /// Start building a rule for `kind` with the given configuration position.
    pub fn builder(id: usize, kind: ResourceKind) -> RuleBuilder {
        RuleBuilder::new(id, kind)
    }

    /// Position of the rule in the configuration.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Targeted resource identifiers.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn targets_resource(&self, resource: &str) -> bool {
        self.resources.iter().any(|r| r == resource)
    }

    /// Topic allow-list; empty means every topic.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn has_topic_filter(&self) -> bool {
        !self.topics.is_empty()
    }

    /// Whether the allow-list names `topic`.
    pub fn filters_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    pub fn exclude_topics(&self) -> &[String] {
        &self.exclude_topics
    }

    /// Whether `topic` matches any exclusion pattern.
    pub fn is_excluded_by_regex(&self, topic: &str) -> bool {
        self.exclude_topics_regex.iter().any(|re| re.is_match(topic))
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn has_metric(&self, metric: &str) -> bool {
        self.metrics.iter().any(|m| m == metric)
    }

    pub fn group_by_labels(&self) -> &[String] {
        &self.group_by_labels
    }
}

/// Builder validating the [`Rule`] invariants.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    id: usize,
    kind: ResourceKind,
    resources: Vec<String>,
    topics: Vec<String>,
    exclude_topics: Vec<String>,
    exclude_topics_regex: Vec<String>,
    metrics: Vec<String>,
    group_by_labels: Vec<String>,
}

impl RuleBuilder {
    fn new(id: usize, kind: ResourceKind) -> Self {
        Self {
            id,
            kind,
            resources: Vec::new(),
            topics: Vec::new(),
            exclude_topics: Vec::new(),
            exclude_topics_regex: Vec::new(),
            metrics: Vec::new(),
            group_by_labels: Vec::new(),
        }
    }

    /// Set the targeted resource identifiers.
    pub fn resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the topic allow-list.
    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Set the literal topic deny-list.
    pub fn exclude_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Set the topic deny-list patterns.
    pub fn exclude_topics_regex<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_topics_regex = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the metrics to collect.
    pub fn metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    /// Set the labels to group by.
    pub fn group_by<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and build the rule.
    ///
    /// # Errors
    /// Returns the first [`RuleError`] the configuration violates.
    pub fn build(self) -> Result<Rule, RuleError> {
        let id = self.id;

        if self.resources.is_empty() {
            return Err(RuleError::NoResources {
                id,
                kind: self.kind,
            });
        }

        if self.metrics.is_empty() {
            return Err(RuleError::NoMetrics { id });
        }

        if self.kind == ResourceKind::Kafka
            && self.topics.is_empty()
            && self.group_by_labels.iter().any(|l| l == PARTITION_LABEL)
        {
            return Err(RuleError::PartitionWithoutTopics { id });
        }

        if let Some(topic) = self
            .topics
            .iter()
            .find(|topic| self.exclude_topics.contains(topic))
        {
            return Err(RuleError::TopicIncludedAndExcluded {
                id,
                topic: topic.clone(),
            });
        }

        let exclude_topics_regex = self
            .exclude_topics_regex
            .into_iter()
            .map(|pattern| {
                Regex::new(&pattern).map_err(|source| RuleError::InvalidRegex {
                    id,
                    pattern,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Rule {
            id,
            kind: self.kind,
            resources: self.resources,
            topics: self.topics,
            exclude_topics: self.exclude_topics,
            exclude_topics_regex,
            metrics: self.metrics,
            group_by_labels: self.group_by_labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METRIC: &str = "io.confluent.kafka.server/retained_bytes";

    #[test]
    fn test_rule_builder_valid() {
        let rule = Rule::builder(3, ResourceKind::Kafka)
            .resources(["lkc-1", "lkc-2"])
            .topics(["orders"])
            .metrics([METRIC])
            .group_by(["topic", "partition"])
            .build()
            .unwrap();

        assert_eq!(rule.id(), 3);
        assert!(rule.targets_resource("lkc-2"));
        assert!(!rule.targets_resource("lkc-3"));
        assert!(rule.has_topic_filter());
        assert!(rule.filters_topic("orders"));
        assert!(rule.has_metric(METRIC));
    }

    #[test]
    fn test_rule_requires_resources() {
        let err = Rule::builder(0, ResourceKind::Connector)
            .metrics([METRIC])
            .build()
            .unwrap_err();
        assert!(matches!(err, RuleError::NoResources { id: 0, .. }));
        assert!(err.to_string().contains("no connector resource"));
    }

    #[test]
    fn test_rule_requires_metrics() {
        let err = Rule::builder(0, ResourceKind::Kafka)
            .resources(["lkc-1"])
            .build()
            .unwrap_err();
        assert!(matches!(err, RuleError::NoMetrics { id: 0 }));
    }

    #[test]
    fn test_rule_partition_requires_topics() {
        let err = Rule::builder(1, ResourceKind::Kafka)
            .resources(["lkc-1"])
            .metrics([METRIC])
            .group_by(["topic", "partition"])
            .build()
            .unwrap_err();
        assert!(matches!(err, RuleError::PartitionWithoutTopics { id: 1 }));
    }

    #[test]
    fn test_rule_topic_included_and_excluded() {
        let err = Rule::builder(2, ResourceKind::Kafka)
            .resources(["lkc-1"])
            .metrics([METRIC])
            .topics(["a", "b"])
            .exclude_topics(["b"])
            .build()
            .unwrap_err();
        match err {
            RuleError::TopicIncludedAndExcluded { id, topic } => {
                assert_eq!(id, 2);
                assert_eq!(topic, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_invalid_regex() {
        let err = Rule::builder(0, ResourceKind::Kafka)
            .resources(["lkc-1"])
            .metrics([METRIC])
            .exclude_topics_regex(["(unclosed"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("invalid exclude_topics_regex"));
    }

    #[test]
    fn test_rule_regex_exclusion() {
        let rule = Rule::builder(0, ResourceKind::Kafka)
            .resources(["lkc-1"])
            .metrics([METRIC])
            .exclude_topics_regex(["^_confluent.*", "tmp$"])
            .build()
            .unwrap();
        assert!(rule.is_excluded_by_regex("_confluent-metrics"));
        assert!(rule.is_excluded_by_regex("orders-tmp"));
        assert!(!rule.is_excluded_by_regex("orders"));
    }
}
