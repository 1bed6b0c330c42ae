//! Query construction for one (metric, rule) pair.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use super::{Aggregation, AggregationOp, Filter, Granularity, Query, ROW_LIMIT};
use crate::model::{
    MetricDescriptor, ResourceDescriptor, ResourceKind, TOPIC_FIELD, TOPIC_LABEL, metric_field,
    resource_field,
};
use crate::rule::Rule;

/// Default delay before a window is considered final (2 minutes).
pub const DEFAULT_DELAY: Duration = Duration::from_secs(120);

/// Largest accepted delay: the Metrics API keeps seven days of data.
pub const MAX_DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Time window every query covers.
///
/// The most recent window of the API is not finalized yet and querying it
/// yields incomplete values, so the window always starts `delay` in the past,
/// aligned on a granularity boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub delay: Duration,
    pub granularity: Granularity,
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            granularity: Granularity::default(),
        }
    }
}

impl QueryWindow {
    pub fn new(delay: Duration, granularity: Granularity) -> Self {
        Self { delay, granularity }
    }

    /// Start of the window for a query issued at `now`.
    pub fn start_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = TimeDelta::from_std(self.delay)
            .ok()
            .and_then(|delay| now.checked_sub_signed(delay))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let step = self.granularity.step().as_secs() as i64;
        let secs = start.timestamp();
        DateTime::from_timestamp(secs - secs.rem_euclid(step), 0).unwrap_or(start)
    }

    /// Interval string for a query issued at `now`, e.g. `2020-06-03T13:37:00Z/PT1M`.
    pub fn interval_at(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}/{}",
            self.start_at(now).to_rfc3339_opts(SecondsFormat::Secs, true),
            self.granularity
        )
    }
}

/// Builds the [`Query`] collecting one metric for a set of resources.
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    metric: &'a MetricDescriptor,
    kind: ResourceKind,
    resource: &'a ResourceDescriptor,
    resources: &'a [String],
    group_by: &'a [String],
    topics: &'a [String],
    exclude_topics: &'a [String],
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder for `metric` on resources of `kind`.
    pub fn new(
        metric: &'a MetricDescriptor,
        kind: ResourceKind,
        resource: &'a ResourceDescriptor,
    ) -> Self {
        Self {
            metric,
            kind,
            resource,
            resources: &[],
            group_by: &[],
            topics: &[],
            exclude_topics: &[],
        }
    }

    /// Create a builder scoped by `rule`.
    pub fn for_rule(
        metric: &'a MetricDescriptor,
        resource: &'a ResourceDescriptor,
        rule: &'a Rule,
    ) -> Self {
        Self::new(metric, rule.kind(), resource)
            .resources(rule.resources())
            .group_by(rule.group_by_labels())
            .topics(rule.topics())
            .exclude_topics(rule.exclude_topics())
    }

    pub fn resources(mut self, resources: &'a [String]) -> Self {
        self.resources = resources;
        self
    }

    pub fn group_by(mut self, labels: &'a [String]) -> Self {
        self.group_by = labels;
        self
    }

    pub fn topics(mut self, topics: &'a [String]) -> Self {
        self.topics = topics;
        self
    }

    pub fn exclude_topics(mut self, topics: &'a [String]) -> Self {
        self.exclude_topics = topics;
        self
    }

    /// Build the query for a request issued at `now`.
    pub fn build(&self, window: &QueryWindow, now: DateTime<Utc>) -> Query {
        let id_field = self.kind.id_field();
        let mut filters = vec![Filter::or(
            self.resources
                .iter()
                .map(|resource| Filter::eq(&id_field, resource))
                .collect(),
        )];

        if self.metric.has_label(TOPIC_LABEL) {
            filters.extend(self.topic_filter());
        }

        Query {
            aggregations: vec![Aggregation {
                metric: self.metric.name.clone(),
                agg: AggregationOp::Sum,
            }],
            filter: Filter::and(filters),
            granularity: window.granularity,
            group_by: self.group_by_fields(),
            intervals: vec![window.interval_at(now)],
            limit: ROW_LIMIT,
        }
    }

    /// Positive include filter, or negative exclude filter when no topic is listed.
    fn topic_filter(&self) -> Option<Filter> {
        let included: Vec<&String> = self
            .topics
            .iter()
            .filter(|topic| !self.exclude_topics.contains(topic))
            .collect();

        if !self.topics.is_empty() {
            // Every listed topic may be excluded; keep matching nothing rather than everything.
            return Some(Filter::or(
                included
                    .into_iter()
                    .map(|topic| Filter::eq(TOPIC_FIELD, topic))
                    .collect(),
            ));
        }

        if self.exclude_topics.is_empty() {
            return None;
        }

        Some(Filter::and(
            self.exclude_topics
                .iter()
                .map(|topic| Filter::not(Filter::eq(TOPIC_FIELD, topic)))
                .collect(),
        ))
    }

    /// Group-by fields for requested labels the metric or resource supports.
    fn group_by_fields(&self) -> Vec<String> {
        let requested = |key: &str| self.group_by.iter().any(|label| label == key);

        let metric_fields = self
            .metric
            .labels
            .iter()
            .filter(|label| requested(&label.key))
            .map(|label| metric_field(&label.key));

        let resource_fields = self
            .group_by
            .iter()
            .filter_map(|label| self.resource.find_label(label))
            .map(resource_field);

        // Connectors, ksql and schema registries always break down per resource.
        let id_field = (self.kind != ResourceKind::Kafka
            && self.resource.has_label(self.kind.id_label()))
        .then(|| self.kind.id_field());

        let mut fields: Vec<String> = Vec::new();
        for field in metric_fields.chain(resource_fields).chain(id_field) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}
