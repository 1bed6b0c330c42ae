//! Conversion of query rows into samples.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::metric::CollectedMetric;
use crate::model::TOPIC_FIELD;
use crate::overlap::OverlapResolver;
use crate::query::{PinnedLabels, Row};
use crate::rule::Rule;
use crate::sink::Sample;

const VALUE_FIELD: &str = "value";
const TIMESTAMP_FIELD: &str = "timestamp";

/// Everything a row needs to become a sample.
pub(crate) struct RowContext<'a> {
    pub rule: &'a Rule,
    pub metric: &'a CollectedMetric,
    pub resolver: &'a OverlapResolver,
    /// Group-by fields removed by the optimizer.
    pub pinned: &'a PinnedLabels,
    pub no_timestamp: bool,
}

impl RowContext<'_> {
    /// Turn `rows` into samples. Rows that cannot be parsed are dropped one by one.
    pub(crate) fn samples(&self, rows: &[Row]) -> Vec<Sample> {
        rows.iter().filter_map(|row| self.sample(row)).collect()
    }

    fn sample(&self, row: &Row) -> Option<Sample> {
        let rule = self.rule;
        let metric_name = &self.metric.descriptor.name;

        let topic = self.field(row, TOPIC_FIELD);
        let cluster = self.field(row, &rule.kind().id_field());

        if let (Some(topic), Some(cluster)) = (&topic, &cluster)
            && self
                .resolver
                .should_suppress(rule, topic, cluster, metric_name)
        {
            tracing::trace!(rule = rule.id(), metric = %metric_name, topic = %topic, cluster = %cluster, "Row shadowed by a more specific rule");
            return None;
        }

        if let Some(topic) = &topic
            && rule.is_excluded_by_regex(topic)
        {
            return None;
        }

        let Some(value) = row.get(VALUE_FIELD).and_then(Value::as_f64) else {
            tracing::warn!(rule = rule.id(), metric = %metric_name, row = ?row, "Dropping row without a numeric value");
            return None;
        };

        let labels = self
            .metric
            .labels
            .iter()
            .map(|label| {
                let value = self.field(row, &label.field).unwrap_or_default();
                (label.name.clone(), value)
            })
            .collect();

        let sample = Sample::new(self.metric.family(), labels, value);
        if self.no_timestamp {
            return Some(sample);
        }

        match parse_timestamp(row) {
            Some(timestamp) => Some(sample.with_timestamp(timestamp)),
            None => {
                tracing::warn!(rule = rule.id(), metric = %metric_name, row = ?row, "Dropping row with an invalid timestamp");
                None
            }
        }
    }

    /// Value of `field` in the row, falling back to the pinned table.
    fn field(&self, row: &Row, field: &str) -> Option<String> {
        match row.get(field) {
            Some(Value::String(value)) => Some(value.clone()),
            Some(Value::Number(value)) => Some(value.to_string()),
            Some(Value::Bool(value)) => Some(value.to_string()),
            _ => self.pinned.get(field).cloned(),
        }
    }
}

fn parse_timestamp(row: &Row) -> Option<DateTime<Utc>> {
    let raw = row.get(TIMESTAMP_FIELD)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}
