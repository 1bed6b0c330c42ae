//! Group-by reduction.
//!
//! A dimension that an `OR` branch pins to one value carries no information:
//! every row would hold the same value. Dropping it from the group-by yields
//! fewer fields to aggregate on, and the pinned value is handed back to the
//! caller so that the exported label can still be filled in.

use std::collections::BTreeMap;

use super::{Filter, Query};

/// Group-by fields removed by [`optimize`], with their pinned value.
pub type PinnedLabels = BTreeMap<String, String>;

/// Remove every group-by dimension pinned to a single value.
///
/// Only `EQ` leaves that are direct children of an `OR` node count;
/// leaves directly below `AND` are ignored and nothing below a `NOT` is
/// visited. A dimension with zero or several matches is kept.
pub fn optimize(query: &Query) -> (Query, PinnedLabels) {
    let mut pinned = PinnedLabels::new();
    let mut group_by = Vec::with_capacity(query.group_by.len());

    for field in &query.group_by {
        let mut values = Vec::new();
        collect_or_values(&query.filter, field, &mut values);

        match values.as_slice() {
            [value] => {
                pinned.insert(field.clone(), (*value).to_string());
            }
            _ => group_by.push(field.clone()),
        }
    }

    let optimized = Query {
        group_by,
        ..query.clone()
    };
    (optimized, pinned)
}

fn collect_or_values<'a>(filter: &'a Filter, field: &str, values: &mut Vec<&'a str>) {
    match filter {
        Filter::Or { filters } => {
            for child in filters {
                if let Filter::Eq { field: f, value } = child
                    && f == field
                {
                    values.push(value);
                }
                collect_or_values(child, field, values);
            }
        }
        Filter::And { filters } => {
            for child in filters {
                collect_or_values(child, field, values);
            }
        }
        Filter::Not { .. } | Filter::Eq { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Aggregation, AggregationOp, Granularity, ROW_LIMIT};

    fn query(filter: Filter, group_by: &[&str]) -> Query {
        Query {
            aggregations: vec![Aggregation {
                metric: "io.confluent.kafka.server/retained_bytes".to_string(),
                agg: AggregationOp::Sum,
            }],
            filter,
            granularity: Granularity::OneMinute,
            group_by: group_by.iter().map(|s| s.to_string()).collect(),
            intervals: vec!["2020-06-03T13:37:00Z/PT1M".to_string()],
            limit: ROW_LIMIT,
        }
    }

    #[test]
    fn test_optimize_pins_single_cluster() {
        let q = query(
            Filter::and(vec![Filter::or(vec![Filter::eq(
                "resource.kafka.id",
                "cluster",
            )])]),
            &["metric.topic", "resource.kafka.id"],
        );

        let (optimized, pinned) = optimize(&q);
        assert_eq!(optimized.group_by, vec!["metric.topic"]);
        assert_eq!(pinned.get("resource.kafka.id").map(String::as_str), Some("cluster"));
        assert_eq!(optimized.filter, q.filter);
    }

    #[test]
    fn test_optimize_keeps_multiple_clusters() {
        let q = query(
            Filter::and(vec![Filter::or(vec![
                Filter::eq("resource.kafka.id", "cluster"),
                Filter::eq("resource.kafka.id", "cluster2"),
            ])]),
            &["metric.topic", "resource.kafka.id"],
        );

        let (optimized, pinned) = optimize(&q);
        assert_eq!(optimized.group_by, vec!["metric.topic", "resource.kafka.id"]);
        assert!(pinned.is_empty());
    }

    #[test]
    fn test_optimize_ignores_leaves_under_and_and_not() {
        let q = query(
            Filter::and(vec![
                Filter::or(vec![Filter::eq("resource.kafka.id", "cluster")]),
                Filter::and(vec![Filter::not(Filter::eq("metric.topic", "x"))]),
                Filter::eq("metric.type", "Produce"),
            ]),
            &["metric.topic", "metric.type"],
        );

        let (optimized, pinned) = optimize(&q);
        assert_eq!(optimized.group_by, vec!["metric.topic", "metric.type"]);
        assert!(pinned.is_empty());
    }

    #[test]
    fn test_optimize_keeps_dimension_negated_under_not() {
        let q = query(
            Filter::and(vec![
                Filter::or(vec![Filter::eq("resource.kafka.id", "cluster")]),
                Filter::not(Filter::or(vec![Filter::eq("metric.topic", "secret")])),
            ]),
            &["metric.topic", "resource.kafka.id"],
        );

        let (optimized, pinned) = optimize(&q);
        assert_eq!(optimized.group_by, vec!["metric.topic"]);
        assert_eq!(pinned.len(), 1);
        assert!(!pinned.contains_key("metric.topic"));
    }

    #[test]
    fn test_optimize_pins_nested_or() {
        let q = query(
            Filter::and(vec![
                Filter::or(vec![Filter::eq("resource.kafka.id", "cluster")]),
                Filter::or(vec![Filter::eq("metric.topic", "orders")]),
            ]),
            &["metric.topic", "resource.kafka.id", "metric.partition"],
        );

        let (optimized, pinned) = optimize(&q);
        assert_eq!(optimized.group_by, vec!["metric.partition"]);
        assert_eq!(pinned.len(), 2);
        assert_eq!(pinned["metric.topic"], "orders");
    }

    #[test]
    fn test_optimize_idempotent() {
        let q = query(
            Filter::and(vec![
                Filter::or(vec![Filter::eq("resource.kafka.id", "cluster")]),
                Filter::or(vec![
                    Filter::eq("metric.topic", "a"),
                    Filter::eq("metric.topic", "b"),
                ]),
            ]),
            &["metric.topic", "resource.kafka.id"],
        );

        let (once, pinned_once) = optimize(&q);
        let (twice, pinned_twice) = optimize(&once);
        assert_eq!(once, twice);
        assert_eq!(pinned_once.len(), 1);
        assert!(pinned_twice.is_empty());
    }
}
