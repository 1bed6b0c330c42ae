//! Metrics API queries.
//!
//! - [`Filter`]: recursive boolean filter tree
//! - [`QueryBuilder`]: turns a (metric, rule) pair into a [`Query`]
//! - [`optimize`]: removes group-by dimensions pinned by an equality filter

mod builder;
mod filter;
mod optimizer;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use builder::{DEFAULT_DELAY, MAX_DELAY, QueryBuilder, QueryWindow};
pub use filter::Filter;
pub use optimizer::{PinnedLabels, optimize};

/// Maximum number of rows the API returns for one query.
pub const ROW_LIMIT: usize = 1000;

/// One row of a query response: field name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Time bucket width the API aggregates data points into.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Granularity {
    #[default]
    #[serde(rename = "PT1M")]
    #[strum(serialize = "PT1M")]
    OneMinute,
    #[serde(rename = "PT5M")]
    #[strum(serialize = "PT5M")]
    FiveMinutes,
    #[serde(rename = "PT15M")]
    #[strum(serialize = "PT15M")]
    FifteenMinutes,
    #[serde(rename = "PT30M")]
    #[strum(serialize = "PT30M")]
    ThirtyMinutes,
    #[serde(rename = "PT1H")]
    #[strum(serialize = "PT1H")]
    OneHour,
}

impl Granularity {
    /// Width of one bucket.
    pub fn step(&self) -> Duration {
        match self {
            Self::OneMinute => Duration::from_secs(60),
            Self::FiveMinutes => Duration::from_secs(5 * 60),
            Self::FifteenMinutes => Duration::from_secs(15 * 60),
            Self::ThirtyMinutes => Duration::from_secs(30 * 60),
            Self::OneHour => Duration::from_secs(60 * 60),
        }
    }
}

/// Aggregation function applied to a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationOp {
    Sum,
}

/// Metric aggregation requested by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub metric: String,
    pub agg: AggregationOp,
}

/// Body of `POST v2/metrics/cloud/query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub aggregations: Vec<Aggregation>,
    pub filter: Filter,
    pub granularity: Granularity,
    pub group_by: Vec<String>,
    pub intervals: Vec<String>,
    pub limit: usize,
}

/// Response of the query endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_granularity_parse() {
        assert_eq!(Granularity::from_str("PT1M").unwrap(), Granularity::OneMinute);
        assert_eq!(Granularity::from_str("pt1h").unwrap(), Granularity::OneHour);
        assert!(Granularity::from_str("PT2M").is_err());
    }

    #[test]
    fn test_granularity_step() {
        assert_eq!(Granularity::OneMinute.step(), Duration::from_secs(60));
        assert_eq!(Granularity::FifteenMinutes.step(), Duration::from_secs(900));
        assert_eq!(Granularity::FiveMinutes.to_string(), "PT5M");
    }

    #[test]
    fn test_query_serialize() {
        let query = Query {
            aggregations: vec![Aggregation {
                metric: "io.confluent.kafka.server/received_bytes".to_string(),
                agg: AggregationOp::Sum,
            }],
            filter: Filter::and(vec![Filter::or(vec![Filter::eq(
                "resource.kafka.id",
                "lkc-1",
            )])]),
            granularity: Granularity::OneMinute,
            group_by: vec!["metric.topic".to_string()],
            intervals: vec!["2020-06-03T13:37:00Z/PT1M".to_string()],
            limit: ROW_LIMIT,
        };

        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "aggregations": [{"metric": "io.confluent.kafka.server/received_bytes", "agg": "SUM"}],
                "filter": {"op": "AND", "filters": [
                    {"op": "OR", "filters": [
                        {"op": "EQ", "field": "resource.kafka.id", "value": "lkc-1"}
                    ]}
                ]},
                "granularity": "PT1M",
                "group_by": ["metric.topic"],
                "intervals": ["2020-06-03T13:37:00Z/PT1M"],
                "limit": 1000
            })
        );
    }

    #[test]
    fn test_query_response_deserialize() {
        let json = r#"{"data": [{"metric.topic": "t", "value": 1.5}]}"#;
        let response: QueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0]["value"], 1.5);

        let empty: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.data.is_empty());
    }
}
