//! Recursive filter tree of a query.

use serde::{Deserialize, Serialize};

/// A query filter.
///
/// Leaves compare one field for equality; branches combine children.
/// Serialized with the operator as the `op` tag, e.g.
/// `{"op": "EQ", "field": "metric.topic", "value": "orders"}` or
/// `{"op": "NOT", "filter": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Filter {
    #[serde(rename = "EQ")]
    Eq { field: String, value: String },
    #[serde(rename = "AND")]
    And { filters: Vec<Filter> },
    #[serde(rename = "OR")]
    Or { filters: Vec<Filter> },
    #[serde(rename = "NOT")]
    Not { filter: Box<Filter> },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And { filters }
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or { filters }
    }

    pub fn not(filter: Filter) -> Self {
        Self::Not {
            filter: Box::new(filter),
        }
    }

    /// Child filters of a branch node; empty for leaves and `NOT`.
    pub fn children(&self) -> &[Filter] {
        match self {
            Self::And { filters } | Self::Or { filters } => filters,
            Self::Eq { .. } | Self::Not { .. } => &[],
        }
    }
}
