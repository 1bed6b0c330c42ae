//! Exported samples and their Prometheus text rendering.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

/// A metric family as announced by `describe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricIdentity {
    pub name: String,
    pub help: String,
    /// Label names, in the order sample values are given.
    pub label_names: Vec<String>,
}

impl MetricIdentity {
    pub fn new(name: impl Into<String>, help: impl Into<String>, label_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            label_names,
        }
    }
}

/// One gauge sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub family: String,
    /// (label name, label value) pairs in family label order.
    pub labels: Vec<(String, String)>,
    pub value: f64,
    /// Data point time; `None` when timestamps are disabled.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Sample {
    pub fn new(family: impl Into<String>, labels: Vec<(String, String)>, value: f64) -> Self {
        Self {
            family: family.into(),
            labels,
            value,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Value of label `name`, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Render `samples` in the Prometheus text exposition format.
///
/// Families are emitted in `identities` order; families without samples are
/// omitted. Samples of an undeclared family are rendered after the declared ones.
pub fn render(identities: &[MetricIdentity], samples: &[Sample]) -> Result<String, prometheus::Error> {
    let mut by_family: HashMap<&str, Vec<&Sample>> = HashMap::new();
    let mut undeclared: Vec<&str> = Vec::new();
    for sample in samples {
        let entry = by_family.entry(sample.family.as_str()).or_default();
        if entry.is_empty() && !identities.iter().any(|id| id.name == sample.family) {
            undeclared.push(sample.family.as_str());
        }
        entry.push(sample);
    }

    let declared = identities
        .iter()
        .map(|id| (id.name.as_str(), id.help.as_str()));
    let extra = undeclared.into_iter().map(|name| (name, name));

    let families: Vec<MetricFamily> = declared
        .chain(extra)
        .filter_map(|(name, help)| {
            let samples = by_family.get(name)?;
            Some(family(name, help, samples))
        })
        .collect();

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

fn family(name: &str, help: &str, samples: &[&Sample]) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(name.to_string());
    family.set_help(help.to_string());
    family.set_field_type(MetricType::GAUGE);

    for sample in samples {
        let mut metric = Metric::default();
        for (key, value) in &sample.labels {
            let mut pair = LabelPair::default();
            pair.set_name(key.clone());
            pair.set_value(value.clone());
            metric.mut_label().push(pair);
        }

        let mut gauge = Gauge::default();
        gauge.set_value(sample.value);
        metric.set_gauge(gauge);

        if let Some(timestamp) = sample.timestamp {
            metric.set_timestamp_ms(timestamp.timestamp_millis());
        }
        family.mut_metric().push(metric);
    }
    family
}
