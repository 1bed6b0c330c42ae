//! Overlap resolution between rules.
//!
//! A broad rule (no topic list) and a narrow rule (explicit topic list) may
//! both cover the same (topic, cluster, metric) triple. The narrow rule wins:
//! rows of the broad rule for that triple are suppressed so the series is
//! exported once.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::ResourceKind;
use crate::rule::Rule;

type DecisionKey = (String, String, String);

/// Two rules with the same specificity covering the same series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousOverlap {
    pub first: usize,
    pub second: usize,
    pub cluster: String,
    pub metric: String,
}

/// Decides whether a rule's row is shadowed by a more specific rule.
///
/// Decisions are memoized per rule. Each rule owns its memo behind a
/// reader/writer lock; two collectors racing on the same key compute the same
/// answer, so the first insert wins and the second is dropped.
#[derive(Debug)]
pub struct OverlapResolver {
    rules: Arc<[Rule]>,
    memo: HashMap<(usize, ResourceKind), RwLock<HashMap<DecisionKey, bool>>>,
}

impl OverlapResolver {
    pub fn new(rules: Arc<[Rule]>) -> Self {
        let memo = rules
            .iter()
            .map(|rule| ((rule.id(), rule.kind()), RwLock::new(HashMap::new())))
            .collect();
        Self { rules, memo }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether `rule` must drop its row for (`topic`, `cluster`, `metric`).
    pub fn should_suppress(&self, rule: &Rule, topic: &str, cluster: &str, metric: &str) -> bool {
        let Some(memo) = self.memo.get(&(rule.id(), rule.kind())) else {
            return self.compute(rule, topic, cluster, metric);
        };

        let key = (topic.to_string(), cluster.to_string(), metric.to_string());
        if let Some(decision) = memo
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return *decision;
        }

        let decision = self.compute(rule, topic, cluster, metric);
        *memo
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(decision)
    }

    fn compute(&self, rule: &Rule, topic: &str, cluster: &str, metric: &str) -> bool {
        if rule.has_topic_filter() {
            return false;
        }

        self.rules.iter().any(|other| {
            other.id() != rule.id()
                && other.kind() == ResourceKind::Kafka
                && other.has_metric(metric)
                && other.targets_resource(cluster)
                && other.has_topic_filter()
                && other.filters_topic(topic)
        })
    }

    /// Pairs of Kafka rules that share a cluster and a metric with the same
    /// specificity. Both report the shared series.
    pub fn ambiguous_overlaps(&self) -> Vec<AmbiguousOverlap> {
        let kafka: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.kind() == ResourceKind::Kafka)
            .collect();

        let mut overlaps = Vec::new();
        for (i, first) in kafka.iter().enumerate() {
            for second in &kafka[i + 1..] {
                if first.id() == second.id() {
                    continue;
                }
                if !equally_specific(first, second) {
                    continue;
                }
                for cluster in first.resources() {
                    if !second.targets_resource(cluster) {
                        continue;
                    }
                    for metric in first.metrics() {
                        if second.has_metric(metric) {
                            overlaps.push(AmbiguousOverlap {
                                first: first.id(),
                                second: second.id(),
                                cluster: cluster.clone(),
                                metric: metric.clone(),
                            });
                        }
                    }
                }
            }
        }
        overlaps
    }
}

/// Both unfiltered, or both filtered on a shared topic.
fn equally_specific(a: &Rule, b: &Rule) -> bool {
    match (a.has_topic_filter(), b.has_topic_filter()) {
        (false, false) => true,
        (true, true) => a.topics().iter().any(|t| b.filters_topic(t)),
        _ => false,
    }
}
