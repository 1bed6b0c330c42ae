//! One collection cycle.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;

use super::fatal::FatalSignal;
use super::metric::{LATENCY_FAMILY, LATENCY_METRIC_LABEL, LATENCY_RULE_LABEL, MetricCatalog};
use super::response::RowContext;
use crate::client::MetricsApi;
use crate::overlap::OverlapResolver;
use crate::query::{QueryBuilder, QueryWindow, ROW_LIMIT, optimize};
use crate::sink::Sample;

/// Knobs shared by every query of a cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionSettings {
    pub window: QueryWindow,
    /// Drop data point timestamps from samples.
    pub no_timestamp: bool,
}

/// Runs collection cycles over every (rule, metric) pair.
#[derive(Clone)]
pub struct CollectionOrchestrator {
    api: Arc<dyn MetricsApi>,
    catalog: Arc<MetricCatalog>,
    resolver: Arc<OverlapResolver>,
    settings: CollectionSettings,
    fatal: FatalSignal,
}

impl std::fmt::Debug for CollectionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionOrchestrator")
            .field("rules", &self.resolver.rules().len())
            .field("metrics", &self.catalog.metrics().len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CollectionOrchestrator {
    pub fn new(
        api: Arc<dyn MetricsApi>,
        catalog: Arc<MetricCatalog>,
        resolver: Arc<OverlapResolver>,
        settings: CollectionSettings,
        fatal: FatalSignal,
    ) -> Self {
        Self {
            api,
            catalog,
            resolver,
            settings,
            fatal,
        }
    }

    /// (rule index, metric name) pairs with a known descriptor.
    fn units(&self) -> Vec<(usize, String)> {
        self.resolver
            .rules()
            .iter()
            .enumerate()
            .flat_map(|(index, rule)| {
                rule.metrics()
                    .iter()
                    .filter(move |metric| self.catalog.metric(rule.kind(), metric).is_some())
                    .map(move |metric| (index, metric.clone()))
            })
            .collect()
    }

    /// Run one cycle, pushing every sample into `sink`.
    ///
    /// Returns once every query has completed. Failed queries contribute only
    /// their latency sample.
    pub async fn collect(&self, sink: &UnboundedSender<Sample>) -> usize {
        let started = Instant::now();
        let units = self.units();
        let count = units.len();

        let mut tasks = JoinSet::new();
        for (rule_index, metric) in units {
            let unit = CollectionUnit {
                orchestrator: self.clone(),
                rule_index,
                metric,
                sink: sink.clone(),
            };
            tasks.spawn(unit.run());
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Collection task failed");
            }
        }

        tracing::debug!(
            queries = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection cycle complete"
        );
        count
    }
}

/// Query of one metric for one rule.
struct CollectionUnit {
    orchestrator: CollectionOrchestrator,
    rule_index: usize,
    metric: String,
    sink: UnboundedSender<Sample>,
}

impl CollectionUnit {
    async fn run(self) {
        let o = &self.orchestrator;
        let Some(rule) = o.resolver.rules().get(self.rule_index) else {
            return;
        };
        let kind = rule.kind();
        let (Some(metric), Some(resource)) = (
            o.catalog.metric(kind, &self.metric),
            o.catalog.resource(kind),
        ) else {
            return;
        };

        let query = QueryBuilder::for_rule(&metric.descriptor, resource, rule)
            .build(&o.settings.window, Utc::now());
        let (query, pinned) = optimize(&query);
        tracing::trace!(rule = rule.id(), metric = %self.metric, query = ?query, pinned = ?pinned, "Optimized query");

        let started = Instant::now();
        let result = o.api.query(&query).await;
        let latency = started.elapsed().as_secs_f64();

        // A closed receiver means the cycle's consumer is gone; nothing to do.
        let _ = self.sink.send(Sample::new(
            LATENCY_FAMILY,
            vec![
                (LATENCY_METRIC_LABEL.to_string(), self.metric.clone()),
                (LATENCY_RULE_LABEL.to_string(), rule.id().to_string()),
            ],
            latency,
        ));

        let response = match result {
            Ok(response) => response,
            Err(err) if err.is_fatal() => {
                tracing::error!(rule = rule.id(), metric = %self.metric, error = %err, "Metrics API rejected credentials");
                o.fatal.raise(err.to_string());
                return;
            }
            Err(err) => {
                tracing::warn!(rule = rule.id(), metric = %self.metric, error = %err, "Query failed");
                return;
            }
        };

        if response.data.len() >= ROW_LIMIT {
            tracing::warn!(
                rule = rule.id(),
                metric = %self.metric,
                rows = response.data.len(),
                "Query returned the maximum number of rows; results are likely truncated"
            );
        }

        let ctx = RowContext {
            rule,
            metric,
            resolver: &o.resolver,
            pinned: &pinned,
            no_timestamp: o.settings.no_timestamp,
        };
        for sample in ctx.samples(&response.data) {
            if self.sink.send(sample).is_err() {
                break;
            }
        }
    }
}
