//! The exporter: bootstrap, describe and collect.
//!
//! [`Exporter::bootstrap`] fetches the descriptors once and builds the
//! collection pipeline. Each [`Exporter::collect`] then runs one cycle, or
//! replays the cached one while it is fresh.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::cache::{DEFAULT_CACHE_TTL, ResultCache};
use crate::client::{ApiError, MetricsApi};
use crate::collector::{CollectionOrchestrator, CollectionSettings, FatalSignal, MetricCatalog};
use crate::model::{ModelError, ResourceKind};
use crate::overlap::OverlapResolver;
use crate::query::QueryWindow;
use crate::rule::Rule;
use crate::sink::{self, MetricIdentity, Sample};

/// Errors raised while starting the exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// A descriptor endpoint failed.
    #[error("failed to fetch descriptors: {0}")]
    Api(#[from] ApiError),

    /// The descriptors do not match the rules.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Nothing to collect.
    #[error("no rule configured")]
    NoRules,
}

/// Runtime settings of the exporter.
#[derive(Debug, Clone, Copy)]
pub struct ExporterSettings {
    pub window: QueryWindow,
    pub no_timestamp: bool,
    /// Zero disables the cache.
    pub cache_ttl: Duration,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            window: QueryWindow::default(),
            no_timestamp: false,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl ExporterSettings {
    fn collection(&self) -> CollectionSettings {
        CollectionSettings {
            window: self.window,
            no_timestamp: self.no_timestamp,
        }
    }
}

/// Collects the configured rules and serves their samples.
#[derive(Debug)]
pub struct Exporter {
    orchestrator: CollectionOrchestrator,
    cache: ResultCache,
    identities: Vec<MetricIdentity>,
    fatal: FatalSignal,
}

impl Exporter {
    /// Fetch the descriptors needed by `rules` and build the exporter.
    ///
    /// # Errors
    /// Fails if a descriptor endpoint fails, or if the API does not expose the
    /// resource type of a rule.
    pub async fn bootstrap(
        api: Arc<dyn MetricsApi>,
        rules: Vec<Rule>,
        settings: ExporterSettings,
    ) -> Result<Self, ExporterError> {
        if rules.is_empty() {
            return Err(ExporterError::NoRules);
        }

        let resources = api.resource_descriptors().await?;
        let mut catalog = MetricCatalog::new();

        for kind in ResourceKind::ALL {
            if !rules.iter().any(|rule| rule.kind() == kind) {
                continue;
            }

            let resource_type: &str = kind.as_ref();
            let resource = resources
                .iter()
                .find(|r| r.kind() == Some(kind))
                .cloned()
                .ok_or_else(|| ModelError::MissingResourceType(kind.to_string()))?;
            catalog.insert_resource(kind, resource);

            let descriptors = api.metric_descriptors(resource_type).await?;
            tracing::debug!(resource_type = %kind, metrics = descriptors.len(), "Fetched metric descriptors");

            let mut warned = HashSet::new();
            for rule in rules.iter().filter(|rule| rule.kind() == kind) {
                for name in rule.metrics() {
                    if !ResourceKind::ALL.iter().any(|k| k.owns_metric(name)) {
                        if warned.insert(name.clone()) {
                            tracing::warn!(rule = rule.id(), metric = %name, "Metric does not belong to any known resource type; skipping");
                        }
                        continue;
                    }
                    if !kind.owns_metric(name) {
                        continue;
                    }

                    match descriptors.iter().find(|d| &d.name == name) {
                        Some(descriptor) => catalog.insert_metric(kind, descriptor.clone())?,
                        None => {
                            if warned.insert(name.clone()) {
                                tracing::warn!(rule = rule.id(), metric = %name, resource_type = %kind, "Metric not exposed by the Metrics API; skipping");
                            }
                        }
                    }
                }
            }
        }

        Ok(Self::from_parts(api, rules, catalog, settings))
    }

    /// Build an exporter from already fetched descriptors.
    pub fn from_parts(
        api: Arc<dyn MetricsApi>,
        rules: Vec<Rule>,
        catalog: MetricCatalog,
        settings: ExporterSettings,
    ) -> Self {
        let resolver = OverlapResolver::new(rules.into());
        for overlap in resolver.ambiguous_overlaps() {
            tracing::warn!(
                first = overlap.first,
                second = overlap.second,
                cluster = %overlap.cluster,
                metric = %overlap.metric,
                "Rules overlap with the same specificity; both will report the series"
            );
        }

        let identities = catalog.identities();
        let fatal = FatalSignal::new();
        let orchestrator = CollectionOrchestrator::new(
            api,
            Arc::new(catalog),
            Arc::new(resolver),
            settings.collection(),
            fatal.clone(),
        );

        let cache = ResultCache::new(settings.cache_ttl);
        if cache.is_enabled() {
            tracing::debug!(ttl = ?cache.ttl(), "Result cache enabled");
        } else {
            tracing::debug!("Result cache disabled");
        }

        Self {
            orchestrator,
            cache,
            identities,
            fatal,
        }
    }

    /// Families this exporter may emit.
    pub fn describe(&self) -> Vec<MetricIdentity> {
        self.identities.clone()
    }

    /// Signal raised when the API rejects the credentials.
    pub fn fatal_signal(&self) -> FatalSignal {
        self.fatal.clone()
    }

    /// Samples of a fresh cycle, or of the cached one while it is valid.
    pub async fn collect(&self) -> Vec<Sample> {
        if !self.cache.is_enabled() {
            return self.run_cycle(false).await;
        }

        if let Some(samples) = self.cache.maybe_serve() {
            tracing::debug!(samples = samples.len(), "Serving cached samples");
            return samples;
        }

        let _refresh = self.cache.lock_refresh().await;
        // Another scrape may have refreshed while we waited.
        if let Some(samples) = self.cache.maybe_serve() {
            return samples;
        }
        self.run_cycle(true).await
    }

    /// Collect and render in the Prometheus text format.
    pub async fn render(&self) -> Result<String, prometheus::Error> {
        let samples = self.collect().await;
        sink::render(&self.identities, &samples)
    }

    async fn run_cycle(&self, cached: bool) -> Vec<Sample> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let drain = tokio::spawn(async move {
            let mut samples = Vec::new();
            while let Some(sample) = rx.recv().await {
                samples.push(sample);
            }
            samples
        });

        if cached {
            let sink = self.cache.begin_cycle(tx);
            self.orchestrator.collect(&sink.sender()).await;
            sink.finish().await;
        } else {
            self.orchestrator.collect(&tx).await;
            drop(tx);
        }

        drain.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Sample drain failed");
            Vec::new()
        })
    }
}
