use super::{FirstRunSignal, Pollable, RunState};
use crate::cache::{CacheEntry, CatalogCache, CatalogKind};
use crate::client::{RemoteCatalogClient, SpecParser};
use crate::endpoint::EndpointDefinition;
use crate::marker::ModMarker;
use crate::pool::WorkerPool;
use crate::types::SpecDetails;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, instrument, trace, warn};

/// Keeps the spec section of the cache in sync with the remote spec store.
///
/// Changed specs are re-cached; when a [`SpecParser`] is configured their
/// content is downloaded and the endpoints they declare are indexed so
/// proxies can be matched to them by URL.
pub struct SpecPoller {
    client: Arc<dyn RemoteCatalogClient>,
    cache: Arc<CatalogCache>,
    parser: Option<Arc<dyn SpecParser>>,
    pool: WorkerPool,
    state: RunState,
}

impl std::fmt::Debug for SpecPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecPoller")
            .field("workers", &self.pool.workers())
            .field("parse_endpoints", &self.parser.is_some())
            .finish_non_exhaustive()
    }
}

impl SpecPoller {
    /// Create a poller that caches specs without parsing their content.
    pub fn new(
        client: Arc<dyn RemoteCatalogClient>,
        cache: Arc<CatalogCache>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            client,
            cache,
            parser: None,
            pool,
            state: RunState::default(),
        }
    }

    /// Extract endpoints from changed specs with `parser`.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn SpecParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Signal other pollers can wait on before resolving specs.
    pub fn first_run(&self) -> FirstRunSignal {
        self.state.first_run()
    }

    /// Whether a cycle is in flight.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    async fn handle_spec(&self, spec: SpecDetails) {
        let marker = spec
            .content_hash
            .clone()
            .map_or(ModMarker::Timestamp(spec.modified), ModMarker::Hash);

        if !self.cache.has_changed(CatalogKind::Spec, &spec.id, &marker) {
            trace!(spec_id = %spec.id, "spec unchanged");
            return;
        }

        let endpoints = match &self.parser {
            Some(parser) => match self.endpoints(parser.as_ref(), &spec).await {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    error!(spec_id = %spec.id, error = %e, "could not read spec endpoints");
                    return;
                },
            },
            None => Vec::new(),
        };

        debug!(
            spec_id = %spec.id,
            name = %spec.name,
            marker = %marker,
            endpoints = endpoints.len(),
            "caching spec"
        );
        let entry = CacheEntry::new(&spec.id, &spec.name, &spec.content_locator, marker)
            .modified_at(spec.modified)
            .with_endpoints(endpoints.iter().map(EndpointDefinition::to_url));
        self.cache.put(CatalogKind::Spec, entry);
    }

    async fn endpoints(
        &self,
        parser: &dyn SpecParser,
        spec: &SpecDetails,
    ) -> Result<Vec<EndpointDefinition>> {
        let content = self.client.get_spec_content(&spec.content_locator).await?;
        if content.is_empty() {
            return Err(Error::Parse(format!("spec {} has no content", spec.id)));
        }
        parser.endpoints(&content)
    }
}

#[async_trait]
impl Pollable for SpecPoller {
    fn name(&self) -> &'static str {
        "poll_specs"
    }

    fn ready(&self) -> bool {
        self.client.is_ready()
    }

    #[instrument(name = "poll_specs", skip_all)]
    async fn execute(&self) -> Result<()> {
        let Some(_running) = self.state.try_begin() else {
            warn!("previous spec poll still running, skipping cycle");
            return Ok(());
        };

        let specs = self.client.list_specs().await.map_err(|e| {
            error!(error = %e, "could not list specs");
            e
        })?;

        let handled = self.pool.run(specs, |spec| self.handle_spec(spec)).await;
        self.state.complete_first_run();
        debug!(handled, cached = self.cache.len(CatalogKind::Spec), "spec poll complete");
        Ok(())
    }

    fn status(&self) -> Result<()> {
        if self.client.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady("spec store".into()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::snapshot::{CatalogSnapshot, SnapshotCatalog};
    use chrono::{TimeZone, Utc};

    struct FixedParser(Vec<EndpointDefinition>);

    impl SpecParser for FixedParser {
        fn endpoints(&self, _content: &[u8]) -> Result<Vec<EndpointDefinition>> {
            Ok(self.0.clone())
        }
    }

    fn spec(id: &str, hash: Option<&str>) -> SpecDetails {
        SpecDetails {
            id: id.into(),
            name: format!("{id}-name"),
            content_locator: format!("/specs/{id}"),
            modified: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            content_hash: hash.map(ToString::to_string),
        }
    }

    fn catalog(specs: Vec<SpecDetails>) -> Arc<SnapshotCatalog> {
        let spec_contents = specs
            .iter()
            .map(|s| (s.content_locator.clone(), "openapi: 3.0.0".to_string()))
            .collect();
        Arc::new(SnapshotCatalog::new(CatalogSnapshot {
            specs,
            spec_contents,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_specs_are_cached_with_endpoints() {
        let client = catalog(vec![spec("s1", Some("h1"))]);
        let cache = Arc::new(CatalogCache::new());
        let parser = Arc::new(FixedParser(vec![EndpointDefinition::new(
            "https",
            "api.example.com",
            443,
            "/orders",
        )]));
        let poller = SpecPoller::new(client, cache.clone(), WorkerPool::new(2)).with_parser(parser);

        assert!(!poller.first_run().is_set());
        poller.execute().await.unwrap();
        assert!(poller.first_run().is_set());

        let entry = cache.get_by_id(CatalogKind::Spec, "s1").unwrap();
        assert_eq!(entry.marker, ModMarker::Hash("h1".into()));
        assert_eq!(
            cache.get_latest_by_endpoint(CatalogKind::Spec, "https://api.example.com/orders"),
            Some("/specs/s1".to_string())
        );
        assert!(
            cache
                .get_by_secondary_key(CatalogKind::Spec, "S1-NAME")
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_listing_without_hash_uses_timestamp() {
        let client = catalog(vec![spec("s1", None)]);
        let cache = Arc::new(CatalogCache::new());
        let poller = SpecPoller::new(client, cache.clone(), WorkerPool::new(1));
        poller.execute().await.unwrap();

        let entry = cache.get_by_id(CatalogKind::Spec, "s1").unwrap();
        assert!(matches!(entry.marker, ModMarker::Timestamp(_)));
        assert!(entry.endpoints.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_spec_is_skipped() {
        let client = catalog(vec![spec("s1", Some("h1")), spec("s2", Some("h2"))]);
        client.update(|s| {
            s.spec_contents.remove("/specs/s2");
        });
        let cache = Arc::new(CatalogCache::new());
        let poller = SpecPoller::new(client, cache.clone(), WorkerPool::new(2))
            .with_parser(Arc::new(FixedParser(Vec::new())));

        poller.execute().await.unwrap();
        assert!(cache.get_by_id(CatalogKind::Spec, "s1").is_some());
        assert!(cache.get_by_id(CatalogKind::Spec, "s2").is_none());
    }

    #[tokio::test]
    async fn test_status_follows_readiness() {
        let client = catalog(Vec::new());
        let poller = SpecPoller::new(client.clone(), Arc::new(CatalogCache::new()), WorkerPool::new(1));
        assert!(poller.ready());
        assert!(poller.status().is_ok());

        client.update(|s| s.ready = false);
        assert!(!poller.ready());
        assert_eq!(poller.status().unwrap_err().category(), "not_ready");
    }
}
