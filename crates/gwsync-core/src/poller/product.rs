use super::{FirstRunSignal, Pollable, RunState};
use crate::cache::{CacheEntry, CatalogCache, CatalogKind};
use crate::client::RemoteCatalogClient;
use crate::description::{PRODUCT_MOD_DATE_DETAIL, SPEC_CONTENT_HASH_DETAIL, ServiceDescription};
use crate::filter::{DiscoveryFilter, FilterOutcome};
use crate::marker::{ModMarker, content_hash};
use crate::pool::WorkerPool;
use crate::publish::{CatalogKey, PublishCoordinator};
use crate::types::{ProductDetail, SPEC_LOCAL_ATTRIBUTE};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use std::sync::Arc;
use tracing::{debug, error, instrument, trace, warn};

/// Publishes API products together with the spec they are named after.
///
/// Products without a cached spec are skipped until one shows up, so this
/// poller only runs once the spec poller has completed a cycle.
pub struct ProductPoller {
    client: Arc<dyn RemoteCatalogClient>,
    cache: Arc<CatalogCache>,
    coordinator: Arc<PublishCoordinator>,
    filter: DiscoveryFilter,
    specs_ready: FirstRunSignal,
    pool: WorkerPool,
    state: RunState,
}

impl std::fmt::Debug for ProductPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductPoller")
            .field("workers", &self.pool.workers())
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl ProductPoller {
    /// Create a poller gated on `specs_ready`.
    pub fn new(
        client: Arc<dyn RemoteCatalogClient>,
        cache: Arc<CatalogCache>,
        coordinator: Arc<PublishCoordinator>,
        specs_ready: FirstRunSignal,
        pool: WorkerPool,
    ) -> Self {
        Self {
            client,
            cache,
            coordinator,
            filter: DiscoveryFilter::default(),
            specs_ready,
            pool,
            state: RunState::default(),
        }
    }

    /// Only publish products accepted by `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: DiscoveryFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Signal set after the first completed cycle.
    pub fn first_run(&self) -> FirstRunSignal {
        self.state.first_run()
    }

    /// Whether a cycle is in flight.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Locator of the spec a product is published with.
    ///
    /// A `spec_local` attribute wins; otherwise the cache is searched by
    /// product name, then by display name.
    fn spec_locator(&self, product: &ProductDetail) -> Option<String> {
        if let Some(local) = product.attribute(SPEC_LOCAL_ATTRIBUTE) {
            return Some(local.to_string());
        }
        [product.name.as_str(), product.display_name.as_str()]
            .into_iter()
            .filter(|name| !name.trim().is_empty())
            .find_map(|name| self.cache.get_by_secondary_key(CatalogKind::Spec, name))
            .map(|entry| entry.content_locator)
    }

    async fn handle_product(&self, name: String) {
        trace!(product = %name, "handling product");
        let product = match self.client.get_product_detail(&name).await {
            Ok(product) => product,
            Err(e) => {
                error!(product = %name, error = %e, "could not get product detail");
                return;
            },
        };

        match self.filter.evaluate(&product) {
            FilterOutcome::Accept => {},
            FilterOutcome::AgentProduct => {
                debug!(product = %name, "product was created by the agent, skipping");
                return;
            },
            FilterOutcome::Filtered => {
                debug!(product = %name, "product filtered out");
                return;
            },
        }

        let Some(locator) = self.spec_locator(&product) else {
            debug!(product = %name, "no spec found for product, skipping");
            return;
        };

        let spec = match self.download_spec(&locator).await {
            Ok(spec) => spec,
            Err(e) => {
                error!(product = %name, locator = %locator, error = %e, "could not download spec");
                return;
            },
        };
        let spec_hash = content_hash(&spec);
        let marker = ModMarker::Product {
            last_modified: product.last_modified,
            spec_hash: spec_hash.clone(),
        };
        let marker_moved = self.cache.has_changed(CatalogKind::Product, &name, &marker);

        let description = build_description(&product, spec, &spec_hash);
        let fingerprint = match description.fingerprint() {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                error!(product = %name, error = %e, "could not fingerprint description");
                return;
            },
        };

        let key = CatalogKey::product(&product.name);
        match self.coordinator.submit(&key, &fingerprint, description).await {
            Ok(decision) => {
                debug!(product = %name, %decision, marker_moved, "product handled");
                let entry = CacheEntry::new(&product.name, &product.name, &locator, marker)
                    .modified_at(product.last_modified);
                self.cache.put(CatalogKind::Product, entry);
            },
            Err(e) => error!(product = %name, error = %e, "could not publish product"),
        }
    }

    async fn download_spec(&self, locator: &str) -> Result<Vec<u8>> {
        let spec = self.client.get_spec_content(locator).await?;
        if spec.is_empty() {
            return Err(Error::Parse("spec had no content".into()));
        }
        Ok(spec)
    }
}

fn build_description(product: &ProductDetail, spec: Vec<u8>, spec_hash: &str) -> ServiceDescription {
    let mut description = ServiceDescription::new(&product.name)
        .with_title(&product.display_name)
        .with_description(&product.description)
        .with_spec(spec)
        .with_agent_detail(
            PRODUCT_MOD_DATE_DETAIL,
            product
                .last_modified
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .with_agent_detail(SPEC_CONTENT_HASH_DETAIL, spec_hash);
    for attribute in &product.attributes {
        let name = attribute.name.to_lowercase().replace(' ', "_");
        description = description.with_attribute(name, &attribute.value);
    }
    description
}

#[async_trait]
impl Pollable for ProductPoller {
    fn name(&self) -> &'static str {
        "poll_products"
    }

    fn ready(&self) -> bool {
        self.client.is_ready() && self.specs_ready.is_set()
    }

    #[instrument(name = "poll_products", skip_all)]
    async fn execute(&self) -> Result<()> {
        let Some(_running) = self.state.try_begin() else {
            warn!("previous product poll still running, skipping cycle");
            return Ok(());
        };

        let products = self.client.list_products().await.map_err(|e| {
            error!(error = %e, "could not list products");
            e
        })?;

        let handled = self
            .pool
            .run(products, |name| self.handle_product(name))
            .await;
        self.state.complete_first_run();
        debug!(handled, "product poll complete");
        Ok(())
    }

    fn status(&self) -> Result<()> {
        if self.client.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady("product catalog".into()))
        }
    }
}
