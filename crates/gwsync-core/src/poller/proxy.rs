use super::{FirstRunSignal, Pollable, RunState};
use crate::cache::{CacheEntry, CatalogCache, CatalogKind};
use crate::client::RemoteCatalogClient;
use crate::description::{CredentialType, SPEC_CONTENT_HASH_DETAIL, ServiceDescription};
use crate::endpoint::definitions_from_urls;
use crate::marker::{ModMarker, content_hash};
use crate::pool::WorkerPool;
use crate::publish::{CatalogKey, PublishCoordinator};
use crate::resolver::SpecResolver;
use crate::types::{PolicyKind, ProxyRevision};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, instrument, trace, warn};

#[derive(Debug, Default, Clone, Copy)]
struct PolicySummary {
    api_key: bool,
    oauth: bool,
    quota: bool,
}

/// Publishes every deployed proxy revision, one description per environment.
///
/// Revisions without a resolvable spec are still published, without a spec
/// attached.
pub struct ProxyPoller {
    client: Arc<dyn RemoteCatalogClient>,
    cache: Arc<CatalogCache>,
    coordinator: Arc<PublishCoordinator>,
    resolver: SpecResolver,
    specs_ready: FirstRunSignal,
    pool: WorkerPool,
    state: RunState,
}

impl std::fmt::Debug for ProxyPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPoller")
            .field("workers", &self.pool.workers())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl ProxyPoller {
    /// Create a poller gated on `specs_ready`.
    pub fn new(
        client: Arc<dyn RemoteCatalogClient>,
        cache: Arc<CatalogCache>,
        coordinator: Arc<PublishCoordinator>,
        specs_ready: FirstRunSignal,
        pool: WorkerPool,
        match_on_url: bool,
    ) -> Self {
        let resolver = SpecResolver::new(Arc::clone(&client), Arc::clone(&cache), match_on_url);
        Self {
            client,
            cache,
            coordinator,
            resolver,
            specs_ready,
            pool,
            state: RunState::default(),
        }
    }

    /// Signal set after the first completed cycle.
    pub fn first_run(&self) -> FirstRunSignal {
        self.state.first_run()
    }

    /// Whether a cycle is in flight.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    async fn handle_proxy(&self, name: String) {
        trace!(proxy = %name, "handling proxy");
        let deployments = match self.client.get_deployments(&name).await {
            Ok(deployments) => deployments,
            Err(e) => {
                error!(proxy = %name, error = %e, "could not get deployments");
                return;
            },
        };

        for environment in &deployments.environments {
            for revision in &environment.revisions {
                self.handle_revision(&name, &environment.name, revision).await;
            }
        }
    }

    async fn handle_revision(&self, proxy: &str, environment: &str, revision_id: &str) {
        let revision = match self.client.get_proxy_revision(proxy, revision_id).await {
            Ok(revision) => revision,
            Err(e) => {
                error!(proxy, environment, revision = revision_id, error = %e, "could not get revision");
                return;
            },
        };

        let policies = self.check_policies(proxy, &revision).await;
        let urls = self
            .resolver
            .revision_urls(proxy, environment, &revision.revision)
            .await;
        let source = self.resolver.resolve(proxy, &revision, &urls).await;

        let spec = match &source {
            Some(source) => match self.client.get_spec_content(source.locator()).await {
                Ok(spec) => {
                    debug!(proxy, environment, revision = revision_id, source = source.label(), locator = source.locator(), "resolved spec");
                    spec
                },
                Err(e) => {
                    error!(proxy, environment, revision = revision_id, locator = source.locator(), error = %e, "could not download spec");
                    return;
                },
            },
            None => {
                debug!(proxy, environment, revision = revision_id, "no spec found, publishing without one");
                Vec::new()
            },
        };

        let key = CatalogKey::proxy(&revision.name, environment);
        let marker = ModMarker::Revision(revision.revision.clone());
        let marker_moved = self
            .cache
            .has_changed(CatalogKind::Proxy, &key.cache_key, &marker);

        let description = build_description(&revision, environment, spec, &urls, policies);
        let fingerprint = match description.fingerprint() {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                error!(proxy, environment, error = %e, "could not fingerprint description");
                return;
            },
        };

        match self.coordinator.submit(&key, &fingerprint, description).await {
            Ok(decision) => {
                debug!(proxy, environment, revision = revision_id, %decision, marker_moved, "revision handled");
                let locator = source.as_ref().map_or("", |s| s.locator());
                let entry = CacheEntry::new(&key.cache_key, &key.cache_key, locator, marker)
                    .with_endpoints(urls);
                self.cache.put(CatalogKind::Proxy, entry);
            },
            Err(e) => {
                error!(proxy, environment, revision = revision_id, error = %e, "could not publish revision");
            },
        }
    }

    async fn check_policies(&self, proxy: &str, revision: &ProxyRevision) -> PolicySummary {
        let mut summary = PolicySummary::default();
        for policy in &revision.policies {
            let detail = match self
                .client
                .get_policy(proxy, &revision.revision, policy)
                .await
            {
                Ok(detail) => detail,
                Err(e) => {
                    debug!(proxy, policy = %policy, error = %e, "could not get policy");
                    continue;
                },
            };
            match detail.kind() {
                PolicyKind::ApiKey => summary.api_key = true,
                PolicyKind::OAuth => summary.oauth = true,
                PolicyKind::Quota => summary.quota = true,
                PolicyKind::Other => {},
            }
        }
        summary
    }
}

fn build_description(
    revision: &ProxyRevision,
    environment: &str,
    spec: Vec<u8>,
    urls: &[String],
    policies: PolicySummary,
) -> ServiceDescription {
    let spec_hash = content_hash(&spec);
    let mut description = ServiceDescription::new(&revision.name)
        .with_title(&revision.display_name)
        .with_description(&revision.description)
        .with_stage(environment)
        .with_version(&revision.revision)
        .with_spec(spec)
        .with_endpoints(definitions_from_urls(urls))
        .with_agent_detail(SPEC_CONTENT_HASH_DETAIL, spec_hash)
        .with_quota(policies.quota);
    if policies.api_key {
        description = description.with_credential_type(CredentialType::ApiKey);
    }
    if policies.oauth {
        description = description.with_credential_type(CredentialType::OAuth);
    }
    description
}

#[async_trait]
impl Pollable for ProxyPoller {
    fn name(&self) -> &'static str {
        "poll_proxies"
    }

    fn ready(&self) -> bool {
        self.client.is_ready() && self.specs_ready.is_set()
    }

    #[instrument(name = "poll_proxies", skip_all)]
    async fn execute(&self) -> Result<()> {
        let Some(_running) = self.state.try_begin() else {
            warn!("previous proxy poll still running, skipping cycle");
            return Ok(());
        };

        let proxies = self.client.list_proxies().await.map_err(|e| {
            error!(error = %e, "could not list proxies");
            e
        })?;

        let handled = self.pool.run(proxies, |name| self.handle_proxy(name)).await;
        self.state.complete_first_run();
        debug!(handled, cached = self.cache.len(CatalogKind::Proxy), "proxy poll complete");
        Ok(())
    }

    fn status(&self) -> Result<()> {
        if self.client.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady("proxy catalog".into()))
        }
    }
}
