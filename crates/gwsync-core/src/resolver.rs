//! Spec resolution for deployed proxy revisions.
//!
//! A revision is matched to a spec by the first step that yields one:
//!
//! 1. the spec URL embedded in the revision metadata
//! 2. an `openapi/association.json` resource file naming a cached spec
//! 3. a cached spec whose name equals the revision name
//! 4. a cached spec serving one of the revision's virtual host URLs
//!
//! Step 4 can be disabled with `specs.match_on_url`. No match is not an
//! error: the proxy is published without a spec.

use crate::cache::{CatalogCache, CatalogKind};
use crate::client::RemoteCatalogClient;
use crate::endpoint::urls_from_virtual_host;
use crate::types::{Association, ProxyRevision};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Where a revision's spec was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    /// Spec URL from the revision metadata.
    Explicit(String),
    /// Spec path from an association resource file.
    Association(String),
    /// Cached spec named after the revision.
    NameMatch(String),
    /// Cached spec serving one of the revision's endpoints.
    Endpoint(String),
}

impl SpecSource {
    /// Locator the spec content is downloaded from.
    pub fn locator(&self) -> &str {
        match self {
            Self::Explicit(l) | Self::Association(l) | Self::NameMatch(l) | Self::Endpoint(l) => l,
        }
    }

    /// Short label for logging.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Explicit(_) => "explicit",
            Self::Association(_) => "association",
            Self::NameMatch(_) => "name",
            Self::Endpoint(_) => "endpoint",
        }
    }
}

/// Resolves specs for proxy revisions against the shared cache.
pub struct SpecResolver {
    client: Arc<dyn RemoteCatalogClient>,
    cache: Arc<CatalogCache>,
    match_on_url: bool,
}

impl std::fmt::Debug for SpecResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecResolver")
            .field("match_on_url", &self.match_on_url)
            .finish_non_exhaustive()
    }
}

impl SpecResolver {
    /// Create a resolver.
    pub fn new(
        client: Arc<dyn RemoteCatalogClient>,
        cache: Arc<CatalogCache>,
        match_on_url: bool,
    ) -> Self {
        Self {
            client,
            cache,
            match_on_url,
        }
    }

    /// Externally reachable URLs of a deployed revision.
    ///
    /// One URL per host alias of every bound virtual host, with the
    /// revision's base path appended. Lookup failures are logged and yield
    /// fewer URLs.
    pub async fn revision_urls(&self, proxy: &str, environment: &str, revision: &str) -> Vec<String> {
        let connection = match self.client.get_revision_connection(proxy, revision).await {
            Ok(connection) => connection,
            Err(e) => {
                error!(proxy, environment, revision, "could not get revision connection: {e}");
                return Vec::new();
            },
        };

        let mut urls = Vec::new();
        for name in &connection.virtual_hosts {
            match self.client.get_virtual_host(environment, name).await {
                Ok(virtual_host) => urls.extend(
                    urls_from_virtual_host(&virtual_host)
                        .into_iter()
                        .map(|url| format!("{url}{}", connection.base_path)),
                ),
                Err(e) => {
                    error!(proxy, environment, virtual_host = %name, "could not get virtual host: {e}");
                },
            }
        }
        urls
    }

    /// Resolve the spec for `revision`, reachable at `urls`.
    pub async fn resolve(
        &self,
        proxy: &str,
        revision: &ProxyRevision,
        urls: &[String],
    ) -> Option<SpecSource> {
        if let Some(spec) = revision.explicit_spec() {
            return Some(SpecSource::Explicit(spec.to_string()));
        }

        if let Some(path) = self.association(proxy, revision).await {
            return Some(SpecSource::Association(path));
        }

        if let Some(entry) = self
            .cache
            .get_by_secondary_key(CatalogKind::Spec, &revision.name)
        {
            return Some(SpecSource::NameMatch(entry.content_locator));
        }

        if self.match_on_url {
            for url in urls {
                if let Some(locator) = self.cache.get_latest_by_endpoint(CatalogKind::Spec, url) {
                    trace!(proxy, url = %url, "spec matched by endpoint");
                    return Some(SpecSource::Endpoint(locator));
                }
            }
        }

        None
    }

    async fn association(&self, proxy: &str, revision: &ProxyRevision) -> Option<String> {
        for resource in revision.resource_files.iter().filter(|r| r.is_association()) {
            let content = match self
                .client
                .get_resource_file(
                    proxy,
                    &revision.revision,
                    &resource.resource_type,
                    &resource.name,
                )
                .await
            {
                Ok(content) => content,
                Err(e) => {
                    debug!(proxy, revision = %revision.revision, "could not download association file: {e}");
                    continue;
                },
            };

            let association: Association = match serde_json::from_slice(&content) {
                Ok(association) => association,
                Err(e) => {
                    debug!(proxy, revision = %revision.revision, "could not read association file: {e}");
                    continue;
                },
            };

            if association.url.trim().is_empty() {
                continue;
            }
            if self
                .cache
                .get_by_locator(CatalogKind::Spec, &association.url)
                .is_some()
            {
                return Some(association.url);
            }
            debug!(
                proxy,
                revision = %revision.revision,
                path = %association.url,
                "associated spec is not cached"
            );
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::marker::ModMarker;
    use crate::snapshot::{CatalogSnapshot, ProxySnapshot, RevisionSnapshot, SnapshotCatalog};
    use crate::types::{ResourceFile, RevisionConnection, VirtualHost};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn revision(spec: Option<&str>, with_association: bool) -> ProxyRevision {
        ProxyRevision {
            name: "orders-proxy".into(),
            revision: "1".into(),
            display_name: String::new(),
            description: String::new(),
            spec: spec.map(ToString::to_string),
            base_paths: vec!["/orders".into()],
            policies: Vec::new(),
            resource_files: if with_association {
                vec![ResourceFile {
                    resource_type: "openapi".into(),
                    name: "association.json".into(),
                }]
            } else {
                Vec::new()
            },
        }
    }

    fn snapshot(revision: ProxyRevision) -> CatalogSnapshot {
        CatalogSnapshot {
            proxies: vec![ProxySnapshot {
                name: "orders-proxy".into(),
                deployments: Default::default(),
                revisions: vec![RevisionSnapshot {
                    revision,
                    connection: RevisionConnection {
                        virtual_hosts: vec!["secure".into(), "missing".into()],
                        base_path: "/orders".into(),
                    },
                    resources: BTreeMap::from([(
                        "openapi/association.json".to_string(),
                        r#"{"url":"/specs/associated"}"#.to_string(),
                    )]),
                    policy_details: Vec::new(),
                }],
            }],
            virtual_hosts: BTreeMap::from([(
                "prod".to_string(),
                vec![VirtualHost {
                    name: "secure".into(),
                    host_aliases: vec!["api.example.com".into()],
                    port: "443".into(),
                    tls: true,
                    base_url: "/".into(),
                }],
            )]),
            ..Default::default()
        }
    }

    fn cache() -> Arc<CatalogCache> {
        let cache = Arc::new(CatalogCache::new());
        cache.put(
            CatalogKind::Spec,
            CacheEntry::new(
                "assoc",
                "Associated",
                "/specs/associated",
                ModMarker::Hash("a".into()),
            ),
        );
        cache.put(
            CatalogKind::Spec,
            CacheEntry::new(
                "by-url",
                "Served Orders",
                "/specs/served",
                ModMarker::Hash("b".into()),
            )
            .with_endpoints(["https://api.example.com/orders"]),
        );
        cache
    }

    fn resolver(revision: &ProxyRevision, cache: Arc<CatalogCache>, match_on_url: bool) -> SpecResolver {
        let client = Arc::new(SnapshotCatalog::new(snapshot(revision.clone())));
        SpecResolver::new(client, cache, match_on_url)
    }

    #[tokio::test]
    async fn test_revision_urls_skip_unknown_virtual_hosts() {
        let rev = revision(None, false);
        let resolver = resolver(&rev, cache(), true);
        let urls = resolver.revision_urls("orders-proxy", "prod", "1").await;
        assert_eq!(urls, vec!["https://api.example.com/orders"]);
    }

    #[tokio::test]
    async fn test_revision_urls_empty_without_connection() {
        let rev = revision(None, false);
        let resolver = resolver(&rev, cache(), true);
        assert!(resolver.revision_urls("orders-proxy", "prod", "9").await.is_empty());
    }

    #[tokio::test]
    async fn test_resolver_precedence() {
        let urls = vec!["https://api.example.com/orders".to_string()];

        // Everything available: the explicit URL wins.
        let rev = revision(Some("https://specs.example.com/orders.json"), true);
        let found = resolver(&rev, cache(), true)
            .resolve("orders-proxy", &rev, &urls)
            .await;
        assert_eq!(
            found,
            Some(SpecSource::Explicit("https://specs.example.com/orders.json".into()))
        );

        // Without it: the association.
        let rev = revision(None, true);
        let found = resolver(&rev, cache(), true)
            .resolve("orders-proxy", &rev, &urls)
            .await;
        assert_eq!(found, Some(SpecSource::Association("/specs/associated".into())));

        // Without that: the endpoint match.
        let rev = revision(None, false);
        let found = resolver(&rev, cache(), true)
            .resolve("orders-proxy", &rev, &urls)
            .await;
        assert_eq!(found, Some(SpecSource::Endpoint("/specs/served".into())));
    }

    #[tokio::test]
    async fn test_name_match_precedes_endpoint() {
        let cache = cache();
        cache.put(
            CatalogKind::Spec,
            CacheEntry::new("named", "Orders-Proxy", "/specs/named", ModMarker::Hash("n".into())),
        );
        let rev = revision(None, false);
        let found = resolver(&rev, cache, true)
            .resolve("orders-proxy", &rev, &["https://api.example.com/orders".to_string()])
            .await
            .unwrap();
        assert_eq!(found.label(), "name");
        assert_eq!(found.locator(), "/specs/named");
    }

    #[tokio::test]
    async fn test_uncached_association_falls_through() {
        let cache = Arc::new(CatalogCache::new());
        let rev = revision(None, true);
        let found = resolver(&rev, cache, true)
            .resolve("orders-proxy", &rev, &[])
            .await;
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_endpoint_match_can_be_disabled() {
        let rev = revision(None, false);
        let found = resolver(&rev, cache(), false)
            .resolve("orders-proxy", &rev, &["https://api.example.com/orders".to_string()])
            .await;
        assert_eq!(found, None);
    }
}
