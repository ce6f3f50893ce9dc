#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gwsync_core::{
    CatalogCache, CatalogSnapshot, Deployments, Error, MemoryPublisher, PolicyDetail,
    ProductDetail, ProductPoller, ProxyPoller, ProxyRevision, ProxySnapshot, PublishCoordinator,
    RemoteCatalogClient, Result, RevisionConnection, RevisionSnapshot, SnapshotCatalog,
    SpecDetails, SpecPoller, VirtualHost, WorkerPool,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const SPEC_LOCATOR: &str = "/specs/orders";

pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap()
}

pub fn spec(id: &str, name: &str, hash: &str) -> SpecDetails {
    SpecDetails {
        id: id.into(),
        name: name.into(),
        content_locator: SPEC_LOCATOR.into(),
        modified: ts(1),
        content_hash: Some(hash.into()),
    }
}

pub fn product(name: &str) -> ProductDetail {
    ProductDetail {
        name: name.into(),
        display_name: name.into(),
        description: String::new(),
        last_modified: ts(2),
        attributes: Vec::new(),
    }
}

/// One spec `S1` named "Orders" and one product "Orders" built on it.
pub fn orders_snapshot(hash: &str, content: &str) -> CatalogSnapshot {
    CatalogSnapshot {
        specs: vec![spec("S1", "Orders", hash)],
        spec_contents: BTreeMap::from([(SPEC_LOCATOR.to_string(), content.to_string())]),
        products: vec![product("Orders")],
        ..Default::default()
    }
}

/// A proxy deployed to `prod` whose virtual host matches no cached spec.
pub fn lonely_proxy_snapshot() -> CatalogSnapshot {
    let revision = ProxyRevision {
        name: "inventory".into(),
        revision: "4".into(),
        display_name: "Inventory".into(),
        description: String::new(),
        spec: None,
        base_paths: vec!["/inventory".into()],
        policies: vec!["oauth".into()],
        resource_files: Vec::new(),
    };
    CatalogSnapshot {
        proxies: vec![ProxySnapshot {
            name: "inventory".into(),
            deployments: serde_json::from_str(
                r#"{"environments":[{"name":"prod","revisions":["4"]}]}"#,
            )
            .unwrap(),
            revisions: vec![RevisionSnapshot {
                revision,
                connection: RevisionConnection {
                    virtual_hosts: vec!["default".into()],
                    base_path: "/inventory".into(),
                },
                resources: BTreeMap::new(),
                policy_details: vec![PolicyDetail {
                    name: "oauth".into(),
                    policy_type: "OAuthV2".into(),
                }],
            }],
        }],
        virtual_hosts: BTreeMap::from([(
            "prod".to_string(),
            vec![VirtualHost {
                name: "default".into(),
                host_aliases: vec!["gw.example.com".into()],
                port: "8443".into(),
                tls: true,
                base_url: "/".into(),
            }],
        )]),
        ..Default::default()
    }
}

/// Fully wired engine over a snapshot client and an in-memory publisher.
pub struct Harness {
    pub client: Arc<SnapshotCatalog>,
    pub cache: Arc<CatalogCache>,
    pub publisher: Arc<MemoryPublisher>,
    pub specs: SpecPoller,
    pub products: ProductPoller,
    pub proxies: ProxyPoller,
}

impl Harness {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        let client = Arc::new(SnapshotCatalog::new(snapshot));
        let cache = Arc::new(CatalogCache::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let coordinator = Arc::new(PublishCoordinator::new(publisher.clone(), "Apigee"));

        let specs = SpecPoller::new(client.clone(), cache.clone(), WorkerPool::new(4));
        let products = ProductPoller::new(
            client.clone(),
            cache.clone(),
            coordinator.clone(),
            specs.first_run(),
            WorkerPool::new(4),
        );
        let proxies = ProxyPoller::new(
            client.clone(),
            cache.clone(),
            coordinator,
            specs.first_run(),
            WorkerPool::new(4),
            true,
        );

        Self {
            client,
            cache,
            publisher,
            specs,
            products,
            proxies,
        }
    }
}

/// Client that tracks how many product detail calls overlap.
pub struct InstrumentedClient {
    inner: SnapshotCatalog,
    delay: Duration,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl InstrumentedClient {
    pub fn new(snapshot: CatalogSnapshot, delay: Duration) -> Self {
        Self {
            inner: SnapshotCatalog::new(snapshot),
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteCatalogClient for InstrumentedClient {
    async fn list_specs(&self) -> Result<Vec<SpecDetails>> {
        self.inner.list_specs().await
    }

    async fn list_products(&self) -> Result<Vec<String>> {
        self.inner.list_products().await
    }

    async fn list_proxies(&self) -> Result<Vec<String>> {
        self.inner.list_proxies().await
    }

    async fn get_product_detail(&self, name: &str) -> Result<ProductDetail> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.inner.get_product_detail(name).await
    }

    async fn get_proxy_revision(&self, name: &str, revision: &str) -> Result<ProxyRevision> {
        self.inner.get_proxy_revision(name, revision).await
    }

    async fn get_deployments(&self, name: &str) -> Result<Deployments> {
        self.inner.get_deployments(name).await
    }

    async fn get_revision_connection(
        &self,
        name: &str,
        revision: &str,
    ) -> Result<RevisionConnection> {
        self.inner.get_revision_connection(name, revision).await
    }

    async fn get_virtual_host(&self, environment: &str, name: &str) -> Result<VirtualHost> {
        self.inner.get_virtual_host(environment, name).await
    }

    async fn get_resource_file(
        &self,
        name: &str,
        revision: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<Vec<u8>> {
        self.inner
            .get_resource_file(name, revision, resource_type, resource_name)
            .await
    }

    async fn get_policy(&self, name: &str, revision: &str, policy: &str) -> Result<PolicyDetail> {
        self.inner.get_policy(name, revision, policy).await
    }

    async fn get_spec_content(&self, locator: &str) -> Result<Vec<u8>> {
        self.inner.get_spec_content(locator).await
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }
}

/// Client whose listings fail while `failing` is set.
pub struct FlakyListings {
    inner: SnapshotCatalog,
    pub failing: AtomicBool,
}

impl FlakyListings {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            inner: SnapshotCatalog::new(snapshot),
            failing: AtomicBool::new(true),
        }
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::remote(operation, "503 Service Unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteCatalogClient for FlakyListings {
    async fn list_specs(&self) -> Result<Vec<SpecDetails>> {
        self.check("list_specs")?;
        self.inner.list_specs().await
    }

    async fn list_products(&self) -> Result<Vec<String>> {
        self.check("list_products")?;
        self.inner.list_products().await
    }

    async fn list_proxies(&self) -> Result<Vec<String>> {
        self.check("list_proxies")?;
        self.inner.list_proxies().await
    }

    async fn get_product_detail(&self, name: &str) -> Result<ProductDetail> {
        self.inner.get_product_detail(name).await
    }

    async fn get_proxy_revision(&self, name: &str, revision: &str) -> Result<ProxyRevision> {
        self.inner.get_proxy_revision(name, revision).await
    }

    async fn get_deployments(&self, name: &str) -> Result<Deployments> {
        self.inner.get_deployments(name).await
    }

    async fn get_revision_connection(
        &self,
        name: &str,
        revision: &str,
    ) -> Result<RevisionConnection> {
        self.inner.get_revision_connection(name, revision).await
    }

    async fn get_virtual_host(&self, environment: &str, name: &str) -> Result<VirtualHost> {
        self.inner.get_virtual_host(environment, name).await
    }

    async fn get_resource_file(
        &self,
        name: &str,
        revision: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<Vec<u8>> {
        self.inner
            .get_resource_file(name, revision, resource_type, resource_name)
            .await
    }

    async fn get_policy(&self, name: &str, revision: &str, policy: &str) -> Result<PolicyDetail> {
        self.inner.get_policy(name, revision, policy).await
    }

    async fn get_spec_content(&self, locator: &str) -> Result<Vec<u8>> {
        self.inner.get_spec_content(locator).await
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }
}
