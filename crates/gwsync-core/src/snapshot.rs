//! Snapshot-backed catalog client.
//!
//! [`SnapshotCatalog`] serves a [`CatalogSnapshot`] through the
//! [`RemoteCatalogClient`] contract. A snapshot is a JSON document holding
//! everything the management plane would return. It backs offline replays
//! from the CLI and the integration tests, and can be swapped between poll
//! cycles to simulate upstream changes.

use crate::client::RemoteCatalogClient;
use crate::types::{
    Deployments, PolicyDetail, ProductDetail, ProxyRevision, RevisionConnection, SpecDetails,
    VirtualHost,
};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// One revision as captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSnapshot {
    /// Revision metadata.
    #[serde(flatten)]
    pub revision: ProxyRevision,
    /// Connection (virtual hosts and base path).
    #[serde(default)]
    pub connection: RevisionConnection,
    /// Resource file contents keyed by `type/name`.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    /// Policy details by policy name.
    #[serde(default)]
    pub policy_details: Vec<PolicyDetail>,
}

/// One proxy as captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySnapshot {
    /// Proxy name.
    pub name: String,
    /// Deployments across environments.
    #[serde(default)]
    pub deployments: Deployments,
    /// Revisions of the proxy.
    #[serde(default)]
    pub revisions: Vec<RevisionSnapshot>,
}

/// Complete state of a remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    /// Spec listing.
    #[serde(default)]
    pub specs: Vec<SpecDetails>,
    /// Spec contents keyed by locator.
    #[serde(default)]
    pub spec_contents: BTreeMap<String, String>,
    /// Products with full detail.
    #[serde(default)]
    pub products: Vec<ProductDetail>,
    /// Proxies.
    #[serde(default)]
    pub proxies: Vec<ProxySnapshot>,
    /// Virtual hosts keyed by environment.
    #[serde(default)]
    pub virtual_hosts: BTreeMap<String, Vec<VirtualHost>>,
    /// Whether the client reports ready.
    #[serde(default = "default_ready")]
    pub ready: bool,
}

const fn default_ready() -> bool {
    true
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self {
            specs: Vec::new(),
            spec_contents: BTreeMap::new(),
            products: Vec::new(),
            proxies: Vec::new(),
            virtual_hosts: BTreeMap::new(),
            ready: true,
        }
    }
}

impl CatalogSnapshot {
    /// Parse a snapshot from JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn proxy(&self, name: &str) -> Result<&ProxySnapshot> {
        self.proxies
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::NotFound(format!("proxy {name}")))
    }

    fn revision(&self, name: &str, revision: &str) -> Result<&RevisionSnapshot> {
        self.proxy(name)?
            .revisions
            .iter()
            .find(|r| r.revision.revision == revision)
            .ok_or_else(|| Error::NotFound(format!("proxy {name} revision {revision}")))
    }
}

/// [`RemoteCatalogClient`] serving an in-memory [`CatalogSnapshot`].
#[derive(Debug, Default)]
pub struct SnapshotCatalog {
    state: RwLock<CatalogSnapshot>,
}

impl SnapshotCatalog {
    /// Serve `snapshot`.
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Replace the served snapshot.
    pub fn replace(&self, snapshot: CatalogSnapshot) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Mutate the served snapshot in place.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut CatalogSnapshot),
    {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }

    fn read<T>(&self, f: impl FnOnce(&CatalogSnapshot) -> Result<T>) -> Result<T> {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl RemoteCatalogClient for SnapshotCatalog {
    async fn list_specs(&self) -> Result<Vec<SpecDetails>> {
        self.read(|s| Ok(s.specs.clone()))
    }

    async fn list_products(&self) -> Result<Vec<String>> {
        self.read(|s| Ok(s.products.iter().map(|p| p.name.clone()).collect()))
    }

    async fn list_proxies(&self) -> Result<Vec<String>> {
        self.read(|s| Ok(s.proxies.iter().map(|p| p.name.clone()).collect()))
    }

    async fn get_product_detail(&self, name: &str) -> Result<ProductDetail> {
        self.read(|s| {
            s.products
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("product {name}")))
        })
    }

    async fn get_proxy_revision(&self, name: &str, revision: &str) -> Result<ProxyRevision> {
        self.read(|s| Ok(s.revision(name, revision)?.revision.clone()))
    }

    async fn get_deployments(&self, name: &str) -> Result<Deployments> {
        self.read(|s| Ok(s.proxy(name)?.deployments.clone()))
    }

    async fn get_revision_connection(
        &self,
        name: &str,
        revision: &str,
    ) -> Result<RevisionConnection> {
        self.read(|s| Ok(s.revision(name, revision)?.connection.clone()))
    }

    async fn get_virtual_host(&self, environment: &str, name: &str) -> Result<VirtualHost> {
        self.read(|s| {
            s.virtual_hosts
                .get(environment)
                .and_then(|hosts| hosts.iter().find(|vh| vh.name == name))
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("virtual host {environment}/{name}")))
        })
    }

    async fn get_resource_file(
        &self,
        name: &str,
        revision: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<Vec<u8>> {
        self.read(|s| {
            let key = format!("{resource_type}/{resource_name}");
            s.revision(name, revision)?
                .resources
                .get(&key)
                .map(|content| content.as_bytes().to_vec())
                .ok_or_else(|| Error::NotFound(format!("resource {key} on {name}/{revision}")))
        })
    }

    async fn get_policy(&self, name: &str, revision: &str, policy: &str) -> Result<PolicyDetail> {
        self.read(|s| {
            s.revision(name, revision)?
                .policy_details
                .iter()
                .find(|p| p.name == policy)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("policy {policy} on {name}/{revision}")))
        })
    }

    async fn get_spec_content(&self, locator: &str) -> Result<Vec<u8>> {
        self.read(|s| {
            s.spec_contents
                .get(locator)
                .map(|content| content.as_bytes().to_vec())
                .ok_or_else(|| Error::NotFound(format!("spec content at {locator}")))
        })
    }

    fn is_ready(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ready
    }
}
