//! Collaborator contracts consumed by the engine.

use crate::Result;
use crate::endpoint::EndpointDefinition;
use crate::types::{
    Deployments, PolicyDetail, ProductDetail, ProxyRevision, RevisionConnection, SpecDetails,
    VirtualHost,
};
use async_trait::async_trait;

/// Read access to the gateway management plane.
///
/// Implementations own transport, authentication and timeouts. Every call
/// must eventually return; the engine does not impose its own deadline.
#[async_trait]
pub trait RemoteCatalogClient: Send + Sync {
    /// Full spec listing.
    async fn list_specs(&self) -> Result<Vec<SpecDetails>>;

    /// Names of all products.
    async fn list_products(&self) -> Result<Vec<String>>;

    /// Names of all proxies.
    async fn list_proxies(&self) -> Result<Vec<String>>;

    /// Full detail of one product.
    async fn get_product_detail(&self, name: &str) -> Result<ProductDetail>;

    /// Metadata of one proxy revision.
    async fn get_proxy_revision(&self, name: &str, revision: &str) -> Result<ProxyRevision>;

    /// Where a proxy is deployed.
    async fn get_deployments(&self, name: &str) -> Result<Deployments>;

    /// Virtual hosts and base path a revision is exposed through.
    async fn get_revision_connection(
        &self,
        name: &str,
        revision: &str,
    ) -> Result<RevisionConnection>;

    /// One virtual host of an environment.
    async fn get_virtual_host(&self, environment: &str, name: &str) -> Result<VirtualHost>;

    /// Raw content of a resource file attached to a revision.
    async fn get_resource_file(
        &self,
        name: &str,
        revision: &str,
        resource_type: &str,
        resource_name: &str,
    ) -> Result<Vec<u8>>;

    /// Detail of a policy attached to a revision.
    async fn get_policy(&self, name: &str, revision: &str, policy: &str) -> Result<PolicyDetail>;

    /// Raw spec content, addressed by storage path or full URL.
    async fn get_spec_content(&self, locator: &str) -> Result<Vec<u8>>;

    /// Whether authentication has completed and calls may be made.
    fn is_ready(&self) -> bool;
}

/// Extracts served endpoints from a spec document.
pub trait SpecParser: Send + Sync {
    /// Endpoints the document declares.
    fn endpoints(&self, content: &[u8]) -> Result<Vec<EndpointDefinition>>;
}
