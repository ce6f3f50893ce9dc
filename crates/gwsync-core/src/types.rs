//! Remote catalog models as returned by the gateway management plane.
//!
//! These are the already-decoded shapes handed over by a
//! [`RemoteCatalogClient`](crate::RemoteCatalogClient); the wire format itself
//! belongs to the client implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource type of revision files that associate a proxy with a spec.
pub const OPENAPI_RESOURCE_TYPE: &str = "openapi";

/// Resource name of the association file within the `openapi` type.
pub const ASSOCIATION_RESOURCE_NAME: &str = "association.json";

/// Product attribute marking products created by the agent itself.
pub const AGENT_PRODUCT_TAG: &str = "agent-product";

/// Value of [`AGENT_PRODUCT_TAG`] on agent-created products.
pub const AGENT_PRODUCT_TAG_VALUE: &str = "true";

/// Product attribute naming a locally stored spec file.
pub const SPEC_LOCAL_ATTRIBUTE: &str = "spec_local";

/// Spec document as listed by the remote spec store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecDetails {
    /// Remote identifier of the spec.
    pub id: String,
    /// Human name; products are matched to specs by this name.
    pub name: String,
    /// Storage path the content is downloaded from.
    pub content_locator: String,
    /// Last modification time reported by the spec store.
    pub modified: DateTime<Utc>,
    /// Content hash, when the listing carries one.
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// Name/value pair attached to products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

impl Attribute {
    /// Create an attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Full product detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    /// Product name, the catalog ID used when publishing.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Last modification time of the product itself.
    pub last_modified: DateTime<Utc>,
    /// Product attributes.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl ProductDetail {
    /// Look up an attribute value, comparing names case-insensitively.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|att| att.name.eq_ignore_ascii_case(name))
            .map(|att| att.value.as_str())
    }
}

/// Resource file attached to a proxy revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    /// Resource type, e.g. `openapi`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// File name.
    pub name: String,
}

impl ResourceFile {
    /// Whether this is the spec association file.
    pub fn is_association(&self) -> bool {
        self.resource_type == OPENAPI_RESOURCE_TYPE && self.name == ASSOCIATION_RESOURCE_NAME
    }
}

/// Content of an association resource file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Storage path of the associated spec.
    #[serde(alias = "URL")]
    pub url: String,
}

/// One revision of a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRevision {
    /// Proxy name.
    pub name: String,
    /// Revision identifier.
    pub revision: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Spec URL embedded in the revision metadata.
    #[serde(default)]
    pub spec: Option<String>,
    /// Base paths the revision serves.
    #[serde(default)]
    pub base_paths: Vec<String>,
    /// Names of policies attached to the revision.
    #[serde(default)]
    pub policies: Vec<String>,
    /// Resource files attached to the revision.
    #[serde(default)]
    pub resource_files: Vec<ResourceFile>,
}

impl ProxyRevision {
    /// Explicit spec URL, ignoring empty values.
    pub fn explicit_spec(&self) -> Option<&str> {
        self.spec.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Revisions of a proxy deployed to one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDeployment {
    /// Environment name.
    pub name: String,
    /// Deployed revision identifiers.
    #[serde(default)]
    pub revisions: Vec<String>,
}

/// Deployment state of a proxy across environments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployments {
    /// Per-environment deployments.
    #[serde(default)]
    pub environments: Vec<EnvironmentDeployment>,
}

/// How a revision is exposed: virtual hosts plus the proxy base path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionConnection {
    /// Names of the virtual hosts the revision is bound to.
    #[serde(default)]
    pub virtual_hosts: Vec<String>,
    /// Base path appended to every virtual host URL.
    #[serde(default)]
    pub base_path: String,
}

/// Virtual host definition of an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    /// Virtual host name.
    pub name: String,
    /// Host names the virtual host answers on.
    #[serde(default)]
    pub host_aliases: Vec<String>,
    /// Listening port as configured (string in the management API).
    #[serde(default)]
    pub port: String,
    /// Whether TLS is configured.
    #[serde(default)]
    pub tls: bool,
    /// Base URL prefix, `/` when unset.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "/".to_string()
}

/// Policy attached to a proxy revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDetail {
    /// Policy name.
    pub name: String,
    /// Policy type as reported by the gateway, e.g. `VerifyAPIKey`.
    pub policy_type: String,
}

/// Security-relevant policy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// API key verification.
    ApiKey,
    /// OAuth 2 token verification.
    OAuth,
    /// Quota enforcement.
    Quota,
    /// Anything else.
    Other,
}

impl PolicyDetail {
    /// Classify the policy by type.
    pub fn kind(&self) -> PolicyKind {
        match self.policy_type.as_str() {
            "VerifyAPIKey" => PolicyKind::ApiKey,
            "OAuthV2" => PolicyKind::OAuth,
            "Quota" => PolicyKind::Quota,
            _ => PolicyKind::Other,
        }
    }
}
